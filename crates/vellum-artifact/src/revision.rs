//! Backend-assigned revision identifiers

use crate::ArtifactError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

const MAX_REVISION_LEN: usize = 128;

/// Opaque identifier naming a point in the published history
///
/// Assigned by the version backend and ordered only by the backend's history.
/// Validation guarantees a revision can never be mistaken for a command-line
/// option: it is non-empty, contains no whitespace or control characters, and
/// does not begin with `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision(String);

impl Revision {
    /// Validate and wrap a revision id
    ///
    /// # Errors
    /// Returns [`ArtifactError::InvalidRevision`] for ids that are empty, too
    /// long, start with `-`, or contain whitespace/control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, ArtifactError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= MAX_REVISION_LEN
            && !id.starts_with('-')
            && !id.chars().any(|c| c.is_whitespace() || c.is_control());
        if valid {
            Ok(Self(id))
        } else {
            Err(ArtifactError::InvalidRevision(id))
        }
    }

    /// The full id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated id (first 12 chars)
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Revision {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Revision {
    type Error = ArtifactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Revision> for String {
    fn from(rev: Revision) -> Self {
        rev.0
    }
}
