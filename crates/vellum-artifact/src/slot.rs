//! Slot names
//!
//! A slot is the logical identity of a publishable artifact (a site's
//! homepage, say). Each slot maps to exactly one tracked file in the
//! repository.

use crate::ArtifactError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Extension of every slot file in the repository
pub const SLOT_EXTENSION: &str = "html";

const MAX_SLOT_LEN: usize = 64;

/// Validated slot identifier
///
/// ASCII alphanumerics, `-` and `_` only, never starting with `-`. The
/// restriction keeps slot names safe to use both as a file name and as a
/// command argument.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotName(String);

impl SlotName {
    /// Validate and wrap a slot name
    ///
    /// # Errors
    /// Returns [`ArtifactError::InvalidSlot`] if the name is empty, too long,
    /// starts with `-`, or contains anything other than `[A-Za-z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, ArtifactError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= MAX_SLOT_LEN
            && !name.starts_with('-')
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid {
            Ok(Self(name))
        } else {
            Err(ArtifactError::InvalidSlot(name))
        }
    }

    /// The slot name as given
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tracked file name relative to the repository root (`index.html`)
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{SLOT_EXTENSION}", self.0)
    }
}

impl Display for SlotName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SlotName {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SlotName {
    type Error = ArtifactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SlotName> for String {
    fn from(slot: SlotName) -> Self {
        slot.0
    }
}
