//! Backend error types
//!
//! Every variant that wraps a failed command keeps the command's own
//! diagnostic output (credentials redacted) so operators can see what the
//! version-control tool actually said.

use std::path::PathBuf;
use std::time::Duration;
use vellum_artifact::{ArtifactError, Revision};

/// Errors from a [`crate::VersionBackend`]
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Command ran and exited unsuccessfully
    #[error("`{command}` failed ({status}): {diagnostic}")]
    Command {
        command: String,
        status: String,
        diagnostic: String,
    },

    /// Command exceeded its time bound and was killed
    #[error("`{command}` timed out after {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },

    /// Command could not be started
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Working-tree file I/O failed
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Path does not exist at the requested revision
    #[error("{path} not found at revision {revision}")]
    NotFound { revision: Revision, path: String },

    /// Backend produced something that is not a valid revision id
    #[error("backend returned an invalid revision: {0}")]
    InvalidRevision(#[from] ArtifactError),
}

impl BackendError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True if the error was a timeout
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;
