//! Error types for the publishing core
//!
//! [`PublishError`] is the internal error of a publish or rollback sequence.
//! It never escapes the public entry points as-is: every failure is folded
//! into [`PublishOutcome::Failed`](crate::PublishOutcome) with a
//! [`FailureKind`] and a human-readable detail.

use crate::types::FailureKind;
use std::path::PathBuf;
use vellum_artifact::Revision;
use vellum_backend::BackendError;

/// Failure of one step of a publish or rollback
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Fetch or hard reset against the remote failed
    #[error("sync with remote failed: {0}")]
    Sync(#[source] BackendError),

    /// Reading, writing, staging or discarding the slot file failed
    #[error("updating working tree failed: {0}")]
    Write(#[source] BackendError),

    /// Creating the local commit failed
    #[error("commit failed: {0}")]
    Commit(#[source] BackendError),

    /// Remote rejected the push; the local commit is orphaned until the next sync
    #[error("push of {local} failed: {source}")]
    Push {
        /// Orphaned local commit
        local: Revision,
        #[source]
        source: BackendError,
    },

    /// Reading historical content failed for a reason other than absence
    #[error("reading historical content failed: {0}")]
    Restore(#[source] BackendError),

    /// Requested revision is not known
    #[error("{0}")]
    NotFound(String),

    /// No implicit rollback target exists
    #[error("{0}")]
    NoTarget(String),

    /// Audit log could not be read or written
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Published, but recording the publication failed
    #[error("published {revision} but recording it failed: {source}")]
    Unrecorded {
        /// Revision that reached the remote
        revision: Revision,
        #[source]
        source: AuditError,
    },

    /// Caller supplied an unusable request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Publishing task panicked or was aborted
    #[error("publishing task failed: {0}")]
    Internal(String),
}

impl PublishError {
    /// Classification carried by the failed outcome
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Sync(_) => FailureKind::Sync,
            Self::Write(_) => FailureKind::Write,
            Self::Commit(_) => FailureKind::Commit,
            Self::Push { .. } => FailureKind::Push,
            Self::Restore(_) => FailureKind::Restore,
            Self::NotFound(_) => FailureKind::NotFound,
            Self::NoTarget(_) => FailureKind::NoTarget,
            Self::Audit(e) | Self::Unrecorded { source: e, .. } => e.kind(),
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
            Self::Internal(_) => FailureKind::Internal,
        }
    }

    /// Create invalid request error
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}

/// Audit log failures
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Persisted log exists but cannot be parsed; it is left untouched
    #[error("audit log {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or replacing the log file failed
    #[error("audit log io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Records could not be serialized
    #[error("serializing audit log failed: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl AuditError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classification for outcomes
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Corrupt { .. } => FailureKind::CorruptLog,
            Self::Io { .. } | Self::Serialize(_) => FailureKind::AuditLog,
        }
    }
}

/// Preview lookup failures
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    /// Cache file could not be read or written
    #[error("preview cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rebuilding from history failed
    #[error("rebuilding preview failed: {0}")]
    Backend(#[from] BackendError),

    /// Slot or revision did not validate
    #[error("invalid preview request: {0}")]
    Invalid(String),
}

impl PreviewError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True if the revision (or the slot at that revision) does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(BackendError::NotFound { .. }))
    }
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`PublisherConfig`](crate::PublisherConfig)
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_error() -> BackendError {
        BackendError::Command {
            command: "git push origin".to_string(),
            status: "exit status: 1".to_string(),
            diagnostic: "rejected".to_string(),
        }
    }

    #[test]
    fn kinds_follow_the_failed_step() {
        assert_eq!(PublishError::Sync(command_error()).kind(), FailureKind::Sync);
        assert_eq!(
            PublishError::Push {
                local: Revision::new("abc123").unwrap(),
                source: command_error(),
            }
            .kind(),
            FailureKind::Push
        );
        assert_eq!(
            PublishError::invalid("empty").kind(),
            FailureKind::InvalidRequest
        );
    }

    #[test]
    fn corrupt_log_is_distinct_from_io() {
        let source = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let corrupt = AuditError::Corrupt {
            path: "logs/index.json".into(),
            source,
        };
        assert_eq!(corrupt.kind(), FailureKind::CorruptLog);
        assert_eq!(PublishError::from(corrupt).kind(), FailureKind::CorruptLog);

        let io = AuditError::io_error(
            "logs/index.json",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(io.kind(), FailureKind::AuditLog);
    }

    #[test]
    fn push_error_names_the_orphaned_commit() {
        let err = PublishError::Push {
            local: Revision::new("deadbeef").unwrap(),
            source: command_error(),
        };
        let msg = err.to_string();
        assert!(msg.contains("deadbeef"));
        assert!(msg.contains("rejected"));
    }
}
