//! Request and outcome types shared by the engines and the facade

use crate::error::PublishError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use vellum_artifact::Revision;

/// Why a publish made no change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Candidate is equivalent to the published content
    Equivalent,
    /// Staged file is byte-identical to HEAD
    NoDiff,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equivalent => f.write_str("equivalent to published content"),
            Self::NoDiff => f.write_str("no changes to commit"),
        }
    }
}

/// Which step or precondition failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Sync,
    Write,
    Commit,
    Push,
    Restore,
    NotFound,
    NoTarget,
    CorruptLog,
    AuditLog,
    InvalidRequest,
    Internal,
}

impl FailureKind {
    /// Transient remote failures worth retrying as-is
    #[inline]
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Sync | Self::Push)
    }

    /// Failures caused by the request rather than the system
    #[inline]
    #[must_use]
    pub fn is_user_error(self) -> bool {
        matches!(self, Self::NotFound | Self::NoTarget | Self::InvalidRequest)
    }

    /// HTTP status a web shell should answer with
    #[must_use]
    pub fn status_hint(self) -> u16 {
        match self {
            Self::InvalidRequest | Self::NoTarget => 400,
            Self::NotFound => 404,
            Self::Sync | Self::Push => 502,
            Self::Write
            | Self::Commit
            | Self::Restore
            | Self::CorruptLog
            | Self::AuditLog
            | Self::Internal => 500,
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sync => "sync",
            Self::Write => "write",
            Self::Commit => "commit",
            Self::Push => "push",
            Self::Restore => "restore",
            Self::NotFound => "not_found",
            Self::NoTarget => "no_target",
            Self::CorruptLog => "corrupt_log",
            Self::AuditLog => "audit_log",
            Self::InvalidRequest => "invalid_request",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Result of a publish or rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// A new revision reached the remote
    Accepted {
        revision: Revision,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rolled_back_to: Option<Revision>,
    },
    /// Nothing was published
    Skipped { reason: SkipReason },
    /// A step failed; the remote is unchanged unless `kind` is audit related
    Failed { kind: FailureKind, detail: String },
}

impl PublishOutcome {
    /// Accepted outcome for a forward publish
    #[must_use]
    pub fn accepted(revision: Revision, timestamp: DateTime<Utc>) -> Self {
        Self::Accepted {
            revision,
            timestamp,
            rolled_back_to: None,
        }
    }

    /// Skipped outcome
    #[must_use]
    pub fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }

    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    #[inline]
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Revision of an accepted outcome
    #[must_use]
    pub fn revision(&self) -> Option<&Revision> {
        match self {
            Self::Accepted { revision, .. } => Some(revision),
            _ => None,
        }
    }

    /// Failure kind of a failed outcome
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<PublishError> for PublishOutcome {
    fn from(err: PublishError) -> Self {
        Self::Failed {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

impl From<Result<PublishOutcome, PublishError>> for PublishOutcome {
    fn from(result: Result<PublishOutcome, PublishError>) -> Self {
        result.unwrap_or_else(Self::from)
    }
}

/// Inbound publish request, as a shell receives it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Target slot name
    pub slot: String,
    /// Candidate markup
    pub content: String,
    /// Commit message; the configured template is used when absent
    #[serde(default)]
    pub message: Option<String>,
    /// Prompt that produced the content, recorded in the audit log
    #[serde(default)]
    pub prompt: Option<String>,
    /// Skip the equivalence check and always advance history
    #[serde(default)]
    pub force: bool,
}

impl PublishRequest {
    pub fn new(slot: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Inbound rollback request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRequest {
    /// Slot to restore
    pub slot: String,
    /// Revision to restore; the entry before the latest when absent
    #[serde(default)]
    pub target: Option<String>,
}

impl RollbackRequest {
    pub fn new(slot: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            target: None,
        }
    }

    #[must_use]
    pub fn to(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}
