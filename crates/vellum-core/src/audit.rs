//! Append-only audit log of accepted publications
//!
//! One JSON array per slot. Records are only ever appended; the whole
//! document is rewritten through a temporary file in the same directory and
//! renamed over the old one, so a crash leaves either the old or the new
//! document, never a torn one. A document that exists but does not parse is
//! reported as corrupt and left exactly as found.

use crate::error::AuditError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use vellum_artifact::{excerpt, Revision, SlotName};

/// Where a record came from, when not a plain forward publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Restored the content of an earlier revision
    Rollback { from: Revision },
}

/// One accepted publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub timestamp: DateTime<Utc>,
    /// Prompt or message that produced the content, stored in full
    pub prompt: String,
    #[serde(rename = "commit_id")]
    pub revision: Revision,
    /// Leading excerpt of the published content
    pub preview: String,
    #[serde(
        rename = "extra_info",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub provenance: Option<Provenance>,
}

impl PublishRecord {
    /// Record for a forward publish
    pub fn new(
        revision: Revision,
        timestamp: DateTime<Utc>,
        prompt: impl Into<String>,
        content: &str,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            timestamp,
            prompt: prompt.into(),
            revision,
            preview: excerpt(content, excerpt_chars).to_string(),
            provenance: None,
        }
    }

    /// Mark as a rollback to `from`
    #[must_use]
    pub fn rolled_back_from(mut self, from: Revision) -> Self {
        self.provenance = Some(Provenance::Rollback { from });
        self
    }

    /// Revision this record restored, if it is a rollback
    #[must_use]
    pub fn rollback_source(&self) -> Option<&Revision> {
        match &self.provenance {
            Some(Provenance::Rollback { from }) => Some(from),
            None => None,
        }
    }
}

/// Audit log of one slot
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Log stored at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log of `slot` inside `dir` (`<dir>/<slot>.json`)
    pub fn for_slot(dir: impl AsRef<Path>, slot: &SlotName) -> Self {
        Self::new(dir.as_ref().join(format!("{slot}.json")))
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, oldest first; empty if the log does not exist yet
    pub async fn list(&self) -> Result<Vec<PublishRecord>, AuditError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AuditError::io_error(&self.path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| {
            tracing::error!(path = %self.path.display(), error = %source, "audit log is corrupt");
            AuditError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Number of records
    pub async fn len(&self) -> Result<usize, AuditError> {
        Ok(self.list().await?.len())
    }

    /// Append `record` durably
    ///
    /// Callers must serialize appends to the same log; the workspace lock
    /// does this for the publishing paths.
    pub async fn append(&self, record: PublishRecord) -> Result<(), AuditError> {
        let mut records = self.list().await?;
        records.push(record);
        let document = serde_json::to_vec_pretty(&records).map_err(AuditError::Serialize)?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || persist_atomically(&path, &document))
            .await
            .map_err(|e| AuditError::io_error(&self.path, std::io::Error::other(e)))??;

        tracing::debug!(path = %self.path.display(), entries = records.len(), "audit record appended");
        Ok(())
    }

    /// Record whose revision is exactly `revision`
    pub async fn find_by_revision(
        &self,
        revision: &Revision,
    ) -> Result<Option<PublishRecord>, AuditError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .rev()
            .find(|r| &r.revision == revision))
    }

    /// Record immediately before `current`, or before the latest if `None`
    ///
    /// `None` if `current` is unknown or has no predecessor.
    pub async fn previous_of(
        &self,
        current: Option<&Revision>,
    ) -> Result<Option<PublishRecord>, AuditError> {
        let mut records = self.list().await?;
        let position = match current {
            Some(rev) => records.iter().rposition(|r| &r.revision == rev),
            None => records.len().checked_sub(1),
        };
        Ok(match position {
            Some(i) if i > 0 => Some(records.swap_remove(i - 1)),
            _ => None,
        })
    }
}

fn persist_atomically(path: &Path, document: &[u8]) -> Result<(), AuditError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| AuditError::io_error(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| AuditError::io_error(dir, e))?;
    tmp.write_all(document)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| AuditError::io_error(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| AuditError::io_error(path, e.error))?;
    Ok(())
}
