//! Rendered previews keyed by `(slot, revision)`
//!
//! Purely derived data: every entry can be rebuilt from history, so failures
//! here never affect a publish decision.

use crate::error::PreviewError;
use moka::future::Cache;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vellum_artifact::{ContentHash, Revision, SlotName, SLOT_EXTENSION};
use vellum_backend::{BackendError, VersionBackend};

/// Disk-backed preview store with an in-memory front
#[derive(Clone)]
pub struct PreviewCache {
    dir: PathBuf,
    memory: Cache<(SlotName, Revision), Arc<str>>,
}

impl std::fmt::Debug for PreviewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewCache")
            .field("dir", &self.dir)
            .field("entries", &self.memory.entry_count())
            .finish()
    }
}

impl PreviewCache {
    /// Cache rooted at `dir` keeping up to `capacity` entries in memory
    pub fn new(dir: impl Into<PathBuf>, capacity: u64) -> Self {
        Self {
            dir: dir.into(),
            memory: Cache::builder().max_capacity(capacity).build(),
        }
    }

    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the preview of `slot` at `revision`
    #[must_use]
    pub fn path_for(&self, slot: &SlotName, revision: &Revision) -> PathBuf {
        self.dir
            .join(slot.as_str())
            .join(format!("{}.{SLOT_EXTENSION}", file_stem(revision)))
    }

    /// Store content for `(slot, revision)`
    pub async fn store(
        &self,
        slot: &SlotName,
        revision: &Revision,
        content: &str,
    ) -> Result<(), PreviewError> {
        let content: Arc<str> = Arc::from(content);
        self.memory
            .insert((slot.clone(), revision.clone()), Arc::clone(&content))
            .await;

        let path = self.path_for(slot, revision);
        tokio::task::spawn_blocking(move || write_atomically(&path, content.as_bytes()))
            .await
            .map_err(|e| PreviewError::io_error(&self.dir, std::io::Error::other(e)))?
    }

    /// Cached content, memory first then disk
    pub async fn get(
        &self,
        slot: &SlotName,
        revision: &Revision,
    ) -> Result<Option<Arc<str>>, PreviewError> {
        let key = (slot.clone(), revision.clone());
        if let Some(hit) = self.memory.get(&key).await {
            return Ok(Some(hit));
        }
        let path = self.path_for(slot, revision);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let content: Arc<str> = Arc::from(content);
                self.memory.insert(key, Arc::clone(&content)).await;
                Ok(Some(content))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PreviewError::io_error(path, e)),
        }
    }

    /// Cached content, rebuilt from history on a miss
    ///
    /// `revision` is resolved to a full commit id first, so symbolic names
    /// such as `HEAD` are never cached under their own name.
    pub async fn get_or_rebuild<B: VersionBackend + ?Sized>(
        &self,
        slot: &SlotName,
        revision: &Revision,
        backend: &B,
    ) -> Result<Arc<str>, PreviewError> {
        let path = slot.file_name();
        let Some(resolved) = backend.resolve_revision(revision).await? else {
            return Err(BackendError::NotFound {
                revision: revision.clone(),
                path,
            }
            .into());
        };
        if let Some(hit) = self.get(slot, &resolved).await? {
            return Ok(hit);
        }
        tracing::debug!(%slot, revision = %resolved.short(), "rebuilding preview");
        let content = backend.content_at_revision(&resolved, &path).await?;
        if let Err(e) = self.store(slot, &resolved, &content).await {
            tracing::warn!(%slot, error = %e, "failed to persist rebuilt preview");
        }
        Ok(Arc::from(content))
    }

    /// Drop the in-memory entries; disk entries stay
    pub fn clear_memory(&self) {
        self.memory.invalidate_all();
    }
}

// Revision ids are opaque; only plain ids are used verbatim as file names.
fn file_stem(revision: &Revision) -> String {
    let id = revision.as_str();
    let plain = !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if plain {
        id.to_string()
    } else {
        ContentHash::compute(id.as_bytes()).to_string()
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PreviewError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| PreviewError::io_error(dir, e))?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| PreviewError::io_error(dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| PreviewError::io_error(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| PreviewError::io_error(path, e.error))?;
    Ok(())
}
