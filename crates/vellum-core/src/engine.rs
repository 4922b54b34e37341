//! The publish sequence
//!
//! ```text
//! lock -> sync -> equivalence check -> write -> stage/diff -> commit
//!      -> revision -> push -> preview
//! ```
//!
//! The sync is a hard reset onto the remote tip, so whatever an earlier
//! interrupted or rejected publish left behind (dirty files, an unpushed
//! commit) is discarded before anything else happens. The equivalence check
//! therefore compares against content that is actually published.

use crate::error::PublishError;
use crate::lock::{WorkspaceGuard, WorkspaceLock, WorkspaceLocks};
use crate::preview::PreviewCache;
use crate::types::{PublishOutcome, SkipReason};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vellum_artifact::{Artifact, SlotName};
use vellum_backend::{PushOutcome, VersionBackend};
use vellum_normalize::ContentNormalizer;

/// Default commit message template
pub const DEFAULT_MESSAGE: &str = "auto: update {file}";

/// Publishes artifacts to one working copy
pub struct PublishEngine<B: VersionBackend> {
    backend: Arc<B>,
    normalizer: ContentNormalizer,
    previews: PreviewCache,
    lock: WorkspaceLock,
    message_template: String,
}

impl<B: VersionBackend> std::fmt::Debug for PublishEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishEngine")
            .field("root", &self.backend.root())
            .field("previews", &self.previews)
            .finish_non_exhaustive()
    }
}

impl<B: VersionBackend> PublishEngine<B> {
    /// Engine over `backend`, locking through `locks`
    pub fn new(backend: Arc<B>, previews: PreviewCache, locks: &WorkspaceLocks) -> Self {
        let lock = locks.for_root(backend.root());
        Self {
            backend,
            normalizer: ContentNormalizer::new(),
            previews,
            lock,
            message_template: DEFAULT_MESSAGE.to_string(),
        }
    }

    /// Template for messages of requests that carry none
    #[must_use]
    pub fn with_message_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = template.into();
        self
    }

    #[inline]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    #[inline]
    pub fn previews(&self) -> &PreviewCache {
        &self.previews
    }

    /// Lock guarding this engine's working copy
    #[inline]
    pub fn lock(&self) -> &WorkspaceLock {
        &self.lock
    }

    /// Publish `artifact`, taking the workspace lock for the duration
    pub async fn publish(
        &self,
        artifact: &Artifact,
        message: Option<&str>,
        forced: bool,
    ) -> PublishOutcome {
        let guard = self.lock.acquire().await;
        self.publish_exclusive(&guard, artifact, message, forced)
            .await
            .into()
    }

    /// Publish `artifact` while the caller holds the workspace lock
    #[tracing::instrument(
        name = "publish",
        skip_all,
        fields(slot = %artifact.slot(), hash = %artifact.hash().short(), forced)
    )]
    pub async fn publish_exclusive(
        &self,
        guard: &WorkspaceGuard,
        artifact: &Artifact,
        message: Option<&str>,
        forced: bool,
    ) -> Result<PublishOutcome, PublishError> {
        self.check_guard(guard)?;
        self.backend.sync().await.map_err(PublishError::Sync)?;
        debug!("synced with remote");
        self.apply_synced(guard, artifact, message, forced).await
    }

    /// Steps after the sync; the working copy must equal the remote tip
    pub(crate) async fn apply_synced(
        &self,
        guard: &WorkspaceGuard,
        artifact: &Artifact,
        message: Option<&str>,
        forced: bool,
    ) -> Result<PublishOutcome, PublishError> {
        self.check_guard(guard)?;
        let slot = artifact.slot();
        let path = slot.file_name();

        if !forced {
            let current = self
                .backend
                .read_file(&path)
                .await
                .map_err(PublishError::Write)?;
            if let Some(current) = current {
                if self.normalizer.equivalent(&current, artifact.content()) {
                    self.backend
                        .discard_changes(&path)
                        .await
                        .map_err(PublishError::Write)?;
                    info!(reason = %SkipReason::Equivalent, "publish skipped");
                    return Ok(PublishOutcome::skipped(SkipReason::Equivalent));
                }
            }
        }

        self.backend
            .write_file(&path, artifact.content())
            .await
            .map_err(PublishError::Write)?;
        let changed = self
            .backend
            .stage_and_diff(&path)
            .await
            .map_err(PublishError::Write)?;
        if !changed && !forced {
            self.backend
                .discard_changes(&path)
                .await
                .map_err(PublishError::Write)?;
            info!(reason = %SkipReason::NoDiff, "publish skipped");
            return Ok(PublishOutcome::skipped(SkipReason::NoDiff));
        }

        let message = message.map_or_else(|| self.default_message(slot), str::to_string);
        self.backend
            .commit(&message, !changed)
            .await
            .map_err(PublishError::Commit)?;
        let revision = self
            .backend
            .current_revision()
            .await
            .map_err(PublishError::Commit)?;
        debug!(revision = %revision.short(), empty = !changed, "committed locally");

        match self.backend.push().await {
            Ok(PushOutcome::Pushed) => {}
            Ok(PushOutcome::NothingToPush) => {
                warn!(revision = %revision.short(), "remote already had the commit");
            }
            Err(source) => {
                warn!(revision = %revision.short(), error = %source, "push failed");
                return Err(PublishError::Push {
                    local: revision,
                    source,
                });
            }
        }
        let timestamp = Utc::now();
        info!(revision = %revision.short(), "published");

        if let Err(e) = self
            .previews
            .store(slot, &revision, artifact.content())
            .await
        {
            warn!(error = %e, "failed to write preview");
        }

        Ok(PublishOutcome::accepted(revision, timestamp))
    }

    fn default_message(&self, slot: &SlotName) -> String {
        self.message_template
            .replace("{file}", &slot.file_name())
            .replace("{slot}", slot.as_str())
    }

    pub(crate) fn check_guard(&self, guard: &WorkspaceGuard) -> Result<(), PublishError> {
        if self.lock.is_held_by(guard) {
            Ok(())
        } else {
            Err(PublishError::Internal(format!(
                "guard for {} does not cover {}",
                guard.root().display(),
                self.lock.root().display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;
    use vellum_test_utils::{page, MemoryBackend, Op};

    fn engine(backend: &Arc<MemoryBackend>) -> (PublishEngine<MemoryBackend>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let previews = PreviewCache::new(dir.path(), 16);
        let engine = PublishEngine::new(Arc::clone(backend), previews, &WorkspaceLocks::new());
        (engine, dir)
    }

    fn artifact(body: &str) -> Artifact {
        Artifact::new(SlotName::new("index").unwrap(), page(body))
    }

    #[tokio::test]
    async fn first_publish_is_accepted() {
        let backend = Arc::new(MemoryBackend::new());
        let (engine, _dir) = engine(&backend);
        let before = backend.remote().revision_count();

        let outcome = engine.publish(&artifact("hello"), None, false).await;
        let revision = outcome.revision().cloned().expect("accepted");
        assert_eq!(backend.remote().revision_count(), before + 1);
        assert_eq!(backend.remote().tip(), Some(revision.clone()));
        assert_eq!(
            backend.remote().message_of(&revision).as_deref(),
            Some("auto: update index.html")
        );
        let preview = engine
            .previews()
            .get(&SlotName::new("index").unwrap(), &revision)
            .await
            .unwrap();
        assert!(preview.is_some());
    }

    #[tokio::test]
    async fn equivalent_content_is_skipped_without_writing() {
        let backend = Arc::new(MemoryBackend::new());
        let (engine, _dir) = engine(&backend);
        engine.publish(&artifact("hello"), None, false).await;
        backend.clear_operations();

        let noisy = Artifact::new(
            SlotName::new("index").unwrap(),
            page("hello").replace("<body>", "<body>\n   <!-- regenerated -->\n"),
        );
        let outcome = engine.publish(&noisy, None, false).await;
        assert_eq!(outcome, PublishOutcome::skipped(SkipReason::Equivalent));
        assert!(!backend.operations().iter().any(Op::is_mutation));
    }

    #[tokio::test]
    async fn forced_republish_advances_history() {
        let backend = Arc::new(MemoryBackend::new());
        let (engine, _dir) = engine(&backend);
        let first = engine.publish(&artifact("same"), None, false).await;
        let second = engine.publish(&artifact("same"), Some("again"), true).await;
        assert!(second.is_accepted());
        assert_ne!(first.revision(), second.revision());
    }

    #[tokio::test]
    async fn sync_failure_touches_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let (engine, _dir) = engine(&backend);
        backend.fail_next_sync("could not resolve host");

        let outcome = engine.publish(&artifact("x"), None, false).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Sync));
        assert!(!backend.operations().iter().any(|op| matches!(op, Op::Write(_))));
    }

    #[tokio::test]
    async fn nothing_to_push_is_accepted() {
        let backend = Arc::new(MemoryBackend::new());
        let (engine, _dir) = engine(&backend);
        backend.report_nothing_to_push_once();
        let outcome = engine.publish(&artifact("raced"), None, false).await;
        assert!(outcome.is_accepted());
        assert_eq!(backend.remote().tip().as_ref(), outcome.revision());
    }

    #[tokio::test]
    async fn foreign_guard_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let (engine, _dir) = engine(&backend);
        let foreign = WorkspaceLocks::new().for_root(backend.root());
        let guard = foreign.acquire().await;
        let err = engine
            .publish_exclusive(&guard, &artifact("x"), None, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Internal);
        assert!(backend.operations().is_empty());
    }
}
