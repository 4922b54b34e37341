//! Restoring earlier published content
//!
//! A rollback never rewrites history. It republishes the content recorded at
//! the target revision as a new, forced revision and logs where it came from.

use crate::audit::{AuditLog, PublishRecord};
use crate::engine::PublishEngine;
use crate::error::PublishError;
use crate::lock::WorkspaceGuard;
use crate::types::PublishOutcome;
use std::sync::Arc;
use tracing::info;
use vellum_artifact::{Artifact, Revision, SlotName};
use vellum_backend::{BackendError, VersionBackend};

/// Republishes historical content through a [`PublishEngine`]
#[derive(Debug)]
pub struct RollbackEngine<B: VersionBackend> {
    engine: Arc<PublishEngine<B>>,
    excerpt_chars: usize,
}

impl<B: VersionBackend> RollbackEngine<B> {
    pub fn new(engine: Arc<PublishEngine<B>>) -> Self {
        Self {
            engine,
            excerpt_chars: 300,
        }
    }

    /// Characters of restored content kept in the audit record
    #[must_use]
    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    /// Roll `slot` back, taking the workspace lock for the duration
    pub async fn rollback(
        &self,
        log: &AuditLog,
        slot: &SlotName,
        target: Option<&Revision>,
    ) -> PublishOutcome {
        let guard = self.engine.lock().acquire().await;
        self.rollback_exclusive(&guard, log, slot, target)
            .await
            .into()
    }

    /// Roll `slot` back to `target`, or to the entry before the latest
    #[tracing::instrument(
        name = "rollback",
        skip_all,
        fields(%slot, target = target.map(Revision::short))
    )]
    pub async fn rollback_exclusive(
        &self,
        guard: &WorkspaceGuard,
        log: &AuditLog,
        slot: &SlotName,
        target: Option<&Revision>,
    ) -> Result<PublishOutcome, PublishError> {
        self.engine.check_guard(guard)?;
        // Resolved before any backend call so a bad target changes nothing.
        let record = resolve_target(log, target).await?;
        let target = record.revision;

        let backend = self.engine.backend();
        backend.sync().await.map_err(PublishError::Sync)?;
        let content = backend
            .content_at_revision(&target, &slot.file_name())
            .await
            .map_err(|e| match e {
                BackendError::NotFound { .. } => PublishError::NotFound(e.to_string()),
                other => PublishError::Restore(other),
            })?;

        let message = format!("Rollback to {target}");
        let artifact = Artifact::new(slot.clone(), content);
        let outcome = self
            .engine
            .apply_synced(guard, &artifact, Some(&message), true)
            .await?;

        let (revision, timestamp) = match outcome {
            PublishOutcome::Accepted {
                revision,
                timestamp,
                ..
            } => (revision, timestamp),
            other => return Ok(other),
        };

        let entry = PublishRecord::new(
            revision.clone(),
            timestamp,
            message,
            artifact.content(),
            self.excerpt_chars,
        )
        .rolled_back_from(target.clone());
        log.append(entry)
            .await
            .map_err(|source| PublishError::Unrecorded {
                revision: revision.clone(),
                source,
            })?;

        info!(revision = %revision.short(), from = %target.short(), "rolled back");
        Ok(PublishOutcome::Accepted {
            revision,
            timestamp,
            rolled_back_to: Some(target),
        })
    }
}

async fn resolve_target(
    log: &AuditLog,
    target: Option<&Revision>,
) -> Result<PublishRecord, PublishError> {
    match target {
        Some(rev) => log
            .find_by_revision(rev)
            .await?
            .ok_or_else(|| PublishError::NotFound(format!("revision {rev} is not in the audit log"))),
        None => log.previous_of(None).await?.ok_or_else(|| {
            PublishError::NoTarget("fewer than two published revisions".to_string())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::WorkspaceLocks;
    use crate::preview::PreviewCache;
    use crate::types::FailureKind;
    use vellum_test_utils::{page, MemoryBackend};

    struct Fixture {
        backend: Arc<MemoryBackend>,
        engine: Arc<PublishEngine<MemoryBackend>>,
        log: AuditLog,
        slot: SlotName,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let backend = Arc::new(MemoryBackend::new());
            let previews = PreviewCache::new(dir.path().join("preview"), 16);
            let engine = Arc::new(PublishEngine::new(
                Arc::clone(&backend),
                previews,
                &WorkspaceLocks::new(),
            ));
            let slot = SlotName::new("index").unwrap();
            let log = AuditLog::for_slot(dir.path().join("logs"), &slot);
            Self {
                backend,
                engine,
                log,
                slot,
                _dir: dir,
            }
        }

        async fn publish(&self, body: &str) -> Revision {
            let artifact = Artifact::new(self.slot.clone(), page(body));
            let outcome = self.engine.publish(&artifact, None, false).await;
            let (revision, timestamp) = match outcome {
                PublishOutcome::Accepted {
                    revision,
                    timestamp,
                    ..
                } => (revision, timestamp),
                other => panic!("expected accepted, got {other:?}"),
            };
            let record = PublishRecord::new(revision.clone(), timestamp, body, artifact.content(), 300);
            self.log.append(record).await.unwrap();
            revision
        }
    }

    #[tokio::test]
    async fn explicit_target_restores_content() {
        let fx = Fixture::new();
        let first = fx.publish("one").await;
        fx.publish("two").await;

        let rollback = RollbackEngine::new(Arc::clone(&fx.engine));
        let outcome = rollback.rollback(&fx.log, &fx.slot, Some(&first)).await;
        let PublishOutcome::Accepted {
            revision,
            rolled_back_to,
            ..
        } = outcome
        else {
            panic!("expected accepted");
        };
        assert_eq!(rolled_back_to, Some(first.clone()));
        assert_eq!(
            fx.backend.remote().content_at_tip("index.html"),
            Some(page("one"))
        );
        assert_eq!(
            fx.backend.remote().message_of(&revision).unwrap(),
            format!("Rollback to {first}")
        );

        let records = fx.log.list().await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].rollback_source(), Some(&first));
    }

    #[tokio::test]
    async fn unknown_target_is_not_found_and_touches_nothing() {
        let fx = Fixture::new();
        fx.publish("one").await;
        fx.backend.clear_operations();

        let rollback = RollbackEngine::new(Arc::clone(&fx.engine));
        let bogus = Revision::new("feedface").unwrap();
        let outcome = rollback.rollback(&fx.log, &fx.slot, Some(&bogus)).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::NotFound));
        assert!(fx.backend.operations().is_empty());
    }

    #[tokio::test]
    async fn implicit_target_needs_two_entries() {
        let fx = Fixture::new();
        fx.publish("only").await;
        fx.backend.clear_operations();

        let rollback = RollbackEngine::new(Arc::clone(&fx.engine));
        let outcome = rollback.rollback(&fx.log, &fx.slot, None).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::NoTarget));
        assert!(fx.backend.operations().is_empty());
        assert_eq!(fx.log.len().await.unwrap(), 1);
    }
}
