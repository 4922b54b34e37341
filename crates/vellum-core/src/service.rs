//! Transport-agnostic entry point for shells
//!
//! [`Publisher`] validates raw requests, runs publish and rollback under the
//! workspace lock, and keeps the audit log in step with accepted outcomes.
//! The locked section runs on its own task: a shell that drops the returned
//! future (client disconnect, timeout) does not leave the working copy
//! half-updated.

use crate::audit::{AuditLog, PublishRecord};
use crate::config::PublisherConfig;
use crate::engine::PublishEngine;
use crate::error::{AuditError, PreviewError, PublishError};
use crate::lock::WorkspaceLocks;
use crate::preview::PreviewCache;
use crate::rollback::RollbackEngine;
use crate::types::{PublishOutcome, PublishRequest, RollbackRequest};
use std::future::Future;
use std::sync::Arc;
use vellum_artifact::{Artifact, Revision, SlotName};
use vellum_backend::{GitBackend, VersionBackend};

struct Inner<B: VersionBackend> {
    engine: Arc<PublishEngine<B>>,
    rollback: RollbackEngine<B>,
    config: PublisherConfig,
}

/// Publish, roll back, list and preview generated pages
pub struct Publisher<B: VersionBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: VersionBackend> Clone for Publisher<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: VersionBackend> std::fmt::Debug for Publisher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("engine", &self.inner.engine)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Publisher<GitBackend> {
    /// Publisher over the git working copy named by `config`
    #[must_use]
    pub fn from_config(config: PublisherConfig) -> Self {
        let backend = GitBackend::new(config.git_config());
        Self::new(backend, config)
    }
}

impl<B: VersionBackend> Publisher<B> {
    /// Publisher with a private lock registry
    pub fn new(backend: B, config: PublisherConfig) -> Self {
        Self::with_locks(Arc::new(backend), config, &WorkspaceLocks::new())
    }

    /// Publisher sharing `locks` with other publishers in the process
    pub fn with_locks(backend: Arc<B>, config: PublisherConfig, locks: &WorkspaceLocks) -> Self {
        let previews = PreviewCache::new(&config.preview_dir, config.preview_cache_capacity);
        let engine = Arc::new(
            PublishEngine::new(backend, previews, locks)
                .with_message_template(&config.default_message),
        );
        let rollback =
            RollbackEngine::new(Arc::clone(&engine)).with_excerpt_chars(config.excerpt_chars);
        Self {
            inner: Arc::new(Inner {
                engine,
                rollback,
                config,
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &PublisherConfig {
        &self.inner.config
    }

    #[inline]
    pub fn engine(&self) -> &PublishEngine<B> {
        &self.inner.engine
    }

    /// Audit log of `slot`
    #[must_use]
    pub fn audit_log(&self, slot: &SlotName) -> AuditLog {
        AuditLog::for_slot(&self.inner.config.audit_dir, slot)
    }

    /// Publish generated content
    pub async fn publish(&self, request: PublishRequest) -> PublishOutcome {
        let artifact = match self.validate_publish(&request) {
            Ok(artifact) => artifact,
            Err(e) => return e.into(),
        };
        let PublishRequest {
            message,
            prompt,
            force,
            ..
        } = request;
        let prompt = prompt.or_else(|| message.clone()).unwrap_or_default();

        self.run_detached(move |inner| async move {
            let log = AuditLog::for_slot(&inner.config.audit_dir, artifact.slot());
            let guard = inner.engine.lock().acquire().await;
            // An unreadable log would leave the publication unrecorded.
            log.list().await?;
            let outcome = inner
                .engine
                .publish_exclusive(&guard, &artifact, message.as_deref(), force)
                .await?;
            if let PublishOutcome::Accepted {
                revision,
                timestamp,
                ..
            } = &outcome
            {
                let record = PublishRecord::new(
                    revision.clone(),
                    *timestamp,
                    prompt,
                    artifact.content(),
                    inner.config.excerpt_chars,
                );
                log.append(record)
                    .await
                    .map_err(|source| PublishError::Unrecorded {
                        revision: revision.clone(),
                        source,
                    })?;
            }
            Ok(outcome)
        })
        .await
    }

    /// Restore earlier content of a slot
    pub async fn rollback(&self, request: RollbackRequest) -> PublishOutcome {
        let slot = match SlotName::new(request.slot) {
            Ok(slot) => slot,
            Err(e) => return PublishError::invalid(e.to_string()).into(),
        };
        let target = match request.target.map(Revision::new).transpose() {
            Ok(target) => target,
            Err(e) => return PublishError::invalid(e.to_string()).into(),
        };

        self.run_detached(move |inner| async move {
            let log = AuditLog::for_slot(&inner.config.audit_dir, &slot);
            let guard = inner.engine.lock().acquire().await;
            inner
                .rollback
                .rollback_exclusive(&guard, &log, &slot, target.as_ref())
                .await
        })
        .await
    }

    /// Audit records of `slot`, oldest first
    pub async fn history(&self, slot: &SlotName) -> Result<Vec<PublishRecord>, AuditError> {
        self.audit_log(slot).list().await
    }

    /// Content of `slot` as published at `revision`
    pub async fn preview(
        &self,
        slot: &SlotName,
        revision: &Revision,
    ) -> Result<Arc<str>, PreviewError> {
        let engine = &self.inner.engine;
        engine
            .previews()
            .get_or_rebuild(slot, revision, engine.backend().as_ref())
            .await
    }

    fn validate_publish(&self, request: &PublishRequest) -> Result<Artifact, PublishError> {
        let slot =
            SlotName::new(request.slot.as_str()).map_err(|e| PublishError::invalid(e.to_string()))?;
        if request.content.trim().is_empty() {
            return Err(PublishError::invalid("content is empty"));
        }
        if self.inner.config.require_html && !looks_like_html(&request.content) {
            return Err(PublishError::invalid("content is not an HTML document"));
        }
        Ok(Artifact::new(slot, request.content.as_str()))
    }

    async fn run_detached<F, Fut>(&self, work: F) -> PublishOutcome
    where
        F: FnOnce(Arc<Inner<B>>) -> Fut,
        Fut: Future<Output = Result<PublishOutcome, PublishError>> + Send + 'static,
    {
        let task = tokio::spawn(work(Arc::clone(&self.inner)));
        match task.await {
            Ok(result) => result.into(),
            Err(e) => {
                tracing::error!(error = %e, "publishing task did not complete");
                PublishError::Internal(e.to_string()).into()
            }
        }
    }
}

fn looks_like_html(content: &str) -> bool {
    content.to_ascii_lowercase().contains("<html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;
    use vellum_test_utils::{page, MemoryBackend};

    fn publisher(dir: &tempfile::TempDir) -> Publisher<MemoryBackend> {
        let config = PublisherConfig::new()
            .with_audit_dir(dir.path().join("logs"))
            .with_preview_dir(dir.path().join("preview"));
        Publisher::new(MemoryBackend::new(), config)
    }

    #[tokio::test]
    async fn rejects_invalid_requests_before_touching_the_backend() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = publisher(&dir);

        for request in [
            PublishRequest::new("../etc", page("x")),
            PublishRequest::new("index", "   "),
            PublishRequest::new("index", "plain text, no markup"),
        ] {
            let outcome = publisher.publish(request).await;
            assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidRequest));
        }
        let outcome = publisher
            .rollback(RollbackRequest::new("index").to("-x"))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidRequest));
        assert!(publisher.engine().backend().operations().is_empty());
    }

    #[tokio::test]
    async fn html_check_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = PublisherConfig::new()
            .with_audit_dir(dir.path().join("logs"))
            .with_preview_dir(dir.path().join("preview"))
            .with_require_html(false);
        let publisher = Publisher::new(MemoryBackend::new(), config);
        let outcome = publisher
            .publish(PublishRequest::new("notes", "just text"))
            .await;
        assert!(outcome.is_accepted());
    }

    #[tokio::test]
    async fn accepted_publish_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = publisher(&dir);
        let outcome = publisher
            .publish(PublishRequest::new("index", page("hi")).with_prompt("make a greeting page"))
            .await;
        let revision = outcome.revision().cloned().expect("accepted");

        let slot = SlotName::new("index").unwrap();
        let history = publisher.history(&slot).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].revision, revision);
        assert_eq!(history[0].prompt, "make a greeting page");

        let preview = publisher.preview(&slot, &revision).await.unwrap();
        assert_eq!(&*preview, page("hi").as_str());
    }

    #[tokio::test]
    async fn skipped_publish_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = publisher(&dir);
        publisher.publish(PublishRequest::new("index", page("hi"))).await;
        let again = publisher.publish(PublishRequest::new("index", page("hi"))).await;
        assert!(again.is_skipped());

        let slot = SlotName::new("index").unwrap();
        assert_eq!(publisher.history(&slot).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn preview_rebuilds_from_history() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = publisher(&dir);
        let outcome = publisher.publish(PublishRequest::new("index", page("old"))).await;
        let revision = outcome.revision().cloned().unwrap();

        std::fs::remove_dir_all(dir.path().join("preview")).unwrap();
        publisher.engine().previews().clear_memory();

        let slot = SlotName::new("index").unwrap();
        let preview = publisher.preview(&slot, &revision).await.unwrap();
        assert_eq!(&*preview, page("old").as_str());

        let missing = Revision::new("0000").unwrap();
        let err = publisher.preview(&slot, &missing).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn symbolic_preview_follows_the_branch() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = publisher(&dir);
        let slot = SlotName::new("index").unwrap();
        let head = Revision::new("HEAD").unwrap();

        publisher.publish(PublishRequest::new("index", page("first"))).await;
        let first = publisher.preview(&slot, &head).await.unwrap();
        assert_eq!(&*first, page("first").as_str());

        publisher.publish(PublishRequest::new("index", page("second"))).await;
        let second = publisher.preview(&slot, &head).await.unwrap();
        assert_eq!(&*second, page("second").as_str());

        let by_name = publisher.engine().previews().path_for(&slot, &head);
        assert!(!by_name.exists());
    }
}
