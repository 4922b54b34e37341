//! Functional tests for rollback.
//!
//! Rollback only ever appends: it republishes historical content as a new
//! forced revision and records which revision it came from.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use vellum_core::prelude::{Revision, SlotName};
use vellum_core::{
    FailureKind, Provenance, PublishOutcome, PublishRequest, Publisher, PublisherConfig,
    RollbackRequest, WorkspaceLocks,
};
use vellum_test_utils::{page, MemoryBackend, Op};

struct Harness {
    backend: Arc<MemoryBackend>,
    publisher: Publisher<MemoryBackend>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = PublisherConfig::new()
            .with_audit_dir(dir.path().join("logs"))
            .with_preview_dir(dir.path().join("static/preview"));
        let backend = Arc::new(MemoryBackend::new());
        let publisher = Publisher::with_locks(Arc::clone(&backend), config, &WorkspaceLocks::new());
        Self {
            backend,
            publisher,
            _dir: dir,
        }
    }

    async fn publish(&self, body: &str) -> Revision {
        let outcome = self
            .publisher
            .publish(PublishRequest::new("index", page(body)).with_prompt(body))
            .await;
        outcome
            .revision()
            .cloned()
            .unwrap_or_else(|| panic!("publish of {body:?} not accepted: {outcome:?}"))
    }

    fn published(&self) -> Option<String> {
        self.backend.remote().content_at_tip("index.html")
    }
}

fn slot() -> SlotName {
    SlotName::new("index").unwrap()
}

/// Publish A, publish B, roll back to A: a third revision with A's content,
/// logged as [A, B, A-again] with the third entry naming its source.
#[tokio::test]
async fn rollback_round_trip() {
    let h = Harness::new();
    let r1 = h.publish("A").await;
    let r2 = h.publish("B").await;

    let outcome = h
        .publisher
        .rollback(RollbackRequest::new("index").to(r1.as_str()))
        .await;
    let PublishOutcome::Accepted {
        revision: r3,
        rolled_back_to,
        ..
    } = outcome
    else {
        panic!("rollback not accepted");
    };

    assert_ne!(r3, r1);
    assert_ne!(r3, r2);
    assert_eq!(rolled_back_to, Some(r1.clone()));
    assert_eq!(h.published(), Some(page("A")));

    let history = h.publisher.history(&slot()).await.unwrap();
    let revisions: Vec<&Revision> = history.iter().map(|r| &r.revision).collect();
    assert_eq!(revisions, vec![&r1, &r2, &r3]);
    assert_eq!(history[0].provenance, None);
    assert_eq!(history[1].provenance, None);
    assert_eq!(
        history[2].provenance,
        Some(Provenance::Rollback { from: r1.clone() })
    );
    assert_eq!(history[2].prompt, format!("Rollback to {r1}"));
}

/// With history [R1, R2, R3], an implicit rollback restores R2, not R1.
#[tokio::test]
async fn implicit_rollback_resolves_to_previous() {
    let h = Harness::new();
    h.publish("first").await;
    let r2 = h.publish("second").await;
    h.publish("third").await;

    let outcome = h.publisher.rollback(RollbackRequest::new("index")).await;
    let PublishOutcome::Accepted { rolled_back_to, .. } = outcome else {
        panic!("rollback not accepted");
    };
    assert_eq!(rolled_back_to, Some(r2));
    assert_eq!(h.published(), Some(page("second")));
}

/// One entry is not enough history for an implicit rollback.
#[tokio::test]
async fn insufficient_history_is_no_target() {
    let h = Harness::new();
    h.publish("only").await;
    let before = h.backend.remote().revision_count();
    h.backend.clear_operations();

    let outcome = h.publisher.rollback(RollbackRequest::new("index")).await;
    let kind = outcome.failure_kind().expect("failed");
    assert_eq!(kind, FailureKind::NoTarget);
    assert!(kind.is_user_error());
    assert!(h.backend.operations().is_empty(), "no backend calls at all");
    assert_eq!(h.backend.remote().revision_count(), before);
    assert_eq!(h.publisher.history(&slot()).await.unwrap().len(), 1);
}

/// An empty log has no target either.
#[tokio::test]
async fn empty_history_is_no_target() {
    let h = Harness::new();
    let outcome = h.publisher.rollback(RollbackRequest::new("index")).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::NoTarget));
}

/// Explicit ids must match a logged revision exactly.
#[tokio::test]
async fn unknown_or_abbreviated_target_is_not_found() {
    let h = Harness::new();
    let r1 = h.publish("A").await;
    h.publish("B").await;
    h.backend.clear_operations();

    for target in ["deadbeef", &r1.as_str()[..4]] {
        let outcome = h
            .publisher
            .rollback(RollbackRequest::new("index").to(target))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::NotFound), "{target}");
    }
    assert!(!h.backend.operations().iter().any(Op::is_mutation));
}

/// Rolling back to the current content still produces a new revision.
#[tokio::test]
async fn rollback_to_identical_content_still_advances() {
    let h = Harness::new();
    h.publish("A").await;
    let r2 = h.publish("B").await;
    let before = h.backend.remote().revision_count();

    let outcome = h
        .publisher
        .rollback(RollbackRequest::new("index").to(r2.as_str()))
        .await;
    assert!(outcome.is_accepted(), "{outcome:?}");
    assert_eq!(h.backend.remote().revision_count(), before + 1);
    assert_eq!(h.published(), Some(page("B")));
}

/// A rollback starts from remote truth: it syncs before reading history.
#[tokio::test]
async fn rollback_syncs_before_restoring() {
    let h = Harness::new();
    let r1 = h.publish("A").await;
    h.publish("B").await;
    h.backend.clear_operations();

    h.publisher
        .rollback(RollbackRequest::new("index").to(r1.as_str()))
        .await;
    let ops = h.backend.operations();
    let sync = ops.iter().position(|op| *op == Op::Sync).expect("synced");
    let show = ops
        .iter()
        .position(|op| matches!(op, Op::Show(_)))
        .expect("read history");
    assert!(sync < show);
}

/// A failed push during rollback is not logged.
#[tokio::test]
async fn failed_rollback_is_not_logged() {
    let h = Harness::new();
    let r1 = h.publish("A").await;
    h.publish("B").await;
    h.backend.fail_next_push("remote: permission denied");

    let outcome = h
        .publisher
        .rollback(RollbackRequest::new("index").to(r1.as_str()))
        .await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Push));
    assert_eq!(h.publisher.history(&slot()).await.unwrap().len(), 2);
    assert_eq!(h.published(), Some(page("B")));
}
