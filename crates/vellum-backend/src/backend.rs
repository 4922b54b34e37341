//! The version-control capability

use crate::error::BackendResult;
use async_trait::async_trait;
use std::path::Path;
use vellum_artifact::Revision;

/// Result of a successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Remote advanced to the local commit
    Pushed,
    /// Remote already contained the local commit
    NothingToPush,
}

/// Command-level interface to a distributed version-control history
///
/// Implementations operate on one working copy rooted at [`root`](Self::root)
/// and one shared remote branch. They must never change process-global state
/// such as the current directory, and every remote operation must be bounded
/// in time. Paths are relative to the repository root.
///
/// Callers are responsible for exclusive access: the trait makes no attempt
/// to serialize concurrent mutations of the working copy.
#[async_trait]
pub trait VersionBackend: Send + Sync + 'static {
    /// Root of the working copy; identifies the shared mutable resource
    fn root(&self) -> &Path;

    /// Fetch the remote and hard-reset the local branch to its tip,
    /// discarding uncommitted edits and unpublished local commits
    async fn sync(&self) -> BackendResult<()>;

    /// Current working-tree content of `path`, `None` if absent
    async fn read_file(&self, path: &str) -> BackendResult<Option<String>>;

    /// Restore `path` to its committed state (removing it if untracked)
    async fn discard_changes(&self, path: &str) -> BackendResult<()>;

    /// Overwrite `path` in the working tree
    async fn write_file(&self, path: &str, content: &str) -> BackendResult<()>;

    /// Stage `path` and report whether the index now differs from HEAD
    async fn stage_and_diff(&self, path: &str) -> BackendResult<bool>;

    /// Commit the index; `allow_empty` permits a commit with no changes
    async fn commit(&self, message: &str, allow_empty: bool) -> BackendResult<()>;

    /// Push the local branch to the shared remote
    async fn push(&self) -> BackendResult<PushOutcome>;

    /// Revision currently checked out
    async fn current_revision(&self) -> BackendResult<Revision>;

    /// Full commit id that `revision` names, `None` if it names no commit
    ///
    /// Symbolic names (`HEAD`, branches, abbreviations) resolve to whatever
    /// they point at now; the returned id never changes meaning.
    async fn resolve_revision(&self, revision: &Revision) -> BackendResult<Option<Revision>>;

    /// Content of `path` as recorded at `revision`; a pure read
    async fn content_at_revision(&self, revision: &Revision, path: &str) -> BackendResult<String>;
}
