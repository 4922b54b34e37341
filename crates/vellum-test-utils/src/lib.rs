//! Testing utilities for the Vellum workspace
//!
//! [`MemoryBackend`] is an in-memory working copy attached to a shared
//! [`MemoryRemote`]. It follows the same rules as a real clone (sync is a
//! hard reset that leaves untracked files other than top-level pages, pushes
//! must fast-forward) and records every call so tests can assert on what a
//! publish actually did.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use vellum_artifact::{Revision, SLOT_EXTENSION};
use vellum_backend::{BackendError, BackendResult, PushOutcome, VersionBackend};

type Tree = BTreeMap<String, String>;

#[derive(Debug, Clone)]
struct Commit {
    parent: Option<Revision>,
    message: String,
    files: Tree,
}

#[derive(Debug, Default)]
struct RemoteState {
    commits: HashMap<Revision, Commit>,
    tip: Option<Revision>,
    next_id: u64,
}

impl RemoteState {
    fn allocate(&mut self) -> Revision {
        self.next_id += 1;
        Revision::new(format!("c0ffee{:06x}", self.next_id)).expect("generated id is valid")
    }
}

/// Shared remote history; clones of the handle see the same state
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Remote with a single initial commit holding a README
    pub fn new() -> Self {
        let mut state = RemoteState::default();
        let id = state.allocate();
        let files = Tree::from([("README.md".to_string(), "# site\n".to_string())]);
        state.commits.insert(
            id.clone(),
            Commit {
                parent: None,
                message: "initial commit".to_string(),
                files,
            },
        );
        state.tip = Some(id);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn tip(&self) -> Option<Revision> {
        self.state.lock().tip.clone()
    }

    /// Commits reachable from the tip
    pub fn revision_count(&self) -> usize {
        let state = self.state.lock();
        ancestry(&state.commits, state.tip.as_ref()).len()
    }

    /// Whether `revision` is part of the published history
    pub fn contains(&self, revision: &Revision) -> bool {
        let state = self.state.lock();
        ancestry(&state.commits, state.tip.as_ref()).contains(revision)
    }

    pub fn message_of(&self, revision: &Revision) -> Option<String> {
        self.state
            .lock()
            .commits
            .get(revision)
            .map(|c| c.message.clone())
    }

    pub fn content_at_tip(&self, path: &str) -> Option<String> {
        let state = self.state.lock();
        let tip = state.tip.as_ref()?;
        state.commits.get(tip)?.files.get(path).cloned()
    }

    /// Another writer publishes `content` at `path` directly on the remote
    pub fn commit_directly(&self, path: &str, content: &str, message: &str) -> Revision {
        let mut state = self.state.lock();
        let mut files = state
            .tip
            .as_ref()
            .and_then(|t| state.commits.get(t))
            .map(|c| c.files.clone())
            .unwrap_or_default();
        files.insert(path.to_string(), content.to_string());
        let id = state.allocate();
        let parent = state.tip.clone();
        state.commits.insert(
            id.clone(),
            Commit {
                parent,
                message: message.to_string(),
                files,
            },
        );
        state.tip = Some(id.clone());
        id
    }
}

fn ancestry(commits: &HashMap<Revision, Commit>, from: Option<&Revision>) -> Vec<Revision> {
    let mut out = Vec::new();
    let mut cursor = from.cloned();
    while let Some(id) = cursor {
        cursor = commits.get(&id).and_then(|c| c.parent.clone());
        out.push(id);
    }
    out
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Sync,
    Read(String),
    Discard(String),
    Write(String),
    Stage(String),
    Commit(Revision),
    Push(Option<Revision>),
    RevParse,
    Resolve(Revision),
    Show(Revision),
}

impl Op {
    /// Calls that change the working copy's committed state or the remote
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Write(_) | Self::Commit(_) | Self::Push(_))
    }
}

#[derive(Debug, Default)]
struct LocalState {
    head: Option<Revision>,
    objects: HashMap<Revision, Commit>,
    index: Tree,
    worktree: Tree,
}

impl LocalState {
    fn head_files(&self) -> Tree {
        self.head
            .as_ref()
            .and_then(|h| self.objects.get(h))
            .map(|c| c.files.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Faults {
    sync: Option<String>,
    push: Option<String>,
    nothing_to_push: bool,
}

/// In-memory [`VersionBackend`] with fault injection
#[derive(Debug)]
pub struct MemoryBackend {
    root: PathBuf,
    remote: MemoryRemote,
    local: Mutex<LocalState>,
    faults: Mutex<Faults>,
    ops: Mutex<Vec<Op>>,
    latency: Option<Duration>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Fresh remote and a clone of it at `/memory/site`
    pub fn new() -> Self {
        Self::clone_of(MemoryRemote::new(), "/memory/site")
    }

    /// Clone of `remote` rooted at `root`; not synced yet
    pub fn clone_of(remote: MemoryRemote, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            remote,
            local: Mutex::new(LocalState::default()),
            faults: Mutex::new(Faults::default()),
            ops: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Sleep this long inside every call, to widen race windows
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn remote(&self) -> &MemoryRemote {
        &self.remote
    }

    /// Local HEAD
    pub fn head(&self) -> Option<Revision> {
        self.local.lock().head.clone()
    }

    /// Working-tree content of `path`
    pub fn worktree_file(&self, path: &str) -> Option<String> {
        self.local.lock().worktree.get(path).cloned()
    }

    /// Simulate an edit left behind by an interrupted publish
    ///
    /// A path unknown to the index stays untracked, like a file written but
    /// never staged.
    pub fn dirty_worktree(&self, path: &str, content: &str) {
        self.local
            .lock()
            .worktree
            .insert(path.to_string(), content.to_string());
    }

    pub fn fail_next_sync(&self, diagnostic: &str) {
        self.faults.lock().sync = Some(diagnostic.to_string());
    }

    pub fn fail_next_push(&self, diagnostic: &str) {
        self.faults.lock().push = Some(diagnostic.to_string());
    }

    /// Next push lands, but reports that the remote already had the commit
    pub fn report_nothing_to_push_once(&self) {
        self.faults.lock().nothing_to_push = true;
    }

    pub fn operations(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }

    pub fn clear_operations(&self) {
        self.ops.lock().clear();
    }

    fn record(&self, op: Op) {
        self.ops.lock().push(op);
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn sync_now(&self) -> BackendResult<()> {
        if let Some(diagnostic) = self.faults.lock().sync.take() {
            return Err(failure("git fetch", &diagnostic));
        }
        let remote = self.remote.state.lock();
        let mut local = self.local.lock();
        for (id, commit) in &remote.commits {
            local.objects.entry(id.clone()).or_insert_with(|| commit.clone());
        }
        // checkout -f: tracked paths follow the new HEAD, untracked ones stay
        let untracked: Tree = local
            .worktree
            .iter()
            .filter(|(path, _)| !local.index.contains_key(*path) && !is_page(path))
            .map(|(path, content)| (path.clone(), content.clone()))
            .collect();
        local.head = remote.tip.clone();
        let files = local.head_files();
        local.index = files.clone();
        local.worktree = files;
        for (path, content) in untracked {
            local.worktree.entry(path).or_insert(content);
        }
        Ok(())
    }

    fn resolve_now(&self, revision: &Revision) -> Option<Revision> {
        if revision.as_str() == "HEAD" {
            return self.head();
        }
        let local = self.local.lock().objects.contains_key(revision);
        let known = local || self.remote.state.lock().commits.contains_key(revision);
        known.then(|| revision.clone())
    }

    fn commit_now(&self, message: &str, allow_empty: bool) -> BackendResult<Revision> {
        let mut remote = self.remote.state.lock();
        let mut local = self.local.lock();
        if local.index == local.head_files() && !allow_empty {
            return Err(failure("git commit", "nothing to commit, working tree clean"));
        }
        let id = remote.allocate();
        let commit = Commit {
            parent: local.head.clone(),
            message: message.to_string(),
            files: local.index.clone(),
        };
        local.objects.insert(id.clone(), commit);
        local.head = Some(id.clone());
        Ok(id)
    }

    fn push_now(&self) -> BackendResult<PushOutcome> {
        let (push_fault, quiet) = {
            let mut faults = self.faults.lock();
            (faults.push.take(), std::mem::take(&mut faults.nothing_to_push))
        };
        if let Some(diagnostic) = push_fault {
            return Err(failure("git push", &diagnostic));
        }
        let mut remote = self.remote.state.lock();
        let local = self.local.lock();
        let Some(head) = local.head.clone() else {
            return Err(failure("git push", "src refspec HEAD does not match any"));
        };
        if remote.tip.as_ref() == Some(&head) {
            return Ok(PushOutcome::NothingToPush);
        }
        let reachable = ancestry(&local.objects, Some(&head));
        if let Some(tip) = &remote.tip {
            if !reachable.contains(tip) {
                return Err(failure(
                    "git push",
                    "! [rejected] HEAD -> main (fetch first)",
                ));
            }
        }
        for id in reachable {
            if let Some(commit) = local.objects.get(&id) {
                remote.commits.entry(id).or_insert_with(|| commit.clone());
            }
        }
        remote.tip = Some(head);
        Ok(if quiet {
            PushOutcome::NothingToPush
        } else {
            PushOutcome::Pushed
        })
    }

    fn show_now(&self, revision: &Revision, path: &str) -> BackendResult<String> {
        let not_found = || BackendError::NotFound {
            revision: revision.clone(),
            path: path.to_string(),
        };
        let commit = {
            let local = self.local.lock();
            local.objects.get(revision).cloned()
        };
        let commit = match commit {
            Some(c) => c,
            None => self
                .remote
                .state
                .lock()
                .commits
                .get(revision)
                .cloned()
                .ok_or_else(not_found)?,
        };
        commit.files.get(path).cloned().ok_or_else(not_found)
    }
}

// Top-level slot pages, which sync removes when untracked
fn is_page(path: &str) -> bool {
    !path.contains('/')
        && path
            .strip_suffix(SLOT_EXTENSION)
            .is_some_and(|stem| stem.ends_with('.'))
}

fn failure(command: &str, diagnostic: &str) -> BackendError {
    BackendError::Command {
        command: command.to_string(),
        status: "exit status: 1".to_string(),
        diagnostic: diagnostic.to_string(),
    }
}

#[async_trait]
impl VersionBackend for MemoryBackend {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn sync(&self) -> BackendResult<()> {
        self.record(Op::Sync);
        self.delay().await;
        self.sync_now()
    }

    async fn read_file(&self, path: &str) -> BackendResult<Option<String>> {
        self.record(Op::Read(path.to_string()));
        self.delay().await;
        Ok(self.worktree_file(path))
    }

    async fn discard_changes(&self, path: &str) -> BackendResult<()> {
        self.record(Op::Discard(path.to_string()));
        self.delay().await;
        let mut local = self.local.lock();
        match local.head_files().remove(path) {
            Some(content) => {
                local.index.insert(path.to_string(), content.clone());
                local.worktree.insert(path.to_string(), content);
            }
            None => {
                local.index.remove(path);
                local.worktree.remove(path);
            }
        }
        Ok(())
    }

    async fn write_file(&self, path: &str, content: &str) -> BackendResult<()> {
        self.record(Op::Write(path.to_string()));
        self.delay().await;
        self.dirty_worktree(path, content);
        Ok(())
    }

    async fn stage_and_diff(&self, path: &str) -> BackendResult<bool> {
        self.record(Op::Stage(path.to_string()));
        self.delay().await;
        let mut local = self.local.lock();
        match local.worktree.get(path).cloned() {
            Some(content) => local.index.insert(path.to_string(), content),
            None => local.index.remove(path),
        };
        Ok(local.index.get(path) != local.head_files().get(path))
    }

    async fn commit(&self, message: &str, allow_empty: bool) -> BackendResult<()> {
        self.delay().await;
        let id = self.commit_now(message, allow_empty)?;
        self.record(Op::Commit(id));
        Ok(())
    }

    async fn push(&self) -> BackendResult<PushOutcome> {
        self.record(Op::Push(self.head()));
        self.delay().await;
        self.push_now()
    }

    async fn current_revision(&self) -> BackendResult<Revision> {
        self.record(Op::RevParse);
        self.head()
            .ok_or_else(|| failure("git rev-parse --verify HEAD", "Needed a single revision"))
    }

    async fn resolve_revision(&self, revision: &Revision) -> BackendResult<Option<Revision>> {
        self.record(Op::Resolve(revision.clone()));
        Ok(self.resolve_now(revision))
    }

    async fn content_at_revision(&self, revision: &Revision, path: &str) -> BackendResult<String> {
        self.record(Op::Show(revision.clone()));
        self.delay().await;
        self.show_now(revision, path)
    }
}

/// Minimal complete page with `body` as its only paragraph
pub fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Generated</title></head>\n\
         <body>\n<p>{body}</p>\n</body>\n</html>\n"
    )
}
