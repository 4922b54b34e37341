//! Per-repository exclusivity
//!
//! A working copy is one shared mutable resource. Every engine pointed at the
//! same root must share one async mutex, whichever slot it targets, because a
//! sync resets the whole tree.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of workspace locks keyed by repository root
#[derive(Debug, Clone, Default)]
pub struct WorkspaceLocks {
    locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl WorkspaceLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock for `root`, created on first use
    #[must_use]
    pub fn for_root(&self, root: &Path) -> WorkspaceLock {
        let mutex = self
            .locks
            .entry(root.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        WorkspaceLock {
            root: root.to_path_buf(),
            mutex,
        }
    }

    /// Number of distinct roots seen
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Handle to the mutex guarding one working copy
#[derive(Debug, Clone)]
pub struct WorkspaceLock {
    root: PathBuf,
    mutex: Arc<Mutex<()>>,
}

impl WorkspaceLock {
    /// Wait for exclusive access
    pub async fn acquire(&self) -> WorkspaceGuard {
        let guard = Arc::clone(&self.mutex).lock_owned().await;
        tracing::trace!(root = %self.root.display(), "workspace lock acquired");
        WorkspaceGuard {
            root: self.root.clone(),
            mutex: Arc::clone(&self.mutex),
            _guard: guard,
        }
    }

    /// Exclusive access if nobody holds it
    #[must_use]
    pub fn try_acquire(&self) -> Option<WorkspaceGuard> {
        let guard = Arc::clone(&self.mutex).try_lock_owned().ok()?;
        Some(WorkspaceGuard {
            root: self.root.clone(),
            mutex: Arc::clone(&self.mutex),
            _guard: guard,
        })
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if `guard` was taken from this lock
    #[must_use]
    pub fn is_held_by(&self, guard: &WorkspaceGuard) -> bool {
        Arc::ptr_eq(&self.mutex, &guard.mutex)
    }
}

/// Proof of exclusive access to one working copy; released on drop
#[derive(Debug)]
pub struct WorkspaceGuard {
    root: PathBuf,
    mutex: Arc<Mutex<()>>,
    _guard: OwnedMutexGuard<()>,
}

impl WorkspaceGuard {
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
