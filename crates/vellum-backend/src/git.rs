//! [`VersionBackend`] over the `git` command line
//!
//! Every invocation is `git -C <root> ...`; the process working directory is
//! never touched. Remote operations inherit the configured timeout, and the
//! environment disables interactive credential prompts so a missing token
//! fails fast instead of hanging.

use crate::backend::{PushOutcome, VersionBackend};
use crate::command::GitInvocation;
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vellum_artifact::Revision;

// Slot pages at the repository root; `glob` keeps `*` from crossing `/`.
const PAGE_PATHSPEC: &str = ":(top,glob)*.html";

/// Where and how to talk to the repository
#[derive(Debug, Clone)]
pub struct GitConfig {
    /// Working copy root
    pub root: PathBuf,
    /// Remote name (`origin`)
    pub remote: String,
    /// Published branch (`main`)
    pub branch: String,
    /// Upper bound for every command
    pub timeout: Duration,
    /// Committer identity passed as `-c user.name=... -c user.email=...`
    pub committer: Option<(String, String)>,
}

impl GitConfig {
    /// Config for `root` with `origin`/`main` and a 30s timeout
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            timeout: Duration::from_secs(30),
            committer: None,
        }
    }

    /// With remote name
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// With branch
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// With command timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// With committer identity
    #[must_use]
    pub fn with_committer(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.committer = Some((name.into(), email.into()));
        self
    }
}

/// `git` command-line backend
#[derive(Debug, Clone)]
pub struct GitBackend {
    config: GitConfig,
    // `-c key=value` pairs applied to every invocation
    git_config: Vec<String>,
    remote_ref: String,
}

impl GitBackend {
    /// Create a backend for an existing clone
    #[must_use]
    pub fn new(config: GitConfig) -> Self {
        let mut git_config = vec!["core.quotepath=off".to_string()];
        if let Some((name, email)) = &config.committer {
            git_config.push(format!("user.name={name}"));
            git_config.push(format!("user.email={email}"));
        }
        let remote_ref = format!("refs/remotes/{}/{}", config.remote, config.branch);
        Self {
            config,
            git_config,
            remote_ref,
        }
    }

    /// Backend configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GitConfig {
        &self.config
    }

    fn git<'a>(&'a self, args: impl IntoIterator<Item = &'a str>) -> GitInvocation<'a> {
        GitInvocation::new(&self.config.root, &self.git_config).args(args)
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.config.root.join(relative)
    }
}

#[async_trait]
impl VersionBackend for GitBackend {
    fn root(&self) -> &Path {
        &self.config.root
    }

    #[tracing::instrument(skip(self), fields(root = %self.config.root.display()))]
    async fn sync(&self) -> BackendResult<()> {
        let timeout = self.config.timeout;
        self.git(["fetch", "--prune", self.config.remote.as_str(), self.config.branch.as_str()])
            .run(timeout)
            .await?;
        // -f discards edits left by an interrupted publish; -B moves the
        // branch back onto the remote tip, dropping unpushed commits.
        self.git([
            "checkout",
            "-f",
            "-B",
            self.config.branch.as_str(),
            self.remote_ref.as_str(),
        ])
        .run(timeout)
        .await?;
        // Untracked pages survive checkout and would read as published
        // content. Logs and previews below the root are left alone.
        self.git(["clean", "-f", "-q", "--", PAGE_PATHSPEC])
            .run(timeout)
            .await?;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> BackendResult<Option<String>> {
        let full = self.path(path);
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::io_error(full, e)),
        }
    }

    async fn discard_changes(&self, path: &str) -> BackendResult<()> {
        let inv = self.git(["checkout", "HEAD", "--", path]);
        let display = inv.display();
        let out = inv.output(self.config.timeout).await?;
        if out.success() {
            return Ok(());
        }
        // Not tracked at HEAD: discarding means removing it.
        if out.stderr.contains("did not match any file") {
            let full = self.path(path);
            return match tokio::fs::remove_file(&full).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(BackendError::io_error(full, e)),
            };
        }
        Err(out.into_error(display))
    }

    async fn write_file(&self, path: &str, content: &str) -> BackendResult<()> {
        let full = self.path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::io_error(parent, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| BackendError::io_error(full, e))
    }

    async fn stage_and_diff(&self, path: &str) -> BackendResult<bool> {
        let timeout = self.config.timeout;
        self.git(["add", "--", path]).run(timeout).await?;

        let inv = self.git(["diff", "--cached", "--quiet", "--", path]);
        let display = inv.display();
        let out = inv.output(timeout).await?;
        match out.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(out.into_error(display)),
        }
    }

    async fn commit(&self, message: &str, allow_empty: bool) -> BackendResult<()> {
        let mut args = vec!["commit", "--quiet", "-m", message];
        if allow_empty {
            args.push("--allow-empty");
        }
        self.git(args).run(self.config.timeout).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(remote = %self.config.remote, branch = %self.config.branch))]
    async fn push(&self) -> BackendResult<PushOutcome> {
        let refspec = format!("HEAD:refs/heads/{}", self.config.branch);
        let out = self
            .git(["push", "--porcelain", self.config.remote.as_str(), refspec.as_str()])
            .run(self.config.timeout)
            .await?;
        if out.stdout.contains("[up to date]") || out.stderr.contains("Everything up-to-date") {
            Ok(PushOutcome::NothingToPush)
        } else {
            Ok(PushOutcome::Pushed)
        }
    }

    async fn current_revision(&self) -> BackendResult<Revision> {
        let out = self
            .git(["rev-parse", "--verify", "HEAD"])
            .run(self.config.timeout)
            .await?;
        Ok(Revision::new(out.stdout.trim())?)
    }

    async fn resolve_revision(&self, revision: &Revision) -> BackendResult<Option<Revision>> {
        let object = format!("{revision}^{{commit}}");
        let inv = self.git(["rev-parse", "--verify", "--quiet", object.as_str()]);
        let display = inv.display();
        let out = inv.output(self.config.timeout).await?;
        match out.code() {
            Some(0) => Ok(Some(Revision::new(out.stdout.trim())?)),
            Some(1) => Ok(None),
            _ => Err(out.into_error(display)),
        }
    }

    async fn content_at_revision(&self, revision: &Revision, path: &str) -> BackendResult<String> {
        let object = format!("{revision}:{path}");
        let inv = self.git(["show", object.as_str()]);
        let display = inv.display();
        let out = inv.output(self.config.timeout).await?;
        if out.success() {
            return Ok(out.stdout);
        }
        let missing = [
            "does not exist",
            "exists on disk, but not in",
            "invalid object name",
            "unknown revision",
            "bad revision",
        ];
        if missing.iter().any(|m| out.stderr.contains(m)) {
            return Err(BackendError::NotFound {
                revision: revision.clone(),
                path: path.to_string(),
            });
        }
        Err(out.into_error(display))
    }
}
