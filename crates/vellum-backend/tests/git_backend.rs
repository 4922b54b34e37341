//! GitBackend against a real `git` binary and a local bare remote.
//!
//! Skipped (passes trivially) when `git` is not installed.

use std::path::Path;
use std::process::Command;
use std::time::Duration;
use vellum_artifact::Revision;
use vellum_backend::{BackendError, GitBackend, GitConfig, PushOutcome, VersionBackend};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("spawn git");
    assert!(
        status.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&status.stderr)
    );
}

/// Bare remote with one commit on `main`, plus a clone to publish from.
fn fixture(tmp: &Path) -> GitBackend {
    let remote = tmp.join("remote.git");
    let seed = tmp.join("seed");
    let work = tmp.join("work");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&seed).unwrap();
    git(&remote, &["init", "--bare", "--quiet"]);
    git(&seed, &["init", "--quiet"]);
    git(&seed, &["checkout", "-q", "-b", "main"]);
    std::fs::write(seed.join("README.md"), "site\n").unwrap();
    git(&seed, &["add", "README.md"]);
    git(&seed, &["commit", "-q", "-m", "init"]);
    git(&seed, &["remote", "add", "origin", remote.to_str().unwrap()]);
    git(&seed, &["push", "-q", "origin", "main"]);
    git(tmp, &["clone", "-q", "--branch", "main", remote.to_str().unwrap(), "work"]);

    GitBackend::new(
        GitConfig::new(work)
            .with_timeout(Duration::from_secs(20))
            .with_committer("vellum", "vellum@example.com"),
    )
}

#[tokio::test]
async fn publish_cycle_against_bare_remote() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let backend = fixture(tmp.path());

    backend.sync().await.unwrap();
    let base = backend.current_revision().await.unwrap();

    backend.write_file("index.html", "<p>one</p>").await.unwrap();
    assert!(backend.stage_and_diff("index.html").await.unwrap());
    backend.commit("publish one", false).await.unwrap();
    assert_eq!(backend.push().await.unwrap(), PushOutcome::Pushed);
    let first = backend.current_revision().await.unwrap();
    assert_ne!(first, base);

    // Pushing again with nothing new is benign.
    assert_eq!(backend.push().await.unwrap(), PushOutcome::NothingToPush);

    // Identical rewrite stages nothing.
    backend.write_file("index.html", "<p>one</p>").await.unwrap();
    assert!(!backend.stage_and_diff("index.html").await.unwrap());

    assert_eq!(
        backend.content_at_revision(&first, "index.html").await.unwrap(),
        "<p>one</p>"
    );
    let missing = backend.content_at_revision(&base, "index.html").await;
    assert!(matches!(missing, Err(BackendError::NotFound { .. })));
}

#[tokio::test]
async fn sync_drops_unpushed_commits_and_dirty_edits() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let backend = fixture(tmp.path());
    backend.sync().await.unwrap();
    let published = backend.current_revision().await.unwrap();

    // A commit that never reached the remote, plus an uncommitted edit.
    backend.write_file("index.html", "<p>orphan</p>").await.unwrap();
    backend.stage_and_diff("index.html").await.unwrap();
    backend.commit("orphan", false).await.unwrap();
    backend.write_file("README.md", "dirty\n").await.unwrap();

    backend.sync().await.unwrap();
    assert_eq!(backend.current_revision().await.unwrap(), published);
    assert_eq!(backend.read_file("index.html").await.unwrap(), None);
    assert_eq!(
        backend.read_file("README.md").await.unwrap().as_deref(),
        Some("site\n")
    );
}

#[tokio::test]
async fn unknown_revision_is_not_found() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let backend = fixture(tmp.path());
    let rev = Revision::new("0000000000000000000000000000000000000000").unwrap();
    let result = backend.content_at_revision(&rev, "index.html").await;
    assert!(matches!(result, Err(BackendError::NotFound { .. })));
}

#[tokio::test]
async fn sync_removes_untracked_pages_only() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let backend = fixture(tmp.path());
    backend.sync().await.unwrap();

    // Written by a publish that died before staging.
    backend.write_file("about.html", "<p>about</p>").await.unwrap();
    // Audit logs and previews may live untracked inside the working copy.
    backend.write_file("logs/about.json", "[]").await.unwrap();
    backend
        .write_file("static/preview/about/abc.html", "<p>old</p>")
        .await
        .unwrap();

    backend.sync().await.unwrap();
    assert_eq!(backend.read_file("about.html").await.unwrap(), None);
    assert_eq!(
        backend.read_file("logs/about.json").await.unwrap().as_deref(),
        Some("[]")
    );
    assert!(backend
        .read_file("static/preview/about/abc.html")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn symbolic_revisions_resolve_to_commit_ids() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let backend = fixture(tmp.path());
    backend.sync().await.unwrap();
    let head = backend.current_revision().await.unwrap();

    let symbolic = Revision::new("HEAD").unwrap();
    assert_eq!(backend.resolve_revision(&symbolic).await.unwrap(), Some(head.clone()));
    let branch = Revision::new("main").unwrap();
    assert_eq!(backend.resolve_revision(&branch).await.unwrap(), Some(head));

    let unknown = Revision::new("0000000000000000000000000000000000000000").unwrap();
    assert_eq!(backend.resolve_revision(&unknown).await.unwrap(), None);
}
