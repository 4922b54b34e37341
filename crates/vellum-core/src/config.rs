//! Publisher configuration
//!
//! Loaded from TOML; every field has a default so a config file only needs
//! to name what differs.
//!
//! ```toml
//! repo_root = "/srv/site"
//! branch = "pages"
//! committer_name = "vellum"
//! committer_email = "vellum@example.com"
//! ```

use crate::engine::DEFAULT_MESSAGE;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vellum_backend::GitConfig;

/// Settings for a [`Publisher`](crate::Publisher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Working copy root
    pub repo_root: PathBuf,
    /// Remote name
    pub remote: String,
    /// Published branch
    pub branch: String,
    /// Directory holding one audit log per slot
    pub audit_dir: PathBuf,
    /// Directory holding rendered previews
    pub preview_dir: PathBuf,
    /// Upper bound for each version-control command
    pub command_timeout_secs: u64,
    /// Characters of content kept in each audit record
    pub excerpt_chars: usize,
    /// Commit message when a request has none; `{file}` and `{slot}` expand
    pub default_message: String,
    /// Reject content that does not look like an HTML document
    pub require_html: bool,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    /// Entries kept in the in-memory preview cache
    pub preview_cache_capacity: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            audit_dir: PathBuf::from("logs"),
            preview_dir: PathBuf::from("static/preview"),
            command_timeout_secs: 30,
            excerpt_chars: 300,
            default_message: DEFAULT_MESSAGE.to_string(),
            require_html: true,
            committer_name: None,
            committer_email: None,
            preview_cache_capacity: 256,
        }
    }
}

impl PublisherConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };
        for (field, value) in [("remote", &self.remote), ("branch", &self.branch)] {
            if value.is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
            if value.starts_with('-') || value.chars().any(char::is_whitespace) {
                return Err(invalid(field, "must be a plain name"));
            }
        }
        if self.command_timeout_secs == 0 {
            return Err(invalid("command_timeout_secs", "must be positive"));
        }
        if self.excerpt_chars == 0 {
            return Err(invalid("excerpt_chars", "must be positive"));
        }
        if self.committer_name.is_some() != self.committer_email.is_some() {
            return Err(invalid(
                "committer_name",
                "committer_name and committer_email must be set together",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_repo_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.repo_root = root.into();
        self
    }

    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    #[must_use]
    pub fn with_audit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audit_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preview_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_require_html(mut self, require: bool) -> Self {
        self.require_html = require;
        self
    }

    #[must_use]
    pub fn with_default_message(mut self, template: impl Into<String>) -> Self {
        self.default_message = template.into();
        self
    }

    #[must_use]
    pub fn with_committer(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.committer_name = Some(name.into());
        self.committer_email = Some(email.into());
        self
    }

    /// Command timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Backend settings derived from this config
    #[must_use]
    pub fn git_config(&self) -> GitConfig {
        let mut git = GitConfig::new(&self.repo_root)
            .with_remote(&self.remote)
            .with_branch(&self.branch)
            .with_timeout(self.command_timeout());
        if let (Some(name), Some(email)) = (&self.committer_name, &self.committer_email) {
            git = git.with_committer(name, email);
        }
        git
    }
}
