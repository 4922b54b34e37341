//! Vellum version backend
//!
//! The publish engine treats version control as a capability, not an
//! implementation. [`VersionBackend`] is that capability; [`GitBackend`] is
//! the production implementation driving the `git` CLI.
//!
//! # Example
//!
//! ```rust,ignore
//! use vellum_backend::{GitBackend, GitConfig, VersionBackend};
//!
//! # async fn example() -> Result<(), vellum_backend::BackendError> {
//! let backend = GitBackend::new(GitConfig::new("/srv/site").with_branch("main"));
//! backend.sync().await?;
//! let head = backend.current_revision().await?;
//! println!("published at {head}");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod backend;
mod command;
mod error;
mod git;

pub use backend::{PushOutcome, VersionBackend};
pub use command::redact;
pub use error::{BackendError, BackendResult};
pub use git::{GitBackend, GitConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
