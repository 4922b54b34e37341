//! Vellum Core - publish/rollback orchestration
//!
//! Turns generated markup into versioned, remotely published revisions:
//! - Skips publishes that only differ cosmetically from what is published
//! - Serializes all work on one working copy behind a workspace lock
//! - Recovers from interrupted or rejected publishes by resetting to the remote
//! - Records every accepted publication in an append-only audit log
//! - Rolls back by republishing historical content as a new revision
//!
//! # Example
//!
//! ```rust,ignore
//! use vellum_core::{PublishRequest, Publisher, PublisherConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PublisherConfig::from_toml_file("vellum.toml")?;
//! let publisher = Publisher::from_config(config);
//!
//! let outcome = publisher
//!     .publish(PublishRequest::new("index", "<html><body>hi</body></html>"))
//!     .await;
//! println!("{}", serde_json::to_string(&outcome)?);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod preview;
pub mod rollback;
pub mod service;
pub mod types;

pub use audit::{AuditLog, Provenance, PublishRecord};
pub use config::PublisherConfig;
pub use engine::{PublishEngine, DEFAULT_MESSAGE};
pub use error::{AuditError, ConfigError, PreviewError, PublishError};
pub use lock::{WorkspaceGuard, WorkspaceLock, WorkspaceLocks};
pub use preview::PreviewCache;
pub use rollback::RollbackEngine;
pub use service::Publisher;
pub use types::{FailureKind, PublishOutcome, PublishRequest, RollbackRequest, SkipReason};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for shells built on Vellum Core
    pub use crate::{
        FailureKind, PublishOutcome, PublishRequest, Publisher, PublisherConfig,
        RollbackRequest, SkipReason,
    };
    pub use vellum_artifact::{Revision, SlotName};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
