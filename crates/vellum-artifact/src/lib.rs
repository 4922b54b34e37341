//! Vellum artifact values
//!
//! The immutable values every other crate passes around.
//!
//! # Core Concepts
//!
//! - [`Artifact`]: generated markup bound to a [`SlotName`]
//! - [`SlotName`]: logical identity of a publishable file
//! - [`Revision`]: backend-assigned id of a point in published history
//! - [`ContentHash`]: 32-byte BLAKE3 digest
//!
//! # Example
//!
//! ```rust
//! use vellum_artifact::{Artifact, SlotName};
//!
//! let slot = SlotName::new("index").unwrap();
//! let artifact = Artifact::new(slot, "<html><body>hi</body></html>");
//! assert_eq!(artifact.slot().file_name(), "index.html");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod hash;
mod revision;
mod slot;

pub use artifact::{excerpt, Artifact, ArtifactError};
pub use hash::{ContentHash, HashError};
pub use revision::Revision;
pub use slot::{SlotName, SLOT_EXTENSION};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn excerpt_is_always_a_prefix(text in ".{0,200}", n in 0usize..300) {
            let cut = excerpt(&text, n);
            prop_assert!(text.starts_with(cut));
            prop_assert!(cut.chars().count() <= n);
        }

        #[test]
        fn valid_slot_names_round_trip(name in "[a-zA-Z0-9_][a-zA-Z0-9_-]{0,40}") {
            let slot = SlotName::new(name.clone()).unwrap();
            prop_assert_eq!(slot.as_str(), name.as_str());
        }
    }
}
