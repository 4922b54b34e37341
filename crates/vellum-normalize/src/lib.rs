//! Vellum content normalization
//!
//! Decides whether two HTML artifacts differ *meaningfully*. Markup is parsed
//! with the tree-sitter HTML grammar, presentation-only nodes are stripped, and
//! two digests are taken:
//!
//! - a **structure** signature over the canonical element/attribute tree
//! - a **text** signature over the visible, whitespace-collapsed text
//!
//! # Example
//!
//! ```rust
//! use vellum_normalize::ContentNormalizer;
//!
//! let n = ContentNormalizer::new();
//! assert!(n.equivalent("<p>a  b</p>", "<p>a b</p>\n"));
//! assert!(!n.equivalent("<p>a</p>", "<p>b</p>"));
//! ```

#![warn(unreachable_pub)]

pub mod html;
mod signature;
mod text;

pub use html::{CanonicalForm, PRESENTATION_ATTRIBUTES, PRESENTATION_ELEMENTS};
pub use signature::{ContentNormalizer, Signature};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn reflow(words: &[String], sep: &str) -> String {
        format!("<html><body><p>{}</p></body></html>", words.join(sep))
    }

    proptest! {
        #[test]
        fn whitespace_reflow_preserves_signature(
            words in prop::collection::vec("[a-z]{1,8}", 1..12),
            sep in "[ \t\n]{1,4}",
        ) {
            let n = ContentNormalizer::new();
            prop_assert_eq!(n.normalize(&reflow(&words, " ")), n.normalize(&reflow(&words, &sep)));
        }

        #[test]
        fn normalize_never_panics(input in ".{0,300}") {
            let _ = ContentNormalizer::new().normalize(&input);
        }
    }
}
