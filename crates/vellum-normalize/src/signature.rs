//! Signatures and the normalizer that derives them

use crate::html::{canonicalize, canonicalize_lossy, CanonicalForm};
use serde::{Deserialize, Serialize};
use vellum_artifact::{Artifact, ContentHash};

/// Equality key for an artifact, blind to cosmetic differences
///
/// Two artifacts are *equivalent* iff both fields match. A signature is only
/// ever used for skip detection; it never identifies published state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Digest of the canonical element/attribute structure
    pub structure: ContentHash,
    /// Digest of the collapsed visible text
    pub text: ContentHash,
}

impl Signature {
    fn from_form(form: &CanonicalForm) -> Self {
        Self {
            structure: ContentHash::compute_fields(form.structure.iter().map(String::as_bytes)),
            text: ContentHash::compute(form.text.as_bytes()),
        }
    }
}

/// Canonicalizes markup into a [`Signature`]
///
/// Pure and total: malformed input is parsed best-effort, and if no syntax
/// tree can be produced at all a tag-stripping fallback is used instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentNormalizer;

impl ContentNormalizer {
    /// Create a normalizer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Canonical forms before hashing, useful for diagnostics
    #[must_use]
    pub fn canonical_form(&self, content: &str) -> CanonicalForm {
        canonicalize(content).unwrap_or_else(|| {
            tracing::debug!(len = content.len(), "falling back to lossy canonical form");
            canonicalize_lossy(content)
        })
    }

    /// Signature of raw markup
    #[must_use]
    pub fn normalize(&self, content: &str) -> Signature {
        Signature::from_form(&self.canonical_form(content))
    }

    /// Signature of an artifact's markup
    #[inline]
    #[must_use]
    pub fn normalize_artifact(&self, artifact: &Artifact) -> Signature {
        self.normalize(artifact.content())
    }

    /// True when `a` and `b` differ only cosmetically
    #[must_use]
    pub fn equivalent(&self, a: &str, b: &str) -> bool {
        // Identical bytes are always equivalent; skip the parse.
        a == b || self.normalize(a) == self.normalize(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Shop</title></head>
  <body>
    <h1>Welcome</h1>
    <p class="lead">Fresh bread daily.</p>
  </body>
</html>"#;

    #[test]
    fn whitespace_noise_is_equivalent() {
        let compact = "<html><head><title>Shop</title></head><body><h1>Welcome</h1>\
                       <p class=\"lead\">Fresh   bread\n daily.</p></body></html>";
        assert!(ContentNormalizer::new().equivalent(PAGE, compact));
    }

    #[test]
    fn stripped_presentation_is_equivalent() {
        let styled = PAGE.replace(
            "<head>",
            "<head><meta name=\"viewport\" content=\"width=device-width\">\
             <style>h1 { color: teal; }</style><!-- build 42 -->",
        );
        assert!(ContentNormalizer::new().equivalent(PAGE, &styled));
    }

    #[test]
    fn text_change_is_not_equivalent() {
        let changed = PAGE.replace("Fresh bread daily.", "Fresh bread weekly.");
        let n = ContentNormalizer::new();
        assert!(!n.equivalent(PAGE, &changed));
        assert_eq!(n.normalize(PAGE).structure, n.normalize(&changed).structure);
    }

    #[test]
    fn structure_change_is_not_equivalent() {
        let changed = PAGE.replace("<h1>Welcome</h1>", "<h2>Welcome</h2>");
        let n = ContentNormalizer::new();
        assert!(!n.equivalent(PAGE, &changed));
        assert_eq!(n.normalize(PAGE).text, n.normalize(&changed).text);
    }

    #[test]
    fn normalize_is_total_on_garbage() {
        let n = ContentNormalizer::new();
        let _ = n.normalize("<<<>>></div></div><p");
        let _ = n.normalize("");
        let _ = n.normalize("\u{0}\u{1}<b");
    }
}
