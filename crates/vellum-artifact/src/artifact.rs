//! Immutable markup artifacts

use crate::hash::ContentHash;
use crate::slot::SlotName;
use std::fmt::Debug;
use std::sync::Arc;

/// Errors constructing artifact values
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Slot name failed validation
    #[error("invalid slot name: {0:?}")]
    InvalidSlot(String),

    /// Revision id failed validation
    #[error("invalid revision id: {0:?}")]
    InvalidRevision(String),
}

/// Generated markup bound to the slot it will be published into
///
/// # Invariants
/// - `hash` is always the BLAKE3 digest of `content`
/// - Immutable after construction; a new artifact is a new value
/// - Cheap to clone (content is shared)
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    slot: SlotName,
    content: Arc<str>,
    hash: ContentHash,
}

impl Artifact {
    /// Create an artifact for `slot`
    #[must_use]
    pub fn new(slot: SlotName, content: impl Into<Arc<str>>) -> Self {
        let content = content.into();
        let hash = ContentHash::compute(content.as_bytes());
        Self {
            slot,
            content,
            hash,
        }
    }

    /// Slot this artifact belongs to
    #[inline]
    #[must_use]
    pub fn slot(&self) -> &SlotName {
        &self.slot
    }

    /// Raw markup
    #[inline]
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Digest of the raw markup
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Byte length of the markup
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// True for zero-length markup
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Leading `max_chars` characters, cut on a char boundary
    #[must_use]
    pub fn excerpt(&self, max_chars: usize) -> &str {
        excerpt(&self.content, max_chars)
    }
}

impl Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("slot", &self.slot)
            .field("len", &self.content.len())
            .field("hash", &self.hash.short())
            .finish()
    }
}

/// Leading `max_chars` characters of `text`, cut on a char boundary
#[must_use]
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> SlotName {
        SlotName::new("index").unwrap()
    }

    #[test]
    fn hash_tracks_content() {
        let a = Artifact::new(slot(), "<p>a</p>");
        let b = Artifact::new(slot(), "<p>a</p>");
        let c = Artifact::new(slot(), "<p>c</p>");
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
        assert_eq!(a, b);
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let artifact = Artifact::new(slot(), "안녕하세요 world");
        assert_eq!(artifact.excerpt(2), "안녕");
        assert_eq!(artifact.excerpt(100), "안녕하세요 world");
        assert_eq!(artifact.excerpt(0), "");
    }

    #[test]
    fn debug_omits_body() {
        let artifact = Artifact::new(slot(), "<html>secret body</html>");
        let dbg = format!("{artifact:?}");
        assert!(dbg.contains("index"));
        assert!(!dbg.contains("secret body"));
    }
}
