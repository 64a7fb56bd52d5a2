use std::fmt;

use sha2::{Digest, Sha256};

/// Deterministic identifier for a synthesized-speech clip.
///
/// Derived from a SHA-256 digest of the full UTF-8 text, so two different
/// texts never share a key even when they share a long prefix and length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    const PREFIX: &'static str = "tts_";

    /// Compute the key for `text`.
    pub fn for_text(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(format!("{}{:x}", Self::PREFIX, hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name used when the clip is persisted to a temp directory.
    pub fn file_name(&self) -> String {
        format!("{}.wav", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
