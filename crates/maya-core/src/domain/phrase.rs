use serde::{Deserialize, Serialize};

/// A single phrase the learner practises.
///
/// Phrases are read-only reference data supplied by the UI layer; the core
/// never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phrase {
    /// The phrase in the learner's own language (e.g. `"Hello"`).
    pub source_text: String,
    /// The phrase in the target language (e.g. `"नमस्कार"`).
    pub target_text: String,
    /// Latin-script pronunciation guide (e.g. `"Namaskar"`).
    pub transliteration: String,
}

impl Phrase {
    pub fn new(
        source_text: impl Into<String>,
        target_text: impl Into<String>,
        transliteration: impl Into<String>,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            target_text: target_text.into(),
            transliteration: transliteration.into(),
        }
    }

    /// Text the learner is meant to pronounce.
    ///
    /// This is what gets synthesized for "listen" and what transcripts are
    /// scored against.
    pub fn reference_text(&self) -> &str {
        &self.target_text
    }
}
