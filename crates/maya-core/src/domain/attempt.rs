use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one scored pronunciation attempt.
///
/// Held only for the current phrase; discarded on retry or when the learner
/// moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    /// What the transcription service heard.
    pub transcript: String,
    /// Similarity to the reference text, 0–100.
    pub accuracy: u8,
    /// When the attempt was scored.
    pub timestamp: DateTime<Utc>,
}

impl AttemptResult {
    /// Build a result stamped with the current time.
    pub fn new(transcript: impl Into<String>, accuracy: u8) -> Self {
        Self {
            transcript: transcript.into(),
            accuracy: accuracy.min(100),
            timestamp: Utc::now(),
        }
    }

    /// Whether this attempt clears `threshold` (strictly greater).
    pub const fn passes(&self, threshold: u8) -> bool {
        self.accuracy > threshold
    }
}
