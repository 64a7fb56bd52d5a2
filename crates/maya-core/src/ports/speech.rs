use async_trait::async_trait;
use thiserror::Error;

use crate::domain::RecordedAudio;

// ── Error ─────────────────────────────────────────────────────────────────────

/// Errors returned by collaborator ports.
///
/// Adapters map their transport errors onto these variants at the boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    /// Text-to-speech request failed or returned no audio.
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Speech-to-text request failed or returned no transcript.
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Chat request failed.
    #[error("Chat request failed: {0}")]
    ChatFailed(String),

    /// Local input for the request could not be read.
    #[error("Could not read request input: {0}")]
    Input(String),
}

// ── Port traits ───────────────────────────────────────────────────────────────

/// Remote text-to-speech collaborator.
#[async_trait]
pub trait SpeechSynthesisPort: Send + Sync {
    /// Synthesize `text` and return the raw audio bytes (WAV container).
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, PortError>;
}

/// Remote speech-to-text collaborator.
#[async_trait]
pub trait TranscriptionPort: Send + Sync {
    /// Transcribe a finished recording.
    async fn transcribe(&self, audio: &RecordedAudio) -> Result<String, PortError>;
}

/// Remote conversational assistant.
///
/// Not part of the scoring loop; exposed so the UI talks to every backend
/// endpoint through one client.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Ask a free-form question and return the assistant's answer.
    async fn ask(&self, question: &str) -> Result<String, PortError>;
}
