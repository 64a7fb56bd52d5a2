//! Wire shapes for the tutor backend.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct TtsRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    pub transcription: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub question: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: String,
}
