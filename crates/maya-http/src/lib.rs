//! # maya-http
//!
//! `reqwest` adapter for the tutor backend. [`ApiClient`] implements the
//! collaborator ports from `maya-core`:
//!
//! | Port | Endpoint |
//! |---|---|
//! | `SpeechSynthesisPort` | `POST /tts/` with `{ "text": … }`, raw WAV body back |
//! | `TranscriptionPort` | `POST /transcribe/`, multipart `file` field, `{ "transcription": … }` back |
//! | `ChatPort` | `POST /chat/` with `{ "question": … }`, `{ "response": … }` back |
//!
//! Failures are reported once and never retried; the learner re-triggers the
//! action.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

mod client;
mod config;
mod dto;
mod error;

// ============================================================================
// Public API
// ============================================================================

pub use client::ApiClient;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};

// Silence unused dev-dependency warnings
#[cfg(test)]
use httpmock as _;
#[cfg(test)]
use tempfile as _;
