//! Port definitions for the practice loop's network collaborators.
//!
//! The speech models themselves are opaque services: given text they return
//! audio bytes, given audio they return a transcript. Adapters implement
//! these traits (`maya-http` talks to the tutor backend; tests use fakes).
//!
//! # Design Rules
//!
//! - No `reqwest` types in any signature
//! - Failures are reported, never retried, by the port
//! - Traits are object-safe so callers can hold `Arc<dyn …>`

mod speech;

pub use speech::{ChatPort, PortError, SpeechSynthesisPort, TranscriptionPort};
