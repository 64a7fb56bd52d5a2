//! # maya-core
//!
//! Domain types, the pronunciation scorer, and the port traits that the
//! practice loop expects from its network collaborators.
//!
//! Nothing in this crate touches audio hardware, the filesystem, or the
//! network. Adapters live in `maya-http` (collaborators) and `maya-voice`
//! (audio resources and the practice controller).

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod ports;
pub mod scoring;

// Re-export commonly used types for convenience
pub use domain::{AttemptResult, CacheKey, Phrase, RecordedAudio};
pub use ports::{ChatPort, PortError, SpeechSynthesisPort, TranscriptionPort};
pub use scoring::{SimilarityScorer, edit_distance};

#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tokio as _;
