//! # maya-voice
//!
//! The phrase practice loop: play a reference clip, record the learner,
//! transcribe, score, and gate advancing on the score.
//!
//! - [`PracticeSessionController`] orchestrates one phrase.
//! - [`AudioCaptureSession`] owns the microphone lifecycle.
//! - [`SpeechSynthesisCache`] synthesizes each phrase once and releases its
//!   clip after playback.
//!
//! Audio hardware sits behind the [`Recorder`] and [`AudioPlayer`] traits;
//! [`audio_local`] provides cpal/rodio implementations for desktop builds.

#![deny(unused_crate_dependencies)]

pub mod audio_io;
pub mod audio_local;
mod audio_thread;
pub mod busy;
pub mod cache;
pub mod capture;
pub mod config;
pub mod error;
mod playback;
pub mod practice;
pub mod session;

// Re-export key types for convenience
pub use audio_io::{
    AudioPlayer, ClipId, PermissionStatus, PlaybackCompletion, PlaybackNotifier, PlaybackOutcome,
    Recorder,
};
pub use busy::{BusyFlag, BusyGuard};
pub use cache::{CacheEntry, SpeechSynthesisCache};
pub use config::{
    AudioContainer, DEFAULT_PASS_THRESHOLD, PracticeConfig, RecordingConfig, SpeechCacheConfig,
    TargetPlatform,
};
pub use error::VoiceError;
pub use practice::{
    AdvanceDecision, PracticeEvent, PracticeSessionController, PracticeState, ToggleOutcome,
};
pub use session::{AudioCaptureSession, RecordingHandle, RecordingState, StopOutcome};

#[cfg(test)]
use mockall as _;
