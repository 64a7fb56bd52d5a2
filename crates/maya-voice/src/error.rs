//! Practice loop error types.

use maya_core::PortError;

/// Errors that can occur in the practice loop.
///
/// Every variant is recoverable: the controller turns it into a
/// user-visible message and returns to `AwaitingAction`. The type is `Clone`
/// so a coalesced synthesis fetch can hand the same failure to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    /// Microphone permission denied.
    #[error("Microphone permission denied")]
    PermissionDenied,

    /// The microphone could not be acquired or configured.
    #[error("Microphone unavailable: {0}")]
    DeviceUnavailable(String),

    /// A recording session is already active.
    #[error("A recording is already in progress")]
    AlreadyRecording,

    /// The recorder stopped but left no usable file behind.
    #[error("Recording produced no data: {0}")]
    RecordingProducedNoData(String),

    /// The speech-synthesis collaborator failed.
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// The transcription collaborator failed.
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Writing, reading or deleting a temporary audio file failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The playback engine could not load or play a clip.
    #[error("Playback failed: {0}")]
    PlaybackError(String),

    /// Converting captured audio to the configured sample rate failed.
    #[error("Audio resampling failed: {0}")]
    ResampleError(String),

    /// The dedicated audio thread has exited.
    #[error("Audio thread is not running")]
    AudioThreadDied,

    /// Another action of the same controller is still in flight.
    #[error("Another action is still in progress")]
    Busy,

    /// The latest attempt does not clear the pass threshold.
    #[error("Cannot advance yet (accuracy: {})", accuracy.map_or_else(|| "no attempt".to_string(), |a| format!("{a}%")))]
    AdvanceBlocked {
        /// Accuracy of the latest attempt, if any.
        accuracy: Option<u8>,
    },
}

impl VoiceError {
    /// Map a failure from the synthesis collaborator.
    pub fn from_synthesis(err: PortError) -> Self {
        match err {
            PortError::SynthesisFailed(msg) => Self::SynthesisFailed(msg),
            PortError::Input(msg) => Self::StorageError(msg),
            other => Self::SynthesisFailed(other.to_string()),
        }
    }

    /// Map a failure from the transcription collaborator.
    pub fn from_transcription(err: PortError) -> Self {
        match err {
            PortError::TranscriptionFailed(msg) => Self::TranscriptionFailed(msg),
            PortError::Input(msg) => Self::StorageError(msg),
            other => Self::TranscriptionFailed(other.to_string()),
        }
    }

    pub(crate) fn storage(err: &std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}
