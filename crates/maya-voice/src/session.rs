//! Recording session: wraps a [`Recorder`] with permission and lifecycle
//! bookkeeping.
//!
//! ```text
//! Idle → RequestingPermission → Idle → Recording → Stopped(handle)
//!              ↓ denied                   ↓ error
//!            Failed                     Failed
//! ```
//!
//! Only one recording may be active per session. Dropping a session while it
//! records releases the microphone through [`Recorder::abort`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use maya_core::RecordedAudio;

use crate::audio_io::{PermissionStatus, Recorder};
use crate::config::RecordingConfig;
use crate::error::VoiceError;

/// A finished recording, verified to exist on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingHandle {
    pub uri: PathBuf,
    pub duration_ms: u64,
    pub mime_type: &'static str,
}

impl RecordingHandle {
    #[must_use]
    pub fn to_recorded_audio(&self) -> RecordedAudio {
        RecordedAudio::new(&self.uri, self.mime_type, self.duration_ms)
    }
}

/// Lifecycle of the session's recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    RequestingPermission,
    Recording,
    Stopped(RecordingHandle),
    Failed(String),
}

/// Result of [`AudioCaptureSession::stop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// No recording was active.
    NothingToStop,
    Stopped(RecordingHandle),
}

/// Manages one recorder for the lifetime of a practice screen.
pub struct AudioCaptureSession {
    recorder: Arc<dyn Recorder>,
    state: RecordingState,
    permission: Option<PermissionStatus>,
    active: Option<ActiveRecording>,
}

struct ActiveRecording {
    mime_type: &'static str,
    started_at: Instant,
}

impl AudioCaptureSession {
    pub fn new(recorder: Arc<dyn Recorder>) -> Self {
        Self {
            recorder,
            state: RecordingState::Idle,
            permission: None,
            active: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &RecordingState {
        &self.state
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        matches!(self.state, RecordingState::Recording)
    }

    /// Last answer from the permission prompt, if it was asked.
    #[must_use]
    pub const fn permission(&self) -> Option<PermissionStatus> {
        self.permission
    }

    /// Ask the platform for microphone access.
    ///
    /// A denial is reported as `Ok(Denied)` and leaves the session `Failed`;
    /// it is not retried until this is called again.
    pub async fn request_permission(&mut self) -> Result<PermissionStatus, VoiceError> {
        if self.is_recording() {
            return Ok(PermissionStatus::Granted);
        }

        self.state = RecordingState::RequestingPermission;
        match self.recorder.request_permission().await {
            Ok(PermissionStatus::Granted) => {
                self.permission = Some(PermissionStatus::Granted);
                self.state = RecordingState::Idle;
                Ok(PermissionStatus::Granted)
            }
            Ok(PermissionStatus::Denied) => {
                tracing::warn!("Microphone permission denied");
                self.permission = Some(PermissionStatus::Denied);
                self.state = RecordingState::Failed(VoiceError::PermissionDenied.to_string());
                Ok(PermissionStatus::Denied)
            }
            Err(e) => {
                self.state = RecordingState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Start recording with `config`.
    ///
    /// Requires a prior granted [`request_permission`](Self::request_permission).
    pub async fn start(&mut self, config: &RecordingConfig) -> Result<(), VoiceError> {
        if self.is_recording() {
            return Err(VoiceError::AlreadyRecording);
        }
        if self.permission != Some(PermissionStatus::Granted) {
            return Err(VoiceError::PermissionDenied);
        }

        if let Err(e) = self.recorder.start(config).await {
            tracing::warn!(error = %e, "Recorder failed to start");
            self.state = RecordingState::Failed(e.to_string());
            return Err(e);
        }

        self.active = Some(ActiveRecording {
            mime_type: config.mime_type(),
            started_at: Instant::now(),
        });
        self.state = RecordingState::Recording;
        tracing::debug!(container = config.container.extension(), "Recording started");
        Ok(())
    }

    /// Stop the active recording and verify its file.
    ///
    /// Stopping when nothing records is a no-op.
    pub async fn stop(&mut self) -> Result<StopOutcome, VoiceError> {
        let Some(active) = self.active.take() else {
            return Ok(StopOutcome::NothingToStop);
        };
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = active.started_at.elapsed().as_millis() as u64;

        let result = match self.recorder.stop().await {
            Ok(Some(uri)) => verify_recording(uri, duration_ms, active.mime_type).await,
            Ok(None) => Err(VoiceError::RecordingProducedNoData(
                "recorder returned no file".to_string(),
            )),
            Err(e) => Err(e),
        };

        match result {
            Ok(handle) => {
                tracing::debug!(uri = %handle.uri.display(), duration_ms, "Recording stopped");
                self.state = RecordingState::Stopped(handle.clone());
                Ok(StopOutcome::Stopped(handle))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Recording did not produce a usable file");
                self.state = RecordingState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Input level of the active recording, when the recorder meters.
    #[must_use]
    pub fn metering(&self) -> Option<f32> {
        if self.is_recording() {
            self.recorder.input_level()
        } else {
            None
        }
    }

    /// Return to `Idle` after a stopped or failed recording.
    pub fn reset(&mut self) {
        if !self.is_recording() {
            self.state = RecordingState::Idle;
        }
    }

    /// Stop any active recording and delete what it produced.
    pub async fn shutdown(&mut self) {
        if let Ok(StopOutcome::Stopped(handle)) = self.stop().await {
            discard_recording(&handle.uri).await;
        }
        self.state = RecordingState::Idle;
    }
}

impl Drop for AudioCaptureSession {
    fn drop(&mut self) {
        if self.active.take().is_some() {
            tracing::debug!("Capture session dropped while recording; releasing microphone");
            self.recorder.abort();
        }
    }
}

async fn verify_recording(
    uri: PathBuf,
    duration_ms: u64,
    mime_type: &'static str,
) -> Result<RecordingHandle, VoiceError> {
    match tokio::fs::metadata(&uri).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(RecordingHandle {
            uri,
            duration_ms,
            mime_type,
        }),
        Ok(_) => {
            discard_recording(&uri).await;
            Err(VoiceError::RecordingProducedNoData(format!(
                "{} is empty",
                uri.display()
            )))
        }
        Err(e) => Err(VoiceError::RecordingProducedNoData(format!(
            "{}: {e}",
            uri.display()
        ))),
    }
}

/// Delete a recording file; failures are logged, not returned.
pub(crate) async fn discard_recording(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to delete recording");
    }
}
