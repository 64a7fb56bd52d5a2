//! Practice session controller: drives one phrase through listen, record,
//! transcribe and score.
//!
//! ```text
//!   AwaitingAction ──listen──▶ PlayingReference ──▶ (previous state)
//!         │
//!         └──toggle──▶ Recording ──toggle──▶ Transcribing ──▶ Scored
//!                                                               │
//!         ▲────────────── toggle (retry) / advance ─────────────┘
//! ```
//!
//! Any failure surfaces as a [`PracticeEvent::Error`]. A failed recording
//! step returns the controller to `AwaitingAction`; a failed `listen` returns
//! it to the state it was in, keeping any scored attempt. Advancing to the next phrase is gated on
//! the latest attempt strictly exceeding the pass threshold.

use std::sync::Arc;

use maya_core::{AttemptResult, Phrase, SimilarityScorer, TranscriptionPort};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::audio_io::PermissionStatus;
use crate::busy::BusyFlag;
use crate::cache::SpeechSynthesisCache;
use crate::config::PracticeConfig;
use crate::error::VoiceError;
use crate::session::{AudioCaptureSession, StopOutcome, discard_recording};

// ── Practice state machine ─────────────────────────────────────────

/// Current state of a practice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PracticeState {
    /// Waiting for the learner to listen or record.
    AwaitingAction,

    /// Fetching or starting the reference clip.
    PlayingReference,

    /// Microphone is recording an attempt.
    Recording,

    /// The attempt is being transcribed and scored.
    Transcribing,

    /// The latest attempt has a score.
    Scored,
}

/// Whether the learner may move on from a scored attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvanceDecision {
    Allowed,
    Blocked,
}

/// Result of [`PracticeSessionController::toggle_recording`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A new recording started.
    Started,
    /// The recording was stopped, transcribed and scored.
    Scored(AttemptResult),
}

// ── Events emitted by the controller ───────────────────────────────

/// Events emitted to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PracticeEvent {
    /// Controller state changed.
    StateChanged(PracticeState),

    /// The transcription service returned text for the attempt.
    Transcript(String),

    /// The attempt was scored.
    Scored(AttemptResult),

    /// A user-visible error message.
    Error(String),

    /// Microphone input level (0.0–1.0), for UI visualisation.
    AudioLevel(f32),
}

// ── Controller ─────────────────────────────────────────────────────

/// Drives practice of a single phrase.
pub struct PracticeSessionController {
    phrase: Phrase,
    state: PracticeState,
    capture: AudioCaptureSession,
    cache: SpeechSynthesisCache,
    transcriber: Arc<dyn TranscriptionPort>,
    scorer: SimilarityScorer,
    config: PracticeConfig,

    /// Latest scored attempt for the current phrase.
    attempt: Option<AttemptResult>,

    /// Latest error, kept until the next action.
    last_error: Option<VoiceError>,

    busy: BusyFlag,
    event_tx: mpsc::UnboundedSender<PracticeEvent>,
}

impl PracticeSessionController {
    /// Create a controller for `phrase`.
    ///
    /// Returns the controller and a receiver for [`PracticeEvent`]s.
    #[must_use]
    pub fn new(
        phrase: Phrase,
        capture: AudioCaptureSession,
        cache: SpeechSynthesisCache,
        transcriber: Arc<dyn TranscriptionPort>,
        config: PracticeConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PracticeEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let controller = Self {
            phrase,
            state: PracticeState::AwaitingAction,
            capture,
            cache,
            transcriber,
            scorer: SimilarityScorer::new(),
            config,
            attempt: None,
            last_error: None,
            busy: BusyFlag::new(),
            event_tx,
        };

        (controller, event_rx)
    }

    #[must_use]
    pub const fn phrase(&self) -> &Phrase {
        &self.phrase
    }

    #[must_use]
    pub const fn state(&self) -> PracticeState {
        self.state
    }

    #[must_use]
    pub const fn attempt(&self) -> Option<&AttemptResult> {
        self.attempt.as_ref()
    }

    #[must_use]
    pub fn accuracy(&self) -> Option<u8> {
        self.attempt.as_ref().map(|a| a.accuracy)
    }

    #[must_use]
    pub fn transcript(&self) -> Option<&str> {
        self.attempt.as_ref().map(|a| a.transcript.as_str())
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&VoiceError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub const fn config(&self) -> &PracticeConfig {
        &self.config
    }

    /// Shared flag the UI polls to disable its buttons.
    #[must_use]
    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    // ── Actions ────────────────────────────────────────────────────

    /// Play the reference clip for the current phrase.
    ///
    /// Leaves the attempt untouched, on success and on failure alike.
    pub async fn listen(&mut self) -> Result<(), VoiceError> {
        if matches!(
            self.state,
            PracticeState::Recording | PracticeState::Transcribing
        ) {
            return Err(VoiceError::Busy);
        }
        let Some(_busy) = self.busy.try_acquire() else {
            return Err(VoiceError::Busy);
        };

        self.last_error = None;
        let resume = self.state;
        self.set_state(PracticeState::PlayingReference);

        let played = self.cache.play_or_fetch(self.phrase.reference_text()).await;
        match played {
            Ok(()) => {
                self.set_state(resume);
                Ok(())
            }
            Err(e) => Err(self.fail_into(resume, e)),
        }
    }

    /// Start recording, or stop and score the active recording.
    ///
    /// Starting a new recording discards the previous attempt.
    pub async fn toggle_recording(&mut self) -> Result<ToggleOutcome, VoiceError> {
        if self.capture.is_recording() {
            self.finish_recording().await
        } else {
            self.begin_recording().await
        }
    }

    /// Whether the latest attempt clears the pass threshold.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.attempt
            .as_ref()
            .is_some_and(|a| a.passes(self.config.pass_threshold))
    }

    /// Advance decision for a scored attempt; `None` before scoring.
    #[must_use]
    pub fn advance_decision(&self) -> Option<AdvanceDecision> {
        (self.state == PracticeState::Scored).then(|| {
            if self.can_advance() {
                AdvanceDecision::Allowed
            } else {
                AdvanceDecision::Blocked
            }
        })
    }

    /// Finish the current phrase, clearing its attempt.
    pub fn advance(&mut self) -> Result<(), VoiceError> {
        if !self.can_advance() {
            return Err(VoiceError::AdvanceBlocked {
                accuracy: self.accuracy(),
            });
        }
        tracing::info!(accuracy = ?self.accuracy(), "Phrase passed");
        self.reset_attempt();
        Ok(())
    }

    /// Switch to another phrase, discarding any recording in progress.
    pub async fn set_phrase(&mut self, phrase: Phrase) {
        self.capture.shutdown().await;
        self.phrase = phrase;
        self.reset_attempt();
    }

    /// Publish and return the current input level while recording.
    pub fn poll_metering(&self) -> Option<f32> {
        let level = self.capture.metering()?;
        self.emit(PracticeEvent::AudioLevel(level));
        Some(level)
    }

    /// Stop recording and playback and release the microphone.
    pub async fn shutdown(&mut self) {
        tracing::debug!("Shutting down practice session");
        self.capture.shutdown().await;
        if let Err(e) = self.cache.stop_current().await {
            tracing::warn!(error = %e, "Failed to stop playback on shutdown");
        }
        self.set_state(PracticeState::AwaitingAction);
    }

    // ── Recording flow ─────────────────────────────────────────────

    async fn begin_recording(&mut self) -> Result<ToggleOutcome, VoiceError> {
        if self.busy.is_busy() {
            return Err(VoiceError::Busy);
        }

        self.attempt = None;
        self.last_error = None;

        // Don't record the reference clip.
        if let Err(e) = self.cache.stop_current().await {
            tracing::warn!(error = %e, "Failed to stop playback before recording");
        }

        if self.capture.permission() != Some(PermissionStatus::Granted) {
            match self.capture.request_permission().await {
                Ok(PermissionStatus::Granted) => {}
                Ok(PermissionStatus::Denied) => return Err(self.fail(VoiceError::PermissionDenied)),
                Err(e) => return Err(self.fail(e)),
            }
        }

        let started = self.capture.start(&self.config.recording).await;
        if let Err(e) = started {
            return Err(self.fail(e));
        }

        self.set_state(PracticeState::Recording);
        Ok(ToggleOutcome::Started)
    }

    async fn finish_recording(&mut self) -> Result<ToggleOutcome, VoiceError> {
        let Some(_busy) = self.busy.try_acquire() else {
            return Err(VoiceError::Busy);
        };

        let handle = match self.capture.stop().await {
            Ok(StopOutcome::Stopped(handle)) => handle,
            Ok(StopOutcome::NothingToStop) => {
                return Err(self.fail(VoiceError::RecordingProducedNoData(
                    "no active recording".to_string(),
                )));
            }
            Err(e) => return Err(self.fail(e)),
        };

        self.set_state(PracticeState::Transcribing);
        let audio = handle.to_recorded_audio();
        let transcribed = self.transcriber.transcribe(&audio).await;
        discard_recording(&audio.path).await;

        let transcript = match transcribed {
            Ok(text) => text,
            Err(e) => return Err(self.fail(VoiceError::from_transcription(e))),
        };
        self.emit(PracticeEvent::Transcript(transcript.clone()));

        let accuracy = self
            .scorer
            .score(self.phrase.reference_text(), &transcript);
        let attempt = AttemptResult::new(transcript, accuracy);
        tracing::info!(
            accuracy,
            duration_ms = audio.duration_ms,
            passed = attempt.passes(self.config.pass_threshold),
            "Attempt scored"
        );

        self.attempt = Some(attempt.clone());
        self.capture.reset();
        self.set_state(PracticeState::Scored);
        self.emit(PracticeEvent::Scored(attempt.clone()));
        Ok(ToggleOutcome::Scored(attempt))
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn reset_attempt(&mut self) {
        self.attempt = None;
        self.last_error = None;
        self.capture.reset();
        self.set_state(PracticeState::AwaitingAction);
    }

    /// Record `err`, tell the UI and fall back to `AwaitingAction`.
    fn fail(&mut self, err: VoiceError) -> VoiceError {
        self.fail_into(PracticeState::AwaitingAction, err)
    }

    /// Record `err`, tell the UI and move to `next`.
    fn fail_into(&mut self, next: PracticeState, err: VoiceError) -> VoiceError {
        tracing::warn!(error = %err, state = ?self.state, "Practice action failed");
        self.emit(PracticeEvent::Error(err.to_string()));
        self.last_error = Some(err.clone());
        self.capture.reset();
        self.set_state(next);
        err
    }

    fn set_state(&mut self, new_state: PracticeState) {
        if self.state != new_state {
            tracing::debug!(old = ?self.state, new = ?new_state, "Practice state transition");
            self.state = new_state;
            self.emit(PracticeEvent::StateChanged(new_state));
        }
    }

    /// Emit an event (best-effort: if the receiver is dropped, we log and move on).
    fn emit(&self, event: PracticeEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::warn!("Practice event receiver dropped");
        }
    }
}

impl Drop for PracticeSessionController {
    fn drop(&mut self) {
        // The capture session releases the microphone itself; playback needs
        // the runtime.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let cache = self.cache.clone();
            runtime.spawn(async move {
                if let Err(e) = cache.stop_current().await {
                    tracing::warn!(error = %e, "Failed to stop playback on drop");
                }
            });
        }
    }
}
