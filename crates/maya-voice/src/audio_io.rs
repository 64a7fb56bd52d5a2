//! `Recorder` and `AudioPlayer` trait abstractions for the practice loop.
//!
//! These traits decouple the capture session and the speech cache from any
//! specific audio backend:
//!
//! | Implementor | Where used |
//! |---|---|
//! | [`LocalRecorder`](crate::audio_local::LocalRecorder) / [`LocalPlayer`](crate::audio_local::LocalPlayer) | Desktop: cpal capture, rodio playback |
//! | Platform recorders | Phones and browsers, injected by the host app |
//!
//! Both traits are object-safe (`Arc<dyn Recorder>` / `Arc<dyn AudioPlayer>`)
//! and take `&self`; implementations use interior mutability.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::config::RecordingConfig;
use crate::error::VoiceError;

// ── Recorder ───────────────────────────────────────────────────────

/// Answer from the platform permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Abstraction over a platform microphone recorder.
///
/// A recorder owns at most one recording at a time and writes it to a file
/// in the container named by the [`RecordingConfig`].
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Ask the platform for microphone access.
    async fn request_permission(&self) -> Result<PermissionStatus, VoiceError>;

    /// Acquire the microphone and begin recording.
    async fn start(&self, config: &RecordingConfig) -> Result<(), VoiceError>;

    /// Stop recording, release the microphone and return the finished file.
    ///
    /// `Ok(None)` means the recorder stopped cleanly but has nothing to show.
    async fn stop(&self) -> Result<Option<PathBuf>, VoiceError>;

    /// Latest input level in `0.0..=1.0`, if the recorder meters input.
    fn input_level(&self) -> Option<f32>;

    /// Release the microphone immediately, discarding any recording.
    ///
    /// Called from `Drop`, so it must not block on I/O.
    fn abort(&self);
}

// ── AudioPlayer ────────────────────────────────────────────────────

/// Handle to a clip loaded into an [`AudioPlayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(u64);

impl ClipId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// All audio drained.
    Finished,
    /// Stopped early, replaced by another clip, or the player went away.
    Stopped,
}

/// Resolves once, when a playback ends.
#[derive(Debug)]
pub struct PlaybackCompletion {
    rx: oneshot::Receiver<PlaybackOutcome>,
}

/// Sending half of a [`PlaybackCompletion`]; consumed by the first report.
#[derive(Debug)]
pub struct PlaybackNotifier {
    tx: oneshot::Sender<PlaybackOutcome>,
}

impl PlaybackCompletion {
    /// Create a linked notifier/completion pair.
    #[must_use]
    pub fn channel() -> (PlaybackNotifier, Self) {
        let (tx, rx) = oneshot::channel();
        (PlaybackNotifier { tx }, Self { rx })
    }

    /// Wait for the playback to end.
    ///
    /// A notifier dropped without reporting counts as [`PlaybackOutcome::Stopped`].
    pub async fn wait(self) -> PlaybackOutcome {
        self.rx.await.unwrap_or(PlaybackOutcome::Stopped)
    }
}

impl PlaybackNotifier {
    pub fn notify(self, outcome: PlaybackOutcome) {
        // The cache may have been dropped; nobody to tell.
        let _ = self.tx.send(outcome);
    }
}

/// Abstraction over an audio output engine.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Decode the audio file at `path` and keep it ready for playback.
    async fn load(&self, path: &Path) -> Result<ClipId, VoiceError>;

    /// Start playing `clip` from the beginning.
    ///
    /// Returns once playback has started; the completion resolves when it ends.
    async fn play(&self, clip: ClipId) -> Result<PlaybackCompletion, VoiceError>;

    /// Stop `clip` if it is playing. Stopping an idle clip is a no-op.
    async fn stop(&self, clip: ClipId) -> Result<(), VoiceError>;

    /// Forget `clip` and release its decoded audio.
    async fn unload(&self, clip: ClipId) -> Result<(), VoiceError>;
}
