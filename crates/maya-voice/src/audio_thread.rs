//! Dedicated audio I/O thread: isolates `!Send` audio resources from the async runtime.
//!
//! `cpal::Stream` (capture) and `rodio::OutputStream` (playback) are `!Send` on
//! some platforms. Rather than using `unsafe impl Send/Sync`, both are confined
//! to a single OS thread and driven through an [`AudioCommand`] channel.
//!
//! Replies travel back on `tokio` oneshot channels so async callers await them
//! instead of blocking a runtime worker.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use tokio::sync::oneshot;

use crate::audio_io::{ClipId, PlaybackNotifier};
use crate::capture::{AudioCapture, CapturedAudio, InputLevel};
use crate::error::VoiceError;
use crate::playback::AudioPlayback;

// ── Commands ───────────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<Result<T, VoiceError>>;

/// A command sent to the audio thread.
enum AudioCommand {
    /// Acquire the microphone and begin recording.
    StartCapture { metering: bool, reply: Reply<()> },

    /// Stop recording and return the raw capture.
    StopCapture { reply: Reply<Option<CapturedAudio>> },

    /// Release the microphone and discard the capture (fire-and-forget).
    AbortCapture,

    /// Decode a clip into memory.
    LoadClip { path: PathBuf, reply: Reply<ClipId> },

    /// Start a loaded clip.
    PlayClip {
        clip: ClipId,
        notifier: PlaybackNotifier,
        reply: Reply<()>,
    },

    /// Stop a clip if it is playing (fire-and-forget).
    StopClip { clip: ClipId },

    /// Forget a clip (fire-and-forget).
    UnloadClip { clip: ClipId },

    /// Shut down the audio thread, releasing all resources.
    Shutdown,
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `Send + Sync` handle to the dedicated audio I/O thread.
///
/// The output device is opened on first use, and the microphone is acquired
/// per recording, so a machine without a microphone can still play clips.
pub struct AudioThreadHandle {
    cmd_tx: mpsc::Sender<AudioCommand>,
    level: InputLevel,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioThreadHandle {
    /// Spawn the audio thread.
    pub fn spawn() -> Result<Self, VoiceError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let level = InputLevel::new();
        let thread_level = level.clone();

        let thread = thread::Builder::new()
            .name("maya-audio".into())
            .spawn(move || Self::run(thread_level, &cmd_rx))
            .map_err(|e| {
                VoiceError::DeviceUnavailable(format!("failed to spawn audio thread: {e}"))
            })?;

        Ok(Self {
            cmd_tx,
            level,
            thread: Some(thread),
        })
    }

    // ── Capture ────────────────────────────────────────────────────

    pub async fn start_capture(&self, metering: bool) -> Result<(), VoiceError> {
        self.send_and_recv(|reply| AudioCommand::StartCapture { metering, reply })
            .await
    }

    pub async fn stop_capture(&self) -> Result<Option<CapturedAudio>, VoiceError> {
        self.send_and_recv(|reply| AudioCommand::StopCapture { reply })
            .await
    }

    pub fn abort_capture(&self) {
        let _ = self.cmd_tx.send(AudioCommand::AbortCapture);
    }

    /// Latest metered input level (0.0 when idle or unmetered).
    pub fn input_level(&self) -> f32 {
        self.level.get()
    }

    // ── Playback ───────────────────────────────────────────────────

    pub async fn load_clip(&self, path: PathBuf) -> Result<ClipId, VoiceError> {
        self.send_and_recv(|reply| AudioCommand::LoadClip { path, reply })
            .await
    }

    pub async fn play_clip(
        &self,
        clip: ClipId,
        notifier: PlaybackNotifier,
    ) -> Result<(), VoiceError> {
        self.send_and_recv(|reply| AudioCommand::PlayClip {
            clip,
            notifier,
            reply,
        })
        .await
    }

    pub fn stop_clip(&self, clip: ClipId) {
        let _ = self.cmd_tx.send(AudioCommand::StopClip { clip });
    }

    pub fn unload_clip(&self, clip: ClipId) {
        let _ = self.cmd_tx.send(AudioCommand::UnloadClip { clip });
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Send a command and await its reply. Channel failures map to
    /// [`VoiceError::AudioThreadDied`].
    async fn send_and_recv<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> AudioCommand,
    ) -> Result<T, VoiceError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .map_err(|_| VoiceError::AudioThreadDied)?;
        rx.await.map_err(|_| VoiceError::AudioThreadDied)?
    }

    // ── Audio thread event loop ────────────────────────────────────

    /// The body of the audio thread. Owns `AudioCapture` and `AudioPlayback`
    /// for their entire lifetime.
    fn run(level: InputLevel, cmd_rx: &mpsc::Receiver<AudioCommand>) {
        let mut capture = AudioCapture::new(level);
        let mut playback: Option<AudioPlayback> = None;

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::StartCapture { metering, reply } => {
                    let _ = reply.send(capture.start_recording(metering));
                }

                AudioCommand::StopCapture { reply } => {
                    let _ = reply.send(capture.stop_recording());
                }

                AudioCommand::AbortCapture => capture.abort(),

                AudioCommand::LoadClip { path, reply } => {
                    let result = output(&mut playback).and_then(|p| p.load(&path));
                    let _ = reply.send(result);
                }

                AudioCommand::PlayClip {
                    clip,
                    notifier,
                    reply,
                } => {
                    let result = output(&mut playback).and_then(|p| p.play(clip, notifier));
                    let _ = reply.send(result);
                }

                AudioCommand::StopClip { clip } => {
                    if let Some(p) = playback.as_mut() {
                        p.stop(clip);
                    }
                }

                AudioCommand::UnloadClip { clip } => {
                    if let Some(p) = playback.as_mut() {
                        p.unload(clip);
                    }
                }

                AudioCommand::Shutdown => break,
            }
        }

        // Resources are dropped here, on the audio thread.
        capture.abort();
        tracing::debug!("Audio thread shutting down");
    }
}

/// Open the output device on first use.
fn output(slot: &mut Option<AudioPlayback>) -> Result<&mut AudioPlayback, VoiceError> {
    if slot.is_none() {
        *slot = Some(AudioPlayback::new()?);
    }
    slot.as_mut().ok_or(VoiceError::AudioThreadDied)
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        // Best-effort shutdown; the thread may already be dead.
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
