//! Local (cpal/rodio) adapters for the [`Recorder`] and [`AudioPlayer`] traits.
//!
//! [`LocalRecorder`] and [`LocalPlayer`] share a single
//! `Arc<AudioThreadHandle>`: the audio OS thread owns both the cpal capture
//! stream and the rodio output stream.
//!
//! # Construction
//!
//! ```no_run
//! # use maya_voice::VoiceError;
//! use maya_voice::audio_local::new_pair;
//! let (recorder, player) = new_pair(std::env::temp_dir().join("maya-recordings"))?;
//! # Ok::<(), VoiceError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::audio_io::{AudioPlayer, ClipId, PermissionStatus, PlaybackCompletion, Recorder};
use crate::audio_thread::AudioThreadHandle;
use crate::capture::CapturedAudio;
use crate::config::{AudioContainer, RecordingConfig};
use crate::error::VoiceError;

// ── LocalRecorder ──────────────────────────────────────────────────

/// Desktop microphone recorder writing 16-bit PCM WAV files.
///
/// Compressed containers need a platform encoder, so only
/// [`AudioContainer::Wav`] configurations are accepted.
pub struct LocalRecorder {
    handle: Arc<AudioThreadHandle>,
    output_dir: PathBuf,
    /// Config of the active recording, `None` when idle.
    active: Mutex<Option<RecordingConfig>>,
}

impl LocalRecorder {
    fn active(&self) -> std::sync::MutexGuard<'_, Option<RecordingConfig>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl Recorder for LocalRecorder {
    /// Desktop systems prompt when the input stream opens; a refusal then
    /// surfaces from [`start`](Recorder::start) as `DeviceUnavailable`.
    async fn request_permission(&self) -> Result<PermissionStatus, VoiceError> {
        Ok(PermissionStatus::Granted)
    }

    async fn start(&self, config: &RecordingConfig) -> Result<(), VoiceError> {
        config.validate()?;
        if config.container != AudioContainer::Wav {
            return Err(VoiceError::DeviceUnavailable(format!(
                "local recorder cannot encode {}",
                config.container.extension()
            )));
        }
        if self.active().is_some() {
            return Err(VoiceError::AlreadyRecording);
        }

        self.handle.start_capture(config.metering_enabled).await?;
        *self.active() = Some(config.clone());
        Ok(())
    }

    async fn stop(&self) -> Result<Option<PathBuf>, VoiceError> {
        let Some(config) = self.active().take() else {
            return Ok(None);
        };

        let Some(captured) = self.handle.stop_capture().await? else {
            return Ok(None);
        };
        if captured.samples.is_empty() {
            tracing::warn!("Recording stopped with no captured samples");
            return Ok(None);
        }

        let path = self
            .output_dir
            .join(format!("recording-{}.{}", Uuid::new_v4(), config.container.extension()));
        let write_path = path.clone();
        tokio::task::spawn_blocking(move || write_wav(&write_path, captured, &config))
            .await
            .map_err(|e| VoiceError::StorageError(e.to_string()))??;

        Ok(Some(path))
    }

    fn input_level(&self) -> Option<f32> {
        self.active()
            .as_ref()
            .filter(|c| c.metering_enabled)
            .map(|_| self.handle.input_level())
    }

    fn abort(&self) {
        self.active().take();
        self.handle.abort_capture();
    }
}

/// Convert `captured` to the configured layout and write it as 16-bit PCM.
fn write_wav(path: &Path, captured: CapturedAudio, config: &RecordingConfig) -> Result<(), VoiceError> {
    let duration_ms = captured.duration_ms();
    let samples = captured.convert(config.sample_rate, config.channels)?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| VoiceError::storage(&e))?;
    }

    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let storage = |e: hound::Error| VoiceError::StorageError(e.to_string());

    let mut writer = hound::WavWriter::create(path, spec).map_err(storage)?;
    for sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(pcm).map_err(storage)?;
    }
    writer.finalize().map_err(storage)?;

    tracing::info!(path = %path.display(), duration_ms, "Recording written");
    Ok(())
}

// ── LocalPlayer ────────────────────────────────────────────────────

/// Desktop speaker output via rodio.
pub struct LocalPlayer {
    handle: Arc<AudioThreadHandle>,
}

#[async_trait]
impl AudioPlayer for LocalPlayer {
    async fn load(&self, path: &Path) -> Result<ClipId, VoiceError> {
        self.handle.load_clip(path.to_path_buf()).await
    }

    async fn play(&self, clip: ClipId) -> Result<PlaybackCompletion, VoiceError> {
        let (notifier, completion) = PlaybackCompletion::channel();
        self.handle.play_clip(clip, notifier).await?;
        Ok(completion)
    }

    async fn stop(&self, clip: ClipId) -> Result<(), VoiceError> {
        self.handle.stop_clip(clip);
        Ok(())
    }

    async fn unload(&self, clip: ClipId) -> Result<(), VoiceError> {
        self.handle.unload_clip(clip);
        Ok(())
    }
}

// ── Constructor ────────────────────────────────────────────────────

/// Spawn one [`AudioThreadHandle`] and return a recorder/player pair that
/// share it. Recordings are written under `output_dir`.
///
/// # Errors
///
/// Returns [`VoiceError`] if the audio thread cannot be spawned.
pub fn new_pair(output_dir: impl Into<PathBuf>) -> Result<(LocalRecorder, LocalPlayer), VoiceError> {
    let handle = Arc::new(AudioThreadHandle::spawn()?);
    let recorder = LocalRecorder {
        handle: Arc::clone(&handle),
        output_dir: output_dir.into(),
        active: Mutex::new(None),
    };
    let player = LocalPlayer { handle };
    Ok((recorder, player))
}
