//! Audio playback module: clip output via `rodio`.
//!
//! Clips are decoded once on load and kept in memory until unloaded. At most
//! one clip plays at a time; starting another stops the current one first.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::audio_io::{ClipId, PlaybackNotifier, PlaybackOutcome};
use crate::error::VoiceError;

/// A decoded clip held in memory.
struct DecodedClip {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

/// The sink currently producing sound.
struct ActivePlayback {
    clip: ClipId,
    sink: Arc<Sink>,
    /// Set when playback is interrupted so the watcher reports `Stopped`.
    stopped: Arc<AtomicBool>,
}

/// Audio playback engine for synthesized speech.
pub struct AudioPlayback {
    /// rodio output stream (must be kept alive).
    _stream: OutputStream,

    /// Handle used to create sinks.
    stream_handle: OutputStreamHandle,

    clips: HashMap<ClipId, DecodedClip>,
    active: Option<ActivePlayback>,
    next_id: u64,
}

impl AudioPlayback {
    /// Open the default output device.
    pub fn new() -> Result<Self, VoiceError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| VoiceError::PlaybackError(e.to_string()))?;

        tracing::info!("Audio playback initialized on default output device");

        Ok(Self {
            _stream: stream,
            stream_handle,
            clips: HashMap::new(),
            active: None,
            next_id: 1,
        })
    }

    /// Decode the WAV file at `path` into memory.
    pub fn load(&mut self, path: &Path) -> Result<ClipId, VoiceError> {
        let file = File::open(path).map_err(|e| VoiceError::storage(&e))?;
        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| VoiceError::PlaybackError(format!("{}: {e}", path.display())))?;

        let sample_rate = decoder.sample_rate();
        let channels = decoder.channels();
        let samples: Vec<f32> = decoder.convert_samples().collect();

        let clip = ClipId::new(self.next_id);
        self.next_id += 1;

        tracing::debug!(
            clip = clip.get(),
            path = %path.display(),
            samples = samples.len(),
            sample_rate,
            channels,
            "Clip loaded"
        );

        self.clips.insert(
            clip,
            DecodedClip {
                samples,
                sample_rate,
                channels,
            },
        );
        Ok(clip)
    }

    /// Start playing `clip`, stopping whatever is playing.
    ///
    /// `notifier` fires once from a watcher thread when the sink drains or
    /// is stopped.
    pub fn play(&mut self, clip: ClipId, notifier: PlaybackNotifier) -> Result<(), VoiceError> {
        self.stop_active();

        let decoded = self
            .clips
            .get(&clip)
            .ok_or_else(|| VoiceError::PlaybackError(format!("clip {} not loaded", clip.get())))?;

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| VoiceError::PlaybackError(e.to_string()))?;
        sink.append(SamplesBuffer::new(
            decoded.channels,
            decoded.sample_rate,
            decoded.samples.clone(),
        ));

        let sink = Arc::new(sink);
        let stopped = Arc::new(AtomicBool::new(false));
        spawn_completion_watcher(Arc::clone(&sink), Arc::clone(&stopped), notifier);

        self.active = Some(ActivePlayback {
            clip,
            sink,
            stopped,
        });
        tracing::debug!(clip = clip.get(), "Audio playback started");
        Ok(())
    }

    /// Stop `clip` if it is the one playing.
    pub fn stop(&mut self, clip: ClipId) {
        if self.active.as_ref().is_some_and(|a| a.clip == clip) {
            self.stop_active();
        }
    }

    /// Drop the decoded audio for `clip`, stopping it first if needed.
    pub fn unload(&mut self, clip: ClipId) {
        self.stop(clip);
        if self.clips.remove(&clip).is_some() {
            tracing::debug!(clip = clip.get(), "Clip unloaded");
        }
    }

    fn stop_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.stopped.store(true, Ordering::SeqCst);
            active.sink.stop();
            tracing::debug!(clip = active.clip.get(), "Audio playback stopped");
        }
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.stop_active();
    }
}

/// Block a helper thread until `sink` drains or is stopped, then report.
///
/// `Sink` is Send in rodio 0.20+. `sleep_until_end()` returns as soon as
/// `stop()` drops the queued sources.
fn spawn_completion_watcher(sink: Arc<Sink>, stopped: Arc<AtomicBool>, notifier: PlaybackNotifier) {
    std::thread::spawn(move || {
        sink.sleep_until_end();
        let outcome = if stopped.load(Ordering::SeqCst) {
            PlaybackOutcome::Stopped
        } else {
            tracing::debug!("Playback finished naturally");
            PlaybackOutcome::Finished
        };
        notifier.notify(outcome);
    });
}
