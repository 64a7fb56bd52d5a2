//! Audio capture module: microphone input via `cpal`.
//!
//! Captures interleaved f32 audio from the default input device while a
//! recording is active and optionally meters the input level. Conversion to
//! the configured channel count and sample rate happens after capture stops.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use rubato::{FftFixedIn, Resampler as _};

use crate::error::VoiceError;

/// Shared input level, stored as `f32` bits.
#[derive(Debug, Clone, Default)]
pub struct InputLevel(Arc<AtomicU32>);

impl InputLevel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, level: f32) {
        self.0.store(level.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Raw audio accumulated during one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    /// Interleaved samples in the device's channel layout.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl CapturedAudio {
    /// Recording length in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / u64::from(self.channels);
        frames * 1000 / u64::from(self.sample_rate)
    }

    /// Convert to `channels` interleaved channels at `sample_rate`.
    pub fn convert(self, sample_rate: u32, channels: u16) -> Result<Vec<f32>, VoiceError> {
        let mono = if self.channels > 1 {
            stereo_to_mono(&self.samples, self.channels)
        } else {
            self.samples
        };

        let mono = if self.sample_rate == sample_rate {
            mono
        } else {
            resample(&mono, self.sample_rate, sample_rate)?
        };

        if channels <= 1 {
            return Ok(mono);
        }
        Ok(mono
            .iter()
            .flat_map(|&s| std::iter::repeat_n(s, usize::from(channels)))
            .collect())
    }
}

/// Microphone capture handle.
///
/// Wraps a `cpal` input stream. The device is acquired in
/// [`start_recording`](Self::start_recording) and released when the stream
/// is dropped in [`stop_recording`](Self::stop_recording) or [`abort`](Self::abort).
pub struct AudioCapture {
    /// The active cpal input stream (None when not recording).
    _stream: Option<Stream>,

    /// Shared buffer of captured samples (device rate, interleaved).
    buffer: Arc<Mutex<Vec<f32>>>,

    /// Whether we are currently recording.
    is_recording: Arc<AtomicBool>,

    /// Level published to the recorder for metering.
    level: InputLevel,

    device_sample_rate: u32,
    device_channels: u16,
}

impl AudioCapture {
    #[must_use]
    pub fn new(level: InputLevel) -> Self {
        Self {
            _stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
            is_recording: Arc::new(AtomicBool::new(false)),
            level,
            device_sample_rate: 0,
            device_channels: 0,
        }
    }

    /// Acquire the default input device and start recording.
    pub fn start_recording(&mut self, metering: bool) -> Result<(), VoiceError> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(VoiceError::AlreadyRecording);
        }

        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
        self.level.set(0.0);

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VoiceError::DeviceUnavailable("no input device found".to_string()))?;

        let config = device
            .default_input_config()
            .map_err(|e| VoiceError::DeviceUnavailable(e.to_string()))?;

        self.device_sample_rate = config.sample_rate().0;
        self.device_channels = config.channels();

        let stream = self.build_input_stream(&device, &config, metering)?;
        stream
            .play()
            .map_err(|e| VoiceError::DeviceUnavailable(e.to_string()))?;

        self._stream = Some(stream);
        self.is_recording.store(true, Ordering::SeqCst);
        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = self.device_sample_rate,
            channels = self.device_channels,
            metering,
            "Microphone recording started"
        );

        Ok(())
    }

    /// Stop recording, release the device and hand back the raw capture.
    ///
    /// Returns `None` when no recording was active.
    pub fn stop_recording(&mut self) -> Result<Option<CapturedAudio>, VoiceError> {
        if !self.is_recording.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }

        // Drop the stream to release the microphone
        self._stream = None;
        self.level.set(0.0);

        let samples = {
            let mut buf = self
                .buffer
                .lock()
                .map_err(|e| VoiceError::DeviceUnavailable(e.to_string()))?;
            std::mem::take(&mut *buf)
        };

        tracing::debug!(
            raw_samples = samples.len(),
            device_rate = self.device_sample_rate,
            "Microphone recording stopped"
        );

        Ok(Some(CapturedAudio {
            samples,
            sample_rate: self.device_sample_rate,
            channels: self.device_channels,
        }))
    }

    /// Release the device and discard anything captured.
    pub fn abort(&mut self) {
        if self.is_recording.swap(false, Ordering::SeqCst) {
            tracing::debug!("Microphone recording aborted");
        }
        self._stream = None;
        self.level.set(0.0);
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    /// Build a cpal input stream that writes samples into the shared buffer.
    fn build_input_stream(
        &self,
        device: &Device,
        config: &cpal::SupportedStreamConfig,
        metering: bool,
    ) -> Result<Stream, VoiceError> {
        let stream_config: StreamConfig = config.clone().into();
        let sample_format = config.sample_format();

        let err_fn = |err: cpal::StreamError| {
            tracing::error!(%err, "Audio input stream error");
        };

        let stream = match sample_format {
            SampleFormat::F32 => {
                let sink = self.sample_sink(metering);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| sink.push(data),
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let sink = self.sample_sink(metering);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let float_data: Vec<f32> =
                            data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                        sink.push(&float_data);
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I32 => {
                let sink = self.sample_sink(metering);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i32], _: &cpal::InputCallbackInfo| {
                        #[allow(clippy::cast_precision_loss)]
                        let float_data: Vec<f32> =
                            data.iter().map(|&s| s as f32 / 2_147_483_648.0).collect();
                        sink.push(&float_data);
                    },
                    err_fn,
                    None,
                )
            }
            _ => {
                return Err(VoiceError::DeviceUnavailable(format!(
                    "Unsupported sample format: {sample_format:?}"
                )));
            }
        };

        stream.map_err(|e| VoiceError::DeviceUnavailable(e.to_string()))
    }

    fn sample_sink(&self, metering: bool) -> SampleSink {
        SampleSink {
            buffer: Arc::clone(&self.buffer),
            is_recording: Arc::clone(&self.is_recording),
            level: metering.then(|| self.level.clone()),
        }
    }
}

/// State moved into the cpal data callback.
struct SampleSink {
    buffer: Arc<Mutex<Vec<f32>>>,
    is_recording: Arc<AtomicBool>,
    level: Option<InputLevel>,
}

impl SampleSink {
    fn push(&self, data: &[f32]) {
        if !self.is_recording.load(Ordering::Relaxed) {
            return;
        }
        if let Some(level) = &self.level {
            level.set(calculate_audio_level(data));
        }
        if let Ok(mut buf) = self.buffer.lock() {
            buf.extend_from_slice(data);
        }
    }
}

/// RMS level of a chunk, scaled into `0.0..=1.0`.
#[allow(clippy::cast_precision_loss)]
pub fn calculate_audio_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    let rms = (sum_sq / samples.len() as f32).sqrt();
    // Speech RMS rarely exceeds ~0.3; scale so normal speech fills the meter.
    (rms * 3.0).min(1.0)
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels);
    #[allow(clippy::cast_precision_loss)]
    let divisor = channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / divisor)
        .collect()
}

/// Resample audio from one sample rate to another using FFT-based resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, VoiceError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_size = 1024;

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        chunk_size,
        2, // sub-chunks for quality
        1, // mono
    )
    .map_err(|e| VoiceError::ResampleError(e.to_string()))?;

    let mut output = Vec::new();

    let mut pos = 0;
    while pos + chunk_size <= samples.len() {
        let chunk = &samples[pos..pos + chunk_size];
        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| VoiceError::ResampleError(e.to_string()))?;
        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
        pos += chunk_size;
    }

    // Pad the tail with zeros and keep only the proportional output
    if pos < samples.len() {
        let remaining = &samples[pos..];
        let mut padded = vec![0.0f32; chunk_size];
        padded[..remaining.len()].copy_from_slice(remaining);

        let result = resampler
            .process(&[&padded], None)
            .map_err(|e| VoiceError::ResampleError(e.to_string()))?;
        if let Some(channel) = result.first() {
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss
            )]
            let output_len = (remaining.len() as f64 * f64::from(to_rate) / f64::from(from_rate))
                .ceil() as usize;
            let take = output_len.min(channel.len());
            output.extend_from_slice(&channel[..take]);
        }
    }

    Ok(output)
}
