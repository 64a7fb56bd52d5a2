//! Recording presets and practice-loop configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::VoiceError;

/// Accuracy an attempt must strictly exceed before the learner may move on.
pub const DEFAULT_PASS_THRESHOLD: u8 = 70;

/// Sub-directory of the OS temp dir that holds synthesized clips.
pub const SPEECH_CACHE_DIR: &str = "maya-tts";

/// Container a recording is encoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioContainer {
    /// MPEG-4 with AAC, as produced by the phone recorders.
    M4a,
    /// WebM/Opus, as produced by browser recorders.
    Webm,
    /// 16-bit PCM WAV.
    Wav,
}

impl AudioContainer {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::M4a => "m4a",
            Self::Webm => "webm",
            Self::Wav => "wav",
        }
    }

    /// MIME type sent with the transcription upload.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::M4a => "audio/m4a",
            Self::Webm => "audio/webm",
            Self::Wav => "audio/wav",
        }
    }
}

/// Platform a recording preset targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    Android,
    Ios,
    Web,
    Desktop,
}

/// Parameters for one recording session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    /// Target bit rate in bits per second.
    pub bit_rate: u32,
    /// Output container.
    pub container: AudioContainer,
    /// Whether input levels are sampled while recording.
    pub metering_enabled: bool,
}

impl RecordingConfig {
    const SPEECH_SAMPLE_RATE: u32 = 44_100;
    const COMPRESSED_BIT_RATE: u32 = 128_000;

    /// High-quality mono speech preset for `platform`.
    #[must_use]
    pub const fn for_platform(platform: TargetPlatform) -> Self {
        match platform {
            TargetPlatform::Android | TargetPlatform::Ios => Self {
                sample_rate: Self::SPEECH_SAMPLE_RATE,
                channels: 1,
                bit_rate: Self::COMPRESSED_BIT_RATE,
                container: AudioContainer::M4a,
                metering_enabled: true,
            },
            TargetPlatform::Web => Self {
                sample_rate: Self::SPEECH_SAMPLE_RATE,
                channels: 1,
                bit_rate: Self::COMPRESSED_BIT_RATE,
                container: AudioContainer::Webm,
                metering_enabled: true,
            },
            TargetPlatform::Desktop => Self {
                sample_rate: Self::SPEECH_SAMPLE_RATE,
                channels: 1,
                bit_rate: Self::SPEECH_SAMPLE_RATE * 16,
                container: AudioContainer::Wav,
                metering_enabled: true,
            },
        }
    }

    #[must_use]
    pub const fn with_metering(mut self, enabled: bool) -> Self {
        self.metering_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.container.mime_type()
    }

    /// Reject settings no recorder can honour.
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.sample_rate == 0 {
            return Err(VoiceError::DeviceUnavailable(
                "sample rate must be non-zero".to_string(),
            ));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(VoiceError::DeviceUnavailable(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        Ok(())
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self::for_platform(TargetPlatform::Desktop)
    }
}

/// Practice controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeConfig {
    /// Accuracy an attempt must strictly exceed to unlock advancing.
    pub pass_threshold: u8,
    /// Preset used for every attempt.
    pub recording: RecordingConfig,
}

impl PracticeConfig {
    #[must_use]
    pub fn for_platform(platform: TargetPlatform) -> Self {
        Self {
            recording: RecordingConfig::for_platform(platform),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_pass_threshold(mut self, threshold: u8) -> Self {
        self.pass_threshold = threshold;
        self
    }
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            recording: RecordingConfig::default(),
        }
    }
}

/// Where the synthesized-speech cache writes its temporary clips.
///
/// A cache deletes clip files by name on release and on drop, so each cache
/// needs a directory of its own. [`Default`] hands out a fresh
/// `<temp>/maya-tts/<uuid>` directory every time it is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechCacheConfig {
    pub temp_dir: PathBuf,
}

impl SpeechCacheConfig {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }
}

impl Default for SpeechCacheConfig {
    fn default() -> Self {
        Self::new(
            std::env::temp_dir()
                .join(SPEECH_CACHE_DIR)
                .join(uuid::Uuid::new_v4().to_string()),
        )
    }
}
