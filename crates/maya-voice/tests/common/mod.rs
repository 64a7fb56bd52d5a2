//! Shared fakes for the practice-loop integration tests.
//!
//! No audio hardware or network is touched: the recorder writes a canned
//! payload, the player tracks clips in memory, and the collaborators answer
//! from queues.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use maya_core::{PortError, RecordedAudio, SpeechSynthesisPort, TranscriptionPort};
use maya_voice::{
    AudioPlayer, ClipId, PermissionStatus, PlaybackCompletion, PlaybackNotifier, PlaybackOutcome,
    Recorder, RecordingConfig, VoiceError,
};

// ── Synthesis ──────────────────────────────────────────────────────

/// Synthesizer returning a fixed payload after an optional delay.
pub struct FakeSynth {
    delay: Duration,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl FakeSynth {
    pub fn new() -> Arc<Self> {
        Self::with(Duration::ZERO, 0)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::with(delay, 0)
    }

    /// Fail the first `failures` calls with `SynthesisFailed`.
    pub fn with(delay: Duration, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            delay,
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesisPort for FakeSynth {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PortError::SynthesisFailed("HTTP 503".into()));
        }
        Ok(format!("RIFF-{text}").into_bytes())
    }
}

// ── Playback ───────────────────────────────────────────────────────

/// One call made to [`FakePlayer`], in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    Load(PathBuf),
    Play(ClipId),
    Stop(ClipId),
    Unload(ClipId),
}

#[derive(Default)]
struct PlayerLog {
    calls: Vec<PlayerCall>,
    loaded: HashMap<ClipId, PathBuf>,
    plays: Vec<ClipId>,
    stops: Vec<ClipId>,
    unloads: Vec<ClipId>,
    notifiers: HashMap<ClipId, PlaybackNotifier>,
}

/// Player that never makes a sound; tests decide when a clip finishes.
#[derive(Default)]
pub struct FakePlayer {
    next_id: AtomicU64,
    log: Mutex<PlayerLog>,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Report natural completion for `clip`.
    pub fn finish(&self, clip: ClipId) {
        if let Some(notifier) = self.log.lock().unwrap().notifiers.remove(&clip) {
            notifier.notify(PlaybackOutcome::Finished);
        }
    }

    pub fn loaded_path(&self, clip: ClipId) -> Option<PathBuf> {
        self.log.lock().unwrap().loaded.get(&clip).cloned()
    }

    pub fn loads(&self) -> usize {
        self.log.lock().unwrap().loaded.len()
    }

    pub fn plays(&self) -> Vec<ClipId> {
        self.log.lock().unwrap().plays.clone()
    }

    pub fn stops(&self) -> Vec<ClipId> {
        self.log.lock().unwrap().stops.clone()
    }

    pub fn unloads(&self) -> Vec<ClipId> {
        self.log.lock().unwrap().unloads.clone()
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<PlayerCall> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn last_played(&self) -> ClipId {
        *self.plays().last().expect("nothing played")
    }
}

#[async_trait]
impl AudioPlayer for FakePlayer {
    async fn load(&self, path: &Path) -> Result<ClipId, VoiceError> {
        if !path.exists() {
            return Err(VoiceError::PlaybackError(format!("{} missing", path.display())));
        }
        let clip = ClipId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut log = self.log.lock().unwrap();
        log.calls.push(PlayerCall::Load(path.to_path_buf()));
        log.loaded.insert(clip, path.to_path_buf());
        Ok(clip)
    }

    async fn play(&self, clip: ClipId) -> Result<PlaybackCompletion, VoiceError> {
        let (notifier, completion) = PlaybackCompletion::channel();
        let mut log = self.log.lock().unwrap();
        log.calls.push(PlayerCall::Play(clip));
        log.plays.push(clip);
        log.notifiers.insert(clip, notifier);
        Ok(completion)
    }

    async fn stop(&self, clip: ClipId) -> Result<(), VoiceError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(PlayerCall::Stop(clip));
        log.stops.push(clip);
        if let Some(notifier) = log.notifiers.remove(&clip) {
            notifier.notify(PlaybackOutcome::Stopped);
        }
        Ok(())
    }

    async fn unload(&self, clip: ClipId) -> Result<(), VoiceError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(PlayerCall::Unload(clip));
        log.unloads.push(clip);
        Ok(())
    }
}

// ── Recording ──────────────────────────────────────────────────────

/// Recorder that writes `payload` to a temp dir when stopped.
pub struct FakeRecorder {
    dir: tempfile::TempDir,
    permission: PermissionStatus,
    payload: &'static [u8],
    starts: AtomicUsize,
    current: Mutex<Option<PathBuf>>,
}

impl FakeRecorder {
    pub fn new(permission: PermissionStatus, payload: &'static [u8]) -> Arc<Self> {
        Arc::new(Self {
            dir: tempfile::tempdir().unwrap(),
            permission,
            payload,
            starts: AtomicUsize::new(0),
            current: Mutex::new(None),
        })
    }

    pub fn granted() -> Arc<Self> {
        Self::new(PermissionStatus::Granted, b"RIFF-take")
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Files currently left in the recording directory.
    pub fn leftover_files(&self) -> usize {
        std::fs::read_dir(self.dir.path()).unwrap().count()
    }
}

#[async_trait]
impl Recorder for FakeRecorder {
    async fn request_permission(&self) -> Result<PermissionStatus, VoiceError> {
        Ok(self.permission)
    }

    async fn start(&self, config: &RecordingConfig) -> Result<(), VoiceError> {
        let n = self.starts.fetch_add(1, Ordering::SeqCst);
        let path = self
            .dir
            .path()
            .join(format!("take-{n}.{}", config.container.extension()));
        *self.current.lock().unwrap() = Some(path);
        Ok(())
    }

    async fn stop(&self) -> Result<Option<PathBuf>, VoiceError> {
        let Some(path) = self.current.lock().unwrap().take() else {
            return Ok(None);
        };
        std::fs::write(&path, self.payload).unwrap();
        Ok(Some(path))
    }

    fn input_level(&self) -> Option<f32> {
        Some(0.25)
    }

    fn abort(&self) {
        self.current.lock().unwrap().take();
    }
}

// ── Transcription ──────────────────────────────────────────────────

/// Transcriber answering from a queue of canned responses.
pub struct ScriptedTranscriber {
    responses: Mutex<VecDeque<Result<String, PortError>>>,
    uploads: Mutex<Vec<RecordedAudio>>,
}

impl ScriptedTranscriber {
    pub fn new(responses: impl IntoIterator<Item = Result<String, PortError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub fn saying(transcripts: &[&str]) -> Arc<Self> {
        Self::new(transcripts.iter().map(|t| Ok((*t).to_string())))
    }

    pub fn uploads(&self) -> Vec<RecordedAudio> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptionPort for ScriptedTranscriber {
    async fn transcribe(&self, audio: &RecordedAudio) -> Result<String, PortError> {
        assert!(audio.path.exists(), "recording deleted before upload");
        self.uploads.lock().unwrap().push(audio.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::TranscriptionFailed("no script left".into())))
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Poll `condition` until it holds, yielding to spawned tasks in between.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within 1s");
}
