//! Synthesized-speech cache.
//!
//! Maps text to a playable clip so a phrase is synthesized once and replayed
//! many times. Concurrent requests for the same text share one in-flight
//! fetch. A clip's temp file and player resources are released exactly once,
//! when its playback finishes naturally or when it is evicted; a clip whose
//! playback was stopped early stays cached for replay.
//!
//! The cache is an owned handle (cheap to clone) injected into whoever needs
//! it; there is no process-wide instance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use maya_core::{CacheKey, SpeechSynthesisPort};

use crate::audio_io::{AudioPlayer, ClipId, PlaybackCompletion, PlaybackOutcome};
use crate::config::SpeechCacheConfig;
use crate::error::VoiceError;

/// Attempts made when an entry is released between lookup and playback.
const MAX_PLAY_ATTEMPTS: usize = 2;

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<CacheEntry>, VoiceError>>>;

/// A synthesized clip loaded into the player.
#[derive(Debug)]
pub struct CacheEntry {
    key: CacheKey,
    clip: ClipId,
    temp_path: PathBuf,
    released: AtomicBool,
}

impl CacheEntry {
    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    #[must_use]
    pub const fn clip(&self) -> ClipId {
        self.clip
    }

    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

enum Slot {
    Fetching(SharedFetch),
    Ready(Arc<CacheEntry>),
}

struct CurrentPlayback {
    id: u64,
    entry: Arc<CacheEntry>,
}

struct Inner {
    synthesizer: Arc<dyn SpeechSynthesisPort>,
    player: Arc<dyn AudioPlayer>,
    temp_dir: PathBuf,
    slots: Mutex<HashMap<CacheKey, Slot>>,
    /// Serializes playback start, stop and release.
    playback: tokio::sync::Mutex<Option<CurrentPlayback>>,
    next_playback: AtomicU64,
}

/// Text → playable clip cache with in-flight request coalescing.
#[derive(Clone)]
pub struct SpeechSynthesisCache {
    inner: Arc<Inner>,
}

enum PlayStart {
    Started,
    EntryReleased,
}

impl SpeechSynthesisCache {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesisPort>,
        player: Arc<dyn AudioPlayer>,
        config: SpeechCacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                synthesizer,
                player,
                temp_dir: config.temp_dir,
                slots: Mutex::new(HashMap::new()),
                playback: tokio::sync::Mutex::new(None),
                next_playback: AtomicU64::new(1),
            }),
        }
    }

    /// Play `text`, synthesizing it first unless a clip is already cached.
    ///
    /// Any playback already in progress is stopped before the new one
    /// starts. Returns once playback has started.
    pub async fn play_or_fetch(&self, text: &str) -> Result<(), VoiceError> {
        let key = CacheKey::for_text(text);

        // The previous clip goes silent before the next one is fetched or decoded.
        {
            let mut playback = self.inner.playback.lock().await;
            self.inner.stop_locked(&mut playback).await;
        }

        for _ in 0..MAX_PLAY_ATTEMPTS {
            let entry = self.resolve(&key, text).await?;
            match self.start_playback(entry).await? {
                PlayStart::Started => return Ok(()),
                PlayStart::EntryReleased => {
                    tracing::debug!(%key, "Clip released before playback, refetching");
                }
            }
        }

        Err(VoiceError::PlaybackError(
            "clip was released before playback could start".to_string(),
        ))
    }

    /// Stop whatever is playing. The clip stays cached.
    pub async fn stop_current(&self) -> Result<(), VoiceError> {
        let mut playback = self.inner.playback.lock().await;
        if let Some(current) = playback.take() {
            self.inner.player.stop(current.entry.clip).await?;
            tracing::debug!(key = %current.entry.key, "Playback stopped");
        }
        Ok(())
    }

    /// Whether a ready clip exists for `text`.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        matches!(
            self.inner.lock_slots().get(&CacheKey::for_text(text)),
            Some(Slot::Ready(_))
        )
    }

    /// Number of ready clips.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock_slots()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a clip is currently playing.
    pub async fn is_playing(&self) -> bool {
        self.inner.playback.lock().await.is_some()
    }

    /// Release the clip for `text`, stopping it first if it is playing.
    pub async fn evict(&self, text: &str) {
        let key = CacheKey::for_text(text);
        let mut playback = self.inner.playback.lock().await;

        let entry = match self.inner.lock_slots().get(&key) {
            Some(Slot::Ready(entry)) => Arc::clone(entry),
            _ => return,
        };
        if playback
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(&current.entry, &entry))
        {
            *playback = None;
            if let Err(e) = self.inner.player.stop(entry.clip).await {
                tracing::warn!(%key, error = %e, "Failed to stop clip before eviction");
            }
        }
        self.inner.release(&entry).await;
    }

    /// Release every ready clip. In-flight fetches are left to complete.
    pub async fn clear(&self) {
        let mut playback = self.inner.playback.lock().await;
        self.inner.stop_locked(&mut playback).await;

        let entries: Vec<Arc<CacheEntry>> = self
            .inner
            .lock_slots()
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready(entry) => Some(Arc::clone(entry)),
                Slot::Fetching(_) => None,
            })
            .collect();

        for entry in entries {
            self.inner.release(&entry).await;
        }
        tracing::debug!("Speech cache cleared");
    }

    /// Look up `key`, joining or starting a fetch on a miss.
    async fn resolve(&self, key: &CacheKey, text: &str) -> Result<Arc<CacheEntry>, VoiceError> {
        let fetch = {
            let mut slots = self.inner.lock_slots();
            match slots.get(key) {
                Some(Slot::Ready(entry)) => {
                    tracing::debug!(%key, "Speech cache hit");
                    return Ok(Arc::clone(entry));
                }
                Some(Slot::Fetching(fetch)) => {
                    tracing::debug!(%key, "Joining in-flight synthesis");
                    fetch.clone()
                }
                None => {
                    let fetch = self.fetch(key.clone(), text.to_string());
                    slots.insert(key.clone(), Slot::Fetching(fetch.clone()));
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Start the fetch for `key` on its own task and return a shareable
    /// handle to its result. The task runs to completion even when every
    /// caller stops waiting, then replaces its slot with the ready entry or
    /// clears it on failure so the next call retries. The handle only holds
    /// a weak reference to the cache.
    fn fetch(&self, key: CacheKey, text: String) -> SharedFetch {
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let result = inner.synthesize_to_clip(&task_key, &text).await;
            inner.finish_fetch(task_key, &result);
            result
        });

        let weak = Arc::downgrade(&self.inner);
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(%key, error = %e, "Speech synthesis task died");
                    if let Some(inner) = weak.upgrade() {
                        inner.lock_slots().remove(&key);
                    }
                    Err(VoiceError::SynthesisFailed(e.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn start_playback(&self, entry: Arc<CacheEntry>) -> Result<PlayStart, VoiceError> {
        let mut playback = self.inner.playback.lock().await;
        if entry.is_released() {
            return Ok(PlayStart::EntryReleased);
        }

        // Another caller may have started a clip while this one was fetching.
        self.inner.stop_locked(&mut playback).await;

        let completion = self
            .inner
            .player
            .play(entry.clip)
            .await
            .inspect_err(|e| tracing::warn!(key = %entry.key, error = %e, "Playback failed"))?;

        let id = self.inner.next_playback.fetch_add(1, Ordering::SeqCst);
        *playback = Some(CurrentPlayback {
            id,
            entry: Arc::clone(&entry),
        });
        drop(playback);

        tracing::debug!(key = %entry.key, playback = id, "Playback started");
        self.watch_completion(id, entry, completion);
        Ok(PlayStart::Started)
    }

    fn watch_completion(&self, id: u64, entry: Arc<CacheEntry>, completion: PlaybackCompletion) {
        let cache = self.clone();
        tokio::spawn(async move {
            if completion.wait().await == PlaybackOutcome::Finished {
                cache.release_after_playback(id, entry).await;
            }
        });
    }

    async fn release_after_playback(&self, id: u64, entry: Arc<CacheEntry>) {
        let mut playback = self.inner.playback.lock().await;
        match playback.as_ref() {
            Some(current) if current.id == id => *playback = None,
            // A newer playback of the same clip owns it now.
            Some(current) if Arc::ptr_eq(&current.entry, &entry) => return,
            _ => {}
        }
        tracing::debug!(key = %entry.key, playback = id, "Playback finished, releasing clip");
        self.inner.release(&entry).await;
    }
}

impl Inner {
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_fetch(&self, key: CacheKey, result: &Result<Arc<CacheEntry>, VoiceError>) {
        let mut slots = self.lock_slots();
        match result {
            Ok(entry) => {
                slots.insert(key, Slot::Ready(Arc::clone(entry)));
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "Speech synthesis fetch failed");
                slots.remove(&key);
            }
        }
    }

    async fn synthesize_to_clip(
        &self,
        key: &CacheKey,
        text: &str,
    ) -> Result<Arc<CacheEntry>, VoiceError> {
        tracing::info!(%key, chars = text.chars().count(), "Synthesizing speech");
        let bytes = self
            .synthesizer
            .synthesize(text)
            .await
            .map_err(VoiceError::from_synthesis)?;

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| VoiceError::storage(&e))?;
        let temp_path = self.temp_dir.join(key.file_name());
        tokio::fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| VoiceError::storage(&e))?;

        let clip = match self.player.load(&temp_path).await {
            Ok(clip) => clip,
            Err(e) => {
                remove_temp_file(&temp_path).await;
                return Err(e);
            }
        };

        tracing::debug!(%key, bytes = bytes.len(), clip = clip.get(), "Clip cached");
        Ok(Arc::new(CacheEntry {
            key: key.clone(),
            clip,
            temp_path,
            released: AtomicBool::new(false),
        }))
    }

    /// Stop the current playback, if any. Failures are logged.
    async fn stop_locked(&self, playback: &mut Option<CurrentPlayback>) {
        if let Some(previous) = playback.take() {
            if let Err(e) = self.player.stop(previous.entry.clip).await {
                tracing::warn!(key = %previous.entry.key, error = %e, "Failed to stop clip");
            }
        }
    }

    /// Release `entry` exactly once: drop it from the map, unload the clip
    /// and delete its temp file.
    async fn release(&self, entry: &Arc<CacheEntry>) {
        if entry.released.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut slots = self.lock_slots();
            if matches!(slots.get(&entry.key), Some(Slot::Ready(e)) if Arc::ptr_eq(e, entry)) {
                slots.remove(&entry.key);
            }
        }

        if let Err(e) = self.player.unload(entry.clip).await {
            tracing::warn!(key = %entry.key, error = %e, "Failed to unload clip");
        }
        remove_temp_file(&entry.temp_path).await;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slots = self
            .slots
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for slot in slots.values() {
            if let Slot::Ready(entry) = slot {
                if entry.released.swap(true, Ordering::SeqCst) {
                    continue;
                }
                if let Err(e) = std::fs::remove_file(&entry.temp_path) {
                    let err = VoiceError::storage(&e);
                    tracing::warn!(
                        path = %entry.temp_path.display(),
                        error = %err,
                        "Failed to delete cached clip on drop"
                    );
                }
            }
        }
    }
}

async fn remove_temp_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        let err = VoiceError::storage(&e);
        tracing::warn!(path = %path.display(), error = %err, "Failed to delete cached clip");
    }
}
