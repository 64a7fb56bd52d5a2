//! Integration tests for `SpeechSynthesisCache`.
//!
//! # What is tested
//!
//! - Concurrent requests for the same text share one synthesis call
//! - Cached clips replay without re-synthesizing
//! - Natural completion releases the clip exactly once
//! - Stopped playback keeps the clip cached
//! - The previous clip is stopped before the next one is loaded
//! - Failed fetches are not cached and do not poison later calls
//! - A fetch whose callers gave up still completes without keeping the
//!   cache alive

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakePlayer, FakeSynth, PlayerCall, eventually};
use maya_core::CacheKey;
use maya_voice::{SpeechCacheConfig, SpeechSynthesisCache, VoiceError};
use tempfile::TempDir;

fn cache_with(synth: &Arc<FakeSynth>, player: &Arc<FakePlayer>) -> (SpeechSynthesisCache, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let cache = SpeechSynthesisCache::new(
        Arc::clone(synth) as _,
        Arc::clone(player) as _,
        SpeechCacheConfig::new(dir.path()),
    );
    (cache, dir)
}

#[tokio::test]
async fn concurrent_requests_share_one_fetch() {
    let synth = FakeSynth::slow(Duration::from_millis(30));
    let player = FakePlayer::new();
    let (cache, _dir) = cache_with(&synth, &player);

    let (a, b) = tokio::join!(cache.play_or_fetch("Hello"), cache.play_or_fetch("Hello"));

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(synth.calls(), 1);
    assert_eq!(player.loads(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn different_texts_fetch_separately() {
    let synth = FakeSynth::slow(Duration::from_millis(10));
    let player = FakePlayer::new();
    let (cache, _dir) = cache_with(&synth, &player);

    let (a, b) = tokio::join!(cache.play_or_fetch("Hello"), cache.play_or_fetch("Goodbye"));

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(synth.calls(), 2);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn clip_is_written_under_its_cache_key() {
    let synth = FakeSynth::new();
    let player = FakePlayer::new();
    let (cache, dir) = cache_with(&synth, &player);

    cache.play_or_fetch("नमस्कार").await.unwrap();

    let path = player.loaded_path(player.last_played()).unwrap();
    assert_eq!(path.parent().unwrap(), dir.path());
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        CacheKey::for_text("नमस्कार").file_name()
    );
    assert_eq!(std::fs::read(&path).unwrap(), "RIFF-नमस्कार".as_bytes());
}

#[tokio::test]
async fn stopped_clip_replays_from_cache() {
    let synth = FakeSynth::new();
    let player = FakePlayer::new();
    let (cache, _dir) = cache_with(&synth, &player);

    cache.play_or_fetch("Hello").await.unwrap();
    let clip = player.last_played();
    cache.stop_current().await.unwrap();

    // Give the completion watcher a chance to run.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(cache.contains("Hello"));
    assert!(player.unloads().is_empty());

    cache.play_or_fetch("Hello").await.unwrap();
    assert_eq!(synth.calls(), 1);
    assert_eq!(player.plays(), vec![clip, clip]);
}

#[tokio::test]
async fn natural_finish_releases_clip_once() {
    let synth = FakeSynth::new();
    let player = FakePlayer::new();
    let (cache, _dir) = cache_with(&synth, &player);

    cache.play_or_fetch("Hello").await.unwrap();
    let clip = player.last_played();
    let path = player.loaded_path(clip).unwrap();
    assert!(path.exists());

    player.finish(clip);
    eventually(|| !player.unloads().is_empty()).await;

    assert_eq!(player.unloads(), vec![clip]);
    assert!(!path.exists());
    assert!(!cache.contains("Hello"));
    assert!(!cache.is_playing().await);

    // A second finish report has nothing left to release.
    player.finish(clip);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(player.unloads(), vec![clip]);

    // The next request synthesizes again.
    cache.play_or_fetch("Hello").await.unwrap();
    assert_eq!(synth.calls(), 2);
}

#[tokio::test]
async fn new_playback_stops_previous_clip() {
    let synth = FakeSynth::new();
    let player = FakePlayer::new();
    let (cache, _dir) = cache_with(&synth, &player);

    cache.play_or_fetch("first").await.unwrap();
    let first = player.last_played();
    cache.play_or_fetch("second").await.unwrap();
    let second = player.last_played();

    assert_ne!(first, second);
    assert_eq!(player.stops(), vec![first]);
    // Interrupted, not finished: still cached.
    assert!(cache.contains("first"));
    assert!(cache.contains("second"));
}

#[tokio::test]
async fn previous_clip_stops_before_next_loads() {
    let synth = FakeSynth::new();
    let player = FakePlayer::new();
    let (cache, dir) = cache_with(&synth, &player);

    cache.play_or_fetch("first").await.unwrap();
    let first = player.last_played();
    assert!(!cache.contains("second"));
    cache.play_or_fetch("second").await.unwrap();

    let second_path = dir.path().join(CacheKey::for_text("second").file_name());
    let calls = player.calls();
    let stop_first = calls
        .iter()
        .position(|c| *c == PlayerCall::Stop(first))
        .expect("first clip never stopped");
    let load_second = calls
        .iter()
        .position(|c| *c == PlayerCall::Load(second_path.clone()))
        .expect("second clip never loaded");
    assert!(stop_first < load_second, "calls out of order: {calls:?}");
}

#[tokio::test]
async fn failed_fetch_is_not_cached() {
    let synth = FakeSynth::with(Duration::ZERO, 1);
    let player = FakePlayer::new();
    let (cache, _dir) = cache_with(&synth, &player);

    let err = cache.play_or_fetch("Hello").await.unwrap_err();
    assert_eq!(err, VoiceError::SynthesisFailed("HTTP 503".into()));
    assert!(cache.is_empty());

    cache.play_or_fetch("Hello").await.unwrap();
    assert_eq!(synth.calls(), 2);
    assert!(cache.contains("Hello"));
}

#[tokio::test]
async fn coalesced_failure_reaches_every_waiter() {
    let synth = FakeSynth::with(Duration::from_millis(20), 1);
    let player = FakePlayer::new();
    let (cache, _dir) = cache_with(&synth, &player);

    let (a, b) = tokio::join!(cache.play_or_fetch("Hello"), cache.play_or_fetch("Hello"));

    assert!(matches!(a, Err(VoiceError::SynthesisFailed(_))));
    assert!(matches!(b, Err(VoiceError::SynthesisFailed(_))));
    assert_eq!(synth.calls(), 1);
    assert_eq!(player.loads(), 0);
}

#[tokio::test]
async fn evict_stops_and_deletes() {
    let synth = FakeSynth::new();
    let player = FakePlayer::new();
    let (cache, _dir) = cache_with(&synth, &player);

    cache.play_or_fetch("Hello").await.unwrap();
    let clip = player.last_played();
    let path = player.loaded_path(clip).unwrap();

    cache.evict("Hello").await;

    assert_eq!(player.stops(), vec![clip]);
    assert_eq!(player.unloads(), vec![clip]);
    assert!(!path.exists());
    assert!(cache.is_empty());
    assert!(!cache.is_playing().await);
}

#[tokio::test]
async fn clear_releases_everything() {
    let synth = FakeSynth::new();
    let player = FakePlayer::new();
    let (cache, dir) = cache_with(&synth, &player);

    cache.play_or_fetch("one").await.unwrap();
    cache.play_or_fetch("two").await.unwrap();
    cache.clear().await;

    assert!(cache.is_empty());
    assert_eq!(player.unloads().len(), 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn dropping_cache_removes_temp_files() {
    let synth = FakeSynth::new();
    let player = FakePlayer::new();
    let (cache, dir) = cache_with(&synth, &player);

    cache.play_or_fetch("Hello").await.unwrap();
    cache.stop_current().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(cache);

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn abandoned_fetch_still_fills_the_cache() {
    let synth = FakeSynth::slow(Duration::from_millis(50));
    let player = FakePlayer::new();
    let (cache, _dir) = cache_with(&synth, &player);

    let waited =
        tokio::time::timeout(Duration::from_millis(5), cache.play_or_fetch("Hello")).await;
    assert!(waited.is_err());

    eventually(|| cache.contains("Hello")).await;
    cache.play_or_fetch("Hello").await.unwrap();
    assert_eq!(synth.calls(), 1);
}

#[tokio::test]
async fn dropping_cache_after_abandoned_fetch_frees_it() {
    let synth = FakeSynth::slow(Duration::from_millis(50));
    let player = FakePlayer::new();
    let (cache, dir) = cache_with(&synth, &player);

    let waited =
        tokio::time::timeout(Duration::from_millis(5), cache.play_or_fetch("Hello")).await;
    assert!(waited.is_err());
    drop(cache);

    // Once the fetch finishes nothing holds the cache, so it drops and takes
    // its clip file with it.
    eventually(|| Arc::strong_count(&player) == 1).await;
    assert_eq!(synth.calls(), 1);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
