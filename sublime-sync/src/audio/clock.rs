//! Headless audio backend
//!
//! Plays nothing. Each loaded element counts down a fixed track duration
//! once started and reports [`AudioSignal::Ended`] when it runs out. Pausing
//! freezes the remaining time. Until [`AudioBackend::unlock`] is called,
//! `play` is rejected the way a browser rejects autoplay before the first
//! user gesture.

use super::{AudioBackend, AudioSignal, HandleId};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

struct Track {
    remaining: Duration,
    started_at: Option<Instant>,
    timer: Option<JoinHandle<()>>,
    volume: f32,
}

type Tracks = Arc<Mutex<HashMap<HandleId, Track>>>;

fn lock(tracks: &Tracks) -> MutexGuard<'_, HashMap<HandleId, Track>> {
    tracks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Simulated playback driven by tokio timers
pub struct ClockBackend {
    track_duration: Duration,
    signal_tx: mpsc::UnboundedSender<AudioSignal>,
    unlocked: AtomicBool,
    tracks: Tracks,
}

impl ClockBackend {
    /// New backend, locked until the first user gesture
    pub fn new(track_duration: Duration, signal_tx: mpsc::UnboundedSender<AudioSignal>) -> Self {
        Self {
            track_duration,
            signal_tx,
            unlocked: AtomicBool::new(false),
            tracks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::Acquire)
    }

    /// Elements loaded and not yet unloaded
    pub fn loaded_count(&self) -> usize {
        lock(&self.tracks).len()
    }

    pub fn is_running(&self, handle: HandleId) -> bool {
        lock(&self.tracks)
            .get(&handle)
            .map(|t| t.started_at.is_some())
            .unwrap_or(false)
    }

    pub fn volume_of(&self, handle: HandleId) -> Option<f32> {
        lock(&self.tracks).get(&handle).map(|t| t.volume)
    }
}

impl AudioBackend for ClockBackend {
    fn load(&self, handle: HandleId, url: &str, volume: f32) -> Result<()> {
        if url.is_empty() {
            return Err(Error::Playback(format!("{}: empty source URL", handle)));
        }
        lock(&self.tracks).insert(
            handle,
            Track {
                remaining: self.track_duration,
                started_at: None,
                timer: None,
                volume,
            },
        );
        debug!(%handle, url, "Simulated track loaded");
        Ok(())
    }

    fn set_volume(&self, handle: HandleId, volume: f32) {
        if let Some(track) = lock(&self.tracks).get_mut(&handle) {
            track.volume = volume;
            trace!(%handle, volume, "Simulated volume");
        }
    }

    fn play(&self, handle: HandleId) -> Result<()> {
        if !self.is_unlocked() {
            return Err(Error::Playback(
                "autoplay not allowed before a user gesture".to_string(),
            ));
        }

        let mut tracks = lock(&self.tracks);
        let track = tracks
            .get_mut(&handle)
            .ok_or_else(|| Error::Playback(format!("{} is not loaded", handle)))?;
        if track.started_at.is_some() {
            return Ok(());
        }

        let remaining = track.remaining;
        let signal_tx = self.signal_tx.clone();
        let shared = Arc::clone(&self.tracks);
        track.started_at = Some(Instant::now());
        track.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            if let Some(track) = lock(&shared).get_mut(&handle) {
                track.remaining = Duration::ZERO;
                track.started_at = None;
                track.timer = None;
            }
            debug!(%handle, "Simulated track ended");
            let _ = signal_tx.send(AudioSignal::Ended(handle));
        }));
        Ok(())
    }

    fn pause(&self, handle: HandleId) {
        if let Some(track) = lock(&self.tracks).get_mut(&handle) {
            if let Some(started_at) = track.started_at.take() {
                track.remaining = track.remaining.saturating_sub(started_at.elapsed());
            }
            if let Some(timer) = track.timer.take() {
                timer.abort();
            }
        }
    }

    fn unload(&self, handle: HandleId) {
        if let Some(track) = lock(&self.tracks).remove(&handle) {
            if let Some(timer) = track.timer {
                timer.abort();
            }
        }
    }

    fn unlock(&self) {
        if !self.unlocked.swap(true, Ordering::AcqRel) {
            debug!("Simulated autoplay restriction lifted");
        }
    }
}
