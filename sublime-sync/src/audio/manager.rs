//! Audio resource manager
//!
//! Owns every audio element created for a bundle. Elements are created on
//! promotion, faded out when superseded and released exactly once. Release
//! unloads the element from the backend and revokes the object URL behind a
//! local source, so nothing else needs to track blob lifetimes.
//!
//! Fades run on a spawned tokio task per element. Starting a new fade on an
//! element that is already fading aborts the previous task and continues
//! from the element's current volume.

use super::{AudioBackend, AudioSource, HandleId, ObjectUrlStore};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use sublime_common::FadeCurve;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Interval between fade volume steps
pub const FADE_STEP: Duration = Duration::from_millis(50);

struct Resource {
    source: AudioSource,
    volume: f32,
    playing: bool,
    fade: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct ManagerInner {
    resources: HashMap<HandleId, Resource>,
    next_id: u64,
}

/// Creates, fades and releases audio elements
#[derive(Clone)]
pub struct AudioResourceManager {
    inner: Arc<Mutex<ManagerInner>>,
    backend: Arc<dyn AudioBackend>,
    object_urls: Arc<ObjectUrlStore>,
    curve: FadeCurve,
}

impl AudioResourceManager {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        object_urls: Arc<ObjectUrlStore>,
        curve: FadeCurve,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManagerInner::default())),
            backend,
            object_urls,
            curve,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create an element for `source` at `initial_volume`
    ///
    /// On failure the source is left untouched; the caller still owns it.
    pub fn create_playable(&self, source: &AudioSource, initial_volume: f32) -> Result<HandleId> {
        let volume = initial_volume.clamp(0.0, 1.0);
        let handle = {
            let mut inner = self.lock();
            inner.next_id += 1;
            HandleId(inner.next_id)
        };

        self.backend.load(handle, source.url(), volume)?;

        self.lock().resources.insert(
            handle,
            Resource {
                source: source.clone(),
                volume,
                playing: false,
                fade: None,
            },
        );
        debug!(%handle, url = %source.url(), volume, "Audio element created");
        Ok(handle)
    }

    /// Set element volume (clamped to 0.0-1.0)
    pub fn set_volume(&self, handle: HandleId, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        {
            let mut inner = self.lock();
            match inner.resources.get_mut(&handle) {
                Some(resource) => resource.volume = volume,
                None => {
                    debug!(%handle, "set_volume on released element ignored");
                    return;
                }
            }
        }
        self.backend.set_volume(handle, volume);
    }

    /// Start playback, tolerating autoplay rejection
    ///
    /// A rejected play is logged and leaves the element paused; it is
    /// expected until the user interacts with the page.
    pub fn play(&self, handle: HandleId) {
        if !self.lock().resources.contains_key(&handle) {
            debug!(%handle, "play on released element ignored");
            return;
        }

        match self.backend.play(handle) {
            Ok(()) => {
                if let Some(resource) = self.lock().resources.get_mut(&handle) {
                    resource.playing = true;
                }
                debug!(%handle, "Playback started");
            }
            Err(e) => warn!(%handle, "Playback rejected: {}", e),
        }
    }

    /// Pause, keeping position
    pub fn pause(&self, handle: HandleId) {
        let known = match self.lock().resources.get_mut(&handle) {
            Some(resource) => {
                resource.playing = false;
                true
            }
            None => false,
        };
        if known {
            self.backend.pause(handle);
        }
    }

    /// Record that the element is no longer playing (ended or rejected)
    pub fn mark_stopped(&self, handle: HandleId) {
        if let Some(resource) = self.lock().resources.get_mut(&handle) {
            resource.playing = false;
        }
    }

    /// Ramp the element to silence over `duration`, then release it
    pub fn fade_out_and_dispose(&self, handle: HandleId, duration: Duration) {
        let start_volume = {
            let mut inner = self.lock();
            let Some(resource) = inner.resources.get_mut(&handle) else {
                debug!(%handle, "fade_out_and_dispose on released element ignored");
                return;
            };
            if let Some(previous) = resource.fade.take() {
                previous.abort();
                debug!(%handle, "Previous fade cancelled");
            }
            resource.volume
        };

        if duration.is_zero() || start_volume <= 0.0 {
            self.dispose(handle);
            return;
        }

        let steps = (duration.as_millis() / FADE_STEP.as_millis()).max(1) as u32;
        let step = duration / steps;
        let manager = self.clone();

        debug!(%handle, start_volume, steps, "Fade-out started");
        let task = tokio::spawn(async move {
            for i in 1..=steps {
                tokio::time::sleep(step).await;
                let volume = manager.curve.volume_at(start_volume, i as f32 / steps as f32);
                manager.set_volume(handle, volume);
            }
            manager.release(handle, false);
        });

        let mut inner = self.lock();
        match inner.resources.get_mut(&handle) {
            Some(resource) => resource.fade = Some(task),
            None => task.abort(),
        }
    }

    /// Release immediately, cancelling any fade in progress
    pub fn dispose(&self, handle: HandleId) -> bool {
        self.release(handle, true)
    }

    /// Release every element (session end)
    pub fn dispose_all(&self) -> usize {
        let handles: Vec<HandleId> = self.lock().resources.keys().copied().collect();
        handles
            .into_iter()
            .filter(|handle| self.release(*handle, true))
            .count()
    }

    /// Revoke the object URL of a source that never got an element
    pub fn discard_source(&self, source: &AudioSource) {
        if let AudioSource::Local(url) = source {
            self.object_urls.revoke(url);
        }
    }

    /// Forward a user gesture to the backend
    pub fn unlock(&self) {
        self.backend.unlock();
    }

    fn release(&self, handle: HandleId, abort_fade: bool) -> bool {
        let Some(mut resource) = self.lock().resources.remove(&handle) else {
            return false;
        };

        if abort_fade {
            if let Some(fade) = resource.fade.take() {
                fade.abort();
            }
        }

        self.backend.unload(handle);
        self.discard_source(&resource.source);
        debug!(%handle, "Audio element released");
        true
    }

    pub fn is_playing(&self, handle: HandleId) -> bool {
        self.lock()
            .resources
            .get(&handle)
            .map(|r| r.playing)
            .unwrap_or(false)
    }

    pub fn is_fading(&self, handle: HandleId) -> bool {
        self.lock()
            .resources
            .get(&handle)
            .map(|r| r.fade.is_some())
            .unwrap_or(false)
    }

    pub fn volume(&self, handle: HandleId) -> Option<f32> {
        self.lock().resources.get(&handle).map(|r| r.volume)
    }

    pub fn is_live(&self, handle: HandleId) -> bool {
        self.lock().resources.contains_key(&handle)
    }

    /// Number of elements not yet released
    pub fn live_handles(&self) -> usize {
        self.lock().resources.len()
    }

    pub fn object_urls(&self) -> &Arc<ObjectUrlStore> {
        &self.object_urls
    }
}
