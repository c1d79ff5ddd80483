//! Audio resource layer
//!
//! The resource manager owns every audio element the pipeline creates and
//! is the only place where elements are created, faded and released.
//! Rendering is delegated to an [`AudioBackend`]:
//! - [`ClockBackend`]: headless, plays each track for a fixed duration
//! - [`BroadcastBackend`]: relays element commands to SSE clients

pub mod broadcast;
pub mod clock;
pub mod manager;
pub mod object_url;
pub mod types;

pub use broadcast::BroadcastBackend;
pub use clock::ClockBackend;
pub use manager::AudioResourceManager;
pub use object_url::ObjectUrlStore;
pub use types::{AudioSignal, AudioSource, HandleId};

use crate::error::Result;

/// Audio element operations
///
/// Implementations report end-of-playback by sending
/// [`AudioSignal::Ended`] on the signal channel they were built with.
pub trait AudioBackend: Send + Sync {
    /// Create an element for `url` at `volume`
    fn load(&self, handle: HandleId, url: &str, volume: f32) -> Result<()>;

    /// Set element volume (0.0-1.0)
    fn set_volume(&self, handle: HandleId, volume: f32);

    /// Start or resume playback
    ///
    /// Returns `Error::Playback` when autoplay is not allowed yet.
    fn play(&self, handle: HandleId) -> Result<()>;

    /// Pause, keeping the playback position
    fn pause(&self, handle: HandleId);

    /// Stop and detach the element; the handle is invalid afterwards
    fn unload(&self, handle: HandleId);

    /// A user gesture happened; lift autoplay restrictions
    fn unlock(&self) {}
}
