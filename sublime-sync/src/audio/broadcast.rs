//! Audio backend relaying element commands to SSE clients
//!
//! The browser page listening on `/api/v1/events` owns the real `<audio>`
//! elements. This backend turns each command into a [`SublimeEvent`] and
//! rewrites local object URLs to the HTTP route serving the blob. The page
//! reports end-of-playback through `POST /api/v1/audio/{handle}/ended` and a
//! refused play request through `POST /api/v1/audio/{handle}/rejected`.

use super::object_url::id_of;
use super::{AudioBackend, HandleId};
use crate::error::Result;
use crate::state::EventBus;
use chrono::Utc;
use sublime_common::events::SublimeEvent;

/// Backend whose elements live in connected browser clients
pub struct BroadcastBackend {
    events: EventBus,
    blob_base_url: String,
}

impl BroadcastBackend {
    /// `public_base_url` is this service's externally reachable base URL
    pub fn new(events: EventBus, public_base_url: &str) -> Self {
        Self {
            events,
            blob_base_url: format!("{}/api/v1/blobs", public_base_url.trim_end_matches('/')),
        }
    }

    /// URL a browser can fetch for `url`
    pub fn client_url(&self, url: &str) -> String {
        match id_of(url) {
            Some(id) => format!("{}/{}", self.blob_base_url, id),
            None => url.to_string(),
        }
    }
}

impl AudioBackend for BroadcastBackend {
    fn load(&self, handle: HandleId, url: &str, volume: f32) -> Result<()> {
        self.events.emit(SublimeEvent::AudioLoaded {
            handle: handle.0,
            url: self.client_url(url),
            volume,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn set_volume(&self, handle: HandleId, volume: f32) {
        self.events.emit(SublimeEvent::AudioVolumeChanged {
            handle: handle.0,
            volume,
            timestamp: Utc::now(),
        });
    }

    // Autoplay policy is enforced by the browser itself
    fn play(&self, handle: HandleId) -> Result<()> {
        self.events.emit(SublimeEvent::AudioPlayRequested {
            handle: handle.0,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn pause(&self, handle: HandleId) {
        self.events.emit(SublimeEvent::AudioPaused {
            handle: handle.0,
            timestamp: Utc::now(),
        });
    }

    fn unload(&self, handle: HandleId) {
        self.events.emit(SublimeEvent::AudioReleased {
            handle: handle.0,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_urls_rewritten_to_blob_route() {
        let backend = BroadcastBackend::new(EventBus::new(16), "http://127.0.0.1:5760/");
        assert_eq!(
            backend.client_url("blob:sublime/abc-123"),
            "http://127.0.0.1:5760/api/v1/blobs/abc-123"
        );
        assert_eq!(
            backend.client_url("https://cdn.example/a.mp3"),
            "https://cdn.example/a.mp3"
        );
    }

    #[tokio::test]
    async fn test_commands_become_events() {
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let backend = BroadcastBackend::new(events, "http://localhost:5760");

        backend
            .load(HandleId(4), "blob:sublime/xyz", 0.0)
            .unwrap();
        backend.play(HandleId(4)).unwrap();
        backend.unload(HandleId(4));

        match rx.recv().await.unwrap() {
            SublimeEvent::AudioLoaded { handle, url, volume, .. } => {
                assert_eq!(handle, 4);
                assert_eq!(url, "http://localhost:5760/api/v1/blobs/xyz");
                assert_eq!(volume, 0.0);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(rx.recv().await.unwrap().event_type(), "AudioPlayRequested");
        assert_eq!(rx.recv().await.unwrap().event_type(), "AudioReleased");
    }
}
