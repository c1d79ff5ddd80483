//! Revocable object URLs for inline audio payloads
//!
//! Inline audio bytes returned by the content service are registered here
//! under a `blob:sublime/{uuid}` URL. The URL stays resolvable until it is
//! revoked; the HTTP API serves live blobs to browser clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// Scheme prefix of every local object URL
pub const OBJECT_URL_PREFIX: &str = "blob:sublime/";

/// Bytes behind an object URL
#[derive(Debug, Clone)]
pub struct Blob {
    pub mime: String,
    pub bytes: Arc<Vec<u8>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    blobs: HashMap<String, Blob>,
    created: u64,
    revoke_calls: u64,
}

/// Registry of live object URLs
#[derive(Debug, Default)]
pub struct ObjectUrlStore {
    inner: Mutex<StoreInner>,
}

impl ObjectUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A poisoned registry is still structurally valid
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register bytes and return their object URL
    pub fn create(&self, bytes: Vec<u8>, mime: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let url = format!("{}{}", OBJECT_URL_PREFIX, id);
        let size = bytes.len();

        let mut inner = self.lock();
        inner.blobs.insert(
            id,
            Blob {
                mime: mime.to_string(),
                bytes: Arc::new(bytes),
            },
        );
        inner.created += 1;
        debug!(url = %url, size, "Object URL created");
        url
    }

    /// Revoke an object URL; returns whether it was live
    pub fn revoke(&self, url: &str) -> bool {
        let mut inner = self.lock();
        inner.revoke_calls += 1;

        let removed = id_of(url)
            .map(|id| inner.blobs.remove(id).is_some())
            .unwrap_or(false);
        if removed {
            debug!(url = %url, "Object URL revoked");
        } else {
            warn!(url = %url, "Revoke of unknown or already revoked object URL");
        }
        removed
    }

    /// Blob behind an object URL, if still live
    pub fn resolve(&self, url: &str) -> Option<Blob> {
        id_of(url).and_then(|id| self.get(id))
    }

    /// Blob by bare id (the part after the prefix)
    pub fn get(&self, id: &str) -> Option<Blob> {
        self.lock().blobs.get(id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.lock().blobs.len()
    }

    pub fn created_count(&self) -> u64 {
        self.lock().created
    }

    pub fn revoke_calls(&self) -> u64 {
        self.lock().revoke_calls
    }
}

/// Bare id of an object URL, `None` for anything else
pub fn id_of(url: &str) -> Option<&str> {
    url.strip_prefix(OBJECT_URL_PREFIX).filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_resolve_revoke() {
        let store = ObjectUrlStore::new();
        let url = store.create(vec![1, 2, 3], "audio/mpeg");

        assert!(url.starts_with(OBJECT_URL_PREFIX));
        let blob = store.resolve(&url).expect("blob should be live");
        assert_eq!(blob.mime, "audio/mpeg");
        assert_eq!(*blob.bytes, vec![1, 2, 3]);
        assert_eq!(store.live_count(), 1);

        assert!(store.revoke(&url));
        assert!(store.resolve(&url).is_none());
        assert_eq!(store.live_count(), 0);
        assert_eq!(store.created_count(), 1);
        assert_eq!(store.revoke_calls(), 1);
    }

    #[test]
    fn test_double_revoke_is_harmless_but_counted() {
        let store = ObjectUrlStore::new();
        let url = store.create(vec![0], "audio/mpeg");

        assert!(store.revoke(&url));
        assert!(!store.revoke(&url));
        assert_eq!(store.revoke_calls(), 2);
    }

    #[test]
    fn test_foreign_urls_are_not_resolved() {
        let store = ObjectUrlStore::new();
        assert!(store.resolve("https://cdn.example/a.mp3").is_none());
        assert_eq!(id_of("blob:sublime/"), None);
        assert_eq!(id_of("blob:sublime/xyz"), Some("xyz"));
    }
}
