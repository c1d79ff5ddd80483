//! Core audio data types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one audio element managed by the resource manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audio-{}", self.0)
    }
}

/// Notifications sent by audio backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSignal {
    /// The element reached end-of-playback
    Ended(HandleId),
    /// The client refused to start the element (autoplay policy)
    Rejected(HandleId),
}

/// Playable source of a bundle's audio
///
/// Exactly one form per bundle: either the remote URL returned by the
/// content service or a local object URL created from inline bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "url", rename_all = "lowercase")]
pub enum AudioSource {
    /// Remote URL, used as-is
    Remote(String),
    /// Revocable object URL owned by the object URL store
    Local(String),
}

impl AudioSource {
    pub fn url(&self) -> &str {
        match self {
            AudioSource::Remote(url) | AudioSource::Local(url) => url,
        }
    }

    /// Whether releasing this source must revoke an object URL
    pub fn is_local(&self) -> bool {
        matches!(self, AudioSource::Local(_))
    }
}
