//! Event types for the Sublime event system
//!
//! Every observable change of the sync pipeline is broadcast as a
//! [`SublimeEvent`]. The SSE endpoint serializes them as JSON with a `type`
//! tag, which is also used as the SSE event name.

use crate::{Language, TextColor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Double-buffer scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Created, not yet enabled
    Idle,
    /// Fetching the first bundle
    Initializing,
    /// Current bundle is playing (or gated)
    Playing,
    /// Current track ended before the next bundle was ready
    AwaitingNext,
    /// First bundle could not be fetched; caller decides whether to retry
    Failed,
    /// Torn down, terminal
    Disposed,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Initializing => "initializing",
            SchedulerState::Playing => "playing",
            SchedulerState::AwaitingNext => "awaiting_next",
            SchedulerState::Failed => "failed",
            SchedulerState::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

/// Which playback slot a fetch fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Current,
    Next,
}

/// Why the intro gate opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOpenReason {
    WarmUpElapsed,
    UserGesture,
}

/// Sublime event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SublimeEvent {
    /// Scheduler moved to a new state
    SchedulerStateChanged {
        state: SchedulerState,
        timestamp: DateTime<Utc>,
    },

    /// A bundle request was issued to the content service
    BundleFetchStarted {
        slot: Slot,
        language: Language,
        exclude: Option<String>,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// A bundle finished downloading and decoding
    BundleReady {
        slot: Slot,
        bundle_id: String,
        content_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A bundle request failed
    BundleFetchFailed {
        slot: Slot,
        error: String,
        attempt: u32,
        will_retry: bool,
        timestamp: DateTime<Utc>,
    },

    /// A bundle became the current one
    BundlePromoted {
        from_bundle_id: Option<String>,
        to_bundle_id: String,
        content_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Skip requested while the next bundle was not ready
    SkipIgnored {
        timestamp: DateTime<Utc>,
    },

    /// New audio element created for a bundle
    AudioLoaded {
        handle: u64,
        url: String,
        volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// Audio element volume changed (fade steps included)
    AudioVolumeChanged {
        handle: u64,
        volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// Playback requested on an audio element
    AudioPlayRequested {
        handle: u64,
        timestamp: DateTime<Utc>,
    },

    /// Audio element paused
    AudioPaused {
        handle: u64,
        timestamp: DateTime<Utc>,
    },

    /// Audio element released; its URL must not be used anymore
    AudioReleased {
        handle: u64,
        timestamp: DateTime<Utc>,
    },

    /// Displayed phrase replaced (typewriter restarts)
    PhraseChanged {
        bundle_id: Option<String>,
        phrase: String,
        language: Language,
        timestamp: DateTime<Utc>,
    },

    /// Typewriter revealed one more character
    PhraseRevealed {
        text: String,
        complete: bool,
        timestamp: DateTime<Utc>,
    },

    /// Palette and shader parameters applied
    PaletteChanged {
        colors: Vec<String>,
        speed: f64,
        softness: f64,
        steps_per_color: u8,
        text_color: TextColor,
        timestamp: DateTime<Utc>,
    },

    /// Placeholder phrase shown while the intro gate is closed
    LoadingPhrase {
        phrase: String,
        timestamp: DateTime<Utc>,
    },

    /// Mute gate toggled
    MuteChanged {
        muted: bool,
        timestamp: DateTime<Utc>,
    },

    /// Intro gate opened
    IntroGateOpened {
        reason: GateOpenReason,
        timestamp: DateTime<Utc>,
    },

    /// Active language changed
    LanguageChanged {
        language: Language,
        timestamp: DateTime<Utc>,
    },

    /// Displayed phrase translated
    PhraseTranslated {
        bundle_id: Option<String>,
        language: Language,
        phrase: String,
        timestamp: DateTime<Utc>,
    },

    /// Content service call counter changed
    ApiCallCount {
        total: u64,
        timestamp: DateTime<Utc>,
    },

    /// Pipeline-level error surfaced to the UI
    PipelineError {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl SublimeEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            SublimeEvent::SchedulerStateChanged { .. } => "SchedulerStateChanged",
            SublimeEvent::BundleFetchStarted { .. } => "BundleFetchStarted",
            SublimeEvent::BundleReady { .. } => "BundleReady",
            SublimeEvent::BundleFetchFailed { .. } => "BundleFetchFailed",
            SublimeEvent::BundlePromoted { .. } => "BundlePromoted",
            SublimeEvent::SkipIgnored { .. } => "SkipIgnored",
            SublimeEvent::AudioLoaded { .. } => "AudioLoaded",
            SublimeEvent::AudioVolumeChanged { .. } => "AudioVolumeChanged",
            SublimeEvent::AudioPlayRequested { .. } => "AudioPlayRequested",
            SublimeEvent::AudioPaused { .. } => "AudioPaused",
            SublimeEvent::AudioReleased { .. } => "AudioReleased",
            SublimeEvent::PhraseChanged { .. } => "PhraseChanged",
            SublimeEvent::PhraseRevealed { .. } => "PhraseRevealed",
            SublimeEvent::PaletteChanged { .. } => "PaletteChanged",
            SublimeEvent::LoadingPhrase { .. } => "LoadingPhrase",
            SublimeEvent::MuteChanged { .. } => "MuteChanged",
            SublimeEvent::IntroGateOpened { .. } => "IntroGateOpened",
            SublimeEvent::LanguageChanged { .. } => "LanguageChanged",
            SublimeEvent::PhraseTranslated { .. } => "PhraseTranslated",
            SublimeEvent::ApiCallCount { .. } => "ApiCallCount",
            SublimeEvent::PipelineError { .. } => "PipelineError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = SublimeEvent::SchedulerStateChanged {
            state: SchedulerState::AwaitingNext,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SchedulerStateChanged");
        assert_eq!(json["state"], "awaiting_next");
        assert_eq!(event.event_type(), "SchedulerStateChanged");
    }

    #[test]
    fn test_palette_event_round_trip() {
        let event = SublimeEvent::PaletteChanged {
            colors: vec!["#000000".to_string(); 5],
            speed: 1.0,
            softness: 0.5,
            steps_per_color: 2,
            text_color: TextColor::White,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SublimeEvent = serde_json::from_str(&json).unwrap();
        match back {
            SublimeEvent::PaletteChanged { text_color, .. } => {
                assert_eq!(text_color, TextColor::White)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_scheduler_state_display_matches_serde() {
        for state in [
            SchedulerState::Idle,
            SchedulerState::Initializing,
            SchedulerState::Playing,
            SchedulerState::AwaitingNext,
            SchedulerState::Failed,
            SchedulerState::Disposed,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json.trim_matches('"'), state.to_string());
        }
    }
}
