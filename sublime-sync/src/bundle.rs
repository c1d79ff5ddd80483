//! Theme bundles
//!
//! A bundle is one unit of ambiance: phrase, palette, animation parameters
//! and a playable audio source. Bundles move through a fixed lifecycle and
//! are never reused once done.

use crate::audio::AudioSource;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use sublime_common::theme::{AnimationParams, ThemeSource};
use sublime_common::{time, Language, Palette, TextColor};

/// Bundle lifecycle
///
/// `Generating -> Ready -> Playing -> Done`, each step exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    Generating,
    Ready,
    Playing,
    Done,
}

/// Session-scoped bundle identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BundleId(String);

impl BundleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces `bundle-{counter}-{unix_millis}` ids
#[derive(Debug, Default)]
pub struct BundleIdGenerator {
    counter: AtomicU64,
}

impl BundleIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> BundleId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        BundleId(format!("bundle-{}-{}", n, time::unix_millis()))
    }
}

/// One fetched theme with its audio
#[derive(Debug)]
pub struct ThemeBundle {
    pub id: BundleId,
    pub content_id: Option<String>,
    pub phrase: String,
    pub language: Language,
    pub palette: Palette,
    pub animation: AnimationParams,
    pub audio: AudioSource,
    pub source: Option<ThemeSource>,
    status: BundleStatus,
}

impl ThemeBundle {
    /// New bundle in `Generating` state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: BundleId,
        content_id: Option<String>,
        phrase: String,
        language: Language,
        palette: Palette,
        animation: AnimationParams,
        audio: AudioSource,
        source: Option<ThemeSource>,
    ) -> Self {
        Self {
            id,
            content_id,
            phrase,
            language,
            palette,
            animation,
            audio,
            source,
            status: BundleStatus::Generating,
        }
    }

    pub fn status(&self) -> BundleStatus {
        self.status
    }

    pub fn text_color(&self) -> TextColor {
        self.palette.text_color()
    }

    pub fn mark_ready(&mut self) -> Result<()> {
        self.transition(BundleStatus::Generating, BundleStatus::Ready)
    }

    pub fn mark_playing(&mut self) -> Result<()> {
        self.transition(BundleStatus::Ready, BundleStatus::Playing)
    }

    pub fn mark_done(&mut self) -> Result<()> {
        self.transition(BundleStatus::Playing, BundleStatus::Done)
    }

    fn transition(&mut self, from: BundleStatus, to: BundleStatus) -> Result<()> {
        if self.status != from {
            return Err(Error::InvalidState(format!(
                "{}: cannot move from {:?} to {:?}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }

    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            id: self.id.to_string(),
            content_id: self.content_id.clone(),
            phrase: self.phrase.clone(),
            language: self.language,
            colors: self.palette.to_hex(),
            text_color: self.text_color(),
            status: self.status,
            source: self.source,
            audio: self.audio.clone(),
        }
    }
}

/// Serializable view of a bundle for status snapshots
#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    pub id: String,
    pub content_id: Option<String>,
    pub phrase: String,
    pub language: Language,
    pub colors: Vec<String>,
    pub text_color: TextColor,
    pub status: BundleStatus,
    pub source: Option<ThemeSource>,
    pub audio: AudioSource,
}
