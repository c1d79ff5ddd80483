//! # Sublime Content Library (sublime-content)
//!
//! Reference content service for the sync pipeline: serves cached themes
//! from SQLite (least played first), generates new themes with music on
//! demand, translates phrases and routes visitor prompts.

use std::sync::Arc;

use sqlx::SqlitePool;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod generate;
pub mod model;
pub mod music;
pub mod prompt;
pub mod realtime;
pub mod seed;

pub use api::build_router;
pub use config::ContentConfig;
pub use error::{Error, Result};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub model: Arc<dyn model::TextModel>,
    pub prompts: Arc<prompt::PromptRouter>,
    pub realtime: realtime::RealtimePolicy,
    pub themes: Arc<dyn generate::ThemeGenerator>,
    pub music: Arc<dyn music::MusicModel>,
    pub config: Arc<ContentConfig>,
}

impl AppState {
    /// State with offline theme and music generators
    pub fn new(db: SqlitePool, model: Arc<dyn model::TextModel>, config: ContentConfig) -> Self {
        Self {
            db,
            model,
            prompts: Arc::new(prompt::PromptRouter::from_config(&config)),
            realtime: realtime::RealtimePolicy::from_config(&config),
            themes: Arc::new(generate::OfflineThemeGenerator),
            music: Arc::new(music::SilentMusic),
            config: Arc::new(config),
        }
    }

    /// Replace the realtime generators
    pub fn with_generators(
        mut self,
        themes: Arc<dyn generate::ThemeGenerator>,
        music: Arc<dyn music::MusicModel>,
    ) -> Self {
        self.themes = themes;
        self.music = music;
        self
    }
}
