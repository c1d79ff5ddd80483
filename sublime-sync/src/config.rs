//! Configuration for the sync service
//!
//! Priority (highest first): command-line arguments, environment variables,
//! TOML file, built-in defaults. Command-line overrides are applied in
//! `main.rs`; this module covers the other three tiers.

use crate::coordinator::CoordinatorConfig;
use crate::error::{Error, Result};
use crate::scheduler::{RetryPolicy, SchedulerConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use sublime_common::config::{env_var, load_service_config, LoggingConfig};
use sublime_common::{FadeCurve, Language};
use tracing::warn;

/// Service name used for config file lookup
pub const SERVICE_NAME: &str = "sublime-sync";

/// Sync service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// HTTP control/SSE port
    pub port: u16,

    /// Base URL of the content service (`{content_url}/theme`, ...)
    pub content_url: String,

    /// Public base URL of this service, used to expose local audio blobs
    pub public_url: Option<String>,

    /// Initial display language
    pub language: Language,

    /// Request timeout for content service calls
    pub request_timeout_ms: u64,

    /// Fade-out duration for a superseded track
    pub fade_out_ms: u64,

    /// Fade-out curve shape
    pub fade_curve: FadeCurve,

    /// Readiness poll interval while waiting for the next bundle
    pub poll_interval_ms: u64,

    /// Retries after a failed background fetch
    pub retry_attempts: u32,

    /// First retry delay, doubled for each further retry
    pub retry_base_delay_ms: u64,

    /// Upper bound for the retry delay
    pub retry_max_delay_ms: u64,

    /// Warm-up delay before the intro gate opens on its own
    pub intro_delay_ms: u64,

    /// Delay between a phrase update and the matching palette update
    pub palette_delay_ms: u64,

    /// Typewriter reveal interval per character
    pub typewriter_interval_ms: u64,

    /// Rotation interval for loading phrases
    pub loading_rotation_ms: u64,

    /// Window after a language switch during which bundle phrases are deferred
    pub language_lock_ms: u64,

    /// Track length used by the simulated audio backend
    pub track_duration_ms: u64,

    /// Use the simulated clock backend instead of relaying audio to SSE clients
    pub simulate: bool,

    /// Simulated backend: start unlocked (no autoplay restriction)
    pub autoplay_unlocked: bool,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            port: 5760,
            content_url: "http://127.0.0.1:5761/api".to_string(),
            public_url: None,
            language: Language::En,
            request_timeout_ms: 60_000,
            fade_out_ms: 1_000,
            fade_curve: FadeCurve::Linear,
            poll_interval_ms: 500,
            retry_attempts: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 8_000,
            intro_delay_ms: 4_000,
            palette_delay_ms: 400,
            typewriter_interval_ms: 50,
            loading_rotation_ms: 1_500,
            language_lock_ms: 1_500,
            track_duration_ms: 30_000,
            simulate: false,
            autoplay_unlocked: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load file configuration (or defaults) and apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config: SyncConfig = load_service_config(SERVICE_NAME, explicit)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SUBLIME_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_var("SUBLIME_CONTENT_URL") {
            self.content_url = url;
        }
        if let Some(url) = env_var("SUBLIME_PUBLIC_URL") {
            self.public_url = Some(url);
        }
        if let Some(lang) = env_var("SUBLIME_LANGUAGE") {
            self.language = lang.parse()?;
        }
        if let Some(port) = env_var("SUBLIME_SYNC_PORT") {
            self.port = port
                .parse()
                .map_err(|e| Error::Config(format!("SUBLIME_SYNC_PORT {:?}: {}", port, e)))?;
        }
        Ok(())
    }

    /// Reject values that would stall or spin the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.content_url.trim().is_empty() {
            return Err(Error::Config("content_url must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be > 0".to_string()));
        }
        if self.typewriter_interval_ms == 0 || self.loading_rotation_ms == 0 {
            return Err(Error::Config(
                "typewriter_interval_ms and loading_rotation_ms must be > 0".to_string(),
            ));
        }
        if self.track_duration_ms == 0 {
            return Err(Error::Config("track_duration_ms must be > 0".to_string()));
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            warn!(
                "retry_max_delay_ms ({}) below retry_base_delay_ms ({}); every retry waits {} ms",
                self.retry_max_delay_ms, self.retry_base_delay_ms, self.retry_max_delay_ms
            );
        }
        Ok(())
    }

    /// Public base URL, defaulting to the loopback listener
    pub fn public_base_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.port))
            .trim_end_matches('/')
            .to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn track_duration(&self) -> Duration {
        Duration::from_millis(self.track_duration_ms)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            fade_out: Duration::from_millis(self.fade_out_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            retry: RetryPolicy {
                retries: self.retry_attempts,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
            },
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            intro_delay: Duration::from_millis(self.intro_delay_ms),
            palette_delay: Duration::from_millis(self.palette_delay_ms),
            typewriter_interval: Duration::from_millis(self.typewriter_interval_ms),
            loading_rotation: Duration::from_millis(self.loading_rotation_ms),
        }
    }
}
