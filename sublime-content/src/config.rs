//! Configuration for the content service
//!
//! Priority (highest first): command-line arguments, environment variables,
//! TOML file, built-in defaults.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sublime_common::config::{env_var, load_service_config, LoggingConfig};

/// Service name used for config file lookup
pub const SERVICE_NAME: &str = "sublime-content";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub port: u16,

    /// SQLite theme store
    pub database_path: PathBuf,

    /// Directory served under `/audio`
    pub audio_dir: PathBuf,

    /// Public base URL used to build `audioUrl`
    pub public_url: Option<String>,

    /// Chat-completions API key; without one an offline model is used
    pub openai_api_key: Option<String>,

    pub openai_base_url: String,

    pub openai_model: String,

    /// Model asked for realtime themes (structured output)
    pub theme_model: String,

    /// Music generation API key; without one realtime themes carry silence
    pub elevenlabs_api_key: Option<String>,

    pub elevenlabs_base_url: String,

    /// Length of a generated track
    pub music_length_ms: u64,

    pub request_timeout_ms: u64,

    /// Generate themes on request (forced, low stock or by ratio)
    pub realtime_enabled: bool,

    /// Below this many cached themes every request is generated
    pub min_stock: u32,

    /// Share of requests generated even when the cache is stocked (0.0-1.0)
    pub realtime_ratio: f64,

    /// Number of least-played themes a random pick is drawn from
    pub candidate_pool: u32,

    /// Sounds offered by the prompt router for audio requests
    pub sounds: Vec<String>,

    /// Content returned for video requests
    pub video_url: String,

    /// Content returned for image requests
    pub image_url: String,

    pub logging: LoggingConfig,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            port: 5761,
            database_path: PathBuf::from("sublime.db"),
            audio_dir: PathBuf::from("audio"),
            public_url: None,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            theme_model: "gpt-4o".to_string(),
            elevenlabs_api_key: None,
            elevenlabs_base_url: "https://api.elevenlabs.io/v1".to_string(),
            music_length_ms: 30_000,
            request_timeout_ms: 60_000,
            realtime_enabled: true,
            min_stock: 20,
            realtime_ratio: 0.05,
            candidate_pool: 10,
            sounds: vec![
                "/sounds/01.mp3".to_string(),
                "/sounds/02.mp3".to_string(),
                "/sounds/03.mp3".to_string(),
            ],
            video_url: concat!(
                "https://player.vimeo.com/video/1069614602",
                "?h=0&autoplay=1&loop=1&title=0&byline=0&portrait=0"
            )
            .to_string(),
            image_url: "/ai-pattern.svg".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ContentConfig {
    /// Load file configuration (or defaults) and apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config: ContentConfig = load_service_config(SERVICE_NAME, explicit)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(key) = env_var("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(key) = env_var("ELEVENLABS_API_KEY") {
            self.elevenlabs_api_key = Some(key);
        }
        if let Some(path) = env_var("SUBLIME_DATABASE") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(url) = env_var("SUBLIME_CONTENT_PUBLIC_URL") {
            self.public_url = Some(url);
        }
        if let Some(port) = env_var("SUBLIME_CONTENT_PORT") {
            self.port = port
                .parse()
                .map_err(|e| Error::Config(format!("SUBLIME_CONTENT_PORT {:?}: {}", port, e)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.candidate_pool == 0 {
            return Err(Error::Config("candidate_pool must be > 0".to_string()));
        }
        if self.sounds.is_empty() {
            return Err(Error::Config("at least one sound is required".to_string()));
        }
        if !(0.0..=1.0).contains(&self.realtime_ratio) {
            return Err(Error::Config(format!(
                "realtime_ratio must be within 0.0-1.0, got {}",
                self.realtime_ratio
            )));
        }
        if self.music_length_ms == 0 {
            return Err(Error::Config("music_length_ms must be > 0".to_string()));
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

    pub fn music_length(&self) -> Duration {
        Duration::from_millis(self.music_length_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ContentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.public_base_url(), "http://127.0.0.1:5761");
    }

    #[test]
    #[serial]
    fn test_file_then_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port = 6000\ncandidate_pool = 4\npublic_url = \"https://cdn.example/\""
        )
        .unwrap();

        std::env::set_var("SUBLIME_CONTENT_PORT", "6001");
        let config = ContentConfig::load(Some(file.path()));
        std::env::remove_var("SUBLIME_CONTENT_PORT");

        let config = config.unwrap();
        assert_eq!(config.port, 6001);
        assert_eq!(config.candidate_pool, 4);
        assert_eq!(config.public_base_url(), "https://cdn.example");
    }

    #[test]
    fn test_realtime_ratio_bounds() {
        for ratio in [-0.1, 1.5, f64::NAN] {
            let config = ContentConfig {
                realtime_ratio: ratio,
                ..ContentConfig::default()
            };
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{}", ratio);
        }
        let config = ContentConfig {
            realtime_ratio: 1.0,
            ..ContentConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_pool_rejected() {
        let config = ContentConfig {
            candidate_pool: 0,
            ..ContentConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
