//! Music generation for realtime themes
//!
//! [`ElevenLabsMusic`] composes an instrumental track from the theme phrase.
//! [`SilentMusic`] stands in without an API key and returns silent MP3
//! frames of the requested length, so realtime themes still play.

use crate::config::ContentConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait MusicModel: Send + Sync {
    /// MP3 bytes for `prompt`, about `length` long
    async fn compose(&self, prompt: &str, length: Duration) -> Result<Vec<u8>>;
}

/// Build the music model for `config`
pub fn from_config(config: &ContentConfig) -> Result<Arc<dyn MusicModel>> {
    match &config.elevenlabs_api_key {
        Some(key) => Ok(Arc::new(ElevenLabsMusic::new(
            &config.elevenlabs_base_url,
            key,
            config.request_timeout(),
        )?)),
        None => {
            warn!("No ElevenLabs API key configured; realtime themes carry silent audio");
            Ok(Arc::new(SilentMusic))
        }
    }
}

#[derive(Serialize)]
struct ComposeRequest<'a> {
    prompt: &'a str,
    music_length_ms: u64,
    force_instrumental: bool,
}

pub struct ElevenLabsMusic {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ElevenLabsMusic {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/music", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl MusicModel for ElevenLabsMusic {
    async fn compose(&self, prompt: &str, length: Duration) -> Result<Vec<u8>> {
        let request = ComposeRequest {
            prompt,
            music_length_ms: length.as_millis() as u64,
            force_instrumental: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("music request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "music service returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("music body: {}", e)))?;
        if bytes.is_empty() {
            return Err(Error::Upstream("music service returned no audio".to_string()));
        }
        debug!(bytes = bytes.len(), "Music composed");
        Ok(bytes.to_vec())
    }
}

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, mono, no padding
const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0xC4];
const FRAME_LEN: usize = 417;
const SAMPLES_PER_FRAME: u64 = 1152;
const SAMPLE_RATE: u64 = 44_100;

/// Silent MP3 covering at least `length`
pub fn silent_mp3(length: Duration) -> Vec<u8> {
    let samples = length.as_millis() as u64 * SAMPLE_RATE / 1000;
    let frames = samples.div_ceil(SAMPLES_PER_FRAME).max(1) as usize;

    let mut bytes = Vec::with_capacity(frames * FRAME_LEN);
    for _ in 0..frames {
        bytes.extend_from_slice(&FRAME_HEADER);
        bytes.resize(bytes.len() + FRAME_LEN - FRAME_HEADER.len(), 0);
    }
    bytes
}

/// Music model used without credentials
pub struct SilentMusic;

#[async_trait]
impl MusicModel for SilentMusic {
    async fn compose(&self, _prompt: &str, length: Duration) -> Result<Vec<u8>> {
        Ok(silent_mp3(length))
    }
}
