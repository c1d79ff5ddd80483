//! Bundle fetcher
//!
//! Turns one content service response into a ready [`ThemeBundle`]. All
//! validation happens here, so the rest of the pipeline only ever sees
//! well-formed bundles. Inline audio is registered as an object URL only
//! after every other field has been accepted.

use crate::audio::{AudioSource, ObjectUrlStore};
use crate::bundle::{BundleIdGenerator, ThemeBundle};
use crate::client::ContentService;
use crate::error::{Error, Result};
use crate::metrics::ApiCallCounter;
use crate::state::EventBus;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use sublime_common::theme::{AnimationParams, ThemeResponse};
use sublime_common::{Language, Palette};
use tracing::debug;

/// MIME type of inline audio payloads
pub const INLINE_AUDIO_MIME: &str = "audio/mpeg";

#[derive(Clone)]
pub struct BundleFetcher {
    service: Arc<dyn ContentService>,
    object_urls: Arc<ObjectUrlStore>,
    ids: Arc<BundleIdGenerator>,
    api_calls: Arc<ApiCallCounter>,
    events: EventBus,
}

impl BundleFetcher {
    pub fn new(
        service: Arc<dyn ContentService>,
        object_urls: Arc<ObjectUrlStore>,
        api_calls: Arc<ApiCallCounter>,
        events: EventBus,
    ) -> Self {
        Self {
            service,
            object_urls,
            ids: Arc::new(BundleIdGenerator::new()),
            api_calls,
            events,
        }
    }

    /// Fetch and decode one bundle
    ///
    /// The call is counted before it is issued, whatever its outcome.
    pub async fn fetch(&self, language: Language, exclude: Option<String>) -> Result<ThemeBundle> {
        self.api_calls.record(&self.events);
        let response = self.service.fetch_theme(language, exclude.as_deref()).await?;
        self.decode(response, language)
    }

    /// Validate a response into a `Ready` bundle
    pub fn decode(&self, response: ThemeResponse, language: Language) -> Result<ThemeBundle> {
        let phrase = response.phrase.trim();
        if phrase.is_empty() {
            return Err(Error::Decode("empty phrase".to_string()));
        }

        let palette = Palette::parse(&response.colors)
            .map_err(|e| Error::Decode(format!("palette: {}", e)))?;
        let animation = AnimationParams::clamped(
            response.speed,
            response.softness,
            response.steps_per_color,
        );

        let audio = self.audio_source(response.audio_url, response.audio_base64)?;

        let mut bundle = ThemeBundle::new(
            self.ids.next_id(),
            response.content_id.filter(|id| !id.is_empty()),
            phrase.to_string(),
            language,
            palette,
            animation,
            audio,
            response.source,
        );
        bundle.mark_ready()?;

        debug!(
            bundle_id = %bundle.id,
            content_id = ?bundle.content_id,
            local_audio = bundle.audio.is_local(),
            "Bundle decoded"
        );
        Ok(bundle)
    }

    fn audio_source(&self, url: Option<String>, inline: Option<String>) -> Result<AudioSource> {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            return Ok(AudioSource::Remote(url));
        }

        let Some(encoded) = inline.filter(|b| !b.trim().is_empty()) else {
            return Err(Error::Decode("No audio data received".to_string()));
        };

        // Tolerate a data URL prefix
        let payload = match encoded.split_once("base64,") {
            Some((_, data)) => data,
            None => encoded.as_str(),
        };
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::Decode(format!("inline audio: {}", e)))?;
        if bytes.is_empty() {
            return Err(Error::Decode("inline audio is empty".to_string()));
        }

        Ok(AudioSource::Local(
            self.object_urls.create(bytes, INLINE_AUDIO_MIME),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleStatus;
    use async_trait::async_trait;
    use sublime_common::theme::{PromptRequest, PromptResponse};

    struct Unreachable;

    #[async_trait]
    impl ContentService for Unreachable {
        async fn fetch_theme(&self, _: Language, _: Option<&str>) -> Result<ThemeResponse> {
            Err(Error::Fetch("connection refused".to_string()))
        }
        async fn translate(&self, _: &str, _: Language) -> Result<String> {
            Err(Error::Translation("unused".to_string()))
        }
        async fn process_prompt(&self, _: &PromptRequest) -> Result<PromptResponse> {
            Err(Error::Fetch("unused".to_string()))
        }
    }

    fn fetcher() -> BundleFetcher {
        BundleFetcher::new(
            Arc::new(Unreachable),
            Arc::new(ObjectUrlStore::new()),
            Arc::new(ApiCallCounter::new()),
            EventBus::new(16),
        )
    }

    fn response() -> ThemeResponse {
        ThemeResponse {
            phrase: "Amber fog over the harbour".to_string(),
            colors: ["#111111", "#222222", "#333333", "#444444", "#555555"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            speed: 0.8,
            softness: 0.6,
            steps_per_color: 3.0,
            audio_url: Some("https://cdn.example/t1.mp3".to_string()),
            audio_base64: None,
            content_id: Some("t1".to_string()),
            source: None,
        }
    }

    #[test]
    fn test_remote_audio_used_directly() {
        let fetcher = fetcher();
        let bundle = fetcher.decode(response(), Language::En).unwrap();

        assert_eq!(bundle.status(), BundleStatus::Ready);
        assert_eq!(
            bundle.audio,
            AudioSource::Remote("https://cdn.example/t1.mp3".to_string())
        );
        assert_eq!(fetcher.object_urls.created_count(), 0);
    }

    #[test]
    fn test_inline_audio_becomes_object_url() {
        let fetcher = fetcher();
        let mut response = response();
        response.audio_url = None;
        response.audio_base64 = Some(STANDARD.encode([0xffu8, 0xfb, 0x90, 0x00]));

        let bundle = fetcher.decode(response, Language::En).unwrap();
        let url = match &bundle.audio {
            AudioSource::Local(url) => url.clone(),
            other => panic!("expected local audio, got {:?}", other),
        };
        let blob = fetcher.object_urls.resolve(&url).unwrap();
        assert_eq!(blob.mime, INLINE_AUDIO_MIME);
        assert_eq!(*blob.bytes, vec![0xff, 0xfb, 0x90, 0x00]);
    }

    #[test]
    fn test_missing_audio_is_decode_error() {
        let mut response = response();
        response.audio_url = None;
        assert!(matches!(
            fetcher().decode(response, Language::En),
            Err(Error::Decode(msg)) if msg == "No audio data received"
        ));
    }

    #[test]
    fn test_bad_palette_rejected_before_audio_is_registered() {
        let fetcher = fetcher();
        let mut response = response();
        response.colors.pop();
        response.audio_url = None;
        response.audio_base64 = Some(STANDARD.encode([1u8, 2, 3]));

        assert!(matches!(
            fetcher.decode(response, Language::En),
            Err(Error::Decode(_))
        ));
        assert_eq!(fetcher.object_urls.created_count(), 0);
    }

    #[test]
    fn test_empty_phrase_and_garbage_base64_rejected() {
        let mut empty = response();
        empty.phrase = "   ".to_string();
        assert!(matches!(fetcher().decode(empty, Language::En), Err(Error::Decode(_))));

        let mut garbage = response();
        garbage.audio_url = None;
        garbage.audio_base64 = Some("!!not base64!!".to_string());
        assert!(matches!(fetcher().decode(garbage, Language::En), Err(Error::Decode(_))));
    }

    #[test]
    fn test_animation_params_clamped() {
        let mut response = response();
        response.speed = 9.0;
        response.softness = f64::NAN;
        response.steps_per_color = 0.0;

        let bundle = fetcher().decode(response, Language::En).unwrap();
        assert_eq!(bundle.animation.speed, 2.0);
        assert_eq!(bundle.animation.softness, 1.0);
        assert_eq!(bundle.animation.steps_per_color, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_still_counted() {
        let fetcher = fetcher();
        let result = fetcher.fetch(Language::Fr, Some("t9".to_string())).await;
        assert!(matches!(result, Err(Error::Fetch(_))));
        assert_eq!(fetcher.api_calls.total(), 1);
    }
}
