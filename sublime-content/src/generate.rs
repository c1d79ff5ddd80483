//! Theme generation for realtime requests
//!
//! [`OpenAiModel`] asks for a structured visual theme: an English phrase,
//! five colors and the shader parameters. [`OfflineThemeGenerator`] composes
//! one locally when no API key is configured.

use crate::config::ContentConfig;
use crate::db::themes::NewTheme;
use crate::error::{Error, Result};
use crate::model::OpenAiModel;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use sublime_common::theme::AnimationParams;
use tracing::{debug, warn};

#[async_trait]
pub trait ThemeGenerator: Send + Sync {
    /// A new English theme, valid and with parameters in range
    async fn generate(&self) -> Result<NewTheme>;
}

/// Build the generator for `config`
pub fn from_config(config: &ContentConfig) -> Result<Arc<dyn ThemeGenerator>> {
    match &config.openai_api_key {
        Some(key) => Ok(Arc::new(OpenAiModel::new(
            &config.openai_base_url,
            key,
            &config.theme_model,
            config.request_timeout(),
        )?)),
        None => {
            warn!("No OpenAI API key configured; realtime themes are composed offline");
            Ok(Arc::new(OfflineThemeGenerator))
        }
    }
}

const SYSTEM_PROMPT: &str = "You compose calm visual ambiances. Reply with a short poetic \
    phrase in English (at most twelve words), five harmonious hex colors ordered from darkest \
    to lightest, a gradient speed between 0.2 and 2.0, a softness between 0 and 1.5 and a \
    number of steps per color between 1 and 5.";

const USER_PROMPT: &str = "Create a new visual theme.";

fn theme_schema() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "visual_theme_response",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "phrase": { "type": "string" },
                    "colors": { "type": "array", "items": { "type": "string" } },
                    "speed": { "type": "number" },
                    "softness": { "type": "number" },
                    "stepsPerColor": { "type": "number" }
                },
                "required": ["phrase", "colors", "speed", "softness", "stepsPerColor"],
                "additionalProperties": false
            }
        }
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedTheme {
    phrase: String,
    colors: Vec<String>,
    speed: f64,
    softness: f64,
    steps_per_color: f64,
}

/// Turn a structured completion into a storable theme
///
/// Shader parameters are clamped; a missing phrase or a palette that is not
/// five hex colors is an upstream failure.
pub fn parse_generated(content: &str) -> Result<NewTheme> {
    let generated: GeneratedTheme = serde_json::from_str(content)
        .map_err(|e| Error::Upstream(format!("theme completion is not a theme: {}", e)))?;
    let params = AnimationParams::clamped(
        generated.speed,
        generated.softness,
        generated.steps_per_color,
    );

    let theme = NewTheme {
        phrase: generated.phrase.trim().to_string(),
        colors: generated.colors,
        speed: params.speed,
        softness: params.softness,
        steps_per_color: f64::from(params.steps_per_color),
        music_path: None,
    };
    theme
        .validate()
        .map_err(|e| Error::Upstream(format!("generated theme rejected: {}", e)))?;
    Ok(theme)
}

#[async_trait]
impl ThemeGenerator for OpenAiModel {
    async fn generate(&self) -> Result<NewTheme> {
        let content = self
            .chat(SYSTEM_PROMPT, USER_PROMPT, 300, 1.0, Some(theme_schema()))
            .await?
            .ok_or_else(|| Error::Upstream("empty theme completion".to_string()))?;
        let theme = parse_generated(&content)?;
        debug!(phrase = %theme.phrase, "Theme generated");
        Ok(theme)
    }
}

const OFFLINE_PHRASES: &[&str] = &[
    "Slow light over still water",
    "A quiet room remembers the rain",
    "Embers drifting into a violet dusk",
    "Fog folding over sleeping hills",
    "The hush before the first snow",
    "Moss and silver at the edge of morning",
];

/// Generator used without credentials
pub struct OfflineThemeGenerator;

impl OfflineThemeGenerator {
    fn compose<R: Rng>(rng: &mut R) -> NewTheme {
        let phrase = OFFLINE_PHRASES.choose(rng).copied().unwrap_or("Quiet light");

        // One base color ramped from dark to full brightness
        let base: [u8; 3] = [rng.gen(), rng.gen(), rng.gen()];
        let colors = (1..=5u8)
            .map(|step| {
                let scale = |channel: u8| (f64::from(channel) * f64::from(step) / 5.0) as u8;
                format!(
                    "#{:02x}{:02x}{:02x}",
                    scale(base[0]),
                    scale(base[1]),
                    scale(base[2])
                )
            })
            .collect();

        let params = AnimationParams::clamped(
            rng.gen_range(0.4..1.4),
            rng.gen_range(0.3..1.2),
            f64::from(rng.gen_range(2u8..=4)),
        );
        NewTheme {
            phrase: phrase.to_string(),
            colors,
            speed: params.speed,
            softness: params.softness,
            steps_per_color: f64::from(params.steps_per_color),
            music_path: None,
        }
    }
}

#[async_trait]
impl ThemeGenerator for OfflineThemeGenerator {
    async fn generate(&self) -> Result<NewTheme> {
        Ok(Self::compose(&mut rand::thread_rng()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clamps_parameters() {
        let content = r##"{
            "phrase": "  Lanterns over a slow river ",
            "colors": ["#101018", "#202838", "#404c68", "#8090b0", "#d0d8f0"],
            "speed": 7.5,
            "softness": -1,
            "stepsPerColor": 3.6
        }"##;
        let theme = parse_generated(content).unwrap();
        assert_eq!(theme.phrase, "Lanterns over a slow river");
        assert_eq!(theme.speed, 2.0);
        assert_eq!(theme.softness, 0.0);
        assert_eq!(theme.steps_per_color, 4.0);
        assert!(theme.music_path.is_none());
    }

    #[test]
    fn test_parse_rejects_bad_palette_and_prose() {
        let short = r##"{"phrase":"x","colors":["#000000"],"speed":1,
            "softness":1,"stepsPerColor":3}"##;
        assert!(matches!(parse_generated(short), Err(Error::Upstream(_))));
        assert!(matches!(
            parse_generated("Here is your theme!"),
            Err(Error::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_themes_are_valid() {
        let generator = OfflineThemeGenerator;
        for _ in 0..20 {
            let theme = generator.generate().await.unwrap();
            theme.validate().unwrap();
            assert!(OFFLINE_PHRASES.contains(&theme.phrase.as_str()));
            assert!((0.2..=2.0).contains(&theme.speed));
            assert!((1.0..=5.0).contains(&theme.steps_per_color));
        }
    }

    #[test]
    fn test_schema_names_every_field() {
        let schema = theme_schema();
        let required = schema["json_schema"]["schema"]["required"].as_array().unwrap();
        assert_eq!(required.len(), 5);
        assert_eq!(schema["json_schema"]["strict"], true);
    }
}
