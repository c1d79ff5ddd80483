//! Wire schemas exchanged with the content service
//!
//! Field names follow the JSON contract consumed by the web front-end
//! (`camelCase`). Responses are parsed into these types at the boundary;
//! anything that does not fit is rejected rather than trusted.

use crate::Language;
use serde::{Deserialize, Serialize};

/// Where the content service obtained a theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeSource {
    /// Served from the pre-generated store (carries a content id)
    Cache,
    /// Generated for this request
    Realtime,
}

/// `GET /theme?lang=..&exclude=..&realtime=..` response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeResponse {
    pub phrase: String,
    pub colors: Vec<String>,
    pub speed: f64,
    pub softness: f64,
    pub steps_per_color: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, alias = "audioInlineBytes", skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ThemeSource>,
}

/// Query parameters of the theme endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThemeQuery {
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub exclude: Option<String>,
    /// Ask for a freshly generated theme
    #[serde(default)]
    pub realtime: Option<bool>,
}

/// Shader animation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationParams {
    pub speed: f64,
    pub softness: f64,
    pub steps_per_color: u8,
}

impl AnimationParams {
    pub const SPEED_RANGE: (f64, f64) = (0.2, 2.0);
    pub const SOFTNESS_RANGE: (f64, f64) = (0.0, 1.5);
    pub const STEPS_RANGE: (u8, u8) = (1, 5);

    /// Build parameters clamped to the renderer's documented ranges
    ///
    /// Non-finite inputs fall back to the defaults.
    pub fn clamped(speed: f64, softness: f64, steps_per_color: f64) -> Self {
        let defaults = Self::default();
        let clamp = |v: f64, (lo, hi): (f64, f64), fallback: f64| {
            if v.is_finite() {
                v.clamp(lo, hi)
            } else {
                fallback
            }
        };

        let (steps_lo, steps_hi) = Self::STEPS_RANGE;
        let steps = clamp(
            steps_per_color.round(),
            (f64::from(steps_lo), f64::from(steps_hi)),
            f64::from(defaults.steps_per_color),
        ) as u8;

        Self {
            speed: clamp(speed, Self::SPEED_RANGE, defaults.speed),
            softness: clamp(softness, Self::SOFTNESS_RANGE, defaults.softness),
            steps_per_color: steps,
        }
    }
}

impl Default for AnimationParams {
    fn default() -> Self {
        Self {
            speed: 1.0,
            softness: 1.0,
            steps_per_color: 3,
        }
    }
}

/// `POST /translate` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: String,
    pub target_lang: Language,
}

/// `POST /translate` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translated: String,
}

/// Kind of content returned by the prompt-routing service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    Text,
    Audio,
    Image,
    Video,
}

/// `POST /process-prompt` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    pub prompt: String,
    pub language: Language,
    #[serde(default)]
    pub current_audio: Option<String>,
}

/// `POST /process-prompt` JSON response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptResponse {
    #[serde(rename = "type")]
    pub kind: PromptKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Error body returned by every Sublime HTTP service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
