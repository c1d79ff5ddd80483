//! Prompt routing
//!
//! Visitor prompts are classified by keyword (English and French) into
//! video, image, audio or text. Media kinds answer with configured content;
//! text goes to the language model.

use crate::config::ContentConfig;
use crate::error::{Error, Result};
use crate::model::TextModel;
use rand::seq::SliceRandom;
use sublime_common::theme::{PromptKind, PromptRequest, PromptResponse};
use sublime_common::Language;
use tracing::{debug, info};

const VIDEO_KEYWORDS: &[&str] = &["video", "film", "showreel", "movie"];
const IMAGE_KEYWORDS: &[&str] = &["image", "photo", "visuel", "picture", "drawing"];
const AUDIO_KEYWORDS: &[&str] = &["son", "musique", "audio", "sound", "music", "track"];

/// Classify a prompt; the first matching kind in video, image, audio order wins
pub fn detect_kind(prompt: &str) -> PromptKind {
    let prompt = prompt.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| prompt.contains(k));

    if matches(VIDEO_KEYWORDS) {
        PromptKind::Video
    } else if matches(IMAGE_KEYWORDS) {
        PromptKind::Image
    } else if matches(AUDIO_KEYWORDS) {
        PromptKind::Audio
    } else {
        PromptKind::Text
    }
}

pub struct PromptRouter {
    sounds: Vec<String>,
    video_url: String,
    image_url: String,
}

impl PromptRouter {
    pub fn new(sounds: Vec<String>, video_url: String, image_url: String) -> Self {
        Self {
            sounds,
            video_url,
            image_url,
        }
    }

    pub fn from_config(config: &ContentConfig) -> Self {
        Self::new(
            config.sounds.clone(),
            config.video_url.clone(),
            config.image_url.clone(),
        )
    }

    /// Pick a sound other than the one playing
    ///
    /// Falls back to the full list if every sound matches `current`.
    pub fn pick_sound(&self, current: Option<&str>) -> Option<String> {
        let others: Vec<&String> = match current.filter(|c| !c.is_empty()) {
            Some(current) => self
                .sounds
                .iter()
                .filter(|sound| !current.ends_with(sound.as_str()))
                .collect(),
            None => self.sounds.iter().collect(),
        };
        let pool: Vec<&String> = if others.is_empty() {
            self.sounds.iter().collect()
        } else {
            others
        };
        pool.choose(&mut rand::thread_rng()).map(|s| s.to_string())
    }

    pub async fn route(
        &self,
        request: &PromptRequest,
        model: &dyn TextModel,
    ) -> Result<PromptResponse> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(Error::BadRequest("prompt must not be empty".to_string()));
        }

        let kind = detect_kind(prompt);
        info!(?kind, language = %request.language, "Routing prompt");
        let french = request.language == Language::Fr;

        let response = match kind {
            PromptKind::Audio => {
                let content = self
                    .pick_sound(request.current_audio.as_deref())
                    .ok_or_else(|| Error::Unavailable("no sounds configured".to_string()))?;
                debug!(sound = %content, "Sound picked");
                PromptResponse {
                    kind,
                    content,
                    caption: Some(
                        if french {
                            "Voici une nouvelle ambiance sonore."
                        } else {
                            "Here is a new soundscape."
                        }
                        .to_string(),
                    ),
                }
            }
            PromptKind::Video => PromptResponse {
                kind,
                content: self.video_url.clone(),
                caption: None,
            },
            PromptKind::Image => PromptResponse {
                kind,
                content: self.image_url.clone(),
                caption: Some(
                    if french {
                        "Un concept visuel généré pour vous."
                    } else {
                        "A visual concept generated for you."
                    }
                    .to_string(),
                ),
            },
            PromptKind::Text => PromptResponse {
                kind,
                content: model.reply(system_prompt(request.language), prompt).await?,
                caption: None,
            },
        };
        Ok(response)
    }
}

fn system_prompt(language: Language) -> &'static str {
    match language {
        Language::Fr => {
            "Tu es l'IA de Sublime Agency, un studio créatif spécialisé en IA et \
             expériences digitales. Réponds de manière créative et concise."
        }
        _ => {
            "You are Sublime Agency's AI, a creative studio specialized in AI and \
             digital experiences. Respond creatively and concisely."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OfflineModel;

    fn router() -> PromptRouter {
        PromptRouter::new(
            vec!["/sounds/01.mp3".into(), "/sounds/02.mp3".into()],
            "https://video.example/embed".into(),
            "/pattern.svg".into(),
        )
    }

    fn request(prompt: &str, language: Language, current_audio: Option<&str>) -> PromptRequest {
        PromptRequest {
            prompt: prompt.to_string(),
            language,
            current_audio: current_audio.map(str::to_string),
        }
    }

    #[test]
    fn test_detect_kind_keywords() {
        assert_eq!(detect_kind("Show me your SHOWREEL"), PromptKind::Video);
        assert_eq!(detect_kind("un visuel pour ma marque"), PromptKind::Image);
        assert_eq!(detect_kind("change la musique"), PromptKind::Audio);
        assert_eq!(detect_kind("who are you?"), PromptKind::Text);
        // Video wins over audio
        assert_eq!(detect_kind("a movie with music"), PromptKind::Video);
    }

    #[test]
    fn test_pick_sound_avoids_current() {
        let router = router();
        for _ in 0..20 {
            let sound = router
                .pick_sound(Some("https://site.example/sounds/01.mp3"))
                .unwrap();
            assert_eq!(sound, "/sounds/02.mp3");
        }
    }

    #[test]
    fn test_pick_sound_falls_back_to_full_list() {
        let router = PromptRouter::new(vec!["/sounds/01.mp3".into()], String::new(), String::new());
        assert_eq!(
            router.pick_sound(Some("/sounds/01.mp3")).as_deref(),
            Some("/sounds/01.mp3")
        );
        assert!(router.pick_sound(Some("")).is_some());
    }

    #[tokio::test]
    async fn test_route_media_and_text() {
        let router = router();
        let model = OfflineModel;

        let audio = router
            .route(&request("play a new sound", Language::Fr, None), &model)
            .await
            .unwrap();
        assert_eq!(audio.kind, PromptKind::Audio);
        assert_eq!(audio.caption.as_deref(), Some("Voici une nouvelle ambiance sonore."));

        let video = router
            .route(&request("your latest film", Language::En, None), &model)
            .await
            .unwrap();
        assert_eq!(video.content, "https://video.example/embed");
        assert!(video.caption.is_none());

        let text = router
            .route(&request("what do you do?", Language::En, None), &model)
            .await
            .unwrap();
        assert_eq!(text.kind, PromptKind::Text);
        assert_eq!(text.content, "what do you do?");
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let result = router()
            .route(&request("   ", Language::En, None), &OfflineModel)
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }
}
