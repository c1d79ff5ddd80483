//! Language model access for translation and text replies
//!
//! [`OpenAiModel`] talks to any OpenAI-compatible chat-completions endpoint.
//! [`OfflineModel`] stands in when no API key is configured: translations
//! return the text unchanged and replies echo the prompt.

use crate::config::ContentConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sublime_common::Language;
use tracing::{debug, warn};

#[async_trait]
pub trait TextModel: Send + Sync {
    /// Translate a short poetic phrase, keeping its tone
    async fn translate(&self, text: &str, target: Language) -> Result<String>;

    /// Free-form answer to a visitor prompt
    async fn reply(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Build the model for `config`
pub fn from_config(config: &ContentConfig) -> Result<Arc<dyn TextModel>> {
    match &config.openai_api_key {
        Some(key) => Ok(Arc::new(OpenAiModel::new(
            &config.openai_base_url,
            key,
            &config.openai_model,
            config.request_timeout(),
        )?)),
        None => {
            warn!("No OpenAI API key configured; translations are disabled");
            Ok(Arc::new(OfflineModel))
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct OpenAiModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiModel {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Option<String>> {
        self.chat(system, user, max_tokens, temperature, None).await
    }

    /// One chat completion; `response_format` requests structured output
    pub(crate) async fn chat(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
        response_format: Option<serde_json::Value>,
    ) -> Result<Option<String>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature,
            response_format,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("chat completion request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "chat completion returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("chat completion body: {}", e)))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty()))
    }
}

#[async_trait]
impl TextModel for OpenAiModel {
    async fn translate(&self, text: &str, target: Language) -> Result<String> {
        let system = format!(
            "You are a translator. Translate the following poetic phrase to {}. \
             Keep the same tone and style. Return ONLY the translation, nothing else.",
            target.english_name()
        );
        let translated = self.complete(&system, text, 200, 0.3).await?;
        debug!(target = %target, "Phrase translated");
        // An empty completion keeps the source text
        Ok(translated.unwrap_or_else(|| text.to_string()))
    }

    async fn reply(&self, system: &str, prompt: &str) -> Result<String> {
        self.complete(system, prompt, 400, 0.7)
            .await?
            .ok_or_else(|| Error::Upstream("empty completion".to_string()))
    }
}

/// Model used without credentials
pub struct OfflineModel;

#[async_trait]
impl TextModel for OfflineModel {
    async fn translate(&self, text: &str, _target: Language) -> Result<String> {
        Ok(text.to_string())
    }

    async fn reply(&self, _system: &str, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_model_is_identity() {
        let model = OfflineModel;
        assert_eq!(
            model.translate("Quiet tide", Language::Ko).await.unwrap(),
            "Quiet tide"
        );
        assert_eq!(model.reply("system", "hello").await.unwrap(), "hello");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let model = OpenAiModel::new(
            "https://llm.example/v1/",
            "key",
            "gpt-4o-mini",
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(model.endpoint, "https://llm.example/v1/chat/completions");
    }

    #[test]
    fn test_config_without_key_uses_offline_model() {
        let config = ContentConfig {
            openai_api_key: None,
            ..ContentConfig::default()
        };
        assert!(from_config(&config).is_ok());
    }

    #[test]
    fn test_response_format_omitted_unless_requested() {
        let mut request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![],
            max_tokens: 10,
            temperature: 0.3,
            response_format: None,
        };
        let plain = serde_json::to_value(&request).unwrap();
        assert!(plain.get("response_format").is_none());

        request.response_format = Some(serde_json::json!({ "type": "json_object" }));
        let structured = serde_json::to_value(&request).unwrap();
        assert_eq!(structured["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_chat_response_parses() {
        let body =
            r#"{"choices":[{"message":{"role":"assistant","content":"  Marée calme \n"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref().map(str::trim),
            Some("Marée calme")
        );
    }
}
