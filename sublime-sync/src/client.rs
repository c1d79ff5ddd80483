//! Content service client
//!
//! The pipeline only depends on the [`ContentService`] trait; the HTTP
//! implementation talks to `sublime-content` (or any service honouring the
//! same JSON contract).

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use sublime_common::theme::{
    PromptKind, PromptRequest, PromptResponse, ThemeResponse, TranslateRequest, TranslateResponse,
};
use sublime_common::Language;
use tracing::debug;

const USER_AGENT: &str = concat!("sublime-sync/", env!("CARGO_PKG_VERSION"));

/// Operations the pipeline needs from the content service
#[async_trait]
pub trait ContentService: Send + Sync {
    /// One theme in `language`, avoiding `exclude` when given
    async fn fetch_theme(&self, language: Language, exclude: Option<&str>) -> Result<ThemeResponse>;

    /// Translate `text` into `target`
    async fn translate(&self, text: &str, target: Language) -> Result<String>;

    /// Route a free-form user prompt
    async fn process_prompt(&self, request: &PromptRequest) -> Result<PromptResponse>;
}

/// [`ContentService`] over HTTP
pub struct HttpContentService {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpContentService {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:5761/api`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Fetch(format!("HTTP {}: {}", status.as_u16(), body.trim())))
    }
}

#[async_trait]
impl ContentService for HttpContentService {
    async fn fetch_theme(
        &self,
        language: Language,
        exclude: Option<&str>,
    ) -> Result<ThemeResponse> {
        let url = format!("{}/theme", self.base_url);
        let mut query = vec![("lang", language.code())];
        if let Some(id) = exclude {
            query.push(("exclude", id));
        }

        debug!(url = %url, lang = %language, exclude = ?exclude, "Requesting theme");

        let response = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let response = Self::checked(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| Error::Decode(format!("theme response: {}", e)))
    }

    async fn translate(&self, text: &str, target: Language) -> Result<String> {
        let url = format!("{}/translate", self.base_url);
        let request = TranslateRequest {
            text: text.to_string(),
            target_lang: target,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Translation(e.to_string()))?;
        let response = Self::checked(response)
            .await
            .map_err(|e| Error::Translation(e.to_string()))?;

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| Error::Translation(format!("translate response: {}", e)))?;
        Ok(body.translated)
    }

    async fn process_prompt(&self, request: &PromptRequest) -> Result<PromptResponse> {
        let url = format!("{}/process-prompt", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let response = Self::checked(response).await?;

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        let body = response
            .text()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        if is_json {
            serde_json::from_str(&body)
                .map_err(|e| Error::Decode(format!("prompt response: {}", e)))
        } else {
            // Streamed plain-text answer
            Ok(PromptResponse {
                kind: PromptKind::Text,
                content: body,
                caption: None,
            })
        }
    }
}
