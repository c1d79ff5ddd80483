//! Shared fixtures for sublime-sync integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sublime_common::events::SublimeEvent;
use sublime_common::theme::{PromptKind, PromptRequest, PromptResponse, ThemeResponse};
use sublime_common::Language;
use sublime_sync::audio::{AudioBackend, ClockBackend};
use sublime_sync::client::ContentService;
use sublime_sync::{Error, EventBus, PipelineHandle, Result, SharedState, SyncConfig, SyncPipeline};
use tokio::sync::{broadcast, mpsc};

/// Content service answering themes from a script
///
/// Translations echo the text prefixed with the target language code.
#[derive(Default)]
pub struct ScriptedService {
    themes: Mutex<VecDeque<Result<ThemeResponse>>>,
    requests: Mutex<Vec<(Language, Option<String>)>>,
    prompts: Mutex<Vec<PromptRequest>>,
}

impl ScriptedService {
    pub fn push(&self, response: Result<ThemeResponse>) {
        self.themes.lock().unwrap().push_back(response);
    }

    pub fn push_themes(&self, content_ids: &[&str]) {
        for id in content_ids {
            self.push(Ok(theme(id)));
        }
    }

    /// Theme requests received so far: (language, exclude)
    pub fn requests(&self) -> Vec<(Language, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<PromptRequest> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentService for ScriptedService {
    async fn fetch_theme(
        &self,
        language: Language,
        exclude: Option<&str>,
    ) -> Result<ThemeResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((language, exclude.map(str::to_string)));
        self.themes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Fetch("content service unavailable".to_string())))
    }

    async fn translate(&self, text: &str, target: Language) -> Result<String> {
        Ok(format!("[{}] {}", target.code(), text))
    }

    async fn process_prompt(&self, request: &PromptRequest) -> Result<PromptResponse> {
        self.prompts.lock().unwrap().push(request.clone());
        Ok(PromptResponse {
            kind: PromptKind::Text,
            content: format!("echo: {}", request.prompt),
            caption: None,
        })
    }
}

/// Cached theme with inline audio, so every bundle owns an object URL
pub fn theme(content_id: &str) -> ThemeResponse {
    ThemeResponse {
        phrase: format!("Phrase {}", content_id),
        colors: vec![
            "#0b1026".to_string(),
            "#1d2b53".to_string(),
            "#7e2553".to_string(),
            "#ff77a8".to_string(),
            "#ffccaa".to_string(),
        ],
        speed: 1.0,
        softness: 0.8,
        steps_per_color: 3.0,
        audio_url: None,
        audio_base64: Some(STANDARD.encode(content_id.as_bytes())),
        content_id: Some(content_id.to_string()),
        source: None,
    }
}

/// Config with short timings for paused-clock tests
pub fn test_config() -> SyncConfig {
    SyncConfig {
        track_duration_ms: 2_000,
        simulate: true,
        autoplay_unlocked: true,
        ..SyncConfig::default()
    }
}

pub struct TestPipeline {
    pub handle: PipelineHandle,
    pub service: Arc<ScriptedService>,
    pub backend: Arc<ClockBackend>,
    pub events: broadcast::Receiver<SublimeEvent>,
}

/// Spawn a pipeline on the simulated clock backend
pub fn start(config: &SyncConfig, service: Arc<ScriptedService>) -> TestPipeline {
    let state = Arc::new(SharedState::new(EventBus::default()));
    let events = state.events.subscribe();

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let backend = Arc::new(ClockBackend::new(config.track_duration(), signal_tx.clone()));
    if config.autoplay_unlocked {
        backend.unlock();
    }

    let handle = SyncPipeline::spawn(
        config,
        service.clone(),
        backend.clone() as Arc<dyn AudioBackend>,
        signal_tx,
        signal_rx,
        state,
    );

    TestPipeline {
        handle,
        service,
        backend,
        events,
    }
}

/// Let spawned tasks and timers run for `ms` of (paused) time
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Drain buffered events
pub fn drain(events: &mut broadcast::Receiver<SublimeEvent>) -> Vec<SublimeEvent> {
    let mut out = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => out.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return out,
        }
    }
}
