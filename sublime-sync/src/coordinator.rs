//! Playback coordinator
//!
//! Projects the current bundle into what the page shows: the phrase as it
//! is being typed out, the palette and shader parameters, and the text color.
//! It also owns the two playback gates. Audio only plays when the user has
//! not muted it and the intro gate is open; the intro gate opens after a
//! warm-up delay or on the first user gesture, whichever comes first.

use crate::audio::{AudioResourceManager, HandleId};
use crate::pipeline::PipelineMsg;
use crate::state::EventBus;
use crate::translation::PhraseUpdate;
use crate::typewriter::Typewriter;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use sublime_common::events::{GateOpenReason, SublimeEvent};
use sublime_common::theme::AnimationParams;
use sublime_common::{Language, Palette, TextColor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub intro_delay: Duration,
    pub palette_delay: Duration,
    pub typewriter_interval: Duration,
    pub loading_rotation: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            intro_delay: Duration::from_millis(4000),
            palette_delay: Duration::from_millis(400),
            typewriter_interval: Duration::from_millis(50),
            loading_rotation: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntroGate {
    Closed,
    Open(GateOpenReason),
}

/// What the page displays
#[derive(Debug, Clone, Serialize)]
pub struct UiState {
    pub bundle_id: Option<String>,
    pub phrase: Option<String>,
    pub displayed: String,
    pub phrase_language: Option<Language>,
    /// Phrase is in a right-to-left script
    pub rtl: bool,
    pub colors: Vec<String>,
    pub animation: AnimationParams,
    pub text_color: TextColor,
    pub loading_phrase: Option<String>,
    pub muted: bool,
    pub intro_open: bool,
}

impl Default for UiState {
    fn default() -> Self {
        let palette = Palette::default();
        Self {
            bundle_id: None,
            phrase: None,
            displayed: String::new(),
            phrase_language: None,
            rtl: false,
            colors: palette.to_hex(),
            animation: AnimationParams::default(),
            text_color: palette.text_color(),
            loading_phrase: None,
            muted: false,
            intro_open: false,
        }
    }
}

#[derive(Default)]
struct Timers {
    typewriter: Option<JoinHandle<()>>,
    palette: Option<JoinHandle<()>>,
    loading: Option<JoinHandle<()>>,
    intro: Option<JoinHandle<()>>,
}

impl Timers {
    fn abort_all(&mut self) {
        for task in [
            self.typewriter.take(),
            self.palette.take(),
            self.loading.take(),
            self.intro.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

pub struct Coordinator {
    config: CoordinatorConfig,
    audio: AudioResourceManager,
    events: EventBus,
    mailbox: mpsc::UnboundedSender<PipelineMsg>,
    ui: UiState,
    intro: IntroGate,
    language: Language,
    current_handle: Option<HandleId>,
    typewriter: Option<Typewriter>,
    held_phrase: Option<PhraseUpdate>,
    pending_palette: Option<(Palette, AnimationParams)>,
    loading_index: usize,
    typewriter_generation: u64,
    palette_generation: u64,
    loading_generation: u64,
    timers: Timers,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        audio: AudioResourceManager,
        events: EventBus,
        mailbox: mpsc::UnboundedSender<PipelineMsg>,
        language: Language,
    ) -> Self {
        Self {
            config,
            audio,
            events,
            mailbox,
            ui: UiState::default(),
            intro: IntroGate::Closed,
            language,
            current_handle: None,
            typewriter: None,
            held_phrase: None,
            pending_palette: None,
            loading_index: 0,
            typewriter_generation: 0,
            palette_generation: 0,
            loading_generation: 0,
            timers: Timers::default(),
        }
    }

    /// Arm the intro warm-up and start rotating loading phrases
    pub fn start(&mut self) {
        if self.intro != IntroGate::Closed || self.timers.intro.is_some() {
            return;
        }
        let delay = self.config.intro_delay;
        let mailbox = self.mailbox.clone();
        self.timers.intro = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = mailbox.send(PipelineMsg::IntroWarmUpElapsed);
        }));
        self.restart_loading();
    }

    /// Volume for new and existing elements
    pub fn target_volume(&self) -> f32 {
        if self.ui.muted {
            0.0
        } else {
            1.0
        }
    }

    pub fn gates_open(&self) -> bool {
        !self.ui.muted && self.intro_open()
    }

    pub fn intro_open(&self) -> bool {
        matches!(self.intro, IntroGate::Open(_))
    }

    /// A new element became current
    pub fn on_handle_promoted(&mut self, handle: HandleId) {
        self.current_handle = Some(handle);
        self.audio.set_volume(handle, self.target_volume());
        self.resume_if_allowed();
    }

    /// Display a phrase (held while the intro gate is closed)
    pub fn show_phrase(&mut self, update: PhraseUpdate) {
        if !self.intro_open() {
            debug!(bundle_id = ?update.bundle_id, "Phrase held until intro opens");
            self.held_phrase = Some(update);
            return;
        }
        self.events.emit(SublimeEvent::PhraseChanged {
            bundle_id: update.bundle_id.clone(),
            phrase: update.text.clone(),
            language: update.language,
            timestamp: Utc::now(),
        });
        self.display(update);
    }

    /// Replace the displayed phrase with its translation
    pub fn apply_translation(&mut self, update: PhraseUpdate) {
        self.events.emit(SublimeEvent::PhraseTranslated {
            bundle_id: update.bundle_id.clone(),
            language: update.language,
            phrase: update.text.clone(),
            timestamp: Utc::now(),
        });
        if !self.intro_open() {
            self.held_phrase = Some(update);
            return;
        }
        self.display(update);
    }

    /// Apply palette and animation after the palette delay
    pub fn schedule_palette(&mut self, palette: Palette, animation: AnimationParams) {
        if let Some(task) = self.timers.palette.take() {
            task.abort();
        }
        self.palette_generation += 1;
        self.pending_palette = Some((palette, animation));

        let generation = self.palette_generation;
        let delay = self.config.palette_delay;
        let mailbox = self.mailbox.clone();
        self.timers.palette = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = mailbox.send(PipelineMsg::PaletteApply { generation });
        }));
    }

    pub fn on_palette_apply(&mut self, generation: u64) {
        if generation != self.palette_generation {
            return;
        }
        self.timers.palette = None;
        let Some((palette, animation)) = self.pending_palette.take() else {
            return;
        };

        self.ui.colors = palette.to_hex();
        self.ui.animation = animation;
        self.ui.text_color = palette.text_color();
        self.events.emit(SublimeEvent::PaletteChanged {
            colors: self.ui.colors.clone(),
            speed: animation.speed,
            softness: animation.softness,
            steps_per_color: animation.steps_per_color,
            text_color: self.ui.text_color,
            timestamp: Utc::now(),
        });
    }

    pub fn on_typewriter_tick(&mut self, generation: u64) {
        if generation != self.typewriter_generation {
            return;
        }
        let Some(typewriter) = self.typewriter.as_mut() else {
            return;
        };
        if !typewriter.advance() {
            return;
        }

        self.ui.displayed = typewriter.revealed_text().to_string();
        let complete = typewriter.is_complete();
        self.events.emit(SublimeEvent::PhraseRevealed {
            text: self.ui.displayed.clone(),
            complete,
            timestamp: Utc::now(),
        });
        if complete {
            if let Some(task) = self.timers.typewriter.take() {
                task.abort();
            }
        }
    }

    pub fn on_loading_tick(&mut self, generation: u64) {
        if generation != self.loading_generation || self.intro_open() {
            return;
        }
        self.loading_index += 1;
        self.emit_loading_phrase();
    }

    /// Mute gate; muting pins volume to zero and never pauses
    pub fn set_muted(&mut self, muted: bool) {
        if self.ui.muted == muted {
            return;
        }
        self.ui.muted = muted;
        info!(muted, "Mute toggled");
        self.events.emit(SublimeEvent::MuteChanged {
            muted,
            timestamp: Utc::now(),
        });

        if let Some(handle) = self.current_handle {
            self.audio.set_volume(handle, self.target_volume());
        }
        self.resume_if_allowed();
    }

    /// First user interaction: lift autoplay restrictions and open the intro
    ///
    /// A browser may have refused an earlier play request without telling
    /// us, so the current element is asked to play again even when it is
    /// recorded as playing.
    pub fn user_gesture(&mut self) {
        self.audio.unlock();
        if self.open_intro(GateOpenReason::UserGesture) {
            return;
        }
        if let Some(handle) = self.current_handle {
            if self.gates_open() {
                self.audio.play(handle);
            }
        }
    }

    pub fn on_intro_warm_up(&mut self) {
        self.timers.intro = None;
        self.open_intro(GateOpenReason::WarmUpElapsed);
    }

    /// Open the intro gate; false if it was already open
    pub fn open_intro(&mut self, reason: GateOpenReason) -> bool {
        if self.intro_open() {
            return false;
        }
        self.intro = IntroGate::Open(reason);
        if let Some(task) = self.timers.intro.take() {
            task.abort();
        }
        if let Some(task) = self.timers.loading.take() {
            task.abort();
        }
        self.loading_generation += 1;
        self.ui.loading_phrase = None;
        self.ui.intro_open = true;

        info!(?reason, "Intro gate opened");
        self.events.emit(SublimeEvent::IntroGateOpened {
            reason,
            timestamp: Utc::now(),
        });

        if let Some(update) = self.held_phrase.take() {
            self.show_phrase(update);
        }
        self.resume_if_allowed();
        true
    }

    /// Language used for loading phrases
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
        if !self.intro_open() {
            self.restart_loading();
        }
    }

    pub fn teardown(&mut self) {
        self.timers.abort_all();
        self.typewriter_generation += 1;
        self.palette_generation += 1;
        self.loading_generation += 1;
        self.current_handle = None;
        self.pending_palette = None;
        self.held_phrase = None;
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn current_handle(&self) -> Option<HandleId> {
        self.current_handle
    }

    fn resume_if_allowed(&self) {
        if let Some(handle) = self.current_handle {
            if self.gates_open() && !self.audio.is_playing(handle) {
                self.audio.play(handle);
            }
        }
    }

    fn display(&mut self, update: PhraseUpdate) {
        self.ui.bundle_id = update.bundle_id;
        self.ui.phrase_language = Some(update.language);
        self.ui.rtl = update.language.is_rtl();
        self.ui.displayed.clear();
        self.typewriter = Some(Typewriter::new(update.text.clone()));
        self.ui.phrase = Some(update.text);

        if let Some(task) = self.timers.typewriter.take() {
            task.abort();
        }
        self.typewriter_generation += 1;
        let generation = self.typewriter_generation;
        let interval = self.config.typewriter_interval;
        let mailbox = self.mailbox.clone();
        self.timers.typewriter = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if mailbox
                    .send(PipelineMsg::TypewriterTick { generation })
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    fn restart_loading(&mut self) {
        if let Some(task) = self.timers.loading.take() {
            task.abort();
        }
        self.loading_generation += 1;
        self.loading_index = 0;
        self.emit_loading_phrase();

        let generation = self.loading_generation;
        let interval = self.config.loading_rotation;
        let mailbox = self.mailbox.clone();
        self.timers.loading = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if mailbox
                    .send(PipelineMsg::LoadingTick { generation })
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    fn emit_loading_phrase(&mut self) {
        let phrases = self.language.loading_phrases();
        if phrases.is_empty() {
            return;
        }
        let phrase = phrases[self.loading_index % phrases.len()].to_string();
        self.ui.loading_phrase = Some(phrase.clone());
        self.events.emit(SublimeEvent::LoadingPhrase {
            phrase,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioBackend, AudioSource, BroadcastBackend, ClockBackend, ObjectUrlStore};
    use std::sync::Arc;
    use sublime_common::FadeCurve;

    struct Harness {
        coordinator: Coordinator,
        rx: mpsc::UnboundedReceiver<PipelineMsg>,
        audio: AudioResourceManager,
    }

    fn harness() -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let (signal_tx, _signal_rx) = mpsc::unbounded_channel();
        let backend = Arc::new(ClockBackend::new(Duration::from_secs(30), signal_tx));
        backend.unlock();
        let audio = manager(backend);
        let coordinator = Coordinator::new(
            CoordinatorConfig::default(),
            audio.clone(),
            EventBus::new(256),
            tx,
            Language::En,
        );
        Harness {
            coordinator,
            rx,
            audio,
        }
    }

    fn manager(backend: Arc<dyn AudioBackend>) -> AudioResourceManager {
        AudioResourceManager::new(backend, Arc::new(ObjectUrlStore::new()), FadeCurve::Linear)
    }

    fn element(audio: &AudioResourceManager) -> HandleId {
        audio
            .create_playable(&AudioSource::Remote("https://cdn.example/a.mp3".into()), 1.0)
            .unwrap()
    }

    fn update(text: &str) -> PhraseUpdate {
        PhraseUpdate {
            bundle_id: Some("bundle-1-0".to_string()),
            text: text.to_string(),
            language: Language::En,
        }
    }

    /// **Given** a promoted element
    /// **When** only one of the two gates is open
    /// **Then** nothing plays; opening both starts playback
    #[tokio::test]
    async fn test_gate_conjunction() {
        let mut h = harness();
        let handle = element(&h.audio);

        h.coordinator.set_muted(true);
        h.coordinator.on_handle_promoted(handle);
        assert!(!h.audio.is_playing(handle));

        // Intro open, still muted
        h.coordinator.open_intro(GateOpenReason::UserGesture);
        assert!(!h.audio.is_playing(handle));
        assert_eq!(h.audio.volume(handle), Some(0.0));

        h.coordinator.set_muted(false);
        assert!(h.audio.is_playing(handle));
        assert_eq!(h.audio.volume(handle), Some(1.0));
    }

    #[tokio::test]
    async fn test_unmute_alone_does_not_play_before_intro() {
        let mut h = harness();
        let handle = element(&h.audio);
        h.coordinator.set_muted(true);
        h.coordinator.on_handle_promoted(handle);

        h.coordinator.set_muted(false);
        assert!(!h.audio.is_playing(handle));
        assert!(!h.coordinator.gates_open());
    }

    #[tokio::test]
    async fn test_mute_keeps_playing_at_zero_volume() {
        let mut h = harness();
        let handle = element(&h.audio);
        h.coordinator.open_intro(GateOpenReason::WarmUpElapsed);
        h.coordinator.on_handle_promoted(handle);
        assert!(h.audio.is_playing(handle));

        h.coordinator.set_muted(true);
        assert!(h.audio.is_playing(handle));
        assert_eq!(h.audio.volume(handle), Some(0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_intro_opens_after_warm_up() {
        let mut h = harness();
        h.coordinator.start();
        assert!(h.coordinator.ui().loading_phrase.is_some());

        loop {
            match h.rx.recv().await.unwrap() {
                PipelineMsg::IntroWarmUpElapsed => break,
                PipelineMsg::LoadingTick { generation } => {
                    h.coordinator.on_loading_tick(generation)
                }
                _ => {}
            }
        }
        h.coordinator.on_intro_warm_up();
        assert!(h.coordinator.intro_open());
        assert!(h.coordinator.ui().loading_phrase.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_phrase_held_until_intro_then_typed() {
        let mut h = harness();
        h.coordinator.show_phrase(update("été"));
        assert_eq!(h.coordinator.ui().phrase, None);

        h.coordinator.user_gesture();
        assert_eq!(h.coordinator.ui().phrase.as_deref(), Some("été"));
        assert_eq!(h.coordinator.ui().displayed, "");

        loop {
            if let PipelineMsg::TypewriterTick { generation } = h.rx.recv().await.unwrap() {
                h.coordinator.on_typewriter_tick(generation);
                if h.coordinator.ui().displayed == "été" {
                    break;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_arabic_phrase_marks_rtl() {
        let mut h = harness();
        h.coordinator.user_gesture();
        h.coordinator.show_phrase(PhraseUpdate {
            language: Language::Ar,
            ..update("هدوء المساء")
        });
        assert!(h.coordinator.ui().rtl);

        h.coordinator.apply_translation(update("Evening calm"));
        assert!(!h.coordinator.ui().rtl);
    }

    /// **Given** a phrase update
    /// **When** the palette is scheduled alongside it
    /// **Then** the palette applies only after the delay, and a newer palette supersedes it
    #[tokio::test(start_paused = true)]
    async fn test_palette_follows_phrase_after_delay() {
        let mut h = harness();
        let dark = Palette::parse(&["#000000"; 5]).unwrap();
        let light = Palette::parse(&["#ffffff"; 5]).unwrap();

        h.coordinator.schedule_palette(dark, AnimationParams::default());
        h.coordinator.schedule_palette(light, AnimationParams::default());
        assert_eq!(h.coordinator.ui().text_color, Palette::default().text_color());

        let generation = loop {
            if let PipelineMsg::PaletteApply { generation } = h.rx.recv().await.unwrap() {
                break generation;
            }
        };
        h.coordinator.on_palette_apply(generation);
        assert_eq!(h.coordinator.ui().text_color, TextColor::Black);
        assert_eq!(h.coordinator.ui().colors[0], "#ffffff");

        // The superseded generation is ignored
        h.coordinator.on_palette_apply(generation - 1);
        assert_eq!(h.coordinator.ui().text_color, TextColor::Black);
    }

    #[tokio::test]
    async fn test_gesture_retries_rejected_playback() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (signal_tx, _signal_rx) = mpsc::unbounded_channel();
        let audio = manager(Arc::new(ClockBackend::new(Duration::from_secs(30), signal_tx)));
        let mut coordinator = Coordinator::new(
            CoordinatorConfig::default(),
            audio.clone(),
            EventBus::new(16),
            tx,
            Language::En,
        );

        let handle = element(&audio);
        coordinator.open_intro(GateOpenReason::WarmUpElapsed);
        coordinator.on_handle_promoted(handle);
        assert!(!audio.is_playing(handle), "locked backend rejects autoplay");

        coordinator.user_gesture();
        assert!(audio.is_playing(handle));
    }

    fn play_requests(rx: &mut tokio::sync::broadcast::Receiver<SublimeEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SublimeEvent::AudioPlayRequested { .. }) {
                count += 1;
            }
        }
        count
    }

    /// **Given** browser-rendered audio whose first play request was refused
    /// **When** the user interacts with the page after the warm-up opened the intro
    /// **Then** play is requested again for the current element
    #[tokio::test]
    async fn test_gesture_replays_after_browser_refusal() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let events = EventBus::new(64);
        let mut client = events.subscribe();
        let audio = manager(Arc::new(BroadcastBackend::new(
            events.clone(),
            "http://127.0.0.1:5760",
        )));
        let mut coordinator = Coordinator::new(
            CoordinatorConfig::default(),
            audio.clone(),
            events,
            tx,
            Language::En,
        );

        let handle = element(&audio);
        coordinator.open_intro(GateOpenReason::WarmUpElapsed);
        coordinator.on_handle_promoted(handle);
        assert_eq!(play_requests(&mut client), 1);

        // Nothing reported the refusal; the element still looks like it plays
        assert!(audio.is_playing(handle));
        coordinator.user_gesture();
        assert!(play_requests(&mut client) >= 1);

        // After an explicit refusal report the next gesture plays it again too
        audio.mark_stopped(handle);
        coordinator.user_gesture();
        assert_eq!(play_requests(&mut client), 1);
        assert!(audio.is_playing(handle));
    }

    #[tokio::test]
    async fn test_gesture_while_muted_requests_nothing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let events = EventBus::new(64);
        let mut client = events.subscribe();
        let audio = manager(Arc::new(BroadcastBackend::new(events.clone(), "http://localhost")));
        let mut coordinator = Coordinator::new(
            CoordinatorConfig::default(),
            audio.clone(),
            events,
            tx,
            Language::En,
        );

        let handle = element(&audio);
        coordinator.set_muted(true);
        coordinator.open_intro(GateOpenReason::WarmUpElapsed);
        coordinator.on_handle_promoted(handle);
        coordinator.user_gesture();
        assert_eq!(play_requests(&mut client), 0);
    }
}
