//! Pipeline actor
//!
//! A single tokio task owns the scheduler, the coordinator, the translation
//! adapter and (through them) the audio resource manager. Everything that
//! can change playback arrives as a message: commands from the HTTP API,
//! results of spawned fetches and translations, timer ticks, and
//! end-of-playback signals from the audio backend. Handlers run one at a
//! time, so no two of them ever observe each other half-done.
//!
//! After each message the actor publishes a fresh [`PipelineSnapshot`] to
//! the shared state for status queries.

use crate::audio::{AudioBackend, AudioResourceManager, AudioSignal, HandleId};
use crate::bundle::ThemeBundle;
use crate::client::ContentService;
use crate::config::SyncConfig;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::fetcher::BundleFetcher;
use crate::scheduler::{PlaybackContext, Promoted, Scheduler};
use crate::state::{PipelineSnapshot, SharedState};
use crate::translation::{PhraseDecision, PhraseUpdate, TranslationAdapter, TranslationRequest};
use chrono::Utc;
use std::sync::Arc;
use sublime_common::events::{SchedulerState, Slot, SublimeEvent};
use sublime_common::Language;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Messages handled by the pipeline actor
pub enum PipelineMsg {
    // Commands
    Enable {
        reply: oneshot::Sender<Result<()>>,
    },
    Disable {
        reply: oneshot::Sender<()>,
    },
    Skip {
        reply: oneshot::Sender<Result<bool>>,
    },
    SetMuted {
        muted: bool,
        reply: oneshot::Sender<()>,
    },
    UserGesture {
        reply: oneshot::Sender<()>,
    },
    SetLanguage {
        language: Language,
        reply: oneshot::Sender<()>,
    },

    // Results of spawned work
    FetchCompleted {
        slot: Slot,
        generation: u64,
        attempt: u32,
        result: Box<Result<ThemeBundle>>,
    },
    TranslationCompleted {
        request: TranslationRequest,
        result: Result<String>,
    },

    // Timers
    RetryNextFetch {
        generation: u64,
        attempt: u32,
    },
    PollTick {
        generation: u64,
    },
    TypewriterTick {
        generation: u64,
    },
    PaletteApply {
        generation: u64,
    },
    LoadingTick {
        generation: u64,
    },
    IntroWarmUpElapsed,
    LanguageLockExpired {
        generation: u64,
    },
}

pub struct SyncPipeline {
    scheduler: Scheduler,
    coordinator: Coordinator,
    translator: TranslationAdapter,
    service: Arc<dyn ContentService>,
    state: Arc<SharedState>,
    mailbox: mpsc::UnboundedSender<PipelineMsg>,
    rx: mpsc::UnboundedReceiver<PipelineMsg>,
    signals: mpsc::UnboundedReceiver<AudioSignal>,
    started: bool,
}

impl SyncPipeline {
    /// Build the pipeline and run it on its own task
    ///
    /// `signal_tx` must be the sender the backend was built with; the
    /// returned handle uses it to forward ended and rejected reports from
    /// HTTP clients.
    pub fn spawn(
        config: &SyncConfig,
        service: Arc<dyn ContentService>,
        backend: Arc<dyn AudioBackend>,
        signal_tx: mpsc::UnboundedSender<AudioSignal>,
        signal_rx: mpsc::UnboundedReceiver<AudioSignal>,
        state: Arc<SharedState>,
    ) -> PipelineHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = state.events.clone();

        let audio =
            AudioResourceManager::new(backend, state.object_urls.clone(), config.fade_curve);
        let fetcher = BundleFetcher::new(
            service.clone(),
            state.object_urls.clone(),
            state.api_calls.clone(),
            events.clone(),
        );
        let scheduler = Scheduler::new(
            fetcher,
            audio.clone(),
            tx.clone(),
            events.clone(),
            config.scheduler_config(),
        );
        let coordinator = Coordinator::new(
            config.coordinator_config(),
            audio,
            events,
            tx.clone(),
            config.language,
        );
        let translator = TranslationAdapter::new(
            config.language,
            std::time::Duration::from_millis(config.language_lock_ms),
            tx.clone(),
        );

        let pipeline = SyncPipeline {
            scheduler,
            coordinator,
            translator,
            service,
            state: state.clone(),
            mailbox: tx.clone(),
            rx,
            signals: signal_rx,
            started: false,
        };
        let task = tokio::spawn(pipeline.run());

        PipelineHandle {
            tx,
            signal_tx,
            state,
            task: Arc::new(task),
        }
    }

    async fn run(mut self) {
        info!("Sync pipeline started");
        self.publish().await;

        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(msg) => self.handle(msg),
                    None => break,
                },
                Some(signal) = self.signals.recv() => self.on_signal(signal),
            }
            self.publish().await;
        }

        self.teardown();
        info!("Sync pipeline stopped");
    }

    fn ctx(&self) -> PlaybackContext {
        PlaybackContext {
            language: self.translator.language(),
            volume: self.coordinator.target_volume(),
        }
    }

    fn handle(&mut self, msg: PipelineMsg) {
        let ctx = self.ctx();
        match msg {
            PipelineMsg::Enable { reply } => {
                if !self.started && self.scheduler.state() != SchedulerState::Disposed {
                    self.started = true;
                    self.coordinator.start();
                }
                let _ = reply.send(self.scheduler.enable(&ctx));
            }
            PipelineMsg::Disable { reply } => {
                self.teardown();
                let _ = reply.send(());
            }
            PipelineMsg::Skip { reply } => {
                let result = self.scheduler.skip(&ctx).map(|promoted| match promoted {
                    Some(promoted) => {
                        self.after_promotion(promoted);
                        true
                    }
                    None => false,
                });
                let _ = reply.send(result);
            }
            PipelineMsg::SetMuted { muted, reply } => {
                self.coordinator.set_muted(muted);
                let _ = reply.send(());
            }
            PipelineMsg::UserGesture { reply } => {
                self.coordinator.user_gesture();
                let _ = reply.send(());
            }
            PipelineMsg::SetLanguage { language, reply } => {
                self.set_language(language);
                let _ = reply.send(());
            }
            PipelineMsg::FetchCompleted {
                slot,
                generation,
                attempt,
                result,
            } => {
                if let Some(promoted) =
                    self.scheduler
                        .on_fetch_completed(slot, generation, attempt, *result, &ctx)
                {
                    self.after_promotion(promoted);
                }
            }
            PipelineMsg::TranslationCompleted { request, result } => {
                let current = self.scheduler.current_bundle().map(|b| b.id.to_string());
                if let Some(update) =
                    self.translator
                        .on_translation_completed(&request, result, current.as_deref())
                {
                    self.coordinator.apply_translation(update);
                }
            }
            PipelineMsg::RetryNextFetch { generation, attempt } => {
                self.scheduler.on_retry(generation, attempt, &ctx);
            }
            PipelineMsg::PollTick { generation } => {
                if let Some(promoted) = self.scheduler.on_poll_tick(generation, &ctx) {
                    self.after_promotion(promoted);
                }
            }
            PipelineMsg::TypewriterTick { generation } => {
                self.coordinator.on_typewriter_tick(generation);
            }
            PipelineMsg::PaletteApply { generation } => {
                self.coordinator.on_palette_apply(generation);
            }
            PipelineMsg::LoadingTick { generation } => {
                self.coordinator.on_loading_tick(generation);
            }
            PipelineMsg::IntroWarmUpElapsed => {
                self.coordinator.on_intro_warm_up();
            }
            PipelineMsg::LanguageLockExpired { generation } => {
                if let Some(decision) = self.translator.on_lock_expired(generation) {
                    self.apply_decision(decision);
                }
            }
        }
    }

    fn on_signal(&mut self, signal: AudioSignal) {
        match signal {
            AudioSignal::Ended(handle) => {
                debug!(%handle, "Audio ended");
                let ctx = self.ctx();
                if let Some(promoted) = self.scheduler.on_track_ended(handle, &ctx) {
                    self.after_promotion(promoted);
                }
            }
            AudioSignal::Rejected(handle) => {
                debug!(%handle, "Client rejected playback");
                self.scheduler.audio().mark_stopped(handle);
            }
        }
    }

    /// Apply a promotion: audio first, then phrase, then palette after a delay
    fn after_promotion(&mut self, promoted: Promoted) {
        self.coordinator.on_handle_promoted(promoted.handle);

        let Some(bundle) = self.scheduler.current_bundle() else {
            return;
        };
        let update = PhraseUpdate {
            bundle_id: Some(bundle.id.to_string()),
            text: bundle.phrase.clone(),
            language: bundle.language,
        };
        let (palette, animation) = (bundle.palette, bundle.animation);

        let decision = self.translator.on_bundle_phrase(update);
        self.apply_decision(decision);
        self.coordinator.schedule_palette(palette, animation);
    }

    fn apply_decision(&mut self, decision: PhraseDecision) {
        match decision {
            PhraseDecision::Show { update, translate } => {
                self.coordinator.show_phrase(update);
                if let Some(request) = translate {
                    self.spawn_translation(request);
                }
            }
            PhraseDecision::Deferred => {}
        }
    }

    fn set_language(&mut self, language: Language) {
        if language == self.translator.language() {
            return;
        }
        info!(%language, "Language changed");

        let displayed = self
            .scheduler
            .current_bundle()
            .map(|b| (b.id.to_string(), b.phrase.clone()));
        let request = self.translator.set_language(language, displayed);
        self.coordinator.set_language(language);
        self.state.events.emit(SublimeEvent::LanguageChanged {
            language,
            timestamp: Utc::now(),
        });

        if let Some(request) = request {
            self.spawn_translation(request);
        }
    }

    fn spawn_translation(&self, request: TranslationRequest) {
        let service = self.service.clone();
        let mailbox = self.mailbox.clone();
        let state = self.state.clone();
        debug!(seq = request.seq, target = %request.target, "Translating phrase");

        tokio::spawn(async move {
            state.api_calls.record(&state.events);
            let result = service.translate(&request.text, request.target).await;
            let _ = mailbox.send(PipelineMsg::TranslationCompleted { request, result });
        });
    }

    fn teardown(&mut self) {
        self.scheduler.teardown();
        self.coordinator.teardown();
        self.translator.teardown();
    }

    async fn publish(&self) {
        let snapshot = PipelineSnapshot {
            state: self.scheduler.state(),
            language: self.translator.language(),
            current: self.scheduler.current_bundle().map(|b| b.summary()),
            current_handle: self.scheduler.current_handle(),
            next: self.scheduler.next_summary(),
            ui: self.coordinator.ui().clone(),
            live_audio_handles: self.scheduler.audio().live_handles(),
        };
        self.state.publish(snapshot).await;
    }
}

/// Cloneable front end to the pipeline actor
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::UnboundedSender<PipelineMsg>,
    signal_tx: mpsc::UnboundedSender<AudioSignal>,
    state: Arc<SharedState>,
    task: Arc<JoinHandle<()>>,
}

impl PipelineHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> PipelineMsg) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    /// Start the session; retries after an initial failure
    pub async fn enable(&self) -> Result<()> {
        self.request(|reply| PipelineMsg::Enable { reply }).await?
    }

    /// Tear everything down; the pipeline cannot be enabled again
    pub async fn disable(&self) -> Result<()> {
        self.request(|reply| PipelineMsg::Disable { reply }).await
    }

    /// Returns whether a bundle was promoted
    pub async fn skip(&self) -> Result<bool> {
        self.request(|reply| PipelineMsg::Skip { reply }).await?
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.request(|reply| PipelineMsg::SetMuted { muted, reply }).await
    }

    pub async fn gesture(&self) -> Result<()> {
        self.request(|reply| PipelineMsg::UserGesture { reply }).await
    }

    pub async fn set_language(&self, language: Language) -> Result<()> {
        self.request(|reply| PipelineMsg::SetLanguage { language, reply })
            .await
    }

    /// Forward an end-of-playback report from a client
    pub fn audio_ended(&self, handle: HandleId) -> Result<()> {
        self.signal_tx
            .send(AudioSignal::Ended(handle))
            .map_err(|_| stopped())
    }

    /// Forward a refused play request from a client
    pub fn audio_rejected(&self, handle: HandleId) -> Result<()> {
        self.signal_tx
            .send(AudioSignal::Rejected(handle))
            .map_err(|_| stopped())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SublimeEvent> {
        self.state.events.subscribe()
    }

    pub async fn snapshot(&self) -> PipelineSnapshot {
        self.state.snapshot().await
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

fn stopped() -> Error {
    warn!("Pipeline task is not running");
    Error::InvalidState("pipeline stopped".to_string())
}
