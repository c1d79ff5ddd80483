//! Double-buffer scheduler
//!
//! Keeps one bundle playing (`current`) while the following one is fetched
//! in the background (`next`). When the current track ends, or on a manual
//! skip, a ready `next` is promoted: a new audio element is created and the
//! old one fades out. If `next` is not ready when the track ends, the
//! scheduler waits in `AwaitingNext` and polls until it is.
//!
//! The scheduler never blocks. Fetches and timers run on spawned tasks that
//! post [`PipelineMsg`]s back to the pipeline actor, which calls the
//! matching `on_*` method. Every message carries the generation it was
//! issued under so results that arrive after a teardown or restart are
//! recognised and dropped.

use crate::audio::{AudioResourceManager, HandleId};
use crate::bundle::{BundleId, BundleSummary, ThemeBundle};
use crate::dedup::DedupTracker;
use crate::error::{Error, Result};
use crate::fetcher::BundleFetcher;
use crate::pipeline::PipelineMsg;
use crate::state::EventBus;
use chrono::Utc;
use serde::Serialize;
use std::mem;
use std::time::Duration;
use sublime_common::events::{SchedulerState, Slot, SublimeEvent};
use sublime_common::Language;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Bounded exponential backoff for background fetches
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Whether attempt number `attempt` (1-based) may be followed by another
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.retries
    }

    /// Delay before the retry that follows failed attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub fade_out: Duration,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fade_out: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(500),
            retry: RetryPolicy::default(),
        }
    }
}

/// The background slot
#[derive(Debug)]
pub enum NextSlot {
    Empty,
    Generating { attempt: u32 },
    Ready(ThemeBundle),
    Backoff { attempt: u32 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextSlotSummary {
    Empty,
    Generating { attempt: u32 },
    Ready { bundle: BundleSummary },
    Backoff { attempt: u32 },
}

impl From<&NextSlot> for NextSlotSummary {
    fn from(slot: &NextSlot) -> Self {
        match slot {
            NextSlot::Empty => NextSlotSummary::Empty,
            NextSlot::Generating { attempt } => NextSlotSummary::Generating { attempt: *attempt },
            NextSlot::Ready(bundle) => NextSlotSummary::Ready {
                bundle: bundle.summary(),
            },
            NextSlot::Backoff { attempt } => NextSlotSummary::Backoff { attempt: *attempt },
        }
    }
}

/// The playing bundle and its audio element
#[derive(Debug)]
pub struct CurrentSlot {
    pub bundle: ThemeBundle,
    pub handle: HandleId,
}

/// Inputs owned by other components that the scheduler needs
#[derive(Debug, Clone, Copy)]
pub struct PlaybackContext {
    /// Language for new fetches
    pub language: Language,
    /// Initial volume of new audio elements
    pub volume: f32,
}

/// Outcome of a promotion, for the coordinator
#[derive(Debug, Clone)]
pub struct Promoted {
    pub bundle_id: BundleId,
    pub handle: HandleId,
    pub from: Option<BundleId>,
}

pub struct Scheduler {
    state: SchedulerState,
    current: Option<CurrentSlot>,
    next: NextSlot,
    fetcher: BundleFetcher,
    audio: AudioResourceManager,
    dedup: DedupTracker,
    mailbox: mpsc::UnboundedSender<PipelineMsg>,
    events: EventBus,
    config: SchedulerConfig,
    fetch_generation: u64,
    poll_generation: u64,
    fetch_task: Option<JoinHandle<()>>,
    retry_task: Option<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(
        fetcher: BundleFetcher,
        audio: AudioResourceManager,
        mailbox: mpsc::UnboundedSender<PipelineMsg>,
        events: EventBus,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            state: SchedulerState::Idle,
            current: None,
            next: NextSlot::Empty,
            fetcher,
            audio,
            dedup: DedupTracker::new(),
            mailbox,
            events,
            config,
            fetch_generation: 0,
            poll_generation: 0,
            fetch_task: None,
            retry_task: None,
            poll_task: None,
        }
    }

    /// Start the session (or retry it after an initial failure)
    pub fn enable(&mut self, ctx: &PlaybackContext) -> Result<()> {
        match self.state {
            SchedulerState::Disposed => Err(Error::InvalidState(
                "scheduler has been disposed".to_string(),
            )),
            SchedulerState::Idle | SchedulerState::Failed => {
                self.set_state(SchedulerState::Initializing);
                self.spawn_fetch(Slot::Current, 1, ctx.language);
                Ok(())
            }
            _ => {
                debug!(state = %self.state, "enable ignored, already running");
                Ok(())
            }
        }
    }

    /// A fetch task finished
    pub fn on_fetch_completed(
        &mut self,
        slot: Slot,
        generation: u64,
        attempt: u32,
        result: Result<ThemeBundle>,
        ctx: &PlaybackContext,
    ) -> Option<Promoted> {
        if self.state == SchedulerState::Disposed || generation != self.fetch_generation {
            if let Ok(bundle) = result {
                debug!(bundle_id = %bundle.id, "Late fetch result discarded");
                self.audio.discard_source(&bundle.audio);
            }
            return None;
        }
        self.fetch_task = None;

        match (slot, result) {
            (Slot::Current, Ok(bundle)) => {
                self.emit_ready(slot, &bundle);
                match self.promote(bundle, ctx) {
                    Ok(promoted) => {
                        self.set_state(SchedulerState::Playing);
                        self.ensure_next_fetch(ctx.language);
                        Some(promoted)
                    }
                    Err(e) => {
                        self.fail_initial(e);
                        None
                    }
                }
            }
            (Slot::Current, Err(e)) => {
                self.events.emit(SublimeEvent::BundleFetchFailed {
                    slot,
                    error: e.to_string(),
                    attempt,
                    will_retry: false,
                    timestamp: Utc::now(),
                });
                self.fail_initial(e);
                None
            }
            (Slot::Next, Ok(bundle)) => {
                self.emit_ready(slot, &bundle);
                debug!(bundle_id = %bundle.id, "Next bundle ready");
                self.next = NextSlot::Ready(bundle);
                None
            }
            (Slot::Next, Err(e)) => {
                let will_retry = self.config.retry.should_retry(attempt);
                warn!(attempt, will_retry, "Background fetch failed: {}", e);
                self.events.emit(SublimeEvent::BundleFetchFailed {
                    slot,
                    error: e.to_string(),
                    attempt,
                    will_retry,
                    timestamp: Utc::now(),
                });

                if will_retry {
                    self.next = NextSlot::Backoff { attempt };
                    self.schedule_retry(attempt);
                } else {
                    self.next = NextSlot::Empty;
                }
                None
            }
        }
    }

    /// Backoff elapsed; fetch `next` again
    pub fn on_retry(&mut self, generation: u64, attempt: u32, ctx: &PlaybackContext) {
        self.retry_task = None;
        if self.state == SchedulerState::Disposed || generation != self.fetch_generation {
            return;
        }
        if !matches!(self.next, NextSlot::Backoff { .. }) {
            return;
        }
        self.spawn_fetch(Slot::Next, attempt, ctx.language);
    }

    /// The backend reported end-of-playback for `handle`
    pub fn on_track_ended(&mut self, handle: HandleId, ctx: &PlaybackContext) -> Option<Promoted> {
        if self.state == SchedulerState::Disposed {
            return None;
        }
        self.audio.mark_stopped(handle);

        if self.current_handle() != Some(handle) {
            debug!(%handle, "Ended signal for a non-current element ignored");
            return None;
        }
        if self.state != SchedulerState::Playing {
            return None;
        }

        if let Some(bundle) = self.take_ready() {
            if let Some(promoted) = self.advance(bundle, ctx) {
                return Some(promoted);
            }
        }

        info!("Track ended before the next bundle was ready");
        self.set_state(SchedulerState::AwaitingNext);
        self.start_poll();
        self.ensure_next_fetch(ctx.language);
        None
    }

    /// Readiness poll while `AwaitingNext`
    pub fn on_poll_tick(&mut self, generation: u64, ctx: &PlaybackContext) -> Option<Promoted> {
        if self.state != SchedulerState::AwaitingNext || generation != self.poll_generation {
            return None;
        }

        if let Some(bundle) = self.take_ready() {
            return self.advance(bundle, ctx);
        }
        // Re-arm after exhausted retries
        self.ensure_next_fetch(ctx.language);
        None
    }

    /// Manual skip: promote `next` if it is ready, otherwise nothing changes
    pub fn skip(&mut self, ctx: &PlaybackContext) -> Result<Option<Promoted>> {
        match self.state {
            SchedulerState::Disposed => {
                return Err(Error::InvalidState(
                    "scheduler has been disposed".to_string(),
                ))
            }
            SchedulerState::Playing | SchedulerState::AwaitingNext => {}
            _ => {
                self.skip_ignored();
                return Ok(None);
            }
        }

        match self.take_ready() {
            Some(bundle) => Ok(self.advance(bundle, ctx)),
            None => {
                self.skip_ignored();
                Ok(None)
            }
        }
    }

    /// Stop everything and release every resource; terminal
    pub fn teardown(&mut self) {
        if self.state == SchedulerState::Disposed {
            return;
        }

        for task in [
            self.fetch_task.take(),
            self.retry_task.take(),
            self.poll_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        // Invalidate anything already queued
        self.fetch_generation += 1;
        self.poll_generation += 1;

        if let Some(mut current) = self.current.take() {
            if let Err(e) = current.bundle.mark_done() {
                warn!("Teardown: {}", e);
            }
            self.audio.dispose(current.handle);
        }
        if let NextSlot::Ready(bundle) = mem::replace(&mut self.next, NextSlot::Empty) {
            self.audio.discard_source(&bundle.audio);
        }
        let released = self.audio.dispose_all();

        self.set_state(SchedulerState::Disposed);
        info!(released, "Scheduler torn down");
    }

    fn advance(&mut self, bundle: ThemeBundle, ctx: &PlaybackContext) -> Option<Promoted> {
        match self.promote(bundle, ctx) {
            Ok(promoted) => {
                self.stop_poll();
                self.set_state(SchedulerState::Playing);
                self.ensure_next_fetch(ctx.language);
                Some(promoted)
            }
            Err(e) => {
                error!("Promotion failed: {}", e);
                self.events.emit(SublimeEvent::PipelineError {
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
                self.ensure_next_fetch(ctx.language);
                None
            }
        }
    }

    fn promote(&mut self, mut bundle: ThemeBundle, ctx: &PlaybackContext) -> Result<Promoted> {
        if let Err(e) = bundle.mark_playing() {
            self.audio.discard_source(&bundle.audio);
            return Err(e);
        }
        let handle = match self.audio.create_playable(&bundle.audio, ctx.volume) {
            Ok(handle) => handle,
            Err(e) => {
                self.audio.discard_source(&bundle.audio);
                return Err(e);
            }
        };

        let from = self.current.take().map(|mut old| {
            if let Err(e) = old.bundle.mark_done() {
                warn!("Superseded bundle: {}", e);
            }
            self.audio.fade_out_and_dispose(old.handle, self.config.fade_out);
            old.bundle.id
        });

        self.dedup.record_promoted(bundle.content_id.clone());

        info!(
            bundle_id = %bundle.id,
            content_id = ?bundle.content_id,
            %handle,
            "Bundle promoted"
        );
        self.events.emit(SublimeEvent::BundlePromoted {
            from_bundle_id: from.as_ref().map(|id| id.to_string()),
            to_bundle_id: bundle.id.to_string(),
            content_id: bundle.content_id.clone(),
            timestamp: Utc::now(),
        });

        let promoted = Promoted {
            bundle_id: bundle.id.clone(),
            handle,
            from,
        };
        self.current = Some(CurrentSlot { bundle, handle });
        Ok(promoted)
    }

    fn fail_initial(&mut self, e: Error) {
        error!("Initial bundle fetch failed: {}", e);
        self.set_state(SchedulerState::Failed);
        self.events.emit(SublimeEvent::PipelineError {
            message: e.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn take_ready(&mut self) -> Option<ThemeBundle> {
        match mem::replace(&mut self.next, NextSlot::Empty) {
            NextSlot::Ready(bundle) => Some(bundle),
            other => {
                self.next = other;
                None
            }
        }
    }

    /// Start a background fetch unless one is in flight, backing off or done
    fn ensure_next_fetch(&mut self, language: Language) {
        if matches!(self.next, NextSlot::Empty) {
            self.spawn_fetch(Slot::Next, 1, language);
        }
    }

    fn spawn_fetch(&mut self, slot: Slot, attempt: u32, language: Language) {
        self.fetch_generation += 1;
        let generation = self.fetch_generation;
        let exclude = self.dedup.exclude_id();
        if slot == Slot::Next {
            self.next = NextSlot::Generating { attempt };
        }

        debug!(?slot, attempt, exclude = ?exclude, "Fetching bundle");
        self.events.emit(SublimeEvent::BundleFetchStarted {
            slot,
            language,
            exclude: exclude.clone(),
            attempt,
            timestamp: Utc::now(),
        });

        let fetcher = self.fetcher.clone();
        let mailbox = self.mailbox.clone();
        self.fetch_task = Some(tokio::spawn(async move {
            let result = fetcher.fetch(language, exclude).await;
            let _ = mailbox.send(PipelineMsg::FetchCompleted {
                slot,
                generation,
                attempt,
                result: Box::new(result),
            });
        }));
    }

    fn schedule_retry(&mut self, attempt: u32) {
        let delay = self.config.retry.delay_for(attempt);
        let generation = self.fetch_generation;
        let mailbox = self.mailbox.clone();
        debug!(?delay, next_attempt = attempt + 1, "Retry scheduled");

        if let Some(previous) = self.retry_task.replace(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = mailbox.send(PipelineMsg::RetryNextFetch {
                generation,
                attempt: attempt + 1,
            });
        })) {
            previous.abort();
        }
    }

    fn start_poll(&mut self) {
        if self.poll_task.is_some() {
            return;
        }
        self.poll_generation += 1;
        let generation = self.poll_generation;
        let interval = self.config.poll_interval;
        let mailbox = self.mailbox.clone();

        self.poll_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if mailbox.send(PipelineMsg::PollTick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_poll(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
            self.poll_generation += 1;
        }
    }

    fn skip_ignored(&self) {
        info!(state = %self.state, "Skip ignored, next bundle not ready");
        self.events.emit(SublimeEvent::SkipIgnored {
            timestamp: Utc::now(),
        });
    }

    fn emit_ready(&self, slot: Slot, bundle: &ThemeBundle) {
        self.events.emit(SublimeEvent::BundleReady {
            slot,
            bundle_id: bundle.id.to_string(),
            content_id: bundle.content_id.clone(),
            timestamp: Utc::now(),
        });
    }

    fn set_state(&mut self, state: SchedulerState) {
        if self.state == state {
            return;
        }
        info!(from = %self.state, to = %state, "Scheduler state changed");
        self.state = state;
        self.events.emit(SublimeEvent::SchedulerStateChanged {
            state,
            timestamp: Utc::now(),
        });
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn current(&self) -> Option<&CurrentSlot> {
        self.current.as_ref()
    }

    pub fn current_bundle(&self) -> Option<&ThemeBundle> {
        self.current.as_ref().map(|c| &c.bundle)
    }

    pub fn current_handle(&self) -> Option<HandleId> {
        self.current.as_ref().map(|c| c.handle)
    }

    pub fn next(&self) -> &NextSlot {
        &self.next
    }

    pub fn next_summary(&self) -> NextSlotSummary {
        NextSlotSummary::from(&self.next)
    }

    pub fn exclude_id(&self) -> Option<String> {
        self.dedup.exclude_id()
    }

    pub fn audio(&self) -> &AudioResourceManager {
        &self.audio
    }
}
