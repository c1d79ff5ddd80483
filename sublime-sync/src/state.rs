//! Shared service state
//!
//! The pipeline actor owns all mutable playback state. What HTTP handlers
//! see is the event bus and the snapshot the actor republishes after every
//! message it handles.

use crate::audio::{HandleId, ObjectUrlStore};
use crate::bundle::BundleSummary;
use crate::coordinator::UiState;
use crate::metrics::{ApiCallCounter, ImpactMetrics};
use crate::scheduler::NextSlotSummary;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sublime_common::events::{SchedulerState, SublimeEvent};
use sublime_common::Language;
use tokio::sync::{broadcast, RwLock};

/// Default capacity of the event channel
pub const EVENT_CAPACITY: usize = 256;

/// Broadcast channel for [`SublimeEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SublimeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send to all subscribers (no subscribers is fine)
    pub fn emit(&self, event: SublimeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SublimeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

/// Read-only projection of the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub state: SchedulerState,
    pub language: Language,
    pub current: Option<BundleSummary>,
    pub current_handle: Option<HandleId>,
    pub next: NextSlotSummary,
    pub ui: UiState,
    pub live_audio_handles: usize,
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self {
            state: SchedulerState::Idle,
            language: Language::default(),
            current: None,
            current_handle: None,
            next: NextSlotSummary::Empty,
            ui: UiState::default(),
            live_audio_handles: 0,
        }
    }
}

/// State shared between the pipeline actor and HTTP handlers
pub struct SharedState {
    pub events: EventBus,
    pub api_calls: Arc<ApiCallCounter>,
    pub object_urls: Arc<ObjectUrlStore>,
    snapshot: RwLock<PipelineSnapshot>,
    started_at: Instant,
}

impl SharedState {
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            api_calls: Arc::new(ApiCallCounter::new()),
            object_urls: Arc::new(ObjectUrlStore::new()),
            snapshot: RwLock::new(PipelineSnapshot::default()),
            started_at: Instant::now(),
        }
    }

    pub async fn snapshot(&self) -> PipelineSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn publish(&self, snapshot: PipelineSnapshot) {
        *self.snapshot.write().await = snapshot;
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn impact(&self) -> ImpactMetrics {
        ImpactMetrics::estimate(self.api_calls.total(), self.uptime())
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(EventBus::default())
    }
}
