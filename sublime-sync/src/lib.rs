//! # Sublime Sync Library (sublime-sync)
//!
//! Keeps phrase, palette and music of the ambiance page in step.
//!
//! **Purpose:** Fetch theme bundles from the content service, play them
//! back to back with a double buffer (one playing, one prefetched), fade
//! between tracks, and project the current bundle into UI state streamed to
//! browsers over SSE.
//!
//! **Architecture:** one actor task ([`pipeline::SyncPipeline`]) owns the
//! scheduler, coordinator and translation adapter; spawned tasks report back
//! through its mailbox.

pub mod api;
pub mod audio;
pub mod bundle;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod state;
pub mod translation;
pub mod typewriter;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use pipeline::{PipelineHandle, SyncPipeline};
pub use state::{EventBus, SharedState};
