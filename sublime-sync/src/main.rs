//! Sublime Sync (sublime-sync) - Main entry point
//!
//! Runs the playback pipeline and its HTTP/SSE control interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sublime_common::Language;
use sublime_sync::api::{self, AppState};
use sublime_sync::audio::{AudioBackend, BroadcastBackend, ClockBackend};
use sublime_sync::client::{ContentService, HttpContentService};
use sublime_sync::{EventBus, SharedState, SyncConfig, SyncPipeline};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for sublime-sync
#[derive(Parser, Debug)]
#[command(name = "sublime-sync")]
#[command(about = "Ambiance playback pipeline for Sublime")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "SUBLIME_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Content service API base URL
    #[arg(long)]
    content_url: Option<String>,

    /// Initial language (fr, en, es, de, ko, zh, ar)
    #[arg(short, long)]
    language: Option<Language>,

    /// Use the simulated clock backend instead of browser-rendered audio
    #[arg(long)]
    simulate: bool,

    /// Simulated track length in milliseconds
    #[arg(long)]
    track_ms: Option<u64>,

    /// Simulated backend: allow playback before the first user gesture
    #[arg(long)]
    autoplay: bool,
}

impl Args {
    fn apply(self, config: &mut SyncConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(url) = self.content_url {
            config.content_url = url;
        }
        if let Some(language) = self.language {
            config.language = language;
        }
        if let Some(track_ms) = self.track_ms {
            config.track_duration_ms = track_ms;
        }
        config.simulate |= self.simulate;
        config.autoplay_unlocked |= self.autoplay;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        SyncConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("sublime_sync={},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Sublime Sync v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!(
        content_url = %config.content_url,
        language = %config.language,
        simulate = config.simulate,
        "Configuration loaded"
    );

    let state = Arc::new(SharedState::new(EventBus::default()));
    let service: Arc<dyn ContentService> = Arc::new(
        HttpContentService::new(&config.content_url, config.request_timeout())
            .context("Failed to create content service client")?,
    );

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let backend: Arc<dyn AudioBackend> = if config.simulate {
        let clock = ClockBackend::new(config.track_duration(), signal_tx.clone());
        if config.autoplay_unlocked {
            clock.unlock();
        }
        Arc::new(clock)
    } else {
        Arc::new(BroadcastBackend::new(
            state.events.clone(),
            &config.public_base_url(),
        ))
    };

    let pipeline = SyncPipeline::spawn(
        &config,
        service.clone(),
        backend,
        signal_tx,
        signal_rx,
        state,
    );
    // Browser mode waits for the first SSE client or POST /api/v1/enable
    if config.simulate {
        if let Err(e) = pipeline.enable().await {
            warn!("Initial enable failed: {}", e);
        }
    } else {
        info!("Waiting for a client on /api/v1/events before starting playback");
    }

    let app_state = AppState {
        pipeline: pipeline.clone(),
        service,
    };
    api::run(config.port, app_state, shutdown_signal())
        .await
        .context("Server error")?;

    if let Err(e) = pipeline.disable().await {
        warn!("Pipeline teardown: {}", e);
    }
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
