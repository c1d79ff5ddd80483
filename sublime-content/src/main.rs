//! Sublime Content (sublime-content) - Main entry point
//!
//! Serves cached and realtime themes, translations and prompt routing, or
//! seeds the theme store from a manifest.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sublime_content::seed::{self, Manifest};
use sublime_content::{build_router, db, generate, model, music, AppState, ContentConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for sublime-content
#[derive(Parser, Debug)]
#[command(name = "sublime-content")]
#[command(about = "Theme, translation and prompt service for Sublime")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "SUBLIME_CONTENT_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite theme store
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory served under /audio
    #[arg(long)]
    audio_dir: Option<PathBuf>,

    /// Public base URL used in audio URLs
    #[arg(long)]
    public_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Import themes from a JSON manifest
    Seed {
        #[arg(long)]
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        ContentConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = args.database {
        config.database_path = path;
    }
    if let Some(dir) = args.audio_dir {
        config.audio_dir = dir;
    }
    if let Some(url) = args.public_url {
        config.public_url = Some(url);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("sublime_content={},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Sublime Content v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let pool = db::init_database(&config.database_path)
        .await
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Seed { manifest } => {
            let parsed = Manifest::load(&manifest)
                .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
            let inserted = seed::seed(&pool, &parsed).await?;
            info!(
                "Seeded {} of {} themes from {}",
                inserted,
                parsed.themes.len(),
                manifest.display()
            );
            Ok(())
        }
        Command::Serve => serve(config, pool).await,
    }
}

async fn serve(config: ContentConfig, pool: sqlx::SqlitePool) -> Result<()> {
    let themes = db::themes::count_themes(&pool).await?;
    match (themes, config.realtime_enabled) {
        (0, false) => warn!("Theme store is empty; /api/theme answers 503 until it is seeded"),
        (0, true) => warn!("Theme store is empty; every theme is generated until it fills"),
        (n, _) => info!("{} cached themes available", n),
    }
    if config.realtime_enabled {
        info!(
            min_stock = config.min_stock,
            ratio = config.realtime_ratio,
            "Realtime generation enabled"
        );
    }

    let model = model::from_config(&config)?;
    let themes = generate::from_config(&config)?;
    let music = music::from_config(&config)?;
    let port = config.port;
    let app = build_router(AppState::new(pool, model, config).with_generators(themes, music));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("sublime-content listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Ctrl+C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}
