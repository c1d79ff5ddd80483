//! HTTP control API and event stream
//!
//! Routes are nested under `/api/v1`; `/health` stays at the root.

pub mod handlers;
pub mod sse;

use crate::client::ContentService;
use crate::error::Result;
use crate::pipeline::PipelineHandle;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: PipelineHandle,
    /// Used to proxy user prompts
    pub service: Arc<dyn ContentService>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/api/v1",
            Router::new()
                .route("/status", get(handlers::status))
                // Session control
                .route("/enable", post(handlers::enable))
                .route("/disable", post(handlers::disable))
                .route("/skip", post(handlers::skip))
                // Gates and language
                .route("/mute", post(handlers::set_mute))
                .route("/gesture", post(handlers::gesture))
                .route("/language", post(handlers::set_language))
                // Browser-rendered audio
                .route("/audio/:handle/ended", post(handlers::audio_ended))
                .route("/audio/:handle/rejected", post(handlers::audio_rejected))
                .route("/blobs/:id", get(handlers::get_blob))
                .route("/prompt", post(handlers::prompt))
                .route("/events", get(sse::event_stream)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run<F>(port: u16, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
