//! HTTP API for the content service
//!
//! Routes live under `/api` so the sync pipeline's `content_url` is the
//! service root plus `/api`. Audio files are served as-is under `/audio`.

pub mod health;
pub mod prompt;
pub mod theme;
pub mod translate;

use crate::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use health::health_routes;

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let audio = ServeDir::new(&state.config.audio_dir);

    let api = Router::new()
        .route("/theme", get(theme::get_theme))
        .route("/translate", post(translate::translate))
        .route("/process-prompt", post(prompt::process_prompt));

    Router::new()
        .merge(health_routes())
        .nest("/api", api)
        .nest_service("/audio", audio)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
