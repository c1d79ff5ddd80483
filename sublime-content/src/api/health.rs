//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::db::themes;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Cached themes, `None` if the store could not be queried
    pub themes: Option<i64>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let themes = match themes::count_themes(&state.db).await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Health check could not count themes: {}", e);
            None
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "sublime-content".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        themes,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
