//! HTTP request handlers

use super::AppState;
use crate::audio::HandleId;
use crate::error::Error;
use crate::metrics::ImpactMetrics;
use crate::state::PipelineSnapshot;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sublime_common::theme::{ErrorResponse, PromptRequest, PromptResponse};
use sublime_common::Language;
use tracing::{info, warn};

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct BuildInfo {
    git_hash: &'static str,
    build_timestamp: &'static str,
    build_profile: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pipeline: PipelineSnapshot,
    api_calls: u64,
    impact: ImpactMetrics,
    uptime_secs: u64,
    live_object_urls: usize,
    build: BuildInfo,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    promoted: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MuteRequest {
    pub muted: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LanguageRequest {
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct LanguageResponse {
    language: Language,
}

#[derive(Debug, Deserialize)]
pub struct PromptBody {
    pub prompt: String,
}

fn error_response(err: Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::Fetch(_) | Error::Decode(_) | Error::Translation(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ============================================================================
// Health and status
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "sublime-sync".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/v1/status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let shared = state.pipeline.state();
    Json(StatusResponse {
        pipeline: state.pipeline.snapshot().await,
        api_calls: shared.api_calls.total(),
        impact: shared.impact(),
        uptime_secs: shared.uptime().as_secs(),
        live_object_urls: shared.object_urls.live_count(),
        build: BuildInfo {
            git_hash: env!("GIT_HASH"),
            build_timestamp: env!("BUILD_TIMESTAMP"),
            build_profile: env!("BUILD_PROFILE"),
        },
    })
}

// ============================================================================
// Session control
// ============================================================================

/// POST /api/v1/enable
pub async fn enable(State(state): State<AppState>) -> ApiResult<Json<AckResponse>> {
    state.pipeline.enable().await.map_err(error_response)?;
    Ok(Json(AckResponse { status: "enabled" }))
}

/// POST /api/v1/disable
///
/// Terminal: the pipeline cannot be enabled again afterwards.
pub async fn disable(State(state): State<AppState>) -> ApiResult<Json<AckResponse>> {
    state.pipeline.disable().await.map_err(error_response)?;
    info!("Session disabled via API");
    Ok(Json(AckResponse { status: "disabled" }))
}

/// POST /api/v1/skip
pub async fn skip(State(state): State<AppState>) -> ApiResult<Json<SkipResponse>> {
    let promoted = state.pipeline.skip().await.map_err(error_response)?;
    Ok(Json(SkipResponse { promoted }))
}

// ============================================================================
// Gates and language
// ============================================================================

/// POST /api/v1/mute
pub async fn set_mute(
    State(state): State<AppState>,
    Json(req): Json<MuteRequest>,
) -> ApiResult<Json<MuteRequest>> {
    state
        .pipeline
        .set_muted(req.muted)
        .await
        .map_err(error_response)?;
    Ok(Json(req))
}

/// POST /api/v1/gesture
pub async fn gesture(State(state): State<AppState>) -> ApiResult<Json<AckResponse>> {
    state.pipeline.gesture().await.map_err(error_response)?;
    Ok(Json(AckResponse { status: "ok" }))
}

/// POST /api/v1/language
pub async fn set_language(
    State(state): State<AppState>,
    Json(req): Json<LanguageRequest>,
) -> ApiResult<Json<LanguageResponse>> {
    let language: Language = req
        .language
        .parse()
        .map_err(|e: sublime_common::Error| bad_request(e.to_string()))?;
    state
        .pipeline
        .set_language(language)
        .await
        .map_err(error_response)?;
    Ok(Json(LanguageResponse { language }))
}

// ============================================================================
// Browser-rendered audio
// ============================================================================

/// POST /api/v1/audio/:handle/ended
pub async fn audio_ended(
    State(state): State<AppState>,
    Path(handle): Path<u64>,
) -> ApiResult<StatusCode> {
    state
        .pipeline
        .audio_ended(HandleId(handle))
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/audio/:handle/rejected
pub async fn audio_rejected(
    State(state): State<AppState>,
    Path(handle): Path<u64>,
) -> ApiResult<StatusCode> {
    state
        .pipeline
        .audio_rejected(HandleId(handle))
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/blobs/:id
pub async fn get_blob(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.pipeline.state().object_urls.get(&id) {
        Some(blob) => (
            [(header::CONTENT_TYPE, blob.mime.clone())],
            blob.bytes.as_ref().clone(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("blob {} not found or revoked", id),
            }),
        )
            .into_response(),
    }
}

/// POST /api/v1/prompt
///
/// Forwards the prompt with the active language and the playing track so
/// the content service does not suggest the same sound.
pub async fn prompt(
    State(state): State<AppState>,
    Json(body): Json<PromptBody>,
) -> ApiResult<Json<PromptResponse>> {
    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err(bad_request("prompt must not be empty"));
    }

    let snapshot = state.pipeline.snapshot().await;
    let request = PromptRequest {
        prompt: prompt.to_string(),
        language: snapshot.language,
        current_audio: snapshot.current.map(|c| c.audio.url().to_string()),
    };

    let shared = state.pipeline.state();
    shared.api_calls.record(&shared.events);
    let response = state.service.process_prompt(&request).await.map_err(|e| {
        warn!("Prompt routing failed: {}", e);
        error_response(e)
    })?;
    Ok(Json(response))
}
