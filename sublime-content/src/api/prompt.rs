//! Prompt routing endpoint

use axum::extract::State;
use axum::Json;
use sublime_common::theme::{PromptRequest, PromptResponse};

use crate::error::Result;
use crate::AppState;

/// POST /api/process-prompt
pub async fn process_prompt(
    State(state): State<AppState>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<PromptResponse>> {
    let response = state.prompts.route(&request, state.model.as_ref()).await?;
    Ok(Json(response))
}
