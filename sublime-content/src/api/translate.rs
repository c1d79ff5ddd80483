//! Phrase translation endpoint

use axum::extract::State;
use axum::Json;
use sublime_common::theme::{TranslateRequest, TranslateResponse};

use crate::error::{Error, Result};
use crate::AppState;

/// POST /api/translate
pub async fn translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(Error::BadRequest("text is required".to_string()));
    }

    let translated = state.model.translate(text, request.target_lang).await?;
    Ok(Json(TranslateResponse { translated }))
}
