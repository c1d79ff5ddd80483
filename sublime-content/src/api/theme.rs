//! Theme endpoint: cached themes, or realtime generation when the policy says so

use axum::extract::{Query, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sublime_common::theme::{ThemeQuery, ThemeResponse, ThemeSource};
use sublime_common::Language;
use tracing::{debug, info, warn};

use crate::db::themes::{self, ThemeRecord};
use crate::error::{Error, Result};
use crate::realtime;
use crate::AppState;

/// GET /api/theme?lang=..&exclude=..&realtime=..
///
/// `exclude` is the content id of the bundle the caller just promoted. Ids
/// this store never issued are ignored. A realtime theme carries its audio
/// inline and no content id. An empty store falls back to generation unless
/// realtime generation is disabled.
pub async fn get_theme(
    State(state): State<AppState>,
    Query(query): Query<ThemeQuery>,
) -> Result<Json<ThemeResponse>> {
    let language = match query.lang.as_deref().filter(|l| !l.is_empty()) {
        Some(code) => code
            .parse::<Language>()
            .map_err(|e| Error::BadRequest(e.to_string()))?,
        None => Language::En,
    };
    let exclude = query.exclude.as_deref().and_then(|id| {
        let parsed = id.parse::<i64>().ok();
        if parsed.is_none() {
            debug!(exclude = id, "Unknown exclusion id ignored");
        }
        parsed
    });

    let forced = query.realtime.unwrap_or(false);
    let stock = themes::count_themes(&state.db).await?;
    if state.realtime.should_generate(stock, forced) {
        debug!(stock, forced, "Serving a realtime theme");
        return realtime_theme(&state, language).await.map(Json);
    }

    match themes::pick_theme(&state.db, exclude, state.config.candidate_pool).await? {
        Some(record) => Ok(Json(cached_theme(&state, record, language).await)),
        None if state.realtime.enabled => {
            info!("No cached themes; generating one");
            realtime_theme(&state, language).await.map(Json)
        }
        None => Err(Error::Unavailable("no cached themes".to_string())),
    }
}

async fn cached_theme(state: &AppState, record: ThemeRecord, language: Language) -> ThemeResponse {
    let phrase = localized_phrase(state, &record.phrase_en, language).await;
    let audio_url = record
        .music_path
        .as_deref()
        .map(|path| audio_url(&state.config.public_base_url(), path));

    ThemeResponse {
        phrase,
        colors: record.colors,
        speed: record.speed,
        softness: record.softness,
        steps_per_color: record.steps_per_color,
        audio_url,
        audio_base64: None,
        content_id: Some(record.id.to_string()),
        source: Some(ThemeSource::Cache),
    }
}

/// Generate a theme with music, store it for later requests, serve it inline
async fn realtime_theme(state: &AppState, language: Language) -> Result<ThemeResponse> {
    let generated = realtime::generate(
        state.themes.as_ref(),
        state.music.as_ref(),
        state.config.music_length(),
    )
    .await?;

    // The visitor still gets the theme when it cannot be stored
    if let Err(e) = realtime::save(&state.db, &state.config.audio_dir, &generated).await {
        warn!("Realtime theme not stored: {}", e);
    }

    let phrase = localized_phrase(state, &generated.theme.phrase, language).await;
    let theme = generated.theme;
    Ok(ThemeResponse {
        phrase,
        colors: theme.colors,
        speed: theme.speed,
        softness: theme.softness,
        steps_per_color: theme.steps_per_color,
        audio_url: None,
        audio_base64: Some(STANDARD.encode(&generated.audio)),
        content_id: None,
        source: Some(ThemeSource::Realtime),
    })
}

/// English phrase translated to `language`; falls back to English on failure
async fn localized_phrase(state: &AppState, english: &str, language: Language) -> String {
    if language == Language::En {
        return english.to_string();
    }
    match state.model.translate(english, language).await {
        Ok(translated) => translated,
        Err(e) => {
            warn!(%language, "Phrase translation failed: {}", e);
            english.to_string()
        }
    }
}

/// Absolute URLs are kept; relative paths are served from `/audio`
pub fn audio_url(public_base: &str, music_path: &str) -> String {
    if music_path.starts_with("http://") || music_path.starts_with("https://") {
        music_path.to_string()
    } else {
        format!("{}/audio/{}", public_base, music_path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_url() {
        assert_eq!(
            audio_url("http://127.0.0.1:5761", "/dawn.mp3"),
            "http://127.0.0.1:5761/audio/dawn.mp3"
        );
        assert_eq!(
            audio_url("http://127.0.0.1:5761", "https://cdn.example/x.mp3"),
            "https://cdn.example/x.mp3"
        );
    }
}
