//! Cached themes: least-played selection and inserts

use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use sublime_common::Palette;
use tracing::debug;

/// A stored theme
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeRecord {
    pub id: i64,
    pub phrase_en: String,
    pub colors: Vec<String>,
    pub speed: f64,
    pub softness: f64,
    pub steps_per_color: f64,
    pub music_path: Option<String>,
    pub play_count: i64,
}

impl ThemeRecord {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let colors: String = row.try_get("colors")?;
        let colors = serde_json::from_str(&colors).map_err(|e| {
            Error::Database(sqlx::Error::Decode(
                format!("colors column is not a JSON string array: {}", e).into(),
            ))
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            phrase_en: row.try_get("phrase_en")?,
            colors,
            speed: row.try_get("speed")?,
            softness: row.try_get("softness")?,
            steps_per_color: row.try_get("steps_per_color")?,
            music_path: row.try_get("music_path")?,
            play_count: row.try_get("play_count")?,
        })
    }
}

/// A theme to insert (seed manifests use the same shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTheme {
    pub phrase: String,
    pub colors: Vec<String>,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_softness")]
    pub softness: f64,
    #[serde(default = "default_steps")]
    pub steps_per_color: f64,
    #[serde(default)]
    pub music_path: Option<String>,
}

fn default_speed() -> f64 {
    1.0
}

fn default_softness() -> f64 {
    1.0
}

fn default_steps() -> f64 {
    3.0
}

impl NewTheme {
    /// Reject themes the sync pipeline would refuse to decode
    pub fn validate(&self) -> Result<()> {
        if self.phrase.trim().is_empty() {
            return Err(Error::BadRequest("phrase must not be empty".to_string()));
        }
        Palette::parse(&self.colors).map_err(|e| Error::BadRequest(e.to_string()))?;
        Ok(())
    }
}

const SELECT_COLUMNS: &str =
    "id, phrase_en, colors, speed, softness, steps_per_color, music_path, play_count";

/// Insert a theme, returning its id
pub async fn insert_theme(pool: &SqlitePool, theme: &NewTheme) -> Result<i64> {
    theme.validate()?;
    let colors = serde_json::to_string(&theme.colors)
        .map_err(|e| Error::BadRequest(format!("colors: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO themes (phrase_en, colors, speed, softness, steps_per_color, music_path)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(theme.phrase.trim())
    .bind(colors)
    .bind(theme.speed)
    .bind(theme.softness)
    .bind(theme.steps_per_color)
    .bind(&theme.music_path)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn count_themes(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM themes")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn get_theme(pool: &SqlitePool, id: i64) -> Result<ThemeRecord> {
    let row = sqlx::query(&format!("SELECT {} FROM themes WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("theme {}", id)))?;
    ThemeRecord::from_row(&row)
}

async fn least_played(
    pool: &SqlitePool,
    exclude: Option<i64>,
    limit: u32,
) -> Result<Vec<ThemeRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM themes WHERE (?1 IS NULL OR id != ?1) \
         ORDER BY play_count ASC, id ASC LIMIT ?2",
        SELECT_COLUMNS
    ))
    .bind(exclude)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(ThemeRecord::from_row).collect()
}

/// Pick a theme among the `pool_size` least played, skipping `exclude`
///
/// The exclusion is dropped when it would leave nothing to pick (a store
/// holding a single theme). The picked theme's play count is incremented and
/// the returned record reflects the new count. `None` when the store is empty.
pub async fn pick_theme(
    pool: &SqlitePool,
    exclude: Option<i64>,
    pool_size: u32,
) -> Result<Option<ThemeRecord>> {
    let mut candidates = least_played(pool, exclude, pool_size).await?;
    if candidates.is_empty() && exclude.is_some() {
        debug!(?exclude, "Exclusion left no candidates; ignoring it");
        candidates = least_played(pool, None, pool_size).await?;
    }

    let picked = candidates.choose(&mut rand::thread_rng()).cloned();
    let Some(mut theme) = picked else {
        return Ok(None);
    };

    sqlx::query("UPDATE themes SET play_count = play_count + 1 WHERE id = ?")
        .bind(theme.id)
        .execute(pool)
        .await?;
    theme.play_count += 1;

    debug!(
        theme_id = theme.id,
        play_count = theme.play_count,
        candidates = candidates.len(),
        "Theme picked"
    );
    Ok(Some(theme))
}
