//! Theme manifest import
//!
//! A manifest is a JSON document `{ "themes": [ { phrase, colors, speed,
//! softness, stepsPerColor, musicPath } ] }`.

use crate::db::themes::{insert_theme, NewTheme};
use crate::error::{Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub themes: Vec<NewTheme>,
}

impl Manifest {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::BadRequest(format!("manifest: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }
}

/// Insert every valid theme, skipping invalid entries; returns the count inserted
pub async fn seed(pool: &SqlitePool, manifest: &Manifest) -> Result<usize> {
    let mut inserted = 0;
    for (index, theme) in manifest.themes.iter().enumerate() {
        match insert_theme(pool, theme).await {
            Ok(id) => {
                inserted += 1;
                info!(theme_id = id, phrase = %theme.phrase, "Theme seeded");
            }
            Err(Error::BadRequest(reason)) => {
                warn!(index, "Skipping invalid manifest entry: {}", reason);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory_database, themes::count_themes};

    const MANIFEST: &str = r##"{
        "themes": [
            {
                "phrase": "Lanterns drifting over still water",
                "colors": ["#0b1026", "#1d2b53", "#7e2553", "#ff77a8", "#ffccaa"],
                "speed": 0.7,
                "stepsPerColor": 2,
                "musicPath": "lanterns.mp3"
            },
            {
                "phrase": "Broken palette",
                "colors": ["#000000"]
            }
        ]
    }"##;

    #[tokio::test]
    async fn test_seed_skips_invalid_entries() {
        let pool = init_memory_database().await.unwrap();
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.themes.len(), 2);
        assert_eq!(manifest.themes[0].softness, 1.0);

        assert_eq!(seed(&pool, &manifest).await.unwrap(), 1);
        assert_eq!(count_themes(&pool).await.unwrap(), 1);
    }

    #[test]
    fn test_malformed_manifest() {
        assert!(matches!(Manifest::parse("{\"themes\": 3}"), Err(Error::BadRequest(_))));
    }
}
