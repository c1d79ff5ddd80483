//! Realtime themes
//!
//! Decides when a request gets a freshly generated theme instead of a cached
//! one, generates it (theme first, then music from its phrase) and stores
//! the result so it joins the cache for later requests.

use crate::config::ContentConfig;
use crate::db::themes::{insert_theme, NewTheme};
use crate::error::Result;
use crate::generate::ThemeGenerator;
use crate::music::MusicModel;
use rand::Rng;
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use sublime_common::time::unix_millis;
use tracing::{debug, info};

/// When to generate instead of serving the cache
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealtimePolicy {
    pub enabled: bool,
    pub min_stock: u32,
    pub ratio: f64,
}

impl RealtimePolicy {
    pub fn from_config(config: &ContentConfig) -> Self {
        Self {
            enabled: config.realtime_enabled,
            min_stock: config.min_stock,
            ratio: config.realtime_ratio,
        }
    }

    /// Whether a request should be generated given `stock` cached themes
    ///
    /// Always false when disabled. Otherwise true when the caller forces it,
    /// when the cache is below the minimum stock, or by the configured ratio.
    pub fn should_generate(&self, stock: i64, forced: bool) -> bool {
        if !self.enabled {
            return false;
        }
        forced
            || stock < i64::from(self.min_stock)
            || (self.ratio > 0.0 && rand::thread_rng().gen_bool(self.ratio.min(1.0)))
    }
}

/// A generated theme and its audio
#[derive(Debug, Clone)]
pub struct Generated {
    pub theme: NewTheme,
    pub audio: Vec<u8>,
}

pub async fn generate(
    themes: &dyn ThemeGenerator,
    music: &dyn MusicModel,
    length: Duration,
) -> Result<Generated> {
    let theme = themes.generate().await?;
    let audio = music.compose(&theme.phrase, length).await?;
    info!(
        phrase = %theme.phrase,
        audio_bytes = audio.len(),
        "Realtime theme generated"
    );
    Ok(Generated { theme, audio })
}

/// Write the audio under `audio_dir` and insert the theme; returns its id
pub async fn save(pool: &SqlitePool, audio_dir: &Path, generated: &Generated) -> Result<i64> {
    tokio::fs::create_dir_all(audio_dir).await?;
    let file_name = format!("{}-{:08x}.mp3", unix_millis(), rand::random::<u32>());
    tokio::fs::write(audio_dir.join(&file_name), &generated.audio).await?;

    let theme = NewTheme {
        music_path: Some(file_name.clone()),
        ..generated.theme.clone()
    };
    let id = insert_theme(pool, &theme).await?;
    debug!(theme_id = id, file = %file_name, "Realtime theme stored");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::db::themes::get_theme;
    use crate::generate::OfflineThemeGenerator;
    use crate::music::SilentMusic;

    fn policy(enabled: bool, min_stock: u32, ratio: f64) -> RealtimePolicy {
        RealtimePolicy {
            enabled,
            min_stock,
            ratio,
        }
    }

    #[test]
    fn test_policy_decisions() {
        let stocked = policy(true, 20, 0.0);
        assert!(stocked.should_generate(0, false));
        assert!(stocked.should_generate(19, false));
        assert!(!stocked.should_generate(20, false));
        assert!(stocked.should_generate(500, true));

        assert!(policy(true, 0, 1.0).should_generate(500, false));

        let disabled = policy(false, 20, 1.0);
        assert!(!disabled.should_generate(0, true));
    }

    #[test]
    fn test_defaults_follow_config() {
        let policy = RealtimePolicy::from_config(&ContentConfig::default());
        assert!(policy.enabled);
        assert_eq!(policy.min_stock, 20);
        assert_eq!(policy.ratio, 0.05);
    }

    #[tokio::test]
    async fn test_generate_and_save() {
        let pool = init_memory_database().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let audio_dir = dir.path().join("generated");

        let generated = generate(&OfflineThemeGenerator, &SilentMusic, Duration::from_secs(1))
            .await
            .unwrap();
        let id = save(&pool, &audio_dir, &generated).await.unwrap();

        let record = get_theme(&pool, id).await.unwrap();
        assert_eq!(record.phrase_en, generated.theme.phrase);
        assert_eq!(record.play_count, 0);
        let file = record.music_path.unwrap();
        assert!(file.ends_with(".mp3"));
        assert_eq!(std::fs::read(audio_dir.join(file)).unwrap(), generated.audio);
    }
}
