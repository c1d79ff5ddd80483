//! Configuration file loading
//!
//! Each service reads an optional TOML file. Resolution order:
//! 1. Explicit `--config` path (must exist and parse)
//! 2. `~/.config/sublime/{service}.toml`
//! 3. `/etc/sublime/{service}.toml` (Linux)
//! 4. Built-in defaults
//!
//! Missing default-location files are not an error: the service logs a
//! warning and starts with built-in defaults. Environment variables and
//! command-line arguments override file values in each binary.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Logging configuration section shared by all services
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default tracing filter directive (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Candidate config file locations for a service, most specific first
pub fn default_config_paths(service: &str) -> Vec<PathBuf> {
    let file_name = format!("{}.toml", service);
    let mut paths = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("sublime").join(&file_name));
    }
    if cfg!(target_os = "linux") {
        paths.push(PathBuf::from("/etc/sublime").join(&file_name));
    }
    paths
}

/// Parse a TOML config file
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Load a service config, degrading to defaults when no file exists
///
/// An explicitly requested file that is missing or malformed is an error.
/// A malformed file found in a default location is also an error, since
/// silently ignoring it would hide an operator mistake.
pub fn load_service_config<T>(service: &str, explicit: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if let Some(path) = explicit {
        info!("Loading configuration from {}", path.display());
        return load_toml_file(path);
    }

    for path in default_config_paths(service) {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            return load_toml_file(&path);
        }
    }

    warn!("No configuration file found for {}, using built-in defaults", service);
    Ok(T::default())
}

/// Read an environment variable, treating empty values as unset
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_end_with_service_file() {
        for path in default_config_paths("sublime-sync") {
            assert!(path.ends_with("sublime/sublime-sync.toml"));
        }
    }

    #[test]
    fn test_logging_default() {
        assert_eq!(LoggingConfig::default().level, "info");
    }
}
