//! Error types for sublime-sync
//!
//! `Fetch`, `Decode` and `Playback` are the pipeline's error taxonomy; the
//! remaining variants cover configuration and misuse.

use thiserror::Error;

/// Main error type for the sync pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Content service unreachable or returned a failure status
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Response did not match the expected schema, or audio payload missing/malformed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Audio backend refused to load or play (autoplay policy, unsupported media)
    #[error("Playback error: {0}")]
    Playback(String),

    /// Translation service failure
    #[error("Translation error: {0}")]
    Translation(String),

    /// Operation not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from shared code
    #[error(transparent)]
    Common(#[from] sublime_common::Error),
}

/// Convenience Result type using sublime-sync Error
pub type Result<T> = std::result::Result<T, Error>;
