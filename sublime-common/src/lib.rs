//! # Sublime Common Library
//!
//! Shared code for the Sublime ambiance services including:
//! - Error types
//! - Event types (SublimeEvent enum) broadcast to UI subscribers
//! - Wire schemas exchanged with the content service
//! - Palette parsing and contrast text color
//! - Supported languages and their loading phrases
//! - Fade curve definitions
//! - Configuration file loading

pub mod colors;
pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod language;
pub mod theme;
pub mod time;

pub use colors::{Palette, TextColor};
pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use language::Language;
