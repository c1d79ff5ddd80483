//! Palette parsing and contrast text color
//!
//! A theme palette is exactly five colors. The first colors dominate the
//! shader background, so the contrast calculation weights them more heavily
//! (weights 5, 4, 3, 2, 1) before comparing the perceived luminance against
//! a fixed threshold.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of colors in every theme palette
pub const PALETTE_SIZE: usize = 5;

/// Luminance above which dark text is used (0-255 scale)
pub const LUMINANCE_THRESHOLD: f64 = 140.0;

/// Per-position weights, first color weighted most
const PALETTE_WEIGHTS: [f64; PALETTE_SIZE] = [5.0, 4.0, 3.0, 2.0, 1.0];

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Perceived relative luminance on a 0-255 scale
    ///
    /// Formula: 0.2126 R + 0.7152 G + 0.0722 B
    pub fn luminance(&self) -> f64 {
        0.2126 * f64::from(self.r) + 0.7152 * f64::from(self.g) + 0.0722 * f64::from(self.b)
    }
}

impl FromStr for Rgb {
    type Err = Error;

    /// Parse `#rrggbb` or `#rgb` (case-insensitive, leading `#` required)
    fn from_str(s: &str) -> Result<Self> {
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| Error::InvalidInput(format!("color must start with '#': {:?}", s)))?;

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidInput(format!("invalid hex color: {:?}", s)));
        }

        let channel = |digits: &str| {
            u8::from_str_radix(digits, 16)
                .map_err(|e| Error::InvalidInput(format!("invalid hex color {:?}: {}", s, e)))
        };

        match hex.len() {
            6 => Ok(Rgb::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                // #abc is shorthand for #aabbcc
                let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Rgb::new(expand(0)?, expand(1)?, expand(2)?))
            }
            _ => Err(Error::InvalidInput(format!("invalid hex color length: {:?}", s))),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Text color class giving readable contrast over a palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextColor {
    Black,
    White,
}

impl fmt::Display for TextColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextColor::Black => write!(f, "black"),
            TextColor::White => write!(f, "white"),
        }
    }
}

/// Ordered five-color palette
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette([Rgb; PALETTE_SIZE]);

impl Palette {
    pub const fn new(colors: [Rgb; PALETTE_SIZE]) -> Self {
        Self(colors)
    }

    /// Parse a palette from hex strings, requiring exactly five colors
    pub fn parse<S: AsRef<str>>(colors: &[S]) -> Result<Self> {
        if colors.len() != PALETTE_SIZE {
            return Err(Error::InvalidInput(format!(
                "palette must have exactly {} colors, got {}",
                PALETTE_SIZE,
                colors.len()
            )));
        }

        let mut parsed = [Rgb::new(0, 0, 0); PALETTE_SIZE];
        for (slot, color) in parsed.iter_mut().zip(colors) {
            *slot = color.as_ref().parse()?;
        }
        Ok(Self(parsed))
    }

    /// Lowercase `#rrggbb` strings in palette order
    pub fn to_hex(&self) -> Vec<String> {
        self.0.iter().map(Rgb::to_string).collect()
    }

    /// Position-weighted mean luminance (0-255)
    pub fn weighted_luminance(&self) -> f64 {
        let total_weight: f64 = PALETTE_WEIGHTS.iter().sum();
        self.0
            .iter()
            .zip(PALETTE_WEIGHTS.iter())
            .map(|(color, weight)| color.luminance() * weight)
            .sum::<f64>()
            / total_weight
    }

    /// Text color with readable contrast over this palette
    pub fn text_color(&self) -> TextColor {
        text_color(self)
    }
}

impl Default for Palette {
    /// The static ambiance shown before any generated content arrives
    fn default() -> Self {
        Self([
            Rgb::new(0x2f, 0x22, 0x35),
            Rgb::new(0x3f, 0x32, 0x44),
            Rgb::new(0x60, 0x49, 0x5a),
            Rgb::new(0xa9, 0xac, 0xa9),
            Rgb::new(0xbf, 0xc3, 0xba),
        ])
    }
}

/// Deterministic contrast text color for a palette
pub fn text_color(palette: &Palette) -> TextColor {
    if palette.weighted_luminance() > LUMINANCE_THRESHOLD {
        TextColor::Black
    } else {
        TextColor::White
    }
}
