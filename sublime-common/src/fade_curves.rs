//! Fade-out curves for audio handoff
//!
//! When a bundle is superseded its audio element is ramped to silence before
//! being released. The ramp shape is configurable; the default is linear.
//!
//! All curves map normalized progress `t` (0.0 = fade start, 1.0 = fade end)
//! to a gain multiplier going from 1.0 to 0.0.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};
use std::str::FromStr;

/// Fade-out curve types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Linear: g(t) = 1 - t
    #[default]
    Linear,

    /// Logarithmic: g(t) = (1-t)²
    /// Fast start, slow finish
    Logarithmic,

    /// S-Curve: g(t) = 0.5 × (1 + cos(π × t))
    SCurve,

    /// Equal-Power: g(t) = cos(t × π/2)
    /// Keeps perceived loudness steady while the next track fades in
    EqualPower,
}

impl FadeCurve {
    /// Gain multiplier at normalized position `position` (clamped to 0..=1)
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Volume at `position` for a fade starting from `start_volume`
    pub fn volume_at(&self, start_volume: f32, position: f32) -> f32 {
        (start_volume * self.calculate_fade_out(position)).clamp(0.0, 1.0)
    }

    /// Canonical configuration value
    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Logarithmic => "logarithmic",
            FadeCurve::SCurve => "s_curve",
            FadeCurve::EqualPower => "equal_power",
        }
    }

    pub fn all_variants() -> &'static [FadeCurve] {
        &[
            FadeCurve::Linear,
            FadeCurve::Logarithmic,
            FadeCurve::SCurve,
            FadeCurve::EqualPower,
        ]
    }
}

impl FromStr for FadeCurve {
    type Err = Error;

    /// Accepts canonical values plus `cosine`/`scurve`/`s-curve` and `equalpower`
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(FadeCurve::Linear),
            "logarithmic" => Ok(FadeCurve::Logarithmic),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Ok(FadeCurve::SCurve),
            "equal_power" | "equalpower" => Ok(FadeCurve::EqualPower),
            _ => Err(Error::InvalidInput(format!("unknown fade curve: {:?}", s))),
        }
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
