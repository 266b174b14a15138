//! Garment and ink colors.
//!
//! Colors enter the engine as `#rrggbb` strings from the UI shell and are
//! interpolated in linear RGB so tints blend without muddy midpoints.

use std::fmt;
use std::str::FromStr;

use palette::{LinSrgb, Srgb};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

// ============================================================================
// BaseColor
// ============================================================================

/// An opaque 8-bit sRGB color, serialized as a `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BaseColor {
    r: u8,
    g: u8,
    b: u8,
}

impl BaseColor {
    pub const WHITE: Self = Self::new(0xff, 0xff, 0xff);
    pub const BLACK: Self = Self::new(0x00, 0x00, 0x00);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb`, `rrggbb` or the short `#rgb` form.
    pub fn parse(hex: &str) -> Result<Self> {
        let rgb = Srgb::<u8>::from_str(hex.trim())
            .map_err(|_| StudioError::InvalidColor(hex.to_string()))?;
        Ok(Self::new(rgb.red, rgb.green, rgb.blue))
    }

    /// Returns the lowercase `#rrggbb` form.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn as_tuple(&self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    /// Converts to linear RGB for interpolation and shading.
    pub fn to_linear(&self) -> LinSrgb {
        Srgb::new(self.r, self.g, self.b)
            .into_format::<f32>()
            .into_linear()
    }

    /// Quantizes a linear color back to 8-bit sRGB.
    pub fn from_linear(color: LinSrgb) -> Self {
        let srgb: Srgb<u8> = Srgb::<f32>::from_linear(color).into_format();
        Self::new(srgb.red, srgb.green, srgb.blue)
    }
}

impl Default for BaseColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for BaseColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for BaseColor {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BaseColor {
    type Error = StudioError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<BaseColor> for String {
    fn from(color: BaseColor) -> Self {
        color.to_hex()
    }
}

// ============================================================================
// Interpolation
// ============================================================================

/// Advances `current` toward `target` by one frame of exponential decay.
///
/// Computes `current + (target - current) * (1 - e^(-rate * dt))`, so the
/// perceived speed does not depend on the frame rate. A non-positive or
/// non-finite `dt` leaves the color unchanged.
pub fn next_color(current: LinSrgb, target: LinSrgb, dt: f32, rate: f32) -> LinSrgb {
    if !dt.is_finite() || dt <= 0.0 {
        return current;
    }
    let t = 1.0 - (-rate * dt).exp();
    LinSrgb::new(
        current.red + (target.red - current.red) * t,
        current.green + (target.green - current.green) * t,
        current.blue + (target.blue - current.blue) * t,
    )
}

/// Returns the color as `[r, g, b, 1.0]` for material upload.
pub fn to_rgba(color: LinSrgb) -> [f32; 4] {
    [color.red, color.green, color.blue, 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: LinSrgb, b: LinSrgb) -> f32 {
        ((a.red - b.red).powi(2) + (a.green - b.green).powi(2) + (a.blue - b.blue).powi(2)).sqrt()
    }

    #[test]
    fn parse_hex_forms() {
        assert_eq!(BaseColor::parse("#E639A8").unwrap(), BaseColor::new(0xe6, 0x39, 0xa8));
        assert_eq!(BaseColor::parse("18181b").unwrap(), BaseColor::new(0x18, 0x18, 0x1b));
        assert_eq!(BaseColor::parse("#fff").unwrap(), BaseColor::WHITE);
        assert!(BaseColor::parse("pink").is_err());
        assert!(BaseColor::parse("").is_err());
    }

    #[test]
    fn hex_output_is_lowercase() {
        let color: BaseColor = "#3B82F6".parse().unwrap();
        assert_eq!(color.to_hex(), "#3b82f6");
    }

    #[test]
    fn serde_uses_hex_strings() {
        let color = BaseColor::new(0xef, 0x44, 0x44);
        let json = serde_json::to_string(&color).unwrap();
        assert_eq!(json, "\"#ef4444\"");
        let back: BaseColor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, color);
        assert!(serde_json::from_str::<BaseColor>("\"nope\"").is_err());
    }

    #[test]
    fn linear_conversion_survives_quantization() {
        let color = BaseColor::new(0xea, 0xb3, 0x08);
        assert_eq!(BaseColor::from_linear(color.to_linear()), color);
    }

    #[test]
    fn next_color_moves_toward_target() {
        let current = BaseColor::BLACK.to_linear();
        let target = BaseColor::WHITE.to_linear();

        let step = next_color(current, target, 1.0 / 60.0, 4.0);
        assert!(distance(step, target) < distance(current, target));
        assert!(step.red > 0.0 && step.red < 1.0);
    }

    #[test]
    fn next_color_ignores_non_positive_dt() {
        let current = BaseColor::BLACK.to_linear();
        let target = BaseColor::WHITE.to_linear();
        assert_eq!(next_color(current, target, 0.0, 4.0), current);
        assert_eq!(next_color(current, target, -1.0, 4.0), current);
        assert_eq!(next_color(current, target, f32::NAN, 4.0), current);
    }

    #[test]
    fn next_color_is_frame_rate_independent() {
        let start = BaseColor::BLACK.to_linear();
        let target = BaseColor::WHITE.to_linear();

        let mut fast = start;
        for _ in 0..120 {
            fast = next_color(fast, target, 1.0 / 120.0, 4.0);
        }
        let mut slow = start;
        for _ in 0..30 {
            slow = next_color(slow, target, 1.0 / 30.0, 4.0);
        }
        assert!(distance(fast, slow) < 1e-4);
    }

    #[test]
    fn long_frames_converge() {
        let target = BaseColor::new(0x10, 0xb9, 0x81).to_linear();
        let result = next_color(BaseColor::BLACK.to_linear(), target, 60.0, 4.0);
        assert!(distance(result, target) < 1e-5);
    }
}
