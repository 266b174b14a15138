//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working configuration.
//!
//! ```json
//! {
//!   "layerSurcharge": 5,
//!   "pixelRatio": 1.5,
//!   "colorRate": 4.0,
//!   "referencePlanes": false,
//!   "assetRoot": "public",
//!   "text": { "fontSize": 160.0, "padding": 40.0, "minWidth": 512, "minHeight": 128 }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::color::BaseColor;
use crate::error::{Result, StudioError};

/// Canvas metrics used when turning text into a decal bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct TextMetrics {
    /// Reference font size in logical pixels.
    pub font_size: f32,
    /// Padding added on each side of the measured text.
    pub padding: f32,
    /// Logical canvas width floor.
    pub min_width: u32,
    /// Logical canvas height floor.
    pub min_height: u32,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            font_size: 160.0,
            padding: 40.0,
            min_width: 512,
            min_height: 128,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct StudioConfig {
    /// Price added per decoration layer.
    pub layer_surcharge: u64,

    /// Device pixel ratio applied to rasterized text.
    pub pixel_ratio: f32,

    /// Exponential-decay rate for base color transitions (per second).
    pub color_rate: f32,

    /// Emit a flat reference plane alongside every projected decal.
    pub reference_planes: bool,

    /// Directory that garment mesh assets are resolved against.
    pub asset_root: PathBuf,

    /// Base color applied on startup and by reset.
    #[cfg_attr(feature = "jsonschema", schemars(with = "String"))]
    pub default_color: BaseColor,

    /// Colors offered by the shell's swatch picker.
    #[cfg_attr(feature = "jsonschema", schemars(with = "Vec<String>"))]
    pub preset_colors: Vec<BaseColor>,

    /// Font used by new text layers until the user picks another one.
    pub default_font: String,

    /// Maximum number of characters kept from a text layer.
    pub max_text_len: usize,

    pub text: TextMetrics,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            layer_surcharge: 5,
            pixel_ratio: 1.5,
            color_rate: 4.0,
            reference_planes: false,
            asset_root: PathBuf::from("public"),
            default_color: BaseColor::new(0xe6, 0x39, 0xa8),
            preset_colors: vec![
                BaseColor::new(0xe6, 0x39, 0xa8),
                BaseColor::new(0xff, 0xff, 0xff),
                BaseColor::new(0x18, 0x18, 0x1b),
                BaseColor::new(0x3b, 0x82, 0xf6),
                BaseColor::new(0xef, 0x44, 0x44),
                BaseColor::new(0xea, 0xb3, 0x08),
                BaseColor::new(0x10, 0xb9, 0x81),
            ],
            default_font: "sans-serif".to_string(),
            max_text_len: 32,
            text: TextMetrics::default(),
        }
    }
}

impl StudioConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| StudioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
