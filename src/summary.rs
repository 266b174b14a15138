//! Serializable snapshot of a design for the surrounding shell.
//!
//! A [`DesignSummary`] is what the shell hands to its checkout link or
//! order form. It is read-only output: nothing in the engine consumes it
//! back, and image bytes are replaced by a short description.
//!
//! # Example
//!
//! ```
//! use garment_studio::{DesignSummary, GarmentId};
//!
//! let json = r##"{
//!   "garment": "shirt",
//!   "garmentName": "Essential Tee",
//!   "baseColor": "#e639a8",
//!   "basePrice": 20000,
//!   "layerSurcharge": 5,
//!   "totalPrice": 20000,
//!   "layers": []
//! }"##;
//!
//! let summary = DesignSummary::from_json(json).unwrap();
//! assert_eq!(summary.garment, GarmentId::Shirt);
//! assert!(summary.layers.is_empty());
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::{GarmentDefinition, GarmentId};
use crate::color::BaseColor;
use crate::layer::{Layer, LayerContent, LayerId, LayerKind, Side};

// ============================================================================
// LayerSummary
// ============================================================================

/// One layer as the shell sees it.
///
/// ```json
/// {
///   "id": 3,
///   "kind": "text",
///   "side": "front",
///   "position": [0.0, 0.04, 0.15],
///   "rotation": [0.0, 0.0, 0.0],
///   "scale": [0.3, 0.15, 0.3],
///   "text": "Team 42",
///   "font": "sans-serif",
///   "color": "#ffffff"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub id: LayerId,
    pub kind: LayerKind,
    pub side: Side,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "jsonschema", schemars(with = "Option<String>"))]
    pub color: Option<BaseColor>,

    /// Short description of the image source (never the bytes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&Layer> for LayerSummary {
    fn from(layer: &Layer) -> Self {
        let t = layer.transform();
        let mut summary = Self {
            id: layer.id(),
            kind: layer.kind(),
            side: layer.side(),
            position: t.position.to_array(),
            rotation: t.rotation.to_array(),
            scale: t.scale.to_array(),
            text: None,
            font: None,
            color: None,
            image: None,
        };
        match layer.content() {
            LayerContent::Text { text, font, color } => {
                summary.text = Some(text.clone());
                summary.font = Some(font.clone());
                summary.color = Some(*color);
            }
            LayerContent::Image { source, .. } => summary.image = Some(source.describe()),
        }
        summary
    }
}

// ============================================================================
// DesignSummary
// ============================================================================

/// The whole design: garment, color, layers and price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct DesignSummary {
    pub garment: GarmentId,
    pub garment_name: String,

    #[cfg_attr(feature = "jsonschema", schemars(with = "String"))]
    pub base_color: BaseColor,

    pub base_price: u64,
    pub layer_surcharge: u64,
    pub total_price: u64,

    /// In render order (last on top).
    #[serde(default)]
    pub layers: Vec<LayerSummary>,
}

impl DesignSummary {
    pub fn new<'a>(
        garment: &GarmentDefinition,
        base_color: BaseColor,
        layer_surcharge: u64,
        layers: impl IntoIterator<Item = &'a Layer>,
    ) -> Self {
        let layers: Vec<LayerSummary> = layers.into_iter().map(LayerSummary::from).collect();
        Self {
            garment: garment.id,
            garment_name: garment.name.clone(),
            base_color,
            base_price: garment.base_price,
            layer_surcharge,
            total_price: price(garment.base_price, layer_surcharge, layers.len()),
            layers,
        }
    }

    /// Serializes the summary to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes the summary to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// `base + surcharge * layers`, saturating.
pub fn price(base: u64, surcharge: u64, layers: usize) -> u64 {
    base.saturating_add(surcharge.saturating_mul(layers as u64))
}
