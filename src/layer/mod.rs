//! Decoration layers placed on a garment.
//!
//! A [`Layer`] is one text or image stamp with a side and a transform in
//! garment space. Layers live in a [`LayerStack`], which owns their order,
//! hands out ids and tracks which layer is open for editing.
//!
//! # Architecture
//!
//! Each layer carries a revision number that increments whenever anything
//! about it changes. Downstream caches (decal projections) key on that
//! revision, the same way textures key on [`Layer::texture_key`], so a
//! slider drag re-projects only the layer being dragged.

pub mod stack;

pub use stack::LayerStack;

use std::f32::consts::PI;
use std::fmt;

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::color::BaseColor;
use crate::raster::{ImageSource, TextureKey};

/// Smallest uniform scale a slider edit can produce.
pub const MIN_SCALE: f32 = 0.02;
/// Largest uniform scale a slider edit can produce.
pub const MAX_SCALE: f32 = 1.0;
/// Slider bound for the x and y offsets (either direction).
pub const MAX_OFFSET: f32 = 0.5;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque, monotonically increasing layer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(transparent)]
pub struct LayerId(u64);

impl LayerId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// Which face of the garment a layer is printed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Text,
    Image,
}

impl LayerKind {
    /// Height scale as a fraction of width scale.
    pub fn aspect(&self) -> f32 {
        match self {
            LayerKind::Text => 0.5,
            LayerKind::Image => 1.0,
        }
    }

    fn default_scale(&self) -> Vec3 {
        match self {
            LayerKind::Text => Vec3::new(0.3, 0.15, 0.3),
            LayerKind::Image => Vec3::splat(0.15),
        }
    }
}

/// Direction of a reorder step. `Up` moves toward index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// The slider-editable fields of a layer transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerField {
    X,
    Y,
    Scale,
}

// ============================================================================
// LayerTransform
// ============================================================================

/// Placement of a decal in normalized garment space.
///
/// `scale.x` is the print width, `scale.y` the print height and `scale.z`
/// the projection depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct LayerTransform {
    #[cfg_attr(feature = "jsonschema", schemars(with = "[f32; 3]"))]
    pub position: Vec3,
    /// Euler angles (XYZ order, radians).
    #[cfg_attr(feature = "jsonschema", schemars(with = "[f32; 3]"))]
    pub rotation: Vec3,
    #[cfg_attr(feature = "jsonschema", schemars(with = "[f32; 3]"))]
    pub scale: Vec3,
}

impl LayerTransform {
    /// Default placement for a newly added layer.
    ///
    /// Front layers sit just in front of the chest facing the viewer; back
    /// layers mirror that behind the garment and are turned half a revolution
    /// so they read correctly from behind.
    pub fn default_for(side: Side, kind: LayerKind) -> Self {
        let (position, rotation) = match side {
            Side::Front => (Vec3::new(0.0, 0.04, 0.15), Vec3::ZERO),
            Side::Back => (Vec3::new(0.0, 0.04, -0.15), Vec3::new(0.0, PI, 0.0)),
        };
        Self {
            position,
            rotation,
            scale: kind.default_scale(),
        }
    }

    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation_quat(), self.position)
    }

    /// Returns the uniform "size" shown on the scale slider.
    pub fn uniform_scale(&self) -> f32 {
        self.scale.x
    }
}

// ============================================================================
// LayerContent
// ============================================================================

/// What a layer prints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerContent {
    Text {
        text: String,
        font: String,
        color: BaseColor,
    },
    Image {
        source: ImageSource,
        digest: u64,
    },
}

impl LayerContent {
    pub fn text(text: impl Into<String>, font: impl Into<String>, color: BaseColor) -> Self {
        Self::Text {
            text: text.into(),
            font: font.into(),
            color,
        }
    }

    pub fn image(source: ImageSource) -> Self {
        let digest = source.digest();
        Self::Image { source, digest }
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            LayerContent::Text { .. } => LayerKind::Text,
            LayerContent::Image { .. } => LayerKind::Image,
        }
    }

    /// Key of the texture this content rasterizes or decodes to.
    pub fn texture_key(&self) -> TextureKey {
        match self {
            LayerContent::Text { text, font, color } => TextureKey::text(text, font, *color),
            LayerContent::Image { digest, .. } => TextureKey::Image(*digest),
        }
    }
}

// ============================================================================
// Layer
// ============================================================================

/// One decoration placed on the active garment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    id: LayerId,
    side: Side,
    transform: LayerTransform,
    content: LayerContent,
    #[serde(skip)]
    revision: u64,
}

impl Layer {
    fn new(id: LayerId, side: Side, content: LayerContent) -> Self {
        Self {
            id,
            side,
            transform: LayerTransform::default_for(side, content.kind()),
            content,
            revision: 0,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn kind(&self) -> LayerKind {
        self.content.kind()
    }

    pub fn transform(&self) -> &LayerTransform {
        &self.transform
    }

    pub fn content(&self) -> &LayerContent {
        &self.content
    }

    pub fn texture_key(&self) -> TextureKey {
        self.content.texture_key()
    }

    /// Increments whenever the transform or content changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns a copy with `field` set to `value`, or `None` when the edit
    /// changes nothing.
    fn with_field(&self, field: LayerField, value: f32) -> Option<Self> {
        let mut transform = self.transform;
        match field {
            LayerField::X => transform.position.x = value.clamp(-MAX_OFFSET, MAX_OFFSET),
            LayerField::Y => transform.position.y = value.clamp(-MAX_OFFSET, MAX_OFFSET),
            LayerField::Scale => {
                let s = value.clamp(MIN_SCALE, MAX_SCALE);
                transform.scale = Vec3::new(s, s * self.kind().aspect(), s);
            }
        }

        if transform == self.transform {
            return None;
        }
        Some(Self {
            transform,
            revision: self.revision.wrapping_add(1),
            ..self.clone()
        })
    }

    fn with_content(&self, content: LayerContent) -> Option<Self> {
        if content == self.content {
            return None;
        }
        Some(Self {
            content,
            revision: self.revision.wrapping_add(1),
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_layer(side: Side) -> Layer {
        Layer::new(
            LayerId(1),
            side,
            LayerContent::text("Hola", "sans-serif", BaseColor::BLACK),
        )
    }

    #[test]
    fn side_dependent_defaults() {
        let front = LayerTransform::default_for(Side::Front, LayerKind::Text);
        assert!(front.position.z > 0.0);
        assert_eq!(front.rotation, Vec3::ZERO);

        let back = LayerTransform::default_for(Side::Back, LayerKind::Image);
        assert!(back.position.z < 0.0);
        assert!((back.rotation.y - PI).abs() < 1e-6);
        assert_eq!(back.scale, Vec3::splat(0.15));
    }

    #[test]
    fn scale_edit_keeps_kind_aspect() {
        let text = text_layer(Side::Front)
            .with_field(LayerField::Scale, 0.4)
            .unwrap();
        assert_eq!(text.transform().scale, Vec3::new(0.4, 0.2, 0.4));

        let image = Layer::new(
            LayerId(2),
            Side::Front,
            LayerContent::image(ImageSource::from_bytes(vec![1])),
        )
        .with_field(LayerField::Scale, 0.4)
        .unwrap();
        assert_eq!(image.transform().scale, Vec3::splat(0.4));
    }

    #[test]
    fn field_edits_are_clamped_and_bump_revision() {
        let layer = text_layer(Side::Front);
        let moved = layer.with_field(LayerField::X, 3.0).unwrap();
        assert_eq!(moved.transform().position.x, MAX_OFFSET);
        assert_eq!(moved.transform().position.y, layer.transform().position.y);
        assert_eq!(moved.revision(), layer.revision() + 1);

        let tiny = layer.with_field(LayerField::Scale, 0.0).unwrap();
        assert_eq!(tiny.transform().uniform_scale(), MIN_SCALE);
    }

    #[test]
    fn no_op_edit_returns_none() {
        let layer = text_layer(Side::Front);
        assert!(layer.with_field(LayerField::X, 0.0).is_none());
        assert!(
            layer
                .with_content(LayerContent::text("Hola", "sans-serif", BaseColor::BLACK))
                .is_none()
        );
    }

    #[test]
    fn transform_matrix_places_origin() {
        let transform = LayerTransform::default_for(Side::Front, LayerKind::Text);
        let origin = transform.to_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - transform.position).length() < 1e-6);
    }

    #[test]
    fn layer_serializes_with_tagged_content() {
        let json = serde_json::to_value(text_layer(Side::Back)).unwrap();
        assert_eq!(json["side"], "back");
        assert_eq!(json["content"]["kind"], "text");
        assert_eq!(json["content"]["color"], "#000000");
    }
}
