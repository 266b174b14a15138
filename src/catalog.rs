//! Static garment catalog.

use std::fmt;
use std::str::FromStr;

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::StudioError;

/// Identifies a garment model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum GarmentId {
    Shirt,
    Hoodie,
    Cap,
}

impl GarmentId {
    pub const ALL: [GarmentId; 3] = [GarmentId::Shirt, GarmentId::Hoodie, GarmentId::Cap];

    pub fn as_str(&self) -> &'static str {
        match self {
            GarmentId::Shirt => "shirt",
            GarmentId::Hoodie => "hoodie",
            GarmentId::Cap => "cap",
        }
    }
}

impl fmt::Display for GarmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GarmentId {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shirt" | "tshirt" | "t-shirt" => Ok(GarmentId::Shirt),
            "hoodie" => Ok(GarmentId::Hoodie),
            "cap" => Ok(GarmentId::Cap),
            _ => Err(StudioError::UnknownGarment(s.to_string())),
        }
    }
}

/// Brings a garment mesh from its authored scale and orientation into the
/// shared garment space that layer transforms are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshNormalization {
    pub scale: f32,
    pub position: Vec3,
    /// Euler angles (XYZ order, radians).
    pub rotation: Vec3,
}

impl Default for MeshNormalization {
    fn default() -> Self {
        Self {
            scale: 1.0,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }
}

impl MeshNormalization {
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z),
            self.position,
        )
    }
}

/// A catalog entry. Immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarmentDefinition {
    pub id: GarmentId,
    pub name: String,
    /// Mesh asset path, relative to the configured asset root.
    pub mesh_asset: String,
    /// Price in the smallest currency unit.
    pub base_price: u64,
    #[serde(default)]
    pub normalization: MeshNormalization,
}

/// The set of garments a session can choose from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    garments: Vec<GarmentDefinition>,
}

impl Catalog {
    pub fn new(garments: Vec<GarmentDefinition>) -> Self {
        Self { garments }
    }

    /// The garments shipped with the studio.
    pub fn builtin() -> Self {
        Self::new(vec![
            GarmentDefinition {
                id: GarmentId::Shirt,
                name: "Essential Tee".to_string(),
                mesh_asset: "shirt.glb".to_string(),
                base_price: 20_000,
                normalization: MeshNormalization::default(),
            },
            GarmentDefinition {
                id: GarmentId::Hoodie,
                name: "Urban Hoodie".to_string(),
                mesh_asset: "hoodie.glb".to_string(),
                base_price: 45_000,
                normalization: MeshNormalization {
                    scale: 0.01,
                    position: Vec3::new(0.0, -0.05, 0.0),
                    rotation: Vec3::ZERO,
                },
            },
            GarmentDefinition {
                id: GarmentId::Cap,
                name: "Classic Cap".to_string(),
                mesh_asset: "cap.glb".to_string(),
                base_price: 12_000,
                normalization: MeshNormalization {
                    scale: 1.6,
                    position: Vec3::new(0.0, 0.1, 0.0),
                    rotation: Vec3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0),
                },
            },
        ])
    }

    pub fn get(&self, id: GarmentId) -> Option<&GarmentDefinition> {
        self.garments.iter().find(|g| g.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GarmentDefinition> {
        self.garments.iter()
    }

    pub fn len(&self) -> usize {
        self.garments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.garments.is_empty()
    }
}
