//! garment-studio: interactive garment decal engine
//!
//! This crate holds the state and geometry behind a garment customizer: a
//! user picks a garment, tints it, and stamps text or image layers onto the
//! 3D model. Rendering itself is left to the host; each frame the
//! [`GarmentSession`] hands back the scene, material colors and projected
//! decal meshes to draw.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use garment_studio::{
//!     BaseColor, Catalog, Direction, Frame, GarmentId, GarmentSession, ImmediateLoader,
//!     LayerField, Side, StudioConfig, TextRasterizer,
//! };
//! use garment_studio::resvg::usvg::fontdb::Database;
//!
//! let config = StudioConfig::default();
//! let rasterizer = TextRasterizer::new(Arc::new(Database::new()), config.text, 1.0);
//! let mut session =
//!     GarmentSession::new(config, Catalog::builtin(), ImmediateLoader::new(), rasterizer);
//!
//! session.select_garment(GarmentId::Shirt);
//! session.set_base_color(BaseColor::parse("#3b82f6").unwrap());
//!
//! // Layers go on the active side
//! session.set_active_side(Side::Back);
//! let id = session.add_text_layer("10", "sans-serif", BaseColor::WHITE).unwrap();
//! session.update_layer(id, LayerField::Scale, 0.5);
//!
//! // One step of the render loop
//! match session.frame(1.0 / 60.0) {
//!     Frame::Loading { progress } => println!("loading {}%", progress.percent()),
//!     Frame::Garment(frame) => println!("{} decals", frame.decals.len()),
//!     Frame::Unselected => unreachable!(),
//! }
//! ```
//!
//! # Design summaries
//!
//! The current design can be exported as JSON for a checkout link:
//!
//! ```
//! # use std::sync::Arc;
//! # use garment_studio::{BaseColor, Catalog, GarmentId, GarmentSession, ImmediateLoader,
//! #     StudioConfig, TextRasterizer};
//! # use garment_studio::resvg::usvg::fontdb::Database;
//! # let config = StudioConfig::default();
//! # let rasterizer = TextRasterizer::new(Arc::new(Database::new()), config.text, 1.0);
//! # let mut session =
//! #     GarmentSession::new(config, Catalog::builtin(), ImmediateLoader::new(), rasterizer);
//! session.select_garment(GarmentId::Hoodie);
//! session.add_text_layer("Crew", "serif", BaseColor::BLACK);
//!
//! let summary = session.summary().unwrap();
//! assert_eq!(summary.total_price, 45_005);
//! let json = summary.to_json().unwrap();
//! ```

mod catalog;
mod color;
mod config;
mod error;
mod material;
mod session;
mod summary;

pub mod decal;
pub mod layer;
pub mod loader;
pub mod raster;
pub mod scene;

pub use resvg;

pub use catalog::{Catalog, GarmentDefinition, GarmentId, MeshNormalization};
pub use color::{BaseColor, next_color, to_rgba};
pub use config::{StudioConfig, TextMetrics};
pub use decal::{DecalMesh, DecalPatch, DecalProjector, ReferencePlane, Surface};
pub use error::{Result, StudioError};
pub use layer::{
    Direction, Layer, LayerContent, LayerField, LayerId, LayerKind, LayerStack, LayerTransform,
    Side,
};
pub use loader::{
    AssetLoader, Generation, GltfAssetLoader, ImmediateLoader, LoadProgress, LoadState,
    PendingLoad,
};
pub use material::{Material, MaterialArena, MaterialHandle, MaterialSynchronizer};
pub use raster::{DecalTexture, ImageSource, RasterizedText, TextRasterizer, TextureCache, TextureKey};
pub use scene::{Aabb, MeshData, NodeId, SceneNode, SurfaceSelection, select_surface};
pub use session::{Draft, Frame, GarmentFrame, GarmentSession, SessionState};
pub use summary::{DesignSummary, LayerSummary};
