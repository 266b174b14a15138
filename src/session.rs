//! The live customization session.
//!
//! [`GarmentSession`] owns the layer stack and every derived resource for
//! the active garment: the loaded scene, its materials, decoded textures and
//! decal projections. The shell calls the mutation methods in response to
//! user input and [`frame`](GarmentSession::frame) once per rendered frame.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use garment_studio::{
//!     BaseColor, Catalog, Frame, GarmentId, GarmentSession, ImmediateLoader, StudioConfig,
//!     TextRasterizer,
//! };
//! use garment_studio::resvg::usvg::fontdb::Database;
//!
//! let config = StudioConfig::default();
//! let rasterizer = TextRasterizer::new(Arc::new(Database::new()), config.text, 1.0);
//! let mut session =
//!     GarmentSession::new(config, Catalog::builtin(), ImmediateLoader::new(), rasterizer);
//!
//! assert!(matches!(session.frame(0.016), Frame::Unselected));
//!
//! session.select_garment(GarmentId::Shirt);
//! session.add_text_layer("Team 42", "sans-serif", BaseColor::WHITE);
//! assert_eq!(session.total_price(), Some(20_005));
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use glam::Mat4;
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, GarmentDefinition, GarmentId};
use crate::color::BaseColor;
use crate::config::StudioConfig;
use crate::decal::{DecalPatch, DecalProjector, Surface};
use crate::layer::{Direction, LayerContent, LayerField, LayerId, LayerStack, Side};
use crate::loader::{AssetLoader, Generation, LoadProgress, LoadState, PendingLoad};
use crate::material::MaterialSynchronizer;
use crate::raster::{ImageSource, TextRasterizer, TextureCache, TextureKey};
use crate::scene::{NodeId, SceneNode};
use crate::summary::{DesignSummary, price};

// ============================================================================
// Public state types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No garment chosen yet; the shell shows its garment picker.
    Unselected,
    /// A garment is active and can be decorated.
    Configuring,
}

/// Fields of the "new layer" form.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub text: String,
    pub font: String,
    pub color: BaseColor,
    /// Side that new layers are placed on.
    pub side: Side,
}

impl Draft {
    fn new(config: &StudioConfig) -> Self {
        Self {
            text: String::new(),
            font: config.default_font.clone(),
            color: BaseColor::WHITE,
            side: Side::Front,
        }
    }
}

/// What the renderer should draw this frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Unselected,
    /// The garment mesh is still loading; draw a progress indicator.
    Loading { progress: LoadProgress },
    Garment(GarmentFrame),
}

#[derive(Debug, Clone)]
pub struct GarmentFrame {
    pub garment: GarmentId,
    pub generation: Generation,
    /// `None` when the mesh failed to load.
    pub scene: Option<Arc<SceneNode>>,
    /// Normalizes the asset into garment space.
    pub root_transform: Mat4,
    pub materials: Vec<(NodeId, [f32; 4])>,
    /// In layer order; later patches draw on top.
    pub decals: Vec<DecalPatch>,
    /// Image layers whose textures have not arrived yet.
    pub pending_textures: usize,
}

// ============================================================================
// Internal state
// ============================================================================

enum MeshState {
    Idle,
    Loading,
    Loaded {
        scene: Arc<SceneNode>,
        surface: Option<Surface>,
    },
    Failed,
}

struct ImageLoad {
    digest: u64,
    load: PendingLoad<RgbaImage>,
}

// ============================================================================
// GarmentSession
// ============================================================================

pub struct GarmentSession<L: AssetLoader> {
    config: StudioConfig,
    catalog: Catalog,
    loader: L,
    rasterizer: TextRasterizer,

    garment: Option<GarmentDefinition>,
    base_color: BaseColor,
    layers: LayerStack,
    draft: Draft,

    generation: Generation,
    mesh: MeshState,
    mesh_loads: Vec<PendingLoad<SceneNode>>,
    image_loads: Vec<ImageLoad>,
    failed_images: HashSet<u64>,
    progress: LoadProgress,

    textures: TextureCache,
    projector: DecalProjector,
    materials: MaterialSynchronizer,
}

impl<L: AssetLoader> GarmentSession<L> {
    pub fn new(config: StudioConfig, catalog: Catalog, loader: L, rasterizer: TextRasterizer) -> Self {
        Self {
            base_color: config.default_color,
            layers: LayerStack::new(config.max_text_len),
            draft: Draft::new(&config),
            projector: DecalProjector::new(config.reference_planes),
            materials: MaterialSynchronizer::new(config.default_color, config.color_rate),
            garment: None,
            generation: Generation::default(),
            mesh: MeshState::Idle,
            mesh_loads: Vec::new(),
            image_loads: Vec::new(),
            failed_images: HashSet::new(),
            progress: LoadProgress::default(),
            textures: TextureCache::new(),
            config,
            catalog,
            loader,
            rasterizer,
        }
    }

    /// Builds a session over the built-in catalog with system fonts.
    pub fn with_system_fonts(config: StudioConfig, loader: L) -> Self {
        let rasterizer = TextRasterizer::with_system_fonts(config.text, config.pixel_ratio);
        Self::new(config, Catalog::builtin(), loader, rasterizer)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        match self.garment {
            Some(_) => SessionState::Configuring,
            None => SessionState::Unselected,
        }
    }

    pub fn garment(&self) -> Option<&GarmentDefinition> {
        self.garment.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn base_color(&self) -> BaseColor {
        self.base_color
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn editing(&self) -> Option<LayerId> {
        self.layers.editing()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn progress(&self) -> LoadProgress {
        self.progress
    }

    /// True while the active garment's mesh has not arrived.
    pub fn is_loading(&self) -> bool {
        matches!(self.mesh, MeshState::Loading)
    }

    /// True when the last mesh load for the active garment failed.
    pub fn load_failed(&self) -> bool {
        matches!(self.mesh, MeshState::Failed)
    }

    /// The surface decals are projected onto, once resolved.
    pub fn surface(&self) -> Option<&Surface> {
        match &self.mesh {
            MeshState::Loaded { surface, .. } => surface.as_ref(),
            _ => None,
        }
    }

    /// Garment base price plus the per-layer surcharge. `None` before a
    /// garment is chosen.
    pub fn total_price(&self) -> Option<u64> {
        self.garment
            .as_ref()
            .map(|g| price(g.base_price, self.config.layer_surcharge, self.layers.len()))
    }

    pub fn summary(&self) -> Option<DesignSummary> {
        self.garment.as_ref().map(|g| {
            DesignSummary::new(g, self.base_color, self.config.layer_surcharge, self.layers.iter())
        })
    }

    // ------------------------------------------------------------------------
    // Garment and color
    // ------------------------------------------------------------------------

    /// Makes `id` the active garment.
    ///
    /// Always discards the current layers and draft, even when re-selecting
    /// the same garment, and starts loading the garment's mesh.
    pub fn select_garment(&mut self, id: GarmentId) -> bool {
        let Some(definition) = self.catalog.get(id).cloned() else {
            warn!(garment = %id, "garment not in catalog");
            return false;
        };

        info!(garment = %id, layers_dropped = self.layers.len(), "selecting garment");
        self.layers.clear();
        self.draft = Draft::new(&self.config);
        self.garment = Some(definition);
        self.start_mesh_load();
        true
    }

    /// Reloads the active garment's mesh after a failure. Layers are kept.
    pub fn retry_load(&mut self) -> bool {
        if self.garment.is_none() || self.is_loading() {
            return false;
        }
        info!("retrying garment load");
        self.failed_images.clear();
        self.start_mesh_load();
        true
    }

    pub fn set_base_color(&mut self, color: BaseColor) {
        self.base_color = color;
        if self.materials.set_target(color) {
            debug!(color = %color, "base color target changed");
        }
    }

    /// Shows or hides the flat placement guide drawn with every decal.
    pub fn set_reference_planes(&mut self, enabled: bool) {
        self.config.reference_planes = enabled;
        self.projector.set_reference_planes(enabled);
    }

    /// Sets the side that new layers are placed on. Existing layers stay.
    pub fn set_active_side(&mut self, side: Side) {
        self.draft.side = side;
    }

    pub fn set_draft_text(&mut self, text: impl Into<String>) {
        self.draft.text = text.into();
    }

    pub fn set_draft_font(&mut self, font: impl Into<String>) {
        self.draft.font = font.into();
    }

    pub fn set_draft_color(&mut self, color: BaseColor) {
        self.draft.color = color;
    }

    /// Restores the default color and drops every layer, keeping the garment.
    pub fn reset(&mut self) {
        debug!("resetting design");
        self.set_base_color(self.config.default_color);
        self.layers.clear();
        self.draft = Draft::new(&self.config);
    }

    // ------------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------------

    /// Adds a text layer on the active side and clears the draft text.
    ///
    /// Blank text, or no active garment, is a no-op.
    pub fn add_text_layer(&mut self, text: &str, font: &str, color: BaseColor) -> Option<LayerId> {
        if self.garment.is_none() {
            debug!("ignoring text layer without a garment");
            return None;
        }
        let id = self.layers.add_text(text, font, color, self.draft.side)?;
        self.draft.text.clear();
        debug!(layer = %id, side = ?self.draft.side, "added text layer");
        Some(id)
    }

    /// Adds a text layer from the draft fields.
    pub fn add_draft_layer(&mut self) -> Option<LayerId> {
        let Draft { text, font, color, .. } = self.draft.clone();
        self.add_text_layer(&text, &font, color)
    }

    /// Adds an image layer on the active side and starts decoding it.
    pub fn add_image_layer(&mut self, source: ImageSource) -> Option<LayerId> {
        if self.garment.is_none() {
            debug!("ignoring image layer without a garment");
            return None;
        }
        let id = self.layers.add_image(source.clone(), self.draft.side)?;
        debug!(layer = %id, source = %source.describe(), "added image layer");
        self.request_image(&source);
        Some(id)
    }

    pub fn update_layer(&mut self, id: LayerId, field: LayerField, value: f32) -> bool {
        self.layers.update(id, field, value)
    }

    pub fn update_text_layer(&mut self, id: LayerId, text: &str, font: &str, color: BaseColor) -> bool {
        self.layers.update_text(id, text, font, color)
    }

    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        let removed = self.layers.delete(id);
        if removed {
            debug!(layer = %id, "deleted layer");
        }
        removed
    }

    pub fn reorder_layer(&mut self, id: LayerId, direction: Direction) -> bool {
        self.layers.reorder_by_id(id, direction)
    }

    pub fn reorder_index(&mut self, index: usize, direction: Direction) -> bool {
        self.layers.reorder(index, direction)
    }

    pub fn open_editor(&mut self, id: LayerId) -> bool {
        self.layers.open_editor(id)
    }

    pub fn close_editor(&mut self) {
        self.layers.close_editor();
    }

    // ------------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------------

    /// Advances the session by `dt` seconds and describes what to draw.
    ///
    /// Never fails: load errors leave the garment without a mesh or without
    /// the affected decal, and are logged.
    pub fn frame(&mut self, dt: f32) -> Frame {
        self.poll_meshes();
        self.poll_images();
        self.materials.tick(dt);

        let Some(garment) = self.garment.as_ref() else {
            return Frame::Unselected;
        };
        if self.is_loading() {
            return Frame::Loading {
                progress: self.progress,
            };
        }

        let (scene, surface) = match &self.mesh {
            MeshState::Loaded { scene, surface } => (Some(scene.clone()), surface.as_ref()),
            _ => (None, None),
        };

        let mut decals = Vec::new();
        let mut pending_textures = 0;
        let mut missing = Vec::new();
        for layer in self.layers.iter() {
            let texture = match layer.content() {
                LayerContent::Text { text, font, color } => {
                    match self.textures.text(&self.rasterizer, text, font, *color) {
                        Ok(texture) => texture,
                        Err(err) => {
                            warn!(layer = %layer.id(), error = %err, "text layer failed to rasterize");
                            continue;
                        }
                    }
                }
                LayerContent::Image { source, digest } => match self.textures.get(&TextureKey::Image(*digest)) {
                    Some(texture) => texture,
                    None => {
                        if !self.failed_images.contains(digest) {
                            pending_textures += 1;
                            if !self.image_loads.iter().any(|l| l.digest == *digest) {
                                missing.push(source.clone());
                            }
                        }
                        continue;
                    }
                },
            };

            if let Some(surface) = surface {
                decals.push(self.projector.project(layer, texture, surface));
            }
        }

        let frame = GarmentFrame {
            garment: garment.id,
            generation: self.generation,
            scene,
            root_transform: garment.normalization.to_matrix(),
            materials: self.materials.colors(),
            decals,
            pending_textures,
        };

        for source in missing {
            self.request_image(&source);
        }
        self.evict_unused();
        Frame::Garment(frame)
    }

    fn start_mesh_load(&mut self) {
        let Some(garment) = self.garment.as_ref() else {
            return;
        };
        self.generation = self.generation.next();
        let receiver = self.loader.load_mesh(&garment.mesh_asset);
        self.mesh_loads.push(PendingLoad::new(
            self.generation,
            garment.mesh_asset.clone(),
            receiver,
        ));
        self.mesh = MeshState::Loading;
        self.image_loads.clear();
        self.projector.clear();
        self.materials.clear();
        self.progress = LoadProgress {
            requested: 1,
            completed: 0,
        };
        debug!(asset = %garment.mesh_asset, generation = %self.generation, "requested garment mesh");
    }

    fn request_image(&mut self, source: &ImageSource) {
        let digest = source.digest();
        if self.textures.contains(&TextureKey::Image(digest))
            || self.image_loads.iter().any(|l| l.digest == digest)
        {
            return;
        }
        let receiver = self.loader.decode_image(source);
        self.image_loads.push(ImageLoad {
            digest,
            load: PendingLoad::new(self.generation, source.describe(), receiver),
        });
        self.progress.requested += 1;
    }

    fn poll_meshes(&mut self) {
        let current = self.generation;
        let mut finished = Vec::new();
        self.mesh_loads.retain_mut(|load| match load.poll() {
            LoadState::Pending => true,
            state => {
                finished.push((load.generation(), load.label().to_string(), state));
                false
            }
        });

        for (generation, asset, state) in finished {
            if generation != current {
                debug!(%asset, %generation, %current, "discarding stale mesh load");
                continue;
            }
            self.progress.completed += 1;
            match state {
                LoadState::Ready(scene) => self.install_scene(scene),
                LoadState::Failed(err) => {
                    warn!(%asset, error = %err, "garment mesh failed to load");
                    self.mesh = MeshState::Failed;
                }
                LoadState::Cancelled | LoadState::Pending => {
                    warn!(%asset, "garment mesh load was cancelled");
                    self.mesh = MeshState::Failed;
                }
            }
        }
    }

    fn install_scene(&mut self, scene: SceneNode) {
        let Some(garment) = self.garment.as_ref() else {
            return;
        };
        let root_transform = garment.normalization.to_matrix();
        let surface = Surface::resolve(&scene, root_transform, self.generation.get());
        if surface.is_none() {
            warn!(garment = %garment.id, "no mesh suitable for decals; layers stay hidden");
        }
        self.materials.rebuild(&scene, self.generation.get());
        self.projector.clear();
        info!(
            garment = %garment.id,
            meshes = scene.mesh_count(),
            generation = %self.generation,
            "garment mesh ready"
        );
        self.mesh = MeshState::Loaded {
            scene: Arc::new(scene),
            surface,
        };
    }

    fn poll_images(&mut self) {
        let current = self.generation;
        let mut finished = Vec::new();
        self.image_loads.retain_mut(|image| match image.load.poll() {
            LoadState::Pending => true,
            state => {
                finished.push((image.digest, image.load.generation(), state));
                false
            }
        });

        for (digest, generation, state) in finished {
            if generation != current {
                debug!(%generation, %current, "discarding stale image decode");
                continue;
            }
            self.progress.completed += 1;
            match state {
                LoadState::Ready(image) => {
                    self.textures.insert_image(digest, image);
                }
                LoadState::Failed(err) => {
                    warn!(error = %err, "image layer failed to decode");
                    self.failed_images.insert(digest);
                }
                LoadState::Cancelled | LoadState::Pending => {
                    self.failed_images.insert(digest);
                }
            }
        }
    }

    fn evict_unused(&mut self) {
        let keys: HashSet<TextureKey> = self.layers.iter().map(|l| l.texture_key()).collect();
        self.textures.retain_keys(&keys);
        let ids: HashSet<LayerId> = self.layers.iter().map(|l| l.id()).collect();
        self.projector.retain_layers(&ids);
    }
}
