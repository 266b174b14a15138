//! Asynchronous asset and texture loading.
//!
//! Loads are requested from an [`AssetLoader`] and answered through a
//! `tokio` oneshot channel. The frame loop never blocks on them: it polls
//! each [`PendingLoad`] once per frame and drops results whose
//! [`Generation`] has been superseded.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use image::RgbaImage;
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, Receiver, error::TryRecvError};
use tracing::debug;

use crate::config::StudioConfig;
use crate::error::{Result, StudioError};
use crate::raster::ImageSource;
use crate::scene::{SceneNode, import};

// ============================================================================
// Generation
// ============================================================================

/// Monotonically increasing tag attached to every load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Returns the successor of this generation.
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

// ============================================================================
// AssetLoader
// ============================================================================

/// Something that can fetch garment meshes and decode uploaded images.
///
/// Both calls return immediately; the result arrives on the receiver.
pub trait AssetLoader {
    fn load_mesh(&self, asset: &str) -> Receiver<Result<SceneNode>>;

    fn decode_image(&self, source: &ImageSource) -> Receiver<Result<RgbaImage>>;
}

/// Loads `.glb` files from disk on a tokio blocking pool.
#[derive(Debug, Clone)]
pub struct GltfAssetLoader {
    root: PathBuf,
    handle: Handle,
}

impl GltfAssetLoader {
    pub fn new(root: impl Into<PathBuf>, handle: Handle) -> Self {
        Self {
            root: root.into(),
            handle,
        }
    }

    /// Resolves assets against the configured asset root.
    pub fn from_config(config: &StudioConfig, handle: Handle) -> Self {
        Self::new(config.asset_root.clone(), handle)
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl AssetLoader for GltfAssetLoader {
    fn load_mesh(&self, asset: &str) -> Receiver<Result<SceneNode>> {
        let (tx, rx) = oneshot::channel();
        let path = self.root.join(asset);
        self.handle.spawn_blocking(move || {
            // The receiver is gone when the session moved on; nothing to do.
            let _ = tx.send(import::load_path(&path));
        });
        rx
    }

    fn decode_image(&self, source: &ImageSource) -> Receiver<Result<RgbaImage>> {
        let (tx, rx) = oneshot::channel();
        let source = source.clone();
        self.handle.spawn_blocking(move || {
            let _ = tx.send(source.decode());
        });
        rx
    }
}

/// Resolves every request synchronously from memory.
///
/// Meshes are registered up front by asset name; images are decoded on the
/// calling thread. Useful for tests and one-shot tools.
#[derive(Debug, Clone, Default)]
pub struct ImmediateLoader {
    meshes: HashMap<String, SceneNode>,
}

impl ImmediateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mesh(mut self, asset: impl Into<String>, scene: SceneNode) -> Self {
        self.insert(asset, scene);
        self
    }

    pub fn insert(&mut self, asset: impl Into<String>, scene: SceneNode) {
        self.meshes.insert(asset.into(), scene);
    }
}

impl AssetLoader for ImmediateLoader {
    fn load_mesh(&self, asset: &str) -> Receiver<Result<SceneNode>> {
        let (tx, rx) = oneshot::channel();
        let result = self
            .meshes
            .get(asset)
            .cloned()
            .ok_or_else(|| StudioError::EmptyAsset(asset.to_string()));
        let _ = tx.send(result);
        rx
    }

    fn decode_image(&self, source: &ImageSource) -> Receiver<Result<RgbaImage>> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(source.decode());
        rx
    }
}

// ============================================================================
// PendingLoad
// ============================================================================

/// Outcome of polling a [`PendingLoad`].
#[derive(Debug)]
pub enum LoadState<T> {
    Pending,
    Ready(T),
    Failed(StudioError),
    /// The loader dropped the request without answering.
    Cancelled,
}

/// An in-flight load tagged with the generation that requested it.
#[derive(Debug)]
pub struct PendingLoad<T> {
    generation: Generation,
    label: String,
    receiver: Receiver<Result<T>>,
}

impl<T> PendingLoad<T> {
    pub fn new(generation: Generation, label: impl Into<String>, receiver: Receiver<Result<T>>) -> Self {
        Self {
            generation,
            label: label.into(),
            receiver,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Checks for a result without blocking.
    pub fn poll(&mut self) -> LoadState<T> {
        match self.receiver.try_recv() {
            Ok(Ok(value)) => LoadState::Ready(value),
            Ok(Err(err)) => LoadState::Failed(err),
            Err(TryRecvError::Empty) => LoadState::Pending,
            Err(TryRecvError::Closed) => {
                debug!(label = %self.label, generation = %self.generation, "load dropped by loader");
                LoadState::Cancelled
            }
        }
    }
}

// ============================================================================
// LoadProgress
// ============================================================================

/// Counts shown by the loading placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadProgress {
    pub requested: usize,
    pub completed: usize,
}

impl LoadProgress {
    /// Whole percent complete; 100 when nothing was requested.
    pub fn percent(&self) -> u8 {
        if self.requested == 0 {
            return 100;
        }
        ((self.completed.min(self.requested) * 100) / self.requested) as u8
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.requested
    }
}
