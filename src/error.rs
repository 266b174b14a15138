//! Error types shared by loaders, rasterizers and the session.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving garment assets and decal textures.
///
/// None of these are fatal to a [`GarmentSession`](crate::GarmentSession):
/// the session logs them and falls back to its "nothing projected yet" state.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("failed to read asset '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse glTF asset: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("asset '{0}' has no scene to display")]
    EmptyAsset(String),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid image source: {0}")]
    InvalidImageSource(String),

    #[error("failed to rasterize text: {0}")]
    Raster(String),

    #[error("invalid color '{0}'")]
    InvalidColor(String),

    #[error("unknown garment '{0}'")]
    UnknownGarment(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("load was dropped before it completed")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, StudioError>;
