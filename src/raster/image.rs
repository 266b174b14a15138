//! User-supplied image sources for image layers.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use data_url::DataUrl;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// Where an image layer's pixels come from.
///
/// Browsers hand uploaded files over as `data:` URIs; native shells usually
/// have raw bytes or a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ImageSource {
    Bytes(Vec<u8>),
    DataUri(String),
    Path(PathBuf),
}

impl ImageSource {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn from_data_uri(uri: impl Into<String>) -> Self {
        Self::DataUri(uri.into())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Cheap syntactic check performed when a layer is added.
    ///
    /// Does not decode anything; a well-formed source can still fail to
    /// decode later.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Bytes(bytes) => !bytes.is_empty(),
            Self::DataUri(uri) => DataUrl::process(uri)
                .map(|url| url.mime_type().type_ == "image")
                .unwrap_or(false),
            Self::Path(path) => !path.as_os_str().is_empty(),
        }
    }

    /// A stable digest used to key decoded textures.
    pub fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Returns a short label suitable for summaries and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Bytes(bytes) => format!("{} bytes", bytes.len()),
            Self::DataUri(uri) => match DataUrl::process(uri) {
                Ok(url) => {
                    let mime = url.mime_type();
                    format!("data:{}/{}", mime.type_, mime.subtype)
                }
                Err(_) => "data:invalid".to_string(),
            },
            Self::Path(path) => path.display().to_string(),
        }
    }

    /// Reads and decodes the source into RGBA pixels.
    pub fn decode(&self) -> Result<RgbaImage> {
        let bytes = match self {
            Self::Bytes(bytes) => return Ok(image::load_from_memory(bytes)?.to_rgba8()),
            Self::DataUri(uri) => {
                let url = DataUrl::process(uri)
                    .map_err(|e| StudioError::InvalidImageSource(format!("{e:?}")))?;
                let (body, _fragment) = url
                    .decode_to_vec()
                    .map_err(|e| StudioError::InvalidImageSource(format!("{e:?}")))?;
                body
            }
            Self::Path(path) => std::fs::read(path).map_err(|source| StudioError::Io {
                path: path.clone(),
                source,
            })?,
        };
        Ok(image::load_from_memory(&bytes)?.to_rgba8())
    }
}
