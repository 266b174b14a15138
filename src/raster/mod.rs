//! Decal texture sources and their cache.
//!
//! Every layer resolves to exactly one [`DecalTexture`]. Text layers are
//! rasterized synchronously by [`TextRasterizer`]; image layers are decoded
//! by the asset loader and inserted once they arrive. The [`TextureCache`]
//! keys both by layer content, so a texture is regenerated only when that
//! content changes.

pub mod image;
pub mod svg;
pub mod text;

pub use self::image::ImageSource;
pub use text::{RasterizedText, TextRasterizer};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ::image::RgbaImage;
use tracing::debug;

use crate::color::BaseColor;
use crate::error::Result;

// ============================================================================
// DecalTexture
// ============================================================================

/// A bitmap ready to be stamped onto a garment.
#[derive(Debug, Clone, PartialEq)]
pub struct DecalTexture {
    pub image: RgbaImage,
    /// Width / height of the intended print area.
    pub aspect: f32,
}

impl DecalTexture {
    pub fn from_image(image: RgbaImage) -> Self {
        let aspect = if image.height() == 0 {
            1.0
        } else {
            image.width() as f32 / image.height() as f32
        };
        Self { image, aspect }
    }

    pub fn from_text(text: RasterizedText) -> Self {
        let aspect = text.logical_width as f32 / text.logical_height.max(1) as f32;
        Self {
            image: text.image,
            aspect,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

// ============================================================================
// TextureKey
// ============================================================================

/// Identifies the content a texture was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextureKey {
    Text {
        text: String,
        font: String,
        color: BaseColor,
    },
    /// Digest of an [`ImageSource`].
    Image(u64),
}

impl TextureKey {
    pub fn text(text: &str, font: &str, color: BaseColor) -> Self {
        Self::Text {
            text: text.to_string(),
            font: font.to_string(),
            color,
        }
    }

    pub fn image(source: &ImageSource) -> Self {
        Self::Image(source.digest())
    }
}

// ============================================================================
// TextureCache
// ============================================================================

/// Memoizes decal textures by content.
#[derive(Default)]
pub struct TextureCache {
    entries: HashMap<TextureKey, Arc<DecalTexture>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &TextureKey) -> Option<Arc<DecalTexture>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &TextureKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the cached text texture or rasterizes and stores it.
    pub fn text(
        &mut self,
        rasterizer: &TextRasterizer,
        text: &str,
        font: &str,
        color: BaseColor,
    ) -> Result<Arc<DecalTexture>> {
        let key = TextureKey::text(text, font, color);
        if let Some(cached) = self.entries.get(&key) {
            return Ok(cached.clone());
        }

        let texture = Arc::new(DecalTexture::from_text(
            rasterizer.rasterize(text, font, color)?,
        ));
        self.entries.insert(key, texture.clone());
        Ok(texture)
    }

    /// Stores a decoded image under the digest of its source.
    pub fn insert_image(&mut self, digest: u64, image: RgbaImage) -> Arc<DecalTexture> {
        let texture = Arc::new(DecalTexture::from_image(image));
        self.entries
            .insert(TextureKey::Image(digest), texture.clone());
        texture
    }

    /// Drops every texture whose key is not in `live`.
    pub fn retain_keys(&mut self, live: &HashSet<TextureKey>) {
        let before = self.entries.len();
        self.entries.retain(|key, _| live.contains(key));
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, "evicted unused decal textures");
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
