//! Shared resvg plumbing for the rasterizers.

use image::RgbaImage;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::Tree;

use crate::error::{Result, StudioError};

/// Renders a parsed tree into a pixmap of `width x height` logical pixels,
/// scaled by `pixel_ratio`.
///
/// Drawing math stays in logical units; only the backing buffer grows.
pub fn render_tree(tree: &Tree, width: u32, height: u32, pixel_ratio: f32) -> Result<RgbaImage> {
    let device_width = (width as f32 * pixel_ratio).ceil() as u32;
    let device_height = (height as f32 * pixel_ratio).ceil() as u32;

    let mut pixmap = Pixmap::new(device_width, device_height).ok_or_else(|| {
        StudioError::Raster(format!(
            "cannot allocate a {device_width}x{device_height} canvas"
        ))
    })?;
    resvg::render(
        tree,
        Transform::from_scale(pixel_ratio, pixel_ratio),
        &mut pixmap.as_mut(),
    );

    Ok(pixmap_to_rgba_image(&pixmap))
}

/// Copies a pixmap into straight-alpha RGBA.
pub fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let pixels = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    // Buffer length is width * height * 4 by construction.
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixels)
        .unwrap_or_else(|| RgbaImage::new(pixmap.width(), pixmap.height()))
}

/// Escapes text for use inside SVG character data and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
