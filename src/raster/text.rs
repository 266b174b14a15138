//! Text-to-bitmap rasterization for text layers.
//!
//! The text is laid out as a single SVG `<text>` element and rendered with
//! resvg, so font fallback and shaping follow usvg's text pipeline.

use std::sync::Arc;

use image::RgbaImage;
use resvg::usvg::fontdb::{self, Database, Family, Query};
use resvg::usvg::{FontFamily, FontResolver, FontStretch, FontStyle, Options, Tree};
use tracing::debug;

use super::svg::{escape_xml, render_tree};
use crate::color::BaseColor;
use crate::config::TextMetrics;
use crate::error::{Result, StudioError};

/// A rasterized text decal.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizedText {
    /// Device pixels (`logical size * pixel ratio`), transparent background.
    pub image: RgbaImage,
    pub logical_width: u32,
    pub logical_height: u32,
}

/// Renders text layers into decal bitmaps.
///
/// Output depends only on `(text, font, color)` together with the
/// rasterizer's fixed font database, metrics and pixel ratio.
#[derive(Clone)]
pub struct TextRasterizer {
    fontdb: Arc<Database>,
    metrics: TextMetrics,
    pixel_ratio: f32,
}

impl TextRasterizer {
    pub fn new(fontdb: Arc<Database>, metrics: TextMetrics, pixel_ratio: f32) -> Self {
        Self {
            fontdb,
            metrics,
            pixel_ratio: if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
                pixel_ratio
            } else {
                1.0
            },
        }
    }

    /// Builds a rasterizer backed by the fonts installed on this machine.
    pub fn with_system_fonts(metrics: TextMetrics, pixel_ratio: f32) -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), "loaded system fonts for text layers");
        Self::new(Arc::new(db), metrics, pixel_ratio)
    }

    pub fn metrics(&self) -> &TextMetrics {
        &self.metrics
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Measures the advance width of `text` at the reference font size.
    ///
    /// Returns 0 when no face in the database can render the text.
    pub fn measure(&self, text: &str, font: &str) -> Result<f32> {
        let size = self.metrics.font_size;
        let probe_width = (size * text.chars().count().max(1) as f32 * 2.0).ceil();
        let svg = text_svg(text, font, BaseColor::BLACK, probe_width, size * 2.0, size);
        let tree = self.parse(&svg)?;

        let root = tree.root();
        if root.children().is_empty() {
            return Ok(0.0);
        }
        Ok(root.abs_bounding_box().width())
    }

    /// Rasterizes `text` centered on a transparent canvas.
    ///
    /// The canvas is the measured width plus padding on both sides, never
    /// smaller than the configured floors.
    pub fn rasterize(&self, text: &str, font: &str, color: BaseColor) -> Result<RasterizedText> {
        let m = &self.metrics;
        let measured = self.measure(text, font)?;

        let logical_width = ((measured + m.padding * 2.0).ceil() as u32).max(m.min_width);
        let logical_height = ((m.font_size + m.padding * 2.0).ceil() as u32).max(m.min_height);

        let svg = text_svg(
            text,
            font,
            color,
            logical_width as f32,
            logical_height as f32,
            m.font_size,
        );
        let tree = self.parse(&svg)?;
        let image = render_tree(&tree, logical_width, logical_height, self.pixel_ratio)?;

        debug!(
            text,
            font,
            width = image.width(),
            height = image.height(),
            "rasterized text layer"
        );

        Ok(RasterizedText {
            image,
            logical_width,
            logical_height,
        })
    }

    fn parse(&self, svg: &str) -> Result<Tree> {
        let opts = Options {
            fontdb: self.fontdb.clone(),
            font_resolver: font_resolver(),
            ..Default::default()
        };
        Tree::from_str(svg, &opts).map_err(|e| StudioError::Raster(e.to_string()))
    }
}

/// Maps CSS generic families onto the database's generic families, then falls
/// back to any sans-serif, serif or monospace face, then to the first face.
fn font_resolver() -> FontResolver<'static> {
    FontResolver {
        select_font: Box::new(|font, db| {
            let mut families: Vec<Family<'_>> = font
                .families()
                .iter()
                .map(|family| match family {
                    FontFamily::Serif => Family::Serif,
                    FontFamily::SansSerif => Family::SansSerif,
                    FontFamily::Cursive => Family::Cursive,
                    FontFamily::Fantasy => Family::Fantasy,
                    FontFamily::Monospace => Family::Monospace,
                    FontFamily::Named(name) => Family::Name(name),
                })
                .collect();
            families.extend([Family::SansSerif, Family::Serif, Family::Monospace]);

            let stretch = match font.stretch() {
                FontStretch::UltraCondensed => fontdb::Stretch::UltraCondensed,
                FontStretch::ExtraCondensed => fontdb::Stretch::ExtraCondensed,
                FontStretch::Condensed => fontdb::Stretch::Condensed,
                FontStretch::SemiCondensed => fontdb::Stretch::SemiCondensed,
                FontStretch::Normal => fontdb::Stretch::Normal,
                FontStretch::SemiExpanded => fontdb::Stretch::SemiExpanded,
                FontStretch::Expanded => fontdb::Stretch::Expanded,
                FontStretch::ExtraExpanded => fontdb::Stretch::ExtraExpanded,
                FontStretch::UltraExpanded => fontdb::Stretch::UltraExpanded,
            };
            let style = match font.style() {
                FontStyle::Normal => fontdb::Style::Normal,
                FontStyle::Italic => fontdb::Style::Italic,
                FontStyle::Oblique => fontdb::Style::Oblique,
            };

            let query = Query {
                families: &families,
                weight: fontdb::Weight(font.weight()),
                stretch,
                style,
            };
            db.query(&query).or_else(|| db.faces().next().map(|face| face.id))
        }),
        select_fallback: FontResolver::default_fallback_selector(),
    }
}

/// Builds an SVG document with `text` centered in a `width x height` canvas.
fn text_svg(text: &str, font: &str, color: BaseColor, width: f32, height: f32, size: f32) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><text x="{cx}" y="{cy}" font-family="{family}" font-size="{size}" font-weight="bold" text-anchor="middle" dominant-baseline="central" fill="{fill}">{body}</text></svg>"#,
        w = width,
        h = height,
        cx = width / 2.0,
        cy = height / 2.0,
        family = escape_xml(font),
        size = size,
        fill = color.to_hex(),
        body = escape_xml(text),
    )
}
