//! The ordered layer sequence owned by a garment session.

use tracing::debug;

use super::{Direction, Layer, LayerContent, LayerField, LayerId, Side};
use crate::color::BaseColor;
use crate::raster::ImageSource;

/// Ordered layers for the active garment.
///
/// Later layers render on top. Every mutation bumps [`version`](Self::version);
/// rejected inputs leave the stack untouched and return `None`/`false`.
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Vec<Layer>,
    editing: Option<LayerId>,
    next_id: u64,
    version: u64,
    max_text_len: usize,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new(32)
    }
}

impl LayerStack {
    /// Creates an empty stack that truncates text to `max_text_len` chars.
    pub fn new(max_text_len: usize) -> Self {
        Self {
            layers: Vec::new(),
            editing: None,
            next_id: 1,
            version: 0,
            max_text_len,
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn as_slice(&self) -> &[Layer] {
        &self.layers
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    /// Incremented on every accepted mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The layer currently open in the editor, if any.
    pub fn editing(&self) -> Option<LayerId> {
        self.editing
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Appends a text layer. Empty or whitespace-only text is ignored.
    pub fn add_text(
        &mut self,
        text: &str,
        font: &str,
        color: BaseColor,
        side: Side,
    ) -> Option<LayerId> {
        let text = self.clip_text(text)?;
        Some(self.push(side, LayerContent::text(text, font, color)))
    }

    /// Appends an image layer. Sources that are not recognisably an image
    /// are ignored.
    pub fn add_image(&mut self, source: ImageSource, side: Side) -> Option<LayerId> {
        if !source.is_well_formed() {
            debug!(source = %source.describe(), "rejected malformed image source");
            return None;
        }
        Some(self.push(side, LayerContent::image(source)))
    }

    /// Rewrites one transform field of the matching layer.
    ///
    /// Returns false for unknown ids, non-finite values and edits that land
    /// on the current value.
    pub fn update(&mut self, id: LayerId, field: LayerField, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.replace(id, |layer| layer.with_field(field, value))
    }

    /// Replaces the content of a text layer. Image layers are left alone.
    pub fn update_text(&mut self, id: LayerId, text: &str, font: &str, color: BaseColor) -> bool {
        let Some(text) = self.clip_text(text) else {
            return false;
        };
        let content = LayerContent::text(text, font, color);
        self.replace(id, |layer| match layer.content {
            LayerContent::Text { .. } => layer.with_content(content),
            LayerContent::Image { .. } => None,
        })
    }

    /// Removes a layer, closing the editor if it was the one being edited.
    pub fn delete(&mut self, id: LayerId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.layers.remove(index);
        if self.editing == Some(id) {
            self.editing = None;
        }
        self.bump();
        true
    }

    /// Swaps the layer at `index` with its neighbor in `direction`.
    ///
    /// No-op at either end of the sequence.
    pub fn reorder(&mut self, index: usize, direction: Direction) -> bool {
        let neighbor = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => index.checked_add(1),
        };
        match neighbor {
            Some(other) if index < self.layers.len() && other < self.layers.len() => {
                self.layers.swap(index, other);
                self.bump();
                true
            }
            _ => false,
        }
    }

    pub fn reorder_by_id(&mut self, id: LayerId, direction: Direction) -> bool {
        match self.index_of(id) {
            Some(index) => self.reorder(index, direction),
            None => false,
        }
    }

    /// Drops every layer and closes the editor. Ids keep increasing.
    pub fn clear(&mut self) {
        if self.layers.is_empty() && self.editing.is_none() {
            return;
        }
        self.layers.clear();
        self.editing = None;
        self.bump();
    }

    /// Opens the editor on `id`. Unknown ids are ignored.
    pub fn open_editor(&mut self, id: LayerId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.editing = Some(id);
        true
    }

    pub fn close_editor(&mut self) {
        self.editing = None;
    }

    fn push(&mut self, side: Side, content: LayerContent) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        self.layers.push(Layer::new(id, side, content));
        self.bump();
        id
    }

    fn replace(&mut self, id: LayerId, edit: impl FnOnce(&Layer) -> Option<Layer>) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        match edit(&self.layers[index]) {
            Some(updated) => {
                self.layers[index] = updated;
                self.bump();
                true
            }
            None => false,
        }
    }

    fn clip_text(&self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }
        Some(text.chars().take(self.max_text_len).collect())
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}
