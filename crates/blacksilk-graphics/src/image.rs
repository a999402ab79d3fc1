//! Layered images.
//!
//! An [`Image`] is an ordered stack of shared layers, index 0 being the top.
//! Every layer matches the image's nominal size and format; [`Image::reset`]
//! is the only way to change them.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLockReadGuard};

use blacksilk_core::PixelFormat;
use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
use tracing::{debug, trace, warn};

use crate::backend::{BackendDevice, BackendId};
use crate::error::GraphicsResult;
use crate::layer::{ImageLayer, SharedLayer};

/// Nominal shape plus free-form metadata directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
    /// Tags grouped by directory (e.g. `"Exif"`), then by tag name.
    #[serde(default)]
    pub directories: BTreeMap<String, BTreeMap<String, String>>,
}

impl ImageMeta {
    /// Metadata without tags.
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format,
            directories: BTreeMap::new(),
        }
    }

    /// Tag `name` of `directory`.
    pub fn tag(&self, directory: &str, name: &str) -> Option<&str> {
        self.directories.get(directory)?.get(name).map(String::as_str)
    }

    /// Sets a tag, creating the directory when needed.
    pub fn set_tag(&mut self, directory: impl Into<String>, name: impl Into<String>, value: impl Into<String>) {
        self.directories
            .entry(directory.into())
            .or_default()
            .insert(name.into(), value.into());
    }

    /// All tags of `directory`.
    pub fn directory(&self, directory: &str) -> Option<&BTreeMap<String, String>> {
        self.directories.get(directory)
    }

    /// Drops a directory; false if absent.
    pub fn remove_directory(&mut self, directory: &str) -> bool {
        self.directories.remove(directory).is_some()
    }
}

fn read(layer: &SharedLayer) -> Option<RwLockReadGuard<'_, ImageLayer>> {
    layer.read().ok()
}

/// Ordered stack of layers sharing one shape.
#[derive(Debug, Clone)]
pub struct Image {
    layers: Vec<SharedLayer>,
    meta: ImageMeta,
}

impl Image {
    /// Image without layers.
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            layers: Vec::new(),
            meta: ImageMeta::new(format, width, height),
        }
    }

    /// Single-layer image shaped like `layer`.
    pub fn from_layer(layer: ImageLayer) -> Self {
        let mut image = Self::new(layer.format(), layer.width(), layer.height());
        image.layers.push(layer.into_shared());
        image
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.meta.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.meta.height
    }

    /// Pixel format.
    pub fn format(&self) -> PixelFormat {
        self.meta.format
    }

    /// Metadata.
    pub fn meta(&self) -> &ImageMeta {
        &self.meta
    }

    /// Mutable metadata tags. Shape changes go through [`Image::reset`].
    pub fn meta_directories_mut(&mut self) -> &mut BTreeMap<String, BTreeMap<String, String>> {
        &mut self.meta.directories
    }

    /// Drops all layers and adopts a new shape.
    pub fn reset(&mut self, format: PixelFormat, width: u32, height: u32) {
        self.layers.clear();
        self.meta.format = format;
        self.meta.width = width;
        self.meta.height = height;
    }

    fn fits(&self, layer: &ImageLayer) -> bool {
        layer.format() == self.meta.format && layer.width() == self.meta.width && layer.height() == self.meta.height
    }

    // ========================================================================
    // Adding and removing
    // ========================================================================

    /// Allocates a zeroed layer on `device` and appends it.
    pub fn create_and_append_layer(
        &mut self,
        device: &Arc<dyn BackendDevice>,
        name: impl Into<String>,
    ) -> GraphicsResult<SharedLayer> {
        let layer = ImageLayer::new(device, self.meta.format, self.meta.width, self.meta.height)?
            .with_name(name)
            .into_shared();
        self.layers.push(layer.clone());
        Ok(layer)
    }

    /// Appends `layer` if it matches the image shape.
    pub fn append_layer(&mut self, layer: SharedLayer) -> bool {
        let fits = read(&layer).is_some_and(|l| self.fits(&l));
        if !fits {
            warn!(format = %self.meta.format, width = self.meta.width, height = self.meta.height, "layer does not match image");
            return false;
        }
        self.layers.push(layer);
        true
    }

    /// Removes `layer` (by identity).
    pub fn remove_layer(&mut self, layer: &SharedLayer) -> bool {
        match self.index_of(layer) {
            Some(index) => {
                self.layers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes the first layer called `name`.
    pub fn remove_layer_by_name(&mut self, name: &str) -> bool {
        let index = self.layers.iter().position(|l| read(l).is_some_and(|l| l.name() == name));
        match index {
            Some(index) => {
                self.layers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes the layer at `index`.
    pub fn remove_layer_by_index(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }
        self.layers.remove(index);
        true
    }

    /// Removes every layer.
    pub fn clear_layers(&mut self) {
        self.layers.clear();
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// True without layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// All layers, top first.
    pub fn layers(&self) -> &[SharedLayer] {
        &self.layers
    }

    /// Index of `layer` (by identity).
    pub fn index_of(&self, layer: &SharedLayer) -> Option<usize> {
        self.layers.iter().position(|l| Arc::ptr_eq(l, layer))
    }

    /// First layer called `name`.
    pub fn layer_by_name(&self, name: &str) -> Option<SharedLayer> {
        self.layers_matching(|l| l.name() == name).into_iter().next()
    }

    /// Layer at `index`.
    pub fn layer_by_index(&self, index: usize) -> Option<SharedLayer> {
        self.layers.get(index).cloned()
    }

    /// True if a layer is called `name`.
    pub fn contains_layer_with_name(&self, name: &str) -> bool {
        self.layer_by_name(name).is_some()
    }

    /// Topmost layer.
    pub fn top_layer(&self) -> Option<SharedLayer> {
        self.layers.first().cloned()
    }

    /// Bottommost layer.
    pub fn bottom_layer(&self) -> Option<SharedLayer> {
        self.layers.last().cloned()
    }

    fn layers_matching(&self, pred: impl Fn(&ImageLayer) -> bool) -> Vec<SharedLayer> {
        self.layers
            .iter()
            .filter(|l| read(l).is_some_and(|l| pred(&l)))
            .cloned()
            .collect()
    }

    /// Layers called `name`.
    pub fn layers_with_name(&self, name: &str) -> Vec<SharedLayer> {
        self.layers_matching(|l| l.name() == name)
    }

    /// Layers of the given size.
    pub fn layers_with_size(&self, width: u32, height: u32) -> Vec<SharedLayer> {
        self.layers_matching(|l| l.width() == width && l.height() == height)
    }

    /// Layers of the given format.
    pub fn layers_with_format(&self, format: PixelFormat) -> Vec<SharedLayer> {
        self.layers_matching(|l| l.format() == format)
    }

    /// Layers holding valid data on `backend`.
    pub fn layers_with_backend(&self, backend: BackendId) -> Vec<SharedLayer> {
        self.layers_matching(|l| l.contains_data_for_backend(backend))
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Moves `layer` one step towards the top.
    pub fn move_layer_up(&mut self, layer: &SharedLayer) -> bool {
        match self.index_of(layer) {
            Some(index) if index > 0 => {
                self.layers.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    /// Moves `layer` one step towards the bottom.
    pub fn move_layer_down(&mut self, layer: &SharedLayer) -> bool {
        match self.index_of(layer) {
            Some(index) if index + 1 < self.layers.len() => {
                self.layers.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    /// Moves `layer` by `steps`, positive towards the top. Fails without
    /// moving when the target lies outside the stack.
    pub fn move_layer(&mut self, layer: &SharedLayer, steps: i32) -> bool {
        let Some(index) = self.index_of(layer) else {
            return false;
        };
        let target = index as i64 - steps as i64;
        if target < 0 || target >= self.layers.len() as i64 {
            return false;
        }
        let moved = self.layers.remove(index);
        self.layers.insert(target as usize, moved);
        true
    }

    /// Swaps the layers at two indices.
    pub fn switch_layers(&mut self, first: usize, second: usize) -> bool {
        if first >= self.layers.len() || second >= self.layers.len() {
            return false;
        }
        self.layers.swap(first, second);
        true
    }

    // ========================================================================
    // Backends
    // ========================================================================

    /// Makes every layer hold data on `device`.
    pub fn update_layer_data_for_backend(&self, device: &Arc<dyn BackendDevice>) -> bool {
        self.layers
            .iter()
            .all(|l| l.write().is_ok_and(|mut l| l.update_data_for_backend(device)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;

    fn device() -> Arc<dyn BackendDevice> {
        Arc::new(CpuDevice::new())
    }

    fn names(image: &Image) -> Vec<String> {
        image.layers().iter().map(|l| l.read().unwrap().name().to_string()).collect()
    }

    fn image_abc() -> (Image, Vec<SharedLayer>) {
        let device = device();
        let mut image = Image::new(PixelFormat::Rgb8, 4, 2);
        let layers = ["a", "b", "c"]
            .into_iter()
            .map(|n| image.create_and_append_layer(&device, n).unwrap())
            .collect();
        (image, layers)
    }

    #[test]
    fn test_append_checks_shape() {
        let device = device();
        let mut image = Image::new(PixelFormat::Rgb8, 4, 2);
        let wrong = ImageLayer::new(&device, PixelFormat::Rgb8, 2, 2).unwrap().into_shared();
        assert!(!image.append_layer(wrong));
        let right = ImageLayer::new(&device, PixelFormat::Rgb8, 4, 2).unwrap().into_shared();
        assert!(image.append_layer(right.clone()));
        assert_eq!(image.index_of(&right), Some(0));
    }

    #[test]
    fn test_ordering() {
        let (mut image, layers) = image_abc();
        assert!(!image.move_layer_up(&layers[0]));
        assert!(image.move_layer_down(&layers[0]));
        assert_eq!(names(&image), ["b", "a", "c"]);
        assert!(image.move_layer(&layers[2], 2));
        assert_eq!(names(&image), ["c", "b", "a"]);
        assert!(!image.move_layer(&layers[2], 1));
        assert!(image.switch_layers(0, 2));
        assert_eq!(names(&image), ["a", "b", "c"]);
        assert!(Arc::ptr_eq(&image.top_layer().unwrap(), &layers[0]));
        assert!(Arc::ptr_eq(&image.bottom_layer().unwrap(), &layers[2]));
    }

    #[test]
    fn test_lookup_and_remove() {
        let (mut image, layers) = image_abc();
        assert!(Arc::ptr_eq(&image.layer_by_name("b").unwrap(), &layers[1]));
        assert_eq!(image.layers_with_backend(BackendId::Cpu).len(), 3);
        assert!(image.layers_with_backend(BackendId::Gpu).is_empty());
        assert_eq!(image.layers_with_size(4, 2).len(), 3);
        assert!(image.remove_layer_by_name("b"));
        assert!(image.remove_layer(&layers[0]));
        assert!(!image.remove_layer(&layers[0]));
        assert!(image.remove_layer_by_index(0));
        assert!(image.is_empty());
    }

    #[test]
    fn test_reset_and_meta() {
        let (mut image, _) = image_abc();
        image.meta_directories_mut().entry("Exif".into()).or_default().insert("Make".into(), "Leica".into());
        assert_eq!(image.meta().tag("Exif", "Make"), Some("Leica"));
        image.reset(PixelFormat::Mono16, 8, 8);
        assert_eq!(image.layer_count(), 0);
        assert_eq!((image.width(), image.format()), (8, PixelFormat::Mono16));
    }
}
