//! Backend-neutral image layer.
//!
//! An [`ImageLayer`] is one logical pixel plane with up to one
//! representation per backend. Each representation is valid (holds the
//! current pixels) or stale. Operations run only on backends where all
//! participating layers are valid; [`ImageLayer::update_data_for_backend`]
//! brings a stale or missing backend up to date.
//!
//! ```text
//! ImageLayer "base" 4000x3000 rgb16
//!     ├── cpu  CpuImageObject  valid
//!     └── gpu  GpuImageObject  stale
//! ```

use std::sync::{Arc, RwLock};

use blacksilk_core::{Bitmap, PixelFormat, Rect32I};

#[allow(unused_imports)]
use tracing::{debug, error, trace, warn};

use crate::backend::cpu::{decode_samples, encode_samples};
use crate::backend::{BackendDevice, BackendId, ImageObject};
use crate::{GraphicsError, GraphicsResult, ops};

/// Layer shared between images, filters and caches.
pub type SharedLayer = Arc<RwLock<ImageLayer>>;

/// One backend's copy of the layer.
pub struct Representation {
    device: Arc<dyn BackendDevice>,
    object: Box<dyn ImageObject>,
    valid: bool,
}

impl Representation {
    /// Owning device.
    pub fn device(&self) -> &Arc<dyn BackendDevice> {
        &self.device
    }

    /// Backend object.
    pub fn object(&self) -> &dyn ImageObject {
        self.object.as_ref()
    }

    /// True if this copy holds the current pixels.
    pub fn is_valid(&self) -> bool {
        self.valid && !self.object.is_empty()
    }

    pub(crate) fn split_mut(&mut self) -> (&Arc<dyn BackendDevice>, &mut dyn ImageObject) {
        (&self.device, self.object.as_mut())
    }
}

impl std::fmt::Debug for Representation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Representation")
            .field("backend", &self.device.backend_id())
            .field("device", &self.device.device_id())
            .field("valid", &self.valid)
            .finish()
    }
}

/// Logical image plane with per-backend representations.
#[derive(Debug)]
pub struct ImageLayer {
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    reps: Vec<Representation>,
}

impl ImageLayer {
    /// Zeroed layer allocated on `device`.
    pub fn new(device: &Arc<dyn BackendDevice>, format: PixelFormat, width: u32, height: u32) -> GraphicsResult<Self> {
        let mut layer = Self::empty(format, width, height);
        layer.attach(device, None)?;
        Ok(layer)
    }

    /// Layer initialized from tightly packed bytes.
    pub fn from_data(
        device: &Arc<dyn BackendDevice>,
        format: PixelFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> GraphicsResult<Self> {
        let expected = format
            .buffer_size(width, height)
            .ok_or(blacksilk_core::Error::InvalidDimensions { width, height })?;
        if data.len() != expected {
            return Err(blacksilk_core::Error::BufferSizeMismatch {
                expected,
                actual: data.len(),
            }
            .into());
        }
        let mut layer = Self::empty(format, width, height);
        layer.attach(device, Some(data))?;
        Ok(layer)
    }

    /// Layer initialized from a bitmap.
    pub fn from_bitmap(device: &Arc<dyn BackendDevice>, bitmap: &Bitmap) -> GraphicsResult<Self> {
        Self::from_data(device, bitmap.format(), bitmap.width(), bitmap.height(), bitmap.buffer())
    }

    /// Layer without any representation.
    pub fn empty(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            name: String::new(),
            width,
            height,
            format,
            reps: Vec::new(),
        }
    }

    /// Builder-style rename.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Wraps the layer for sharing.
    pub fn into_shared(self) -> SharedLayer {
        Arc::new(RwLock::new(self))
    }

    /// Zeroed layer of the same size and format on every device that holds
    /// valid data here.
    pub fn new_like(&self) -> GraphicsResult<Self> {
        self.new_sized_like(self.width, self.height)
    }

    /// Zeroed `width` x `height` layer on the same devices.
    pub fn new_sized_like(&self, width: u32, height: u32) -> GraphicsResult<Self> {
        let mut layer = Self::empty(self.format, width, height);
        for rep in self.reps.iter().filter(|r| r.is_valid()) {
            layer.attach(&rep.device, None)?;
        }
        if layer.reps.is_empty() {
            return Err(GraphicsError::EmptyLayer(self.name.clone()));
        }
        Ok(layer)
    }

    fn attach(&mut self, device: &Arc<dyn BackendDevice>, data: Option<&[u8]>) -> GraphicsResult<()> {
        let object = device
            .create_texture_2d(self.format, self.width, self.height, data)
            .ok_or_else(|| GraphicsError::Allocation {
                width: self.width,
                height: self.height,
                format: self.format.to_string(),
                backend: device.name().to_string(),
            })?;
        self.reps.retain(|r| r.device.backend_id() != device.backend_id());
        self.reps.push(Representation {
            device: device.clone(),
            object,
            valid: true,
        });
        Ok(())
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Layer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the layer.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Full-size rectangle.
    pub fn rect(&self) -> Rect32I {
        Rect32I::from_size(self.width, self.height)
    }

    /// True if no representation holds valid data.
    pub fn is_empty(&self) -> bool {
        !self.reps.iter().any(|r| r.is_valid())
    }

    /// Backends holding valid data.
    pub fn valid_backends(&self) -> Vec<BackendId> {
        self.reps
            .iter()
            .filter(|r| r.is_valid())
            .map(|r| r.device.backend_id())
            .collect()
    }

    /// All representations, valid or not.
    pub fn representations(&self) -> &[Representation] {
        &self.reps
    }

    pub(crate) fn representations_mut(&mut self) -> &mut [Representation] {
        &mut self.reps
    }

    // ========================================================================
    // Backend state
    // ========================================================================

    /// True if `backend` holds valid data.
    pub fn contains_data_for_backend(&self, backend: BackendId) -> bool {
        self.rep(backend).is_some_and(|r| r.is_valid())
    }

    /// True if `device` holds valid data.
    pub fn contains_data_for_device(&self, device: &dyn BackendDevice) -> bool {
        self.reps
            .iter()
            .any(|r| r.is_valid() && r.device.device_id() == device.device_id())
    }

    fn rep(&self, backend: BackendId) -> Option<&Representation> {
        self.reps.iter().find(|r| r.device.backend_id() == backend)
    }

    /// Valid backend object for `backend`.
    pub fn internal_image_for_backend(&self, backend: BackendId) -> Option<&dyn ImageObject> {
        self.rep(backend).filter(|r| r.is_valid()).map(|r| r.object.as_ref())
    }

    /// Mutable backend object for `backend`. Writing through it does not
    /// change validity; call [`ImageLayer::mark_stale`] for other backends.
    pub fn internal_image_for_backend_mut(&mut self, backend: BackendId) -> Option<&mut dyn ImageObject> {
        self.reps
            .iter_mut()
            .find(|r| r.device.backend_id() == backend && r.is_valid())
            .map(|r| r.object.as_mut() as &mut dyn ImageObject)
    }

    /// Device of the `backend` representation.
    pub fn internal_device_for_backend(&self, backend: BackendId) -> Option<&Arc<dyn BackendDevice>> {
        self.rep(backend).map(|r| &r.device)
    }

    /// Makes `device` hold the current pixels, allocating if needed.
    pub fn update_data_for_backend(&mut self, device: &Arc<dyn BackendDevice>) -> bool {
        let backend = device.backend_id();
        if self.contains_data_for_backend(backend) {
            return true;
        }
        let Some(bitmap) = self.retrieve_bitmap() else {
            error!(layer = %self.name, %backend, "no valid data to synchronize from");
            return false;
        };
        let same_device = self
            .rep(backend)
            .is_some_and(|r| r.device.device_id() == device.device_id() && !r.object.is_empty());
        if same_device {
            let Some(rep) = self.reps.iter_mut().find(|r| r.device.backend_id() == backend) else {
                return false;
            };
            rep.valid = rep.object.upload(bitmap.buffer(), bitmap.rect());
            return rep.valid;
        }
        match self.attach(device, Some(bitmap.buffer())) {
            Ok(()) => {
                debug!(layer = %self.name, %backend, "uploaded layer to backend");
                true
            }
            Err(e) => {
                warn!(layer = %self.name, %backend, error = %e, "backend upload failed");
                false
            }
        }
    }

    /// Refreshes every stale representation from a valid one.
    pub fn update_internal_state(&mut self) -> bool {
        if self.reps.iter().all(|r| r.is_valid()) {
            return true;
        }
        let Some(bitmap) = self.retrieve_bitmap() else {
            return false;
        };
        let mut ok = true;
        for rep in self.reps.iter_mut().filter(|r| !r.valid) {
            rep.valid = rep.object.upload(bitmap.buffer(), bitmap.rect());
            ok &= rep.valid;
        }
        ok
    }

    /// Drops the `backend` representation.
    pub fn delete_data_for_backend(&mut self, backend: BackendId) -> bool {
        let before = self.reps.len();
        self.reps.retain(|r| r.device.backend_id() != backend);
        before != self.reps.len()
    }

    /// Flags the `backend` representation as stale.
    pub fn mark_stale(&mut self, backend: BackendId) {
        if let Some(rep) = self.reps.iter_mut().find(|r| r.device.backend_id() == backend) {
            rep.valid = false;
        }
    }

    /// After a write on `written`, those become the only valid copies.
    pub(crate) fn mark_written(&mut self, written: &[BackendId]) {
        for rep in &mut self.reps {
            rep.valid = written.contains(&rep.device.backend_id());
        }
    }

    /// Reallocates the layer on `device`, dropping all data.
    pub fn reset(&mut self, device: &Arc<dyn BackendDevice>, format: PixelFormat, width: u32, height: u32) -> bool {
        self.reps.clear();
        self.format = format;
        self.width = width;
        self.height = height;
        self.attach(device, None).is_ok()
    }

    /// Commits pending writes on every backend.
    pub fn synchronize(&mut self) -> bool {
        self.reps.iter_mut().all(|r| r.object.synchronize())
    }

    /// Drops pending writes on every backend.
    pub fn discard_buffers(&mut self) {
        for rep in &mut self.reps {
            rep.object.discard_buffers();
        }
    }

    // ========================================================================
    // Data transfer
    // ========================================================================

    fn preferred(&self) -> Option<&Representation> {
        // host copies are cheapest to read
        self.rep(BackendId::Cpu)
            .filter(|r| r.is_valid())
            .or_else(|| self.reps.iter().find(|r| r.is_valid()))
    }

    /// True when `len` bytes exactly cover `rect` and `rect` lies inside the layer.
    fn accepts_transfer(&self, len: usize, rect: Rect32I) -> bool {
        rect.fits_within(self.width, self.height) && len == rect.area() as usize * self.format.pixel_size()
    }

    /// Copies `rect` into `buffer` from the cheapest valid representation.
    pub fn retrieve(&self, buffer: &mut [u8], rect: Rect32I) -> bool {
        if !self.accepts_transfer(buffer.len(), rect) {
            error!(layer = %self.name, ?rect, len = buffer.len(), "retrieve rejected");
            return false;
        }
        self.preferred().is_some_and(|r| r.object.retrieve(buffer, rect))
    }

    /// Whole layer as a bitmap.
    pub fn retrieve_bitmap(&self) -> Option<Bitmap> {
        self.preferred()?.object.retrieve_bitmap()
    }

    /// Normalized samples of `rect`, interleaved.
    pub fn retrieve_f32(&self, rect: Rect32I) -> Option<Vec<f32>> {
        let mut bytes = vec![0u8; rect.area() as usize * self.format.pixel_size()];
        if !self.retrieve(&mut bytes, rect) {
            return None;
        }
        let mut out = vec![0.0; rect.area() as usize * self.format.channel_count()];
        decode_samples(self.format, &bytes, &mut out);
        Some(out)
    }

    /// Copies one channel of `rect` into `buffer` (one sample per pixel).
    pub fn retrieve_channel(&self, channel: usize, buffer: &mut [u8], rect: Rect32I) -> bool {
        let channels = self.format.channel_count();
        let bpc = self.format.bytes_per_channel();
        if channel >= channels || buffer.len() != rect.area() as usize * bpc {
            return false;
        }
        let mut full = vec![0u8; rect.area() as usize * self.format.pixel_size()];
        if !self.retrieve(&mut full, rect) {
            return false;
        }
        for (dst, px) in buffer.chunks_exact_mut(bpc).zip(full.chunks_exact(channels * bpc)) {
            dst.copy_from_slice(&px[channel * bpc..(channel + 1) * bpc]);
        }
        true
    }

    /// Writes `data` into `rect` on every valid representation. A rejected
    /// transfer leaves every copy untouched; copies whose backend fails the
    /// write turn stale.
    pub fn upload(&mut self, data: &[u8], rect: Rect32I) -> bool {
        if !self.accepts_transfer(data.len(), rect) {
            error!(layer = %self.name, ?rect, len = data.len(), "upload rejected");
            return false;
        }
        let mut any = false;
        for rep in self.reps.iter_mut().filter(|r| r.valid) {
            rep.valid = rep.object.upload(data, rect);
            any |= rep.valid;
        }
        any
    }

    /// Writes a bitmap at (`dest_x`, `dest_y`).
    pub fn upload_bitmap(&mut self, bitmap: &Bitmap, dest_x: i32, dest_y: i32) -> bool {
        bitmap.format() == self.format && self.upload(bitmap.buffer(), bitmap.rect().translate(dest_x, dest_y))
    }

    /// Writes normalized samples into `rect`.
    pub fn upload_f32(&mut self, values: &[f32], rect: Rect32I) -> bool {
        let mut bytes = vec![0u8; rect.area() as usize * self.format.pixel_size()];
        if values.len() != rect.area() as usize * self.format.channel_count() {
            return false;
        }
        encode_samples(self.format, values, &mut bytes);
        self.upload(&bytes, rect)
    }

    /// Block copy from `source`. Runs on shared backends; otherwise stages
    /// through host memory.
    pub fn copy(&mut self, source: &ImageLayer, source_rect: Rect32I, dest_x: i32, dest_y: i32) -> bool {
        if source.format != self.format {
            return false;
        }
        let shared = self
            .valid_backends()
            .into_iter()
            .any(|b| source.contains_data_for_backend(b));
        if shared {
            return ops::blit(self, source, source_rect, dest_x, dest_y);
        }
        let mut staging = vec![0u8; source_rect.area() as usize * self.format.pixel_size()];
        source.retrieve(&mut staging, source_rect)
            && self.upload(&staging, Rect32I::new(dest_x, dest_y, source_rect.width, source_rect.height))
    }

    /// Sets every channel in `area`.
    pub fn fill(&mut self, area: Rect32I, value: [f32; 4]) -> bool {
        ops::fill_color(self, area, value)
    }

    /// Sets one channel in `area`.
    pub fn fill_channel(&mut self, area: Rect32I, channel: usize, value: f32) -> bool {
        ops::fill_channel(self, area, channel, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;

    fn device() -> Arc<dyn BackendDevice> {
        Arc::new(CpuDevice::new())
    }

    #[test]
    fn test_new_layer_is_valid_on_cpu() {
        let layer = ImageLayer::new(&device(), PixelFormat::Rgb8, 3, 2).unwrap();
        assert!(!layer.is_empty());
        assert_eq!(layer.valid_backends(), vec![BackendId::Cpu]);
        assert!(layer.internal_image_for_backend(BackendId::Gpu).is_none());
    }

    #[test]
    fn test_from_data_length_checked() {
        assert!(ImageLayer::from_data(&device(), PixelFormat::Mono8, 2, 2, &[0; 3]).is_err());
    }

    #[test]
    fn test_retrieve_channel() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let layer = ImageLayer::from_data(&device(), PixelFormat::Rgb8, 2, 1, &data).unwrap();
        let mut green = [0u8; 2];
        assert!(layer.retrieve_channel(1, &mut green, layer.rect()));
        assert_eq!(green, [2, 5]);
        assert!(!layer.retrieve_channel(3, &mut green, layer.rect()));
    }

    #[test]
    fn test_stale_and_update() {
        let dev = device();
        let mut layer = ImageLayer::from_data(&dev, PixelFormat::Mono8, 2, 1, &[9, 8]).unwrap();
        layer.mark_stale(BackendId::Cpu);
        assert!(layer.is_empty());
        assert!(layer.retrieve_bitmap().is_none());
        assert!(!layer.update_internal_state());
        assert!(layer.delete_data_for_backend(BackendId::Cpu));
        assert!(!layer.delete_data_for_backend(BackendId::Cpu));
    }

    #[test]
    fn test_rejected_upload_keeps_pixels() {
        let mut layer = ImageLayer::from_data(&device(), PixelFormat::Mono8, 2, 2, &[1, 2, 3, 4]).unwrap();
        assert!(!layer.upload(&[9, 9, 9], layer.rect()));
        assert!(!layer.upload(&[9, 9], Rect32I::new(1, 1, 2, 1)));
        assert!(!layer.upload_f32(&[0.5; 4], Rect32I::new(-1, 0, 2, 2)));
        assert!(!layer.is_empty());
        assert_eq!(layer.valid_backends(), vec![BackendId::Cpu]);
        assert_eq!(layer.retrieve_bitmap().unwrap().buffer(), &[1, 2, 3, 4]);

        let mut out = [0u8; 2];
        assert!(!layer.retrieve(&mut out, Rect32I::new(1, 0, 2, 1)));
        assert!(layer.upload(&[7, 8], Rect32I::new(0, 1, 2, 1)));
        assert_eq!(layer.retrieve_bitmap().unwrap().buffer(), &[1, 2, 7, 8]);
    }

    #[test]
    fn test_host_staged_writes_commit_on_synchronize() {
        let mut layer = ImageLayer::from_data(&device(), PixelFormat::Mono8, 2, 2, &[1, 2, 3, 4]).unwrap();
        let object = layer
            .internal_image_for_backend_mut(BackendId::Cpu)
            .and_then(|o| crate::backend::AsAny::as_any_mut(o).downcast_mut::<crate::CpuImageObject>())
            .unwrap();
        assert!(object.write_deferred(&[5, 6], Rect32I::new(0, 0, 2, 1)));
        assert_eq!(layer.retrieve_bitmap().unwrap().buffer(), &[1, 2, 3, 4]);
        assert!(layer.synchronize());
        assert_eq!(layer.retrieve_bitmap().unwrap().buffer(), &[5, 6, 3, 4]);
    }

    #[test]
    fn test_reset_changes_shape() {
        let dev = device();
        let mut layer = ImageLayer::new(&dev, PixelFormat::Mono8, 2, 2).unwrap();
        assert!(layer.reset(&dev, PixelFormat::Rgba16, 5, 1));
        assert_eq!((layer.width(), layer.height(), layer.format()), (5, 1, PixelFormat::Rgba16));
        assert!(layer.contains_data_for_device(dev.as_ref()));
    }
}
