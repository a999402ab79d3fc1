//! Multi-scale sharpening.
//!
//! Each cascade blurs the source with its own radius; the blurred copies
//! are kept between renders and only rebuilt when the filter is marked
//! dirty or a buffer no longer fits the source (format, size, backend).
//! Background preparation calls [`CascadedSharpen::generate_cascades`]
//! ahead of time so interactive renders only run the combination.

use std::sync::Arc;

#[allow(unused_imports)]
use tracing::{debug, error, trace};

use crate::backend::{AsAny, BackendDevice, BackendId};
use crate::blur_cache::BlurCache;
use crate::filter::{Filter, current_preset, prepare_target};
use crate::layer::ImageLayer;
use crate::ops::{self, CascadeInput};
use crate::preset::FilterPreset;

/// Parameters of one cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cascade {
    /// Gaussian radius of the blurred copy.
    pub blur_radius: f32,
    /// Contribution in percent.
    pub strength: f32,
}

impl Default for Cascade {
    fn default() -> Self {
        Self {
            blur_radius: 1.0,
            strength: 0.0,
        }
    }
}

struct CascadeEntry {
    params: Cascade,
    buffer: Option<ImageLayer>,
}

impl CascadeEntry {
    fn new(params: Cascade) -> Self {
        Self { params, buffer: None }
    }

    fn fits(&self, device: &Arc<dyn BackendDevice>, src: &ImageLayer) -> bool {
        self.buffer.as_ref().is_some_and(|b| {
            b.format() == src.format()
                && b.width() == src.width()
                && b.height() == src.height()
                && b.contains_data_for_backend(device.backend_id())
        })
    }
}

/// Cascaded sharpen filter.
pub struct CascadedSharpen {
    device: Arc<dyn BackendDevice>,
    cascades: Vec<CascadeEntry>,
    threshold: f32,
    dirty: bool,
    cache: BlurCache,
}

impl CascadedSharpen {
    /// Filter name.
    pub const NAME: &'static str = "CascadedSharpen";

    /// Filter without cascades and threshold 0.
    pub fn new(device: Arc<dyn BackendDevice>) -> Self {
        Self {
            device,
            cascades: Vec::new(),
            threshold: 0.0,
            dirty: true,
            cache: BlurCache::new(),
        }
    }

    /// Filter with the given cascades.
    pub fn with_cascades(device: Arc<dyn BackendDevice>, cascades: &[Cascade]) -> Self {
        let mut filter = Self::new(device);
        filter.cascades = cascades.iter().copied().map(CascadeEntry::new).collect();
        filter
    }

    /// Number of cascades.
    pub fn cascade_count(&self) -> usize {
        self.cascades.len()
    }

    /// Grows or shrinks the cascade list; new cascades use the defaults.
    pub fn set_cascade_count(&mut self, count: usize) {
        if count == self.cascades.len() {
            return;
        }
        for entry in self.cascades.drain(count.min(self.cascades.len())..) {
            if let Some(buffer) = entry.buffer {
                self.cache.release(buffer);
            }
        }
        self.cascades.resize_with(count, || CascadeEntry::new(Cascade::default()));
        self.dirty = true;
    }

    /// Parameters of cascade `index`.
    pub fn cascade(&self, index: usize) -> Option<Cascade> {
        self.cascades.get(index).map(|c| c.params)
    }

    /// All cascade parameters.
    pub fn cascades(&self) -> Vec<Cascade> {
        self.cascades.iter().map(|c| c.params).collect()
    }

    /// Sets the strength of cascade `index`; false if out of range.
    pub fn set_cascade_strength(&mut self, index: usize, strength: f32) -> bool {
        let Some(entry) = self.cascades.get_mut(index) else {
            return false;
        };
        if entry.params.strength != strength {
            entry.params.strength = strength;
            self.dirty = true;
        }
        true
    }

    /// Sets the radius of cascade `index`, dropping its buffer when it
    /// changes; false if out of range.
    pub fn set_cascade_blur_radius(&mut self, index: usize, radius: f32) -> bool {
        let Some(entry) = self.cascades.get_mut(index) else {
            return false;
        };
        if entry.params.blur_radius != radius {
            entry.params.blur_radius = radius;
            if let Some(buffer) = entry.buffer.take() {
                self.cache.release(buffer);
            }
            self.dirty = true;
        }
        true
    }

    /// Blurred copy held by cascade `index`.
    pub fn cascade_blur_buffer(&self, index: usize) -> Option<&ImageLayer> {
        self.cascades.get(index)?.buffer.as_ref()
    }

    /// Damping threshold in percent.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Sets the threshold.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Forces every buffer to be rebuilt on the next render.
    pub fn update_cascades(&mut self) {
        self.dirty = true;
    }

    /// True if the next render rebuilds the buffers.
    pub fn needs_update(&self) -> bool {
        self.dirty
    }

    /// Rebuilds the cascade list with `radii` and blurs `base` for each.
    ///
    /// Strengths of existing cascades are kept.
    pub fn generate_cascades(&mut self, radii: &[f32], device: &Arc<dyn BackendDevice>, base: &ImageLayer) -> bool {
        self.set_cascade_count(radii.len());
        for (entry, radius) in self.cascades.iter_mut().zip(radii) {
            entry.params.blur_radius = *radius;
        }
        let mut ok = true;
        for index in 0..self.cascades.len() {
            ok &= self.generate_blur_buffer(index, device, base);
        }
        if ok {
            self.dirty = false;
        }
        debug!(count = radii.len(), ok, "cascades generated");
        ok
    }

    /// Drops the `backend` data of every buffer.
    pub fn delete_blur_buffers_for_backend(&mut self, backend: BackendId) {
        for buffer in self.cascades.iter_mut().filter_map(|c| c.buffer.as_mut()) {
            buffer.delete_data_for_backend(backend);
        }
        self.cache.invalidate_backend(backend);
    }

    fn generate_blur_buffer(&mut self, index: usize, device: &Arc<dyn BackendDevice>, base: &ImageLayer) -> bool {
        let Some(entry) = self.cascades.get_mut(index) else {
            return false;
        };
        if let Some(old) = entry.buffer.take() {
            self.cache.release(old);
        }
        let Some(mut buffer) = self.cache.acquire(device, base.format(), base.width(), base.height()) else {
            error!(index, "cascade buffer allocation failed");
            return false;
        };
        let radius = entry.params.blur_radius;
        trace!(index, radius, "cascade blur");
        if !ops::gaussian_blur(&mut buffer, base, base.rect(), radius) {
            return false;
        }
        entry.buffer = Some(buffer.with_name(format!("cascade{index}")));
        true
    }
}

impl Clone for CascadedSharpen {
    fn clone(&self) -> Self {
        Self {
            device: self.device.clone(),
            cascades: self.cascades.iter().map(|c| CascadeEntry::new(c.params)).collect(),
            threshold: self.threshold,
            dirty: true,
            cache: BlurCache::new(),
        }
    }
}

impl AsAny for CascadedSharpen {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Filter for CascadedSharpen {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn device(&self) -> &Arc<dyn BackendDevice> {
        &self.device
    }

    fn set_device(&mut self, device: Arc<dyn BackendDevice>) {
        self.device = device;
    }

    fn process_with(&mut self, device: &Arc<dyn BackendDevice>, dst: &mut ImageLayer, src: &ImageLayer) -> bool {
        if !prepare_target(device, dst, src) {
            return false;
        }
        let area = src.rect();
        if self.cascades.is_empty() {
            debug!("no cascades, copying source");
            return ops::blit(dst, src, area, 0, 0);
        }

        let mut regenerated = false;
        for index in 0..self.cascades.len() {
            if self.dirty || !self.cascades[index].fits(device, src) {
                if !self.generate_blur_buffer(index, device, src) {
                    return false;
                }
                regenerated = true;
            }
        }
        if regenerated {
            self.dirty = false;
        }

        let inputs: Vec<CascadeInput<'_>> = self
            .cascades
            .iter()
            .filter_map(|c| {
                c.buffer.as_ref().map(|blurred| CascadeInput {
                    blurred,
                    strength: c.params.strength,
                })
            })
            .collect();
        ops::cascaded_sharpen(dst, src, &inputs, area, self.threshold)
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self) -> FilterPreset {
        let mut preset = current_preset(Self::NAME);
        preset.set_int("NumberOfCascades", self.cascades.len() as i32);
        preset.set_float("Threshold", self.threshold);
        for (i, c) in self.cascades.iter().enumerate() {
            preset.set_float(format!("Strength{i}"), c.params.strength);
            preset.set_float(format!("BlurRadius{i}"), c.params.blur_radius);
        }
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> bool {
        let mut found = false;
        if let Some(count) = preset.int("NumberOfCascades") {
            self.set_cascade_count(count.max(0) as usize);
            found = true;
            for i in 0..self.cascades.len() {
                let (Some(strength), Some(radius)) = (
                    preset.float(&format!("Strength{i}")),
                    preset.float(&format!("BlurRadius{i}")),
                ) else {
                    debug!(index = i, "preset lacks cascade values");
                    break;
                };
                self.set_cascade_strength(i, strength);
                self.set_cascade_blur_radius(i, radius);
            }
        }
        if let Some(threshold) = preset.float("Threshold") {
            self.threshold = threshold;
            found = true;
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;
    use blacksilk_core::PixelFormat;

    fn device() -> Arc<dyn BackendDevice> {
        Arc::new(CpuDevice::new())
    }

    fn cascades(n: usize) -> Vec<Cascade> {
        (0..n)
            .map(|i| Cascade {
                blur_radius: 1.0 + i as f32,
                strength: 40.0,
            })
            .collect()
    }

    #[test]
    fn test_buffers_rebuilt_only_when_needed() {
        let device = device();
        let src = ImageLayer::from_data(&device, PixelFormat::Mono8, 4, 1, &[0, 255, 0, 255]).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Mono8, 4, 1);
        let mut sharpen = CascadedSharpen::with_cascades(device, &cascades(2));
        assert!(sharpen.needs_update());
        assert!(sharpen.process(&mut dst, &src));
        assert!(!sharpen.needs_update());
        assert!(sharpen.cascade_blur_buffer(1).is_some());

        sharpen.set_cascade_blur_radius(1, 4.0);
        assert!(sharpen.cascade_blur_buffer(1).is_none());
        assert!(sharpen.needs_update());
        assert!(sharpen.process(&mut dst, &src));
        assert!(sharpen.cascade_blur_buffer(1).is_some());
    }

    #[test]
    fn test_generate_cascades_sets_radii() {
        let device = device();
        let base = ImageLayer::new(&device, PixelFormat::Rgb8, 3, 3).unwrap();
        let mut sharpen = CascadedSharpen::new(device.clone());
        assert!(sharpen.generate_cascades(&[0.5, 1.5, 3.0], &device, &base));
        assert_eq!(sharpen.cascade_count(), 3);
        assert_eq!(sharpen.cascade(2).unwrap().blur_radius, 3.0);
        assert!(!sharpen.needs_update());
        sharpen.update_cascades();
        assert!(sharpen.needs_update());
    }

    #[test]
    fn test_without_cascades_copies() {
        let device = device();
        let src = ImageLayer::from_data(&device, PixelFormat::Mono8, 2, 1, &[3, 4]).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Mono8, 2, 1);
        assert!(CascadedSharpen::new(device).process(&mut dst, &src));
        assert_eq!(dst.retrieve_bitmap().unwrap().buffer(), &[3, 4]);
    }

    #[test]
    fn test_clone_drops_buffers() {
        let device = device();
        let base = ImageLayer::new(&device, PixelFormat::Mono8, 2, 2).unwrap();
        let mut sharpen = CascadedSharpen::with_cascades(device.clone(), &cascades(2));
        assert!(sharpen.generate_cascades(&[1.0, 2.0], &device, &base));
        let copy = sharpen.clone();
        assert_eq!(copy.cascades(), sharpen.cascades());
        assert!(copy.cascade_blur_buffer(0).is_none());
        assert!(copy.needs_update());
    }

    #[test]
    fn test_preset_round_trip() {
        let device = device();
        let mut a = CascadedSharpen::with_cascades(device.clone(), &cascades(4));
        a.set_threshold(12.0);
        let mut b = CascadedSharpen::new(device);
        assert!(b.from_preset(&a.to_preset()));
        assert_eq!(b.cascades(), a.cascades());
        assert_eq!(b.threshold(), 12.0);
    }
}
