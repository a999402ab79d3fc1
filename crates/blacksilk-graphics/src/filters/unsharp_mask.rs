//! Unsharp masking.

use std::sync::Arc;

#[allow(unused_imports)]
use tracing::{debug, error, trace};

use crate::backend::{AsAny, BackendDevice};
use crate::blur_cache::BlurCache;
use crate::filter::{Filter, current_preset, prepare_target, read_float};
use crate::layer::ImageLayer;
use crate::ops;
use crate::preset::FilterPreset;

/// Classic unsharp mask.
///
/// `mask = blur(src) - src`, `dst = src - mask * strength`. The mask is
/// clamped at zero by the subtraction, so only edges brighter than their
/// surroundings are lifted.
pub struct UnsharpMask {
    device: Arc<dyn BackendDevice>,
    blur_radius: f32,
    strength: f32,
    cache: BlurCache,
}

impl UnsharpMask {
    /// Filter name.
    pub const NAME: &'static str = "UnsharpMask";

    /// Radius 1, strength 1.
    pub fn new(device: Arc<dyn BackendDevice>) -> Self {
        Self {
            device,
            blur_radius: 1.0,
            strength: 1.0,
            cache: BlurCache::new(),
        }
    }

    /// Blur radius of the mask.
    pub fn blur_radius(&self) -> f32 {
        self.blur_radius
    }

    /// Sets the blur radius; cached buffers are dropped when it changes.
    pub fn set_blur_radius(&mut self, radius: f32) {
        if radius != self.blur_radius {
            self.cache.invalidate();
        }
        self.blur_radius = radius;
    }

    /// Mask strength.
    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Sets the mask strength.
    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength;
    }
}

impl Clone for UnsharpMask {
    fn clone(&self) -> Self {
        Self {
            device: self.device.clone(),
            blur_radius: self.blur_radius,
            strength: self.strength,
            cache: BlurCache::new(),
        }
    }
}

impl AsAny for UnsharpMask {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Filter for UnsharpMask {
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
        let (format, width, height) = (src.format(), src.width(), src.height());
        let (Some(mut blurred), Some(mut mask)) = (
            self.cache.acquire(device, format, width, height),
            self.cache.acquire(device, format, width, height),
        ) else {
            error!(width, height, "unsharp mask buffers unavailable");
            return false;
        };
        trace!(radius = self.blur_radius, strength = self.strength, "unsharp mask");
        let area = src.rect();
        let ok = ops::gaussian_blur(&mut blurred, src, area, self.blur_radius)
            && ops::subtract(&mut mask, &blurred, src, area)
            && ops::multiply_scalar(&mut blurred, &mask, area, self.strength)
            && ops::subtract(dst, src, &blurred, area);
        self.cache.release(blurred);
        self.cache.release(mask);
        ok
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self) -> FilterPreset {
        let mut preset = current_preset(Self::NAME);
        preset.set_float("Strength", self.strength);
        preset.set_float("BlurRadius", self.blur_radius);
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> bool {
        let mut found = read_float(preset, "Strength", &mut self.strength);
        if let Some(radius) = preset.float("BlurRadius") {
            self.set_blur_radius(radius);
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

    #[test]
    fn test_flat_image_unchanged() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let src = ImageLayer::from_data(&device, PixelFormat::Mono8, 4, 4, &[90; 16]).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Mono8, 4, 4);
        let mut filter = UnsharpMask::new(device);
        filter.set_strength(2.0);
        assert!(filter.process(&mut dst, &src));
        assert_eq!(dst.retrieve_bitmap().unwrap().buffer(), &[90; 16]);
        assert!(filter.process(&mut dst, &src));
        assert!(filter.cache.hits() >= 2);
    }

    #[test]
    fn test_radius_change_drops_buffers() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let src = ImageLayer::new(&device, PixelFormat::Rgb8, 3, 3).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Rgb8, 3, 3);
        let mut filter = UnsharpMask::new(device);
        assert!(filter.process(&mut dst, &src));
        assert_eq!(filter.cache.len(), 2);
        filter.set_blur_radius(2.5);
        assert!(filter.cache.is_empty());
    }
}
