//! Radial vignette.

use std::sync::Arc;

use blacksilk_core::Point32F;

#[allow(unused_imports)]
use tracing::{debug, trace};

use crate::backend::{AsAny, BackendDevice};
use crate::filter::{Filter, current_preset, prepare_target, read_float};
use crate::layer::ImageLayer;
use crate::ops;
use crate::preset::FilterPreset;

/// Darkens towards the edges around a movable center.
///
/// Center and radius are percentages of the layer size, strength a
/// percentage of the full effect.
#[derive(Clone)]
pub struct Vignette {
    device: Arc<dyn BackendDevice>,
    center: Point32F,
    radius: f32,
    strength: f32,
}

impl Vignette {
    /// Filter name.
    pub const NAME: &'static str = "Vignette";

    /// Centered vignette, radius 100, strength 50.
    pub fn new(device: Arc<dyn BackendDevice>) -> Self {
        Self {
            device,
            center: Point32F::new(50.0, 50.0),
            radius: 100.0,
            strength: 50.0,
        }
    }

    /// Center in percent of width and height.
    pub fn center(&self) -> Point32F {
        self.center
    }

    /// Moves the center.
    pub fn set_center(&mut self, center: Point32F) {
        self.center = center;
    }

    /// Radius in percent of the height.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Sets the radius.
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
    }

    /// Strength in percent.
    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Sets the strength.
    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength;
    }
}

impl AsAny for Vignette {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Filter for Vignette {
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
        trace!(center = ?self.center, radius = self.radius, strength = self.strength, "vignette");
        prepare_target(device, dst, src)
            && ops::apply_vignette(dst, src, src.rect(), self.center, self.radius, self.strength)
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self) -> FilterPreset {
        let mut preset = current_preset(Self::NAME);
        preset.set_float("X", self.center.x);
        preset.set_float("Y", self.center.y);
        preset.set_float("Strength", self.strength);
        preset.set_float("Radius", self.radius);
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> bool {
        let mut found = read_float(preset, "X", &mut self.center.x);
        found |= read_float(preset, "Y", &mut self.center.y);
        found |= read_float(preset, "Strength", &mut self.strength);
        found |= read_float(preset, "Radius", &mut self.radius);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;
    use blacksilk_core::PixelFormat;

    #[test]
    fn test_zero_strength_is_identity() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let data = [10u8, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120];
        let src = ImageLayer::from_data(&device, PixelFormat::Rgb8, 2, 2, &data).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Rgb8, 2, 2);
        let mut vignette = Vignette::new(device);
        vignette.set_strength(0.0);
        assert!(vignette.process(&mut dst, &src));
        assert_eq!(dst.retrieve_bitmap().unwrap().buffer(), &data);
    }

    #[test]
    fn test_preset_round_trip() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let mut a = Vignette::new(device.clone());
        a.set_center(Point32F::new(30.0, 70.0));
        a.set_radius(80.0);
        let mut b = Vignette::new(device);
        assert!(b.from_preset(&a.to_preset()));
        assert_eq!(b.center(), Point32F::new(30.0, 70.0));
        assert_eq!(b.radius(), 80.0);
        assert_eq!(b.strength(), 50.0);
    }
}
