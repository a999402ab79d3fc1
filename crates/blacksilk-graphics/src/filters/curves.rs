//! Tone curves.

use std::sync::Arc;

use blacksilk_core::{Curve, Point32F};

#[allow(unused_imports)]
use tracing::{debug, error, trace};

use crate::backend::{AsAny, BackendDevice};
use crate::filter::{Filter, current_preset, prepare_target, read_curve_points, write_curve_points};
use crate::layer::ImageLayer;
use crate::ops;
use crate::preset::FilterPreset;

/// Maps every sample through a tone curve.
///
/// The curve is sampled once per distinct value of the source format
/// (256 or 65536 entries) and resampled when the points or the format
/// change.
#[derive(Clone)]
pub struct Curves {
    device: Arc<dyn BackendDevice>,
    curve: Curve,
    data: Vec<f32>,
    modified: bool,
}

impl Curves {
    /// Filter name.
    pub const NAME: &'static str = "Curves";

    /// Identity curve.
    pub fn new(device: Arc<dyn BackendDevice>) -> Self {
        Self {
            device,
            curve: Curve::default(),
            data: Vec::new(),
            modified: true,
        }
    }

    /// Control points.
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Replaces the control points.
    pub fn set_points(&mut self, points: Vec<Point32F>) {
        self.curve.assign(points);
        self.modified = true;
    }

    /// Curve sampled at the last render.
    pub fn curve_data(&self) -> &[f32] {
        &self.data
    }

    fn update_curve_data(&mut self, len: usize) -> bool {
        if self.modified || self.data.len() != len {
            self.data = self.curve.sample(len);
            self.modified = false;
            trace!(len, points = self.curve.len(), "curve resampled");
        }
        !self.data.is_empty()
    }
}

impl AsAny for Curves {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Filter for Curves {
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
        let len = src.format().max_value() as usize + 1;
        if !self.update_curve_data(len) {
            error!(points = self.curve.len(), "curve needs at least two points");
            return false;
        }
        prepare_target(device, dst, src) && ops::adjust_brightness(dst, src, src.rect(), &self.data)
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self) -> FilterPreset {
        let mut preset = current_preset(Self::NAME);
        write_curve_points(&mut preset, self.curve.points(), self.data.len());
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> bool {
        match read_curve_points(preset) {
            Some(points) => {
                self.set_points(points);
                true
            }
            None => false,
        }
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

    #[test]
    fn test_inverting_curve() {
        let device = device();
        let src = ImageLayer::from_data(&device, PixelFormat::Mono8, 3, 1, &[0, 100, 255]).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Mono8, 3, 1);
        let mut curves = Curves::new(device);
        curves.set_points(vec![Point32F::new(0.0, 1.0), Point32F::new(1.0, 0.0)]);
        assert!(curves.process(&mut dst, &src));
        assert_eq!(curves.curve_data().len(), 256);
        assert_eq!(dst.retrieve_bitmap().unwrap().buffer(), &[255, 155, 0]);
    }

    #[test]
    fn test_single_point_fails() {
        let device = device();
        let src = ImageLayer::new(&device, PixelFormat::Mono8, 1, 1).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Mono8, 1, 1);
        let mut curves = Curves::new(device);
        curves.set_points(vec![Point32F::new(0.5, 0.5)]);
        assert!(!curves.process(&mut dst, &src));
    }

    #[test]
    fn test_preset_needs_points() {
        let mut curves = Curves::new(device());
        assert!(!curves.from_preset(&FilterPreset::for_filter("x", Curves::NAME)));
        curves.set_points(vec![Point32F::new(0.0, 0.1), Point32F::new(1.0, 0.9)]);
        let preset = curves.to_preset();
        let mut other = Curves::new(device());
        assert!(other.from_preset(&preset));
        assert_eq!(other.curve().points(), curves.curve().points());
    }
}
