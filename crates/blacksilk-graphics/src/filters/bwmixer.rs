//! Channel-mix black and white conversion.

use std::sync::Arc;

#[allow(unused_imports)]
use tracing::{debug, trace};

use crate::backend::{AsAny, BackendDevice};
use crate::filter::{Filter, current_preset, prepare_target, read_float};
use crate::layer::ImageLayer;
use crate::ops;
use crate::preset::FilterPreset;

/// Monochrome conversion with per-channel sensitivities.
///
/// Every color channel of the output is `r*sr + g*sg + b*sb`.
#[derive(Clone)]
pub struct BWMixer {
    device: Arc<dyn BackendDevice>,
    sensitivities: [f32; 3],
}

impl BWMixer {
    /// Filter name.
    pub const NAME: &'static str = "BWMixer";

    /// Mixer with all sensitivities at 1.
    pub fn new(device: Arc<dyn BackendDevice>) -> Self {
        Self {
            device,
            sensitivities: [1.0; 3],
        }
    }

    /// Red, green and blue sensitivities.
    pub fn sensitivities(&self) -> [f32; 3] {
        self.sensitivities
    }

    /// Sets the three sensitivities.
    pub fn set_sensitivities(&mut self, red: f32, green: f32, blue: f32) {
        self.sensitivities = [red, green, blue];
    }

    /// Restores the default of 1 per channel.
    pub fn reset_to_uniform(&mut self) {
        self.sensitivities = [1.0; 3];
    }
}

impl AsAny for BWMixer {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Filter for BWMixer {
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
        trace!(sensitivities = ?self.sensitivities, "bw mixer");
        prepare_target(device, dst, src) && ops::convert_to_monochrome(dst, src, src.rect(), self.sensitivities)
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self) -> FilterPreset {
        let mut preset = current_preset(Self::NAME);
        preset.set_float("RedSensitivity", self.sensitivities[0]);
        preset.set_float("GreenSensitivity", self.sensitivities[1]);
        preset.set_float("BlueSensitivity", self.sensitivities[2]);
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> bool {
        let [r, g, b] = &mut self.sensitivities;
        let mut found = read_float(preset, "RedSensitivity", r);
        found |= read_float(preset, "GreenSensitivity", g);
        found |= read_float(preset, "BlueSensitivity", b);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;
    use blacksilk_core::PixelFormat;

    #[test]
    fn test_green_only() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let src = ImageLayer::from_data(&device, PixelFormat::Rgb8, 1, 1, &[10, 200, 30]).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Rgb8, 1, 1);
        let mut mixer = BWMixer::new(device);
        mixer.set_sensitivities(0.0, 1.0, 0.0);
        assert!(mixer.process(&mut dst, &src));
        assert_eq!(dst.retrieve_bitmap().unwrap().buffer(), &[200, 200, 200]);
    }

    #[test]
    fn test_partial_preset() {
        let mut mixer = BWMixer::new(Arc::new(CpuDevice::new()));
        let mut preset = FilterPreset::for_filter("p", BWMixer::NAME);
        preset.set_float("GreenSensitivity", 0.25);
        assert!(mixer.from_preset(&preset));
        assert_eq!(mixer.sensitivities(), [1.0, 0.25, 1.0]);
        assert!(!mixer.from_preset(&FilterPreset::new("empty")));
    }
}
