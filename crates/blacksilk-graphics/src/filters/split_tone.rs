//! Split toning.

use std::sync::Arc;

#[allow(unused_imports)]
use tracing::{debug, trace};

use crate::backend::{AsAny, BackendDevice};
use crate::filter::{Filter, current_preset, prepare_target, read_float, read_rgb, write_rgb};
use crate::layer::ImageLayer;
use crate::ops;
use crate::preset::FilterPreset;

/// Overlay-tints highlights and shadows with separate colors.
///
/// Factors of 0.5 leave the image unchanged; `balance` shifts the split
/// point between highlights and shadows.
#[derive(Clone)]
pub struct SplitTone {
    device: Arc<dyn BackendDevice>,
    highlights: [f32; 3],
    shadows: [f32; 3],
    balance: f32,
}

impl SplitTone {
    /// Filter name.
    pub const NAME: &'static str = "SplitTone";

    /// Neutral split tone.
    pub fn new(device: Arc<dyn BackendDevice>) -> Self {
        Self {
            device,
            highlights: [0.5; 3],
            shadows: [0.5; 3],
            balance: 0.0,
        }
    }

    /// Highlight tint.
    pub fn highlights(&self) -> [f32; 3] {
        self.highlights
    }

    /// Sets the highlight tint.
    pub fn set_highlights(&mut self, rgb: [f32; 3]) {
        self.highlights = rgb;
    }

    /// Shadow tint.
    pub fn shadows(&self) -> [f32; 3] {
        self.shadows
    }

    /// Sets the shadow tint.
    pub fn set_shadows(&mut self, rgb: [f32; 3]) {
        self.shadows = rgb;
    }

    /// Highlight/shadow balance.
    pub fn balance(&self) -> f32 {
        self.balance
    }

    /// Sets the balance.
    pub fn set_balance(&mut self, balance: f32) {
        self.balance = balance;
    }
}

impl AsAny for SplitTone {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Filter for SplitTone {
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
        prepare_target(device, dst, src)
            && ops::splittone(dst, src, src.rect(), self.highlights, self.shadows, self.balance)
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self) -> FilterPreset {
        let mut preset = current_preset(Self::NAME);
        preset.set_float("Balance", self.balance);
        write_rgb(&mut preset, "HighlightsFactor", self.highlights);
        write_rgb(&mut preset, "ShadowsFactor", self.shadows);
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> bool {
        let mut found = read_float(preset, "Balance", &mut self.balance);
        found |= read_rgb(preset, "HighlightsFactor", &mut self.highlights);
        found |= read_rgb(preset, "ShadowsFactor", &mut self.shadows);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;
    use blacksilk_core::PixelFormat;

    #[test]
    fn test_rejects_mono() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let src = ImageLayer::new(&device, PixelFormat::Mono8, 2, 2).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Mono8, 2, 2);
        assert!(!SplitTone::new(device).process(&mut dst, &src));
    }

    #[test]
    fn test_preset_keys() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let mut tone = SplitTone::new(device.clone());
        tone.set_highlights([0.7, 0.6, 0.4]);
        tone.set_balance(0.2);
        let preset = tone.to_preset();
        assert_eq!(preset.float("HighlightsFactor.G"), Some(0.6));
        assert_eq!(preset.float("ShadowsFactor.B"), Some(0.5));

        let mut other = SplitTone::new(device);
        assert!(other.from_preset(&preset));
        assert_eq!(other.highlights(), [0.7, 0.6, 0.4]);
        assert_eq!(other.balance(), 0.2);
    }
}
