//! Luminance-adaptive black and white conversion.

use std::sync::Arc;

use crate::backend::{AsAny, BackendDevice};
use crate::filter::{Filter, current_preset, prepare_target, read_float, read_rgb, write_rgb};
use crate::layer::ImageLayer;
use crate::ops::{self, LUMA_WEIGHTS};
use crate::preset::FilterPreset;

/// Blends a highlight channel mix and a shadow channel mix by luminance.
#[derive(Clone)]
pub struct BWAdaptiveMixer {
    device: Arc<dyn BackendDevice>,
    highlight_weights: [f32; 3],
    shadow_weights: [f32; 3],
    balance: f32,
}

impl BWAdaptiveMixer {
    /// Filter name.
    pub const NAME: &'static str = "BWAdaptiveMixer";

    /// Both mixes at Rec. 601 weights, balance 1.
    pub fn new(device: Arc<dyn BackendDevice>) -> Self {
        Self {
            device,
            highlight_weights: LUMA_WEIGHTS,
            shadow_weights: LUMA_WEIGHTS,
            balance: 1.0,
        }
    }

    /// Channel mix used in the highlights.
    pub fn highlight_weights(&self) -> [f32; 3] {
        self.highlight_weights
    }

    /// Sets the highlight mix.
    pub fn set_highlight_weights(&mut self, rgb: [f32; 3]) {
        self.highlight_weights = rgb;
    }

    /// Channel mix used in the shadows.
    pub fn shadow_weights(&self) -> [f32; 3] {
        self.shadow_weights
    }

    /// Sets the shadow mix.
    pub fn set_shadow_weights(&mut self, rgb: [f32; 3]) {
        self.shadow_weights = rgb;
    }

    /// Offset added to the luminance weight.
    pub fn balance(&self) -> f32 {
        self.balance
    }

    /// Sets the balance.
    pub fn set_balance(&mut self, balance: f32) {
        self.balance = balance;
    }
}

impl AsAny for BWAdaptiveMixer {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Filter for BWAdaptiveMixer {
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
            && ops::adaptive_bw_mixer(
                dst,
                src,
                src.rect(),
                self.balance,
                self.highlight_weights,
                self.shadow_weights,
            )
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self) -> FilterPreset {
        let mut preset = current_preset(Self::NAME);
        write_rgb(&mut preset, "HighlightWeights", self.highlight_weights);
        write_rgb(&mut preset, "ShadowWeights", self.shadow_weights);
        preset.set_float("Balance", self.balance);
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> bool {
        let mut found = read_rgb(preset, "HighlightWeights", &mut self.highlight_weights);
        found |= read_rgb(preset, "ShadowWeights", &mut self.shadow_weights);
        found |= read_float(preset, "Balance", &mut self.balance);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;
    use blacksilk_core::PixelFormat;

    #[test]
    fn test_output_is_gray() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let src = ImageLayer::from_data(&device, PixelFormat::Rgb8, 2, 1, &[200, 40, 90, 5, 250, 120]).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Rgb8, 2, 1);
        let mut mixer = BWAdaptiveMixer::new(device);
        mixer.set_balance(0.0);
        mixer.set_shadow_weights([0.0, 0.0, 1.0]);
        assert!(mixer.process(&mut dst, &src));
        let out = dst.retrieve_bitmap().unwrap().into_buffer();
        for px in out.chunks_exact(3) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }
}
