//! Film grain.

use std::sync::Arc;

use blacksilk_core::{Curve, PixelFormat, Point32F};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[allow(unused_imports)]
use tracing::{debug, error, trace};

use crate::backend::{AsAny, BackendDevice};
use crate::blur_cache::BlurCache;
use crate::filter::{Filter, current_preset, prepare_target, read_curve_points, write_curve_points};
use crate::layer::ImageLayer;
use crate::ops;
use crate::preset::FilterPreset;

/// Grain blur radii below this blit the raw noise instead.
pub const MIN_GRAIN_BLUR_RADIUS: f32 = 0.05;

/// Overlays random grain weighted by a tone curve.
///
/// The noise layer is generated once per size, format and device and then
/// reused; call [`FilmGrain::reset_grain`] to roll new noise.
pub struct FilmGrain {
    device: Arc<dyn BackendDevice>,
    curve: Curve,
    curve_data: Vec<f32>,
    modified: bool,
    mono: bool,
    grain_blur_radius: f32,
    grain: Option<ImageLayer>,
    rng: StdRng,
    cache: BlurCache,
}

impl FilmGrain {
    /// Filter name.
    pub const NAME: &'static str = "FilmGrain";

    /// Mono grain, blur radius 1, strongest in the midtones.
    pub fn new(device: Arc<dyn BackendDevice>) -> Self {
        Self {
            device,
            curve: Curve::new(vec![
                Point32F::new(0.0, 0.2),
                Point32F::new(0.5, 0.6),
                Point32F::new(1.0, 0.2),
            ]),
            curve_data: Vec::new(),
            modified: true,
            mono: true,
            grain_blur_radius: 1.0,
            grain: None,
            rng: StdRng::from_entropy(),
            cache: BlurCache::new(),
        }
    }

    /// Makes the noise reproducible.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Weight curve.
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Replaces the weight curve.
    pub fn set_points(&mut self, points: Vec<Point32F>) {
        self.curve.assign(points);
        self.modified = true;
    }

    /// True if all channels share one noise value per pixel.
    pub fn mono_grain(&self) -> bool {
        self.mono
    }

    /// Switches mono grain; the noise is regenerated on the next render.
    pub fn set_mono_grain(&mut self, mono: bool) {
        if mono != self.mono {
            self.grain = None;
        }
        self.mono = mono;
    }

    /// Blur applied to the noise.
    pub fn grain_blur_radius(&self) -> f32 {
        self.grain_blur_radius
    }

    /// Sets the noise blur.
    pub fn set_grain_blur_radius(&mut self, radius: f32) {
        self.grain_blur_radius = radius;
    }

    /// Current noise layer.
    pub fn grain(&self) -> Option<&ImageLayer> {
        self.grain.as_ref()
    }

    /// Generates fresh noise of the given shape on `device`.
    pub fn reset_grain(&mut self, device: &Arc<dyn BackendDevice>, format: PixelFormat, width: u32, height: u32) -> bool {
        let mut layer = match ImageLayer::new(device, format, width, height) {
            Ok(layer) => layer.with_name("grain"),
            Err(e) => {
                error!(error = %e, "grain allocation failed");
                self.grain = None;
                return false;
            }
        };
        let channels = format.channel_count();
        let mut values = vec![0.0f32; width as usize * height as usize * channels];
        if self.mono {
            for px in values.chunks_exact_mut(channels) {
                px.fill(self.rng.r#gen::<f32>());
            }
        } else {
            for v in &mut values {
                *v = self.rng.r#gen::<f32>();
            }
        }
        let rect = layer.rect();
        let ok = layer.upload_f32(&values, rect);
        debug!(width, height, %format, mono = self.mono, "grain generated");
        self.grain = ok.then_some(layer);
        ok
    }

    fn grain_matches(&self, device: &Arc<dyn BackendDevice>, dst: &ImageLayer) -> bool {
        self.grain.as_ref().is_some_and(|g| {
            g.width() == dst.width()
                && g.height() == dst.height()
                && g.format() == dst.format()
                && g.contains_data_for_device(device.as_ref())
        })
    }

    fn update_curve_data(&mut self, len: usize) -> bool {
        if self.modified || self.curve_data.len() != len {
            self.curve_data = self.curve.sample(len);
            self.modified = false;
        }
        !self.curve_data.is_empty()
    }
}

impl Clone for FilmGrain {
    fn clone(&self) -> Self {
        Self {
            device: self.device.clone(),
            curve: self.curve.clone(),
            curve_data: self.curve_data.clone(),
            modified: self.modified,
            mono: self.mono,
            grain_blur_radius: self.grain_blur_radius,
            grain: None,
            rng: StdRng::from_entropy(),
            cache: BlurCache::new(),
        }
    }
}

impl AsAny for FilmGrain {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Filter for FilmGrain {
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
        if !self.update_curve_data(src.format().max_value() as usize + 1) {
            error!(points = self.curve.len(), "grain curve needs at least two points");
            return false;
        }
        if !prepare_target(device, dst, src) {
            return false;
        }
        if !self.grain_matches(device, dst) && !self.reset_grain(device, dst.format(), dst.width(), dst.height()) {
            return false;
        }
        let Some(grain) = self.grain.as_ref() else {
            return false;
        };
        let Some(mut blurred) = self.cache.acquire(device, grain.format(), grain.width(), grain.height()) else {
            return false;
        };
        let area = src.rect();
        let prepared = if self.grain_blur_radius >= MIN_GRAIN_BLUR_RADIUS {
            ops::gaussian_blur(&mut blurred, grain, area, self.grain_blur_radius)
        } else {
            ops::blit(&mut blurred, grain, area, 0, 0)
        };
        let ok = prepared && ops::filmgrain(dst, src, &blurred, area, &self.curve_data);
        self.cache.release(blurred);
        ok
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }

    fn to_preset(&self) -> FilterPreset {
        let mut preset = current_preset(Self::NAME);
        write_curve_points(&mut preset, self.curve.points(), self.curve_data.len());
        preset.set_int("MonoGrain", i32::from(self.mono));
        preset.set_float("GrainBlurRadius", self.grain_blur_radius);
        preset
    }

    fn from_preset(&mut self, preset: &FilterPreset) -> bool {
        let mut found = false;
        if let Some(points) = read_curve_points(preset) {
            self.set_points(points);
            found = true;
        }
        if let Some(mono) = preset.int("MonoGrain") {
            self.set_mono_grain(mono == 1);
            found = true;
        }
        if let Some(radius) = preset.float("GrainBlurRadius") {
            self.grain_blur_radius = radius;
            found = true;
        }
        found
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
    fn test_mono_grain_shares_channels() {
        let device = device();
        let mut grain = FilmGrain::new(device.clone());
        grain.set_seed(7);
        assert!(grain.reset_grain(&device, PixelFormat::Rgb8, 4, 3));
        let data = grain.grain().unwrap().retrieve_bitmap().unwrap().into_buffer();
        for px in data.chunks_exact(3) {
            assert!(px[0] == px[1] && px[1] == px[2]);
        }
    }

    #[test]
    fn test_grain_reused_until_shape_changes() {
        let device = device();
        let src = ImageLayer::from_data(&device, PixelFormat::Rgb8, 2, 2, &[128; 12]).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Rgb8, 2, 2);
        let mut grain = FilmGrain::new(device.clone());
        grain.set_seed(1);
        assert!(grain.process(&mut dst, &src));
        let first = grain.grain().unwrap().retrieve_bitmap().unwrap();
        assert!(grain.process(&mut dst, &src));
        assert_eq!(grain.grain().unwrap().retrieve_bitmap().unwrap(), first);

        let bigger = ImageLayer::new(&device, PixelFormat::Rgb8, 3, 2).unwrap();
        assert!(grain.process(&mut dst, &bigger));
        assert_eq!(grain.grain().unwrap().width(), 3);
    }

    #[test]
    fn test_zero_weight_curve_is_identity() {
        let device = device();
        let data = [10u8, 60, 110, 160, 210, 250];
        let src = ImageLayer::from_data(&device, PixelFormat::Rgb8, 2, 1, &data).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Rgb8, 2, 1);
        let mut grain = FilmGrain::new(device);
        grain.set_points(vec![Point32F::new(0.0, 0.0), Point32F::new(1.0, 0.0)]);
        grain.set_grain_blur_radius(0.0);
        assert!(grain.process(&mut dst, &src));
        assert_eq!(dst.retrieve_bitmap().unwrap().buffer(), &data);
    }

    #[test]
    fn test_preset_round_trip() {
        let device = device();
        let mut a = FilmGrain::new(device.clone());
        a.set_mono_grain(false);
        a.set_grain_blur_radius(0.5);
        let mut b = FilmGrain::new(device);
        assert!(b.from_preset(&a.to_preset()));
        assert!(!b.mono_grain());
        assert_eq!(b.grain_blur_radius(), 0.5);
        assert_eq!(b.curve().points(), a.curve().points());
    }
}
