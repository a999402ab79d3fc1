//! Generic compositions against the fused CPU kernels.
//!
//! `PartialCpu` is a CPU device whose kernel table lacks the fused
//! operations, so dispatch reports them unsupported and the public ops
//! run their generic compositions instead.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use blacksilk_core::{PixelFormat, Rect32I};
use blacksilk_graphics::backend::ImageObject;
use blacksilk_graphics::ops::{self, CascadeInput, Dispatch, KernelTable, Op, OpKind};
use blacksilk_graphics::{BackendDevice, BackendId, CpuDevice, DeviceConfig, ImageLayer};

const SIZE: u32 = 8;

const FUSED: [OpKind; 3] = [OpKind::AdaptiveBw, OpKind::FilmGrain, OpKind::CascadedSharpen4];

const ALL: [OpKind; 18] = [
    OpKind::Blit,
    OpKind::Fill,
    OpKind::FillChannel,
    OpKind::Binary,
    OpKind::Scalar,
    OpKind::AlphaBlend,
    OpKind::Negate,
    OpKind::BrightnessCurve,
    OpKind::BrightnessScale,
    OpKind::Monochrome,
    OpKind::Blur,
    OpKind::Vignette,
    OpKind::SplitTone,
    OpKind::AdaptiveBw,
    OpKind::FilmGrain,
    OpKind::CascadedSharpen4,
    OpKind::WeightedSum,
    OpKind::Resample,
];

/// CPU device without the fused kernels.
struct PartialCpu {
    inner: CpuDevice,
    kernels: KernelTable,
}

impl PartialCpu {
    fn new() -> Self {
        let inner = CpuDevice::new();
        let mut kernels = KernelTable::new();
        for kind in ALL.into_iter().filter(|k| !FUSED.contains(k)) {
            if let Some(kernel) = inner.kernels().get(kind) {
                kernels.register(kind, kernel);
            }
        }
        Self { inner, kernels }
    }
}

impl BackendDevice for PartialCpu {
    fn backend_id(&self) -> BackendId {
        self.inner.backend_id()
    }

    fn device_id(&self) -> u64 {
        self.inner.device_id()
    }

    fn name(&self) -> &str {
        "CPU without fused kernels"
    }

    fn config(&self) -> &DeviceConfig {
        self.inner.config()
    }

    fn create_texture_2d(
        &self,
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Option<Box<dyn ImageObject>> {
        self.inner.create_texture_2d(format, width, height, data)
    }

    fn kernels(&self) -> &KernelTable {
        &self.kernels
    }
}

fn full() -> Arc<dyn BackendDevice> {
    Arc::new(CpuDevice::new())
}

fn partial() -> Arc<dyn BackendDevice> {
    Arc::new(PartialCpu::new())
}

/// Smooth RGB ramp with a bright spot in the middle.
fn scene(device: &Arc<dyn BackendDevice>) -> ImageLayer {
    let mut values = Vec::with_capacity((SIZE * SIZE * 3) as usize);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let spot = if (3..5).contains(&x) && (3..5).contains(&y) { 0.15 } else { 0.0 };
            let fx = x as f32 / (SIZE - 1) as f32;
            let fy = y as f32 / (SIZE - 1) as f32;
            values.push(0.2 + 0.5 * fx + spot);
            values.push(0.3 + 0.4 * fy + spot);
            values.push(0.6 - 0.3 * fx * fy + spot);
        }
    }
    layer_from(device, &values)
}

/// Checkerboard-ish noise stand-in centered on mid-gray.
fn grain(device: &Arc<dyn BackendDevice>) -> ImageLayer {
    let values: Vec<f32> = (0..SIZE * SIZE * 3)
        .map(|i| 0.5 + if (i / 3 + i / (3 * SIZE)) % 2 == 0 { 0.2 } else { -0.2 })
        .collect();
    layer_from(device, &values)
}

fn layer_from(device: &Arc<dyn BackendDevice>, values: &[f32]) -> ImageLayer {
    let mut layer = ImageLayer::new(device, PixelFormat::Rgb16, SIZE, SIZE).unwrap();
    assert!(layer.upload_f32(values, layer.rect()));
    layer
}

fn grain_curve() -> Vec<f32> {
    (0..256)
        .map(|i| {
            let t = i as f32 / 255.0;
            0.2 + 0.4 * (1.0 - (2.0 * t - 1.0).abs())
        })
        .collect()
}

fn assert_close(a: &ImageLayer, b: &ImageLayer, epsilon: f32) {
    let a = a.retrieve_f32(a.rect()).unwrap();
    let b = b.retrieve_f32(b.rect()).unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_abs_diff_eq!(*x, *y, epsilon = epsilon);
    }
}

fn render_grain(device: &Arc<dyn BackendDevice>) -> ImageLayer {
    let src = scene(device);
    let noise = grain(device);
    let mut dst = src.new_like().unwrap();
    assert!(ops::filmgrain(&mut dst, &src, &noise, src.rect(), &grain_curve()));
    dst
}

fn render_adaptive(device: &Arc<dyn BackendDevice>) -> ImageLayer {
    let src = scene(device);
    let mut dst = src.new_like().unwrap();
    assert!(ops::adaptive_bw_mixer(
        &mut dst,
        &src,
        src.rect(),
        0.1,
        [0.5, 0.3, 0.2],
        [0.2, 0.3, 0.5],
    ));
    dst
}

fn render_sharpen(device: &Arc<dyn BackendDevice>) -> ImageLayer {
    let src = scene(device);
    let blurred: Vec<ImageLayer> = [1.0, 2.0, 3.0, 4.0]
        .iter()
        .map(|&radius| {
            let mut b = src.new_like().unwrap();
            assert!(ops::gaussian_blur(&mut b, &src, src.rect(), radius));
            b
        })
        .collect();
    let cascades: Vec<CascadeInput<'_>> = blurred
        .iter()
        .zip([60.0, 40.0, 30.0, 20.0])
        .map(|(blurred, strength)| CascadeInput { blurred, strength })
        .collect();
    let mut dst = src.new_like().unwrap();
    assert!(ops::cascaded_sharpen(&mut dst, &src, &cascades, src.rect(), 10.0));
    dst
}

#[test]
fn test_missing_kernel_dispatches_unsupported() {
    let curve = grain_curve();
    for (device, expected) in [(full(), Dispatch::Rendered), (partial(), Dispatch::Unsupported)] {
        let src = scene(&device);
        let noise = grain(&device);
        let mut dst = src.new_like().unwrap();
        let area = Rect32I::from_size(SIZE, SIZE);
        assert_eq!(ops::dispatch(&Op::FilmGrain(&curve), &mut dst, &[&src, &noise], area), expected);
        assert!(!dst.is_empty());
    }
}

#[test]
fn test_filmgrain_fallback_matches_kernel() {
    assert_close(&render_grain(&full()), &render_grain(&partial()), 1e-3);
}

#[test]
fn test_adaptive_bw_fallback_matches_kernel() {
    assert_close(&render_adaptive(&full()), &render_adaptive(&partial()), 1e-3);
}

#[test]
fn test_cascaded_sharpen_fallback_matches_fused() {
    assert_close(&render_sharpen(&full()), &render_sharpen(&partial()), 5e-3);
}

#[test]
fn test_generic_functions_match_kernels_directly() {
    let device = full();
    let src = scene(&device);
    let noise = grain(&device);
    let area = src.rect();
    let curve = grain_curve();

    let mut generic = src.new_like().unwrap();
    assert!(ops::filmgrain_generic(&mut generic, &src, &noise, area, &curve));
    assert_close(&generic, &render_grain(&device), 1e-3);

    let mut generic = src.new_like().unwrap();
    assert!(ops::adaptive_bw_mixer_generic(
        &mut generic,
        &src,
        area,
        0.1,
        [0.5, 0.3, 0.2],
        [0.2, 0.3, 0.5],
    ));
    assert_close(&generic, &render_adaptive(&device), 1e-3);
}
