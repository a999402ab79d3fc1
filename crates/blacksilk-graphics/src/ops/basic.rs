//! Copy, fill, arithmetic, blend and tone operations.
//!
//! Every function writes `dst` inside `area` from sources of the same size
//! and format, and returns `false` when no backend could render.
//! Destination and sources are distinct layers; use a scratch layer from
//! [`ImageLayer::new_like`] to chain operations.

use blacksilk_core::Rect32I;

#[allow(unused_imports)]
use tracing::{error, trace};

use super::{BinaryOp, Op, ScalarOp, check_area, run};
use crate::layer::ImageLayer;

// ============================================================================
// Copy and fill
// ============================================================================

/// Copies `source_rect` of `src` to (`dest_x`, `dest_y`) in `dst`.
pub fn blit(dst: &mut ImageLayer, src: &ImageLayer, source_rect: Rect32I, dest_x: i32, dest_y: i32) -> bool {
    let target = Rect32I::new(dest_x, dest_y, source_rect.width, source_rect.height);
    let ok = !dst.is_empty()
        && !src.is_empty()
        && dst.format() == src.format()
        && !source_rect.is_empty()
        && source_rect.fits_within(src.width(), src.height())
        && target.fits_within(dst.width(), dst.height());
    if !ok {
        error!(?source_rect, dest_x, dest_y, layer = dst.name(), "blit precondition violated");
        return false;
    }
    run(&Op::Blit { dest_x, dest_y }, dst, &[src], source_rect)
}

/// Sets every channel in `area` to `value`.
pub fn fill(dst: &mut ImageLayer, area: Rect32I, value: f32) -> bool {
    fill_color(dst, area, [value; 4])
}

/// Sets channels in `area` to `color` (entries beyond the channel count are
/// ignored).
pub fn fill_color(dst: &mut ImageLayer, area: Rect32I, color: [f32; 4]) -> bool {
    check_area(dst, &[], area) && run(&Op::Fill(color), dst, &[], area)
}

/// Sets one channel in `area`.
pub fn fill_channel(dst: &mut ImageLayer, area: Rect32I, channel: usize, value: f32) -> bool {
    if channel >= dst.format().channel_count() {
        error!(channel, format = %dst.format(), "channel index out of range");
        return false;
    }
    check_area(dst, &[], area) && run(&Op::FillChannel { channel, value }, dst, &[], area)
}

// ============================================================================
// Layer-layer arithmetic and blending
// ============================================================================

fn binary(kind: BinaryOp, dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    trace!(?kind, ?area, "binary op");
    check_area(dst, &[a, b], area) && run(&Op::Binary(kind), dst, &[a, b], area)
}

/// `a + b`
pub fn add(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::Add, dst, a, b, area)
}

/// `a - b`
pub fn subtract(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::Subtract, dst, a, b, area)
}

/// `a * b`
pub fn multiply(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::Multiply, dst, a, b, area)
}

/// `a / b`; a zero divisor yields 1.
pub fn divide(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::Divide, dst, a, b, area)
}

/// Per-sample minimum.
pub fn min(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::Min, dst, a, b, area)
}

/// Per-sample maximum.
pub fn max(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::Max, dst, a, b, area)
}

/// `a - b + 0.5`
pub fn grain_extract(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::GrainExtract, dst, a, b, area)
}

/// `a + b - 0.5`
pub fn grain_merge(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::GrainMerge, dst, a, b, area)
}

/// Overlay of `a` with mask `b`.
pub fn overlay_blend(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::Overlay, dst, a, b, area)
}

/// `1 - (1 - a)(1 - b)`
pub fn screen(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::Screen, dst, a, b, area)
}

/// `|a - b|`
pub fn difference(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I) -> bool {
    binary(BinaryOp::Difference, dst, a, b, area)
}

/// `a * (1 - alpha) + b * alpha`
pub fn alpha_blend(dst: &mut ImageLayer, a: &ImageLayer, b: &ImageLayer, area: Rect32I, alpha: f32) -> bool {
    check_area(dst, &[a, b], area) && run(&Op::AlphaBlend(alpha), dst, &[a, b], area)
}

// ============================================================================
// Layer-scalar arithmetic
// ============================================================================

fn scalar(kind: ScalarOp, dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, value: f32) -> bool {
    check_area(dst, &[src], area) && run(&Op::Scalar(kind, value), dst, &[src], area)
}

/// `src + value`
pub fn add_scalar(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, value: f32) -> bool {
    scalar(ScalarOp::Add, dst, src, area, value)
}

/// `src - value`
pub fn subtract_scalar(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, value: f32) -> bool {
    scalar(ScalarOp::Subtract, dst, src, area, value)
}

/// `src * value`
pub fn multiply_scalar(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, value: f32) -> bool {
    scalar(ScalarOp::Multiply, dst, src, area, value)
}

/// `src / value`; zero yields 1.
pub fn divide_scalar(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, value: f32) -> bool {
    scalar(ScalarOp::Divide, dst, src, area, value)
}

/// `min(src, value)`
pub fn min_scalar(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, value: f32) -> bool {
    scalar(ScalarOp::Min, dst, src, area, value)
}

/// `max(src, value)`
pub fn max_scalar(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, value: f32) -> bool {
    scalar(ScalarOp::Max, dst, src, area, value)
}

/// Scales the distance from mid-gray: `(src - 0.5) * value + 0.5`.
pub fn grain_multiply(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, value: f32) -> bool {
    scalar(ScalarOp::GrainMultiply, dst, src, area, value)
}

/// `1 - src`
pub fn negate(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I) -> bool {
    check_area(dst, &[src], area) && run(&Op::Negate, dst, &[src], area)
}

// ============================================================================
// Tone
// ============================================================================

/// Maps every sample through a sampled curve (`curve[round(v * (len - 1))]`).
pub fn adjust_brightness(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, curve: &[f32]) -> bool {
    if curve.is_empty() {
        error!("adjust_brightness with an empty curve");
        return false;
    }
    check_area(dst, &[src], area) && run(&Op::BrightnessCurve(curve), dst, &[src], area)
}

/// `min(src * value, 1)`. Both layers must hold data.
pub fn adjust_brightness_scalar(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, value: f32) -> bool {
    check_area(dst, &[src], area) && run(&Op::BrightnessScale(value), dst, &[src], area)
}

/// Writes `c0*f0 + c1*f1 + c2*f2` to every color channel; alpha is kept.
///
/// Needs at least three channels.
pub fn convert_to_monochrome(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, factors: [f32; 3]) -> bool {
    if dst.format().channel_count() < 3 {
        error!(format = %dst.format(), "monochrome conversion needs a color layer");
        return false;
    }
    check_area(dst, &[src], area) && run(&Op::Monochrome(factors), dst, &[src], area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendDevice, CpuDevice};
    use blacksilk_core::PixelFormat;
    use std::sync::Arc;

    fn device() -> Arc<dyn BackendDevice> {
        Arc::new(CpuDevice::new())
    }

    fn mono(dev: &Arc<dyn BackendDevice>, data: &[u8]) -> ImageLayer {
        ImageLayer::from_data(dev, PixelFormat::Mono8, data.len() as u32, 1, data).unwrap()
    }

    fn bytes(layer: &ImageLayer) -> Vec<u8> {
        layer.retrieve_bitmap().unwrap().into_buffer()
    }

    #[test]
    fn test_add_saturates() {
        let dev = device();
        let a = mono(&dev, &[100, 200]);
        let b = mono(&dev, &[100, 100]);
        let mut out = a.new_like().unwrap();
        assert!(add(&mut out, &a, &b, a.rect()));
        assert_eq!(bytes(&out), vec![200, 255]);
    }

    #[test]
    fn test_divide_by_zero_is_white() {
        let dev = device();
        let a = mono(&dev, &[51, 51]);
        let b = mono(&dev, &[0, 255]);
        let mut out = a.new_like().unwrap();
        assert!(divide(&mut out, &a, &b, a.rect()));
        assert_eq!(bytes(&out), vec![255, 51]);
    }

    #[test]
    fn test_area_outside_layer_fails() {
        let dev = device();
        let a = mono(&dev, &[1, 2]);
        let mut out = a.new_like().unwrap();
        assert!(!negate(&mut out, &a, Rect32I::new(1, 0, 2, 1)));
    }

    #[test]
    fn test_partial_area() {
        let dev = device();
        let a = mono(&dev, &[0, 0, 0]);
        let mut out = a.new_like().unwrap();
        assert!(negate(&mut out, &a, Rect32I::new(1, 0, 1, 1)));
        assert_eq!(bytes(&out), vec![0, 255, 0]);
    }

    #[test]
    fn test_fill_channel_and_monochrome() {
        let dev = device();
        let mut rgb = ImageLayer::new(&dev, PixelFormat::Rgb8, 2, 2).unwrap();
        assert!(fill_channel(&mut rgb, Rect32I::from_size(2, 2), 0, 1.0));
        assert!(!fill_channel(&mut rgb, Rect32I::from_size(2, 2), 3, 1.0));

        let mut out = rgb.new_like().unwrap();
        assert!(convert_to_monochrome(&mut out, &rgb, rgb.rect(), [1.0, 0.0, 0.0]));
        assert!(bytes(&out).iter().all(|&v| v == 255));
    }

    #[test]
    fn test_brightness_curve() {
        let dev = device();
        let a = mono(&dev, &[0, 255]);
        let mut out = a.new_like().unwrap();
        assert!(adjust_brightness(&mut out, &a, a.rect(), &[1.0, 0.0]));
        assert_eq!(bytes(&out), vec![255, 0]);
        assert!(!adjust_brightness(&mut out, &a, a.rect(), &[]));
        assert!(adjust_brightness_scalar(&mut out, &a, a.rect(), 0.5));
        assert_eq!(bytes(&out), vec![0, 128]);
    }

    #[test]
    fn test_blit_offsets() {
        let dev = device();
        let src = mono(&dev, &[7, 9]);
        let mut dst = mono(&dev, &[0, 0, 0]);
        assert!(blit(&mut dst, &src, Rect32I::new(0, 0, 2, 1), 1, 0));
        assert_eq!(bytes(&dst), vec![0, 7, 9]);
        assert!(!blit(&mut dst, &src, Rect32I::new(0, 0, 2, 1), 2, 0));
    }
}
