//! Blur, vignette, split-tone, adaptive black and white, film grain and
//! cascaded sharpening.
//!
//! Operations without a kernel on some backend fall back to a composition
//! of the basic operations, dispatched through the same routing.

use blacksilk_core::{Point32F, Rect32I};

#[allow(unused_imports)]
use tracing::{debug, error, trace};

use super::basic::{
    add, add_scalar, adjust_brightness, convert_to_monochrome, grain_extract, grain_merge, grain_multiply,
    max, multiply, multiply_scalar, negate, overlay_blend,
};
use super::{BlurDirection, Op, check_area, run, run_with_fallback, temp_like};
use crate::layer::ImageLayer;

/// Rec. 601 luma weights.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

// ============================================================================
// Blur
// ============================================================================

/// Normalized gaussian weights for `radius`.
///
/// Length is `4 * ceil(radius) + 1`, weight `exp(-i² / (radius * 1.141))`.
/// A non-positive radius yields the identity kernel.
pub fn gaussian_kernel(radius: f32) -> Vec<f32> {
    if radius <= 0.0 || !radius.is_finite() {
        return vec![1.0];
    }
    let half = 2 * radius.ceil() as i32;
    let denom = radius * 1.141;
    let mut weights: Vec<f32> = (-half..=half).map(|i| (-((i * i) as f32) / denom).exp()).collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

fn blur_pass(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, radius: f32, direction: BlurDirection) -> bool {
    trace!(radius, ?direction, "gaussian blur pass");
    check_area(dst, &[src], area) && run(&Op::Blur { radius, direction }, dst, &[src], area)
}

/// Horizontal gaussian pass with wrap-around edges.
pub fn horizontal_gaussian_blur(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, radius: f32) -> bool {
    blur_pass(dst, src, area, radius, BlurDirection::Horizontal)
}

/// Vertical gaussian pass with wrap-around edges.
pub fn vertical_gaussian_blur(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, radius: f32) -> bool {
    blur_pass(dst, src, area, radius, BlurDirection::Vertical)
}

/// Separable gaussian blur.
///
/// The horizontal pass covers the whole layer since the vertical pass reads
/// rows outside `area`.
pub fn gaussian_blur(dst: &mut ImageLayer, src: &ImageLayer, area: Rect32I, radius: f32) -> bool {
    let Some(mut temp) = temp_like(src) else {
        return false;
    };
    horizontal_gaussian_blur(&mut temp, src, src.rect(), radius) && vertical_gaussian_blur(dst, &temp, area, radius)
}

// ============================================================================
// Color effects
// ============================================================================

/// Radial darkening.
///
/// `center` is in percent of width/height, `radius` in percent of height and
/// `strength` in percent. Per sample: `v = strength * dist / max_dist`,
/// `out = (1 - v) * c + v * c²`.
pub fn apply_vignette(
    dst: &mut ImageLayer,
    src: &ImageLayer,
    area: Rect32I,
    center: Point32F,
    radius: f32,
    strength: f32,
) -> bool {
    let op = Op::Vignette {
        center: [center.x, center.y],
        radius,
        strength,
    };
    check_area(dst, &[src], area) && run(&op, dst, &[src], area)
}

/// Overlay-tints highlights and shadows. Intensity is taken from channel 0.
pub fn splittone(
    dst: &mut ImageLayer,
    src: &ImageLayer,
    area: Rect32I,
    highlights: [f32; 3],
    shadows: [f32; 3],
    balance: f32,
) -> bool {
    if dst.format().channel_count() < 3 {
        error!(format = %dst.format(), "split-tone needs a color layer");
        return false;
    }
    let op = Op::SplitTone {
        highlights,
        shadows,
        balance,
    };
    check_area(dst, &[src], area) && run(&op, dst, &[src], area)
}

/// Black and white conversion blending two channel mixes by luminance.
///
/// `luma = clamp(balance + 0.299r + 0.587g + 0.114b)`,
/// `out = mix(shadows) * (1 - luma) + mix(highlights) * luma`.
pub fn adaptive_bw_mixer(
    dst: &mut ImageLayer,
    src: &ImageLayer,
    area: Rect32I,
    balance: f32,
    highlights: [f32; 3],
    shadows: [f32; 3],
) -> bool {
    if dst.format().channel_count() < 3 {
        error!(format = %dst.format(), "adaptive mixer needs a color layer");
        return false;
    }
    if !check_area(dst, &[src], area) {
        return false;
    }
    let op = Op::AdaptiveBw {
        balance,
        highlights,
        shadows,
    };
    run_with_fallback(&op, dst, &[src], area, |dst| {
        adaptive_bw_mixer_generic(dst, src, area, balance, highlights, shadows)
    })
}

/// [`adaptive_bw_mixer`] built from monochrome, scalar and arithmetic
/// operations.
pub fn adaptive_bw_mixer_generic(
    dst: &mut ImageLayer,
    src: &ImageLayer,
    area: Rect32I,
    balance: f32,
    highlights: [f32; 3],
    shadows: [f32; 3],
) -> bool {
    let (Some(mut a), Some(mut weight), Some(mut inverse), Some(mut mixed)) =
        (temp_like(src), temp_like(src), temp_like(src), temp_like(src))
    else {
        return false;
    };
    debug!(?area, "adaptive mixer generic path");
    convert_to_monochrome(&mut a, src, area, LUMA_WEIGHTS)
        && add_scalar(&mut weight, &a, area, balance)
        && negate(&mut inverse, &weight, area)
        && convert_to_monochrome(&mut a, src, area, highlights)
        && multiply(&mut mixed, &a, &weight, area)
        && convert_to_monochrome(&mut a, src, area, shadows)
        && multiply(&mut weight, &a, &inverse, area)
        && add(dst, &mixed, &weight, area)
}

/// Film grain blend.
///
/// Per channel: `w = curve(c)`, `out = c * (1 - w) + overlay(c, grain) * w`.
pub fn filmgrain(dst: &mut ImageLayer, src: &ImageLayer, grain: &ImageLayer, area: Rect32I, curve: &[f32]) -> bool {
    if curve.is_empty() {
        error!("film grain with an empty curve");
        return false;
    }
    if !check_area(dst, &[src, grain], area) {
        return false;
    }
    run_with_fallback(&Op::FilmGrain(curve), dst, &[src, grain], area, |dst| {
        filmgrain_generic(dst, src, grain, area, curve)
    })
}

/// [`filmgrain`] built from brightness, overlay and arithmetic operations.
pub fn filmgrain_generic(
    dst: &mut ImageLayer,
    src: &ImageLayer,
    grain: &ImageLayer,
    area: Rect32I,
    curve: &[f32],
) -> bool {
    let (Some(mut weight), Some(mut grained), Some(mut scratch), Some(mut kept)) =
        (temp_like(src), temp_like(src), temp_like(src), temp_like(src))
    else {
        return false;
    };
    debug!(?area, "film grain generic path");
    adjust_brightness(&mut weight, src, area, curve)
        && overlay_blend(&mut grained, src, grain, area)
        && negate(&mut scratch, &weight, area)
        && multiply(&mut kept, src, &scratch, area)
        && multiply(&mut scratch, &grained, &weight, area)
        && add(dst, &kept, &scratch, area)
}

// ============================================================================
// Cascaded sharpen
// ============================================================================

/// One blurred copy of the base with its strength in percent.
#[derive(Debug, Clone, Copy)]
pub struct CascadeInput<'a> {
    /// Base image blurred with this cascade's radius.
    pub blurred: &'a ImageLayer,
    /// Strength in percent.
    pub strength: f32,
}

/// Fused cascade combination for one sample.
///
/// `raw_k = blur_k - base`; each cascade contributes the difference to the
/// previous one scaled by its strength. The local contrast maximum (floored
/// at 0.5) damped by the threshold decides how much of the sharpened value
/// is used.
#[inline]
pub(crate) fn cascade_pixel(base: f32, blurred: &[f32], strengths: &[f32], threshold: f32) -> f32 {
    let mut sum = 0.0;
    let mut peak = 0.5f32;
    let mut last = 0.0;
    for (b, s) in blurred.iter().zip(strengths) {
        let raw = b - base;
        sum += (raw - last) * s / 100.0;
        peak = peak.max(raw + 0.5);
        last = raw;
    }
    let overall = (peak * threshold_factor(threshold)).clamp(0.0, 1.0);
    overall * (base - sum) + (1.0 - overall) * base
}

#[inline]
fn threshold_factor(threshold: f32) -> f32 {
    1.0 - (threshold / 100.0).max(0.01)
}

/// Multi-scale sharpening from pre-blurred copies of `base`.
///
/// Exactly four cascades use the fused kernel; any other count runs
/// [`cascaded_sharpen_generic`].
pub fn cascaded_sharpen(
    dst: &mut ImageLayer,
    base: &ImageLayer,
    cascades: &[CascadeInput<'_>],
    area: Rect32I,
    threshold: f32,
) -> bool {
    if cascades.is_empty() {
        error!("cascaded sharpen without cascades");
        return false;
    }
    let mut sources: Vec<&ImageLayer> = vec![base];
    sources.extend(cascades.iter().map(|c| c.blurred));
    if !check_area(dst, &sources, area) {
        return false;
    }

    if cascades.len() != 4 {
        debug!(count = cascades.len(), "cascade count has no fused kernel");
        return cascaded_sharpen_generic(dst, base, cascades, area, threshold);
    }
    let strengths = [
        cascades[0].strength,
        cascades[1].strength,
        cascades[2].strength,
        cascades[3].strength,
    ];
    let op = Op::CascadedSharpen4 { strengths, threshold };
    run_with_fallback(&op, dst, &sources, area, |dst| {
        cascaded_sharpen_generic(dst, base, cascades, area, threshold)
    })
}

/// Cascaded sharpening for any number of cascades, built from grain blend
/// operations. Intermediate values live around mid-gray.
pub fn cascaded_sharpen_generic(
    dst: &mut ImageLayer,
    base: &ImageLayer,
    cascades: &[CascadeInput<'_>],
    area: Rect32I,
    threshold: f32,
) -> bool {
    let mut temps = Vec::with_capacity(7);
    for _ in 0..7 {
        let Some(mut t) = temp_like(base) else {
            return false;
        };
        if !super::fill(&mut t, area, 0.5) {
            return false;
        }
        temps.push(t);
    }
    let [mut last_usm, mut usm, mut peak_front, mut peak_back, mut front, mut back, mut scratch]: [ImageLayer; 7] =
        match temps.try_into() {
            Ok(t) => t,
            Err(_) => return false,
        };

    for (k, cascade) in cascades.iter().enumerate() {
        trace!(cascade = k, strength = cascade.strength, "sharpen cascade");
        let ok = grain_extract(&mut usm, cascade.blurred, base, area)
            && max(&mut peak_back, &usm, &peak_front, area)
            && grain_extract(&mut scratch, &usm, &last_usm, area)
            && grain_multiply(&mut last_usm, &scratch, area, cascade.strength / 100.0)
            && grain_merge(&mut back, &front, &last_usm, area);
        if !ok {
            return false;
        }
        std::mem::swap(&mut front, &mut back);
        std::mem::swap(&mut peak_front, &mut peak_back);
        std::mem::swap(&mut last_usm, &mut usm);
    }

    // peak -> blend weight, front -> accumulated detail
    multiply_scalar(&mut peak_back, &peak_front, area, threshold_factor(threshold))
        && grain_extract(&mut scratch, base, &front, area)
        && multiply(&mut back, &scratch, &peak_back, area)
        && negate(&mut usm, &peak_back, area)
        && multiply(&mut scratch, base, &usm, area)
        && add(dst, &back, &scratch, area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gaussian_kernel_shape() {
        assert_eq!(gaussian_kernel(0.0), vec![1.0]);
        let k = gaussian_kernel(1.5);
        assert_eq!(k.len(), 4 * 2 + 1);
        assert_abs_diff_eq!(k.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(k[0], k[k.len() - 1], epsilon = 1e-7);
        assert!(k[4] > k[3]);
    }

    #[test]
    fn test_cascade_pixel_flat_is_identity() {
        let v = cascade_pixel(0.4, &[0.4; 4], &[100.0; 4], 0.0);
        assert_abs_diff_eq!(v, 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_cascade_pixel_sharpens_away_from_blur() {
        // a pixel brighter than its surroundings gets brighter
        let v = cascade_pixel(0.6, &[0.5, 0.5, 0.5, 0.5], &[100.0, 0.0, 0.0, 0.0], 0.0);
        assert!(v > 0.6);
    }
}
