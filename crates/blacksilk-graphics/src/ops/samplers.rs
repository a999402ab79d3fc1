//! Downsampling.
//!
//! Two families:
//!
//! - [`sample_weighted_sum`] / [`area_sample`]: each destination pixel is an
//!   `n x n` weighted sum of source pixels picked on a stretched grid.
//! - Separable filters ([`ResampleFilter`]): two-pass horizontal then
//!   vertical convolution with a fixed kernel widened by the scale factor.
//!
//! Output size is `floor(w * factor) x floor(h * factor)` with
//! `factor` in `(0.001, 1)`.
//!
//! # Example
//!
//! ```rust
//! use blacksilk_graphics::ops::{ResampleFilter, resample_f32};
//!
//! let src = vec![0.5f32; 16 * 16 * 3];
//! let dst = resample_f32(&src, (16, 16), 3, (8, 8), ResampleFilter::Lanczos3);
//! assert_eq!(dst.len(), 8 * 8 * 3);
//! ```

#[allow(unused_imports)]
use tracing::{debug, error, trace};

use super::{Op, check_area, run_with_fallback};
use crate::layer::ImageLayer;

/// Smallest weighted-sum matrix edge.
pub const MIN_SAMPLER_SIZE: usize = 2;
/// Largest weighted-sum matrix edge.
pub const MAX_SAMPLER_SIZE: usize = 6;

// ============================================================================
// Filters
// ============================================================================

/// Separable resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResampleFilter {
    /// Keys cubic convolution, a = -0.5.
    #[default]
    Bicubic,
    /// Lanczos windowed sinc, order 3.
    Lanczos3,
    /// Mitchell-Netravali, B = C = 1/3.
    Mitchell,
    /// Cubic B-spline (B = 1, C = 0), smoothest.
    BSpline,
    /// Catmull-Rom spline (B = 0, C = 0.5).
    CatmullRom,
}

impl ResampleFilter {
    /// Every filter.
    pub const ALL: [ResampleFilter; 5] = [
        Self::Bicubic,
        Self::Lanczos3,
        Self::Mitchell,
        Self::BSpline,
        Self::CatmullRom,
    ];

    /// Kernel radius at scale 1.
    #[inline]
    pub fn support(&self) -> f32 {
        match self {
            Self::Lanczos3 => 3.0,
            _ => 2.0,
        }
    }

    /// Kernel value at distance `x`.
    #[inline]
    pub fn weight(&self, x: f32) -> f32 {
        match self {
            Self::Bicubic => keys_weight(x, -0.5),
            Self::Lanczos3 => lanczos_weight(x, 3.0),
            Self::Mitchell => bc_spline_weight(x, 1.0 / 3.0, 1.0 / 3.0),
            Self::BSpline => bc_spline_weight(x, 1.0, 0.0),
            Self::CatmullRom => bc_spline_weight(x, 0.0, 0.5),
        }
    }

    /// Lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bicubic => "bicubic",
            Self::Lanczos3 => "lanczos",
            Self::Mitchell => "mitchell",
            Self::BSpline => "bspline",
            Self::CatmullRom => "catmull-rom",
        }
    }
}

impl std::str::FromStr for ResampleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bicubic" | "cubic" => Ok(Self::Bicubic),
            "lanczos" | "lanczos3" => Ok(Self::Lanczos3),
            "mitchell" => Ok(Self::Mitchell),
            "bspline" | "b-spline" => Ok(Self::BSpline),
            "catmull-rom" | "catmullrom" => Ok(Self::CatmullRom),
            other => Err(format!("unknown filter '{other}'")),
        }
    }
}

#[inline]
fn keys_weight(x: f32, a: f32) -> f32 {
    let ax = x.abs();
    if ax < 1.0 {
        (a + 2.0) * ax * ax * ax - (a + 3.0) * ax * ax + 1.0
    } else if ax < 2.0 {
        a * ax * ax * ax - 5.0 * a * ax * ax + 8.0 * a * ax - 4.0 * a
    } else {
        0.0
    }
}

#[inline]
fn bc_spline_weight(x: f32, b: f32, c: f32) -> f32 {
    let ax = x.abs();
    if ax < 1.0 {
        ((12.0 - 9.0 * b - 6.0 * c) * ax * ax * ax + (-18.0 + 12.0 * b + 6.0 * c) * ax * ax + (6.0 - 2.0 * b))
            / 6.0
    } else if ax < 2.0 {
        ((-b - 6.0 * c) * ax * ax * ax
            + (6.0 * b + 30.0 * c) * ax * ax
            + (-12.0 * b - 48.0 * c) * ax
            + (8.0 * b + 24.0 * c))
            / 6.0
    } else {
        0.0
    }
}

#[inline]
fn lanczos_weight(x: f32, a: f32) -> f32 {
    let ax = x.abs();
    if ax < 1e-8 {
        1.0
    } else if ax < a {
        let pi_x = std::f32::consts::PI * ax;
        let pi_x_a = pi_x / a;
        (pi_x.sin() / pi_x) * (pi_x_a.sin() / pi_x_a)
    } else {
        0.0
    }
}

// ============================================================================
// Host implementations
// ============================================================================

/// Output size for `factor`; `None` when the factor is out of range or the
/// result would be empty.
pub fn scaled_size(width: u32, height: u32, factor: f32) -> Option<(u32, u32)> {
    if !(factor > 0.001 && factor < 1.0) {
        return None;
    }
    let w = (width as f32 * factor).floor() as u32;
    let h = (height as f32 * factor).floor() as u32;
    (w > 0 && h > 0).then_some((w, h))
}

/// Separable resampling of interleaved normalized samples.
pub fn resample_f32(
    src: &[f32],
    (src_w, src_h): (u32, u32),
    channels: usize,
    (dst_w, dst_h): (u32, u32),
    filter: ResampleFilter,
) -> Vec<f32> {
    let (src_w, src_h, dst_w, dst_h) = (src_w as usize, src_h as usize, dst_w as usize, dst_h as usize);
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 || src.len() != src_w * src_h * channels {
        return vec![0.0; dst_w * dst_h * channels];
    }
    let temp = resample_pass(src, src_w, src_h, channels, dst_w, filter, Axis::X);
    resample_pass(&temp, dst_w, src_h, channels, dst_h, filter, Axis::Y)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

/// One filter pass along `axis`, producing `dst_len` samples on that axis.
fn resample_pass(
    src: &[f32],
    src_w: usize,
    src_h: usize,
    channels: usize,
    dst_len: usize,
    filter: ResampleFilter,
    axis: Axis,
) -> Vec<f32> {
    let src_len = if axis == Axis::X { src_w } else { src_h };
    let (out_w, out_h) = if axis == Axis::X { (dst_len, src_h) } else { (src_w, dst_len) };
    let scale = src_len as f32 / dst_len as f32;
    let stretch = scale.max(1.0);
    let support = filter.support() * stretch;

    // weights per output position, shared by every row/column
    let taps: Vec<(usize, Vec<f32>)> = (0..dst_len)
        .map(|i| {
            let center = (i as f32 + 0.5) * scale - 0.5;
            let first = ((center - support).floor() as isize).max(0) as usize;
            let last = ((center + support).ceil() as isize).clamp(0, src_len as isize - 1) as usize;
            let mut weights: Vec<f32> = (first..=last)
                .map(|s| filter.weight((s as f32 - center) / stretch))
                .collect();
            let sum: f32 = weights.iter().sum();
            if sum != 0.0 {
                weights.iter_mut().for_each(|w| *w /= sum);
            }
            (first, weights)
        })
        .collect();

    let mut dst = vec![0.0f32; out_w * out_h * channels];
    for y in 0..out_h {
        for x in 0..out_w {
            let (pos, fixed) = if axis == Axis::X { (x, y) } else { (y, x) };
            let (first, weights) = &taps[pos];
            let out = &mut dst[(y * out_w + x) * channels..][..channels];
            for (k, w) in weights.iter().enumerate() {
                let s = first + k;
                let idx = if axis == Axis::X {
                    (fixed * src_w + s) * channels
                } else {
                    (s * src_w + fixed) * channels
                };
                for c in 0..channels {
                    out[c] += src[idx + c] * w;
                }
            }
        }
    }
    dst
}

/// `size x size` weighted-sum downsampling of interleaved normalized
/// samples.
///
/// Destination pixel (x, y) sums source pixels at
/// `floor((x + mx) * (src_w - 1) / dst_w)` (and likewise on y) for
/// `mx, my < size`, weighted by `weights[my * size + mx]`.
pub fn weighted_sum_f32(
    src: &[f32],
    (src_w, src_h): (u32, u32),
    channels: usize,
    (dst_w, dst_h): (u32, u32),
    size: usize,
    weights: &[f32],
) -> Vec<f32> {
    let (src_w, src_h, dst_w, dst_h) = (src_w as usize, src_h as usize, dst_w as usize, dst_h as usize);
    let mut dst = vec![0.0f32; dst_w * dst_h * channels];
    if src_w == 0 || src_h == 0 || weights.len() < size * size || src.len() != src_w * src_h * channels {
        return dst;
    }
    let ratio_x = (src_w - 1) as f32 / dst_w as f32;
    let ratio_y = (src_h - 1) as f32 / dst_h as f32;
    let pick = |i: usize, ratio: f32, len: usize| ((i as f32 * ratio).floor() as usize).min(len - 1);

    for y in 0..dst_h {
        for x in 0..dst_w {
            let out = &mut dst[(y * dst_w + x) * channels..][..channels];
            for my in 0..size {
                let sy = pick(y + my, ratio_y, src_h);
                for mx in 0..size {
                    let sx = pick(x + mx, ratio_x, src_w);
                    let w = weights[my * size + mx];
                    let idx = (sy * src_w + sx) * channels;
                    for c in 0..channels {
                        out[c] += src[idx + c] * w;
                    }
                }
            }
        }
    }
    dst
}

/// Uniform `size x size` weights.
pub fn area_weights(size: usize) -> Vec<f32> {
    let n = (size * size) as f32;
    vec![1.0 / n; size * size]
}

// ============================================================================
// Layer operations
// ============================================================================

fn sampled_layer(src: &ImageLayer, factor: f32) -> Option<ImageLayer> {
    let Some((w, h)) = scaled_size(src.width(), src.height(), factor) else {
        error!(factor, width = src.width(), height = src.height(), "invalid sampling factor");
        return None;
    };
    src.new_sized_like(w, h).ok()
}

/// Host path: read `src`, compute, write the whole of `dst`.
fn host_sample(dst: &mut ImageLayer, src: &ImageLayer, compute: impl FnOnce(&[f32]) -> Vec<f32>) -> bool {
    let Some(pixels) = src.retrieve_f32(src.rect()) else {
        return false;
    };
    let out = compute(&pixels);
    let rect = dst.rect();
    dst.upload_f32(&out, rect)
}

/// Downsamples `src` by `factor` with an `size x size` weight matrix.
pub fn sample_weighted_sum(src: &ImageLayer, factor: f32, size: usize, weights: &[f32]) -> Option<ImageLayer> {
    if !(MIN_SAMPLER_SIZE..=MAX_SAMPLER_SIZE).contains(&size) || weights.len() != size * size {
        error!(size, weights = weights.len(), "invalid weighted-sum matrix");
        return None;
    }
    let mut dst = sampled_layer(src, factor)?;
    let area = dst.rect();
    if !check_area(&dst, &[src], area) {
        return None;
    }
    trace!(size, factor, "weighted-sum sampling");
    let src_size = (src.width(), src.height());
    let dst_size = (dst.width(), dst.height());
    let channels = src.format().channel_count();
    let op = Op::WeightedSum { size, weights };
    let ok = run_with_fallback(&op, &mut dst, &[src], area, |dst| {
        debug!("weighted-sum host path");
        host_sample(dst, src, |px| weighted_sum_f32(px, src_size, channels, dst_size, size, weights))
    });
    ok.then_some(dst)
}

/// Box-filter downsampling: uniform `size x size` weights.
pub fn area_sample(src: &ImageLayer, factor: f32, size: usize) -> Option<ImageLayer> {
    sample_weighted_sum(src, factor, size, &area_weights(size))
}

/// Downsamples `src` by `factor` with a separable filter.
pub fn downsample(src: &ImageLayer, factor: f32, filter: ResampleFilter) -> Option<ImageLayer> {
    let mut dst = sampled_layer(src, factor)?;
    let area = dst.rect();
    if !check_area(&dst, &[src], area) {
        return None;
    }
    trace!(filter = filter.name(), factor, "resampling");
    let src_size = (src.width(), src.height());
    let dst_size = (dst.width(), dst.height());
    let channels = src.format().channel_count();
    let ok = run_with_fallback(&Op::Resample(filter), &mut dst, &[src], area, |dst| {
        debug!(filter = filter.name(), "resample host path");
        host_sample(dst, src, |px| resample_f32(px, src_size, channels, dst_size, filter))
    });
    ok.then_some(dst)
}

/// Keys bicubic downsampling.
pub fn sample_bicubic(src: &ImageLayer, factor: f32) -> Option<ImageLayer> {
    downsample(src, factor, ResampleFilter::Bicubic)
}

/// Lanczos-3 downsampling.
pub fn sample_lanczos(src: &ImageLayer, factor: f32) -> Option<ImageLayer> {
    downsample(src, factor, ResampleFilter::Lanczos3)
}

/// Mitchell-Netravali downsampling.
pub fn sample_mitchell(src: &ImageLayer, factor: f32) -> Option<ImageLayer> {
    downsample(src, factor, ResampleFilter::Mitchell)
}

/// B-spline downsampling.
pub fn sample_bspline(src: &ImageLayer, factor: f32) -> Option<ImageLayer> {
    downsample(src, factor, ResampleFilter::BSpline)
}

/// Catmull-Rom downsampling.
pub fn sample_catmull_rom(src: &ImageLayer, factor: f32) -> Option<ImageLayer> {
    downsample(src, factor, ResampleFilter::CatmullRom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_filter_weights() {
        for filter in ResampleFilter::ALL {
            assert_eq!(filter.weight(filter.support() + 0.1), 0.0, "{filter:?}");
        }
        assert_abs_diff_eq!(ResampleFilter::Bicubic.weight(0.0), 1.0);
        assert_abs_diff_eq!(ResampleFilter::CatmullRom.weight(0.0), 1.0);
        assert_abs_diff_eq!(ResampleFilter::Lanczos3.weight(0.0), 1.0);
        assert_abs_diff_eq!(ResampleFilter::BSpline.weight(0.0), 2.0 / 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ResampleFilter::Bicubic.weight(1.0), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_scaled_size() {
        assert_eq!(scaled_size(100, 50, 0.5), Some((50, 25)));
        assert_eq!(scaled_size(99, 99, 0.5), Some((49, 49)));
        assert_eq!(scaled_size(100, 100, 1.0), None);
        assert_eq!(scaled_size(100, 100, 0.001), None);
        assert_eq!(scaled_size(1, 1, 0.5), None);
    }

    #[test]
    fn test_resample_constant_stays_constant() {
        let src = vec![0.25f32; 20 * 10];
        for filter in ResampleFilter::ALL {
            let dst = resample_f32(&src, (20, 10), 1, (7, 3), filter);
            for v in dst {
                assert_abs_diff_eq!(v, 0.25, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_weighted_sum_uniform() {
        let src: Vec<f32> = (0..16).map(|i| if i % 2 == 0 { 0.0 } else { 1.0 }).collect();
        let dst = weighted_sum_f32(&src, (4, 4), 1, (2, 2), 2, &area_weights(2));
        assert_eq!(dst.len(), 4);
        for v in dst {
            assert!((0.0..=1.0).contains(&v));
        }
        let flat = weighted_sum_f32(&[0.5; 16], (4, 4), 1, (2, 2), 3, &area_weights(3));
        for v in flat {
            assert_abs_diff_eq!(v, 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!("Lanczos".parse::<ResampleFilter>().unwrap(), ResampleFilter::Lanczos3);
        assert!("box".parse::<ResampleFilter>().is_err());
    }
}
