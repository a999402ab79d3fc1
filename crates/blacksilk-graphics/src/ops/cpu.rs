//! CPU kernels.

use blacksilk_core::Rect32I;

use super::complex::{cascade_pixel, gaussian_kernel};
use super::samplers::{resample_f32, weighted_sum_f32};
use super::{BinaryOp, BlurDirection, KernelTable, Op, OpKind, overlay};
use crate::backend::cpu::{CpuImageObject, decode_samples, execute_rows, execute_tile_based};
use crate::backend::ImageObject;

/// Kernel table of the CPU backend.
pub(crate) fn cpu_kernels() -> KernelTable {
    let mut table = KernelTable::new();
    table.register(OpKind::Blit, blit);
    table.register(OpKind::Fill, fill);
    table.register(OpKind::FillChannel, fill_channel);
    table.register(OpKind::Binary, binary);
    table.register(OpKind::Scalar, scalar);
    table.register(OpKind::AlphaBlend, alpha_blend);
    table.register(OpKind::Negate, negate);
    table.register(OpKind::BrightnessCurve, brightness_curve);
    table.register(OpKind::BrightnessScale, brightness_scale);
    table.register(OpKind::Monochrome, monochrome);
    table.register(OpKind::Blur, blur);
    table.register(OpKind::Vignette, vignette);
    table.register(OpKind::SplitTone, splittone);
    table.register(OpKind::AdaptiveBw, adaptive_bw);
    table.register(OpKind::FilmGrain, filmgrain);
    table.register(OpKind::CascadedSharpen4, cascaded_sharpen4);
    table.register(OpKind::WeightedSum, weighted_sum);
    table.register(OpKind::Resample, resample);
    table
}

// ============================================================================
// Helpers
// ============================================================================

fn as_cpu(dst: &mut dyn ImageObject) -> Option<&mut CpuImageObject> {
    dst.as_any_mut().downcast_mut::<CpuImageObject>()
}

fn sources_cpu<'a>(sources: &[&'a dyn ImageObject], count: usize) -> Option<Vec<&'a CpuImageObject>> {
    if sources.len() != count {
        return None;
    }
    sources
        .iter()
        .map(|s| s.as_any().downcast_ref::<CpuImageObject>())
        .collect()
}

#[inline]
fn load(src: &CpuImageObject, x: i32, y: i32, len: usize) -> Vec<f32> {
    let mut row = vec![0.0; len];
    src.load_row(x, y, &mut row);
    row
}

/// Curve lookup: nearest entry for a normalized sample.
#[inline]
pub(crate) fn curve_lookup(curve: &[f32], v: f32) -> f32 {
    let last = curve.len().saturating_sub(1);
    let idx = (v.clamp(0.0, 1.0) * last as f32).round() as usize;
    curve.get(idx.min(last)).copied().unwrap_or(v)
}

/// Per-sample map over one source.
fn map1(dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I, tiled: bool, f: impl Fn(f32) -> f32 + Sync + Send) -> bool {
    let (Some(dst), Some(src)) = (as_cpu(dst), sources_cpu(sources, 1)) else {
        return false;
    };
    let src = src[0];
    let kernel = |x: i32, y: i32, row: &mut [f32]| {
        let a = load(src, x, y, row.len());
        for (o, v) in row.iter_mut().zip(a) {
            *o = f(v);
        }
    };
    if tiled {
        execute_tile_based(dst, area, kernel);
    } else {
        execute_rows(dst, area, kernel);
    }
    true
}

/// Per-sample map over two sources.
fn map2(dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I, f: impl Fn(f32, f32) -> f32 + Sync + Send) -> bool {
    let (Some(dst), Some(src)) = (as_cpu(dst), sources_cpu(sources, 2)) else {
        return false;
    };
    let (a, b) = (src[0], src[1]);
    execute_rows(dst, area, |x, y, row| {
        let ra = load(a, x, y, row.len());
        let rb = load(b, x, y, row.len());
        for ((o, va), vb) in row.iter_mut().zip(ra).zip(rb) {
            *o = f(va, vb);
        }
    });
    true
}

// ============================================================================
// Basic
// ============================================================================

fn blit(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::Blit { dest_x, dest_y } = *op else {
        return false;
    };
    let [src] = sources else {
        return false;
    };
    dst.copy_from(*src, area, dest_x, dest_y)
}

fn fill(op: &Op<'_>, dst: &mut dyn ImageObject, _sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let (Op::Fill(value), Some(dst)) = (*op, as_cpu(dst)) else {
        return false;
    };
    let channels = dst.channels();
    execute_rows(dst, area, |_, _, row| {
        for px in row.chunks_exact_mut(channels) {
            px.copy_from_slice(&value[..channels]);
        }
    });
    true
}

fn fill_channel(op: &Op<'_>, dst: &mut dyn ImageObject, _sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let (Op::FillChannel { channel, value }, Some(dst)) = (*op, as_cpu(dst)) else {
        return false;
    };
    let channels = dst.channels();
    if channel >= channels {
        return false;
    }
    execute_rows(dst, area, |_, _, row| {
        for px in row.chunks_exact_mut(channels) {
            px[channel] = value;
        }
    });
    true
}

fn binary(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::Binary(kind) = *op else {
        return false;
    };
    map2(dst, sources, area, move |a, b| kind.apply(a, b))
}

fn scalar(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::Scalar(kind, value) = *op else {
        return false;
    };
    map1(dst, sources, area, false, move |a| kind.apply(a, value))
}

fn alpha_blend(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::AlphaBlend(alpha) = *op else {
        return false;
    };
    map2(dst, sources, area, move |a, b| a * (1.0 - alpha) + b * alpha)
}

fn negate(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    matches!(op, Op::Negate) && map1(dst, sources, area, false, |a| 1.0 - a)
}

fn brightness_curve(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::BrightnessCurve(curve) = *op else {
        return false;
    };
    !curve.is_empty() && map1(dst, sources, area, true, |a| curve_lookup(curve, a))
}

fn brightness_scale(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::BrightnessScale(value) = *op else {
        return false;
    };
    map1(dst, sources, area, true, move |a| (a * value).min(1.0))
}

fn monochrome(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::Monochrome(f) = *op else {
        return false;
    };
    let (Some(dst), Some(src)) = (as_cpu(dst), sources_cpu(sources, 1)) else {
        return false;
    };
    let src = src[0];
    let channels = dst.channels();
    if channels < 3 {
        return false;
    }
    execute_tile_based(dst, area, |x, y, row| {
        let input = load(src, x, y, row.len());
        for (out, px) in row.chunks_exact_mut(channels).zip(input.chunks_exact(channels)) {
            let mono = px[0] * f[0] + px[1] * f[1] + px[2] * f[2];
            out[..3].fill(mono);
            if channels == 4 {
                out[3] = px[3];
            }
        }
    });
    true
}

// ============================================================================
// Complex
// ============================================================================

fn blur(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::Blur { radius, direction } = *op else {
        return false;
    };
    let (Some(dst), Some(src)) = (as_cpu(dst), sources_cpu(sources, 1)) else {
        return false;
    };
    let src = src[0];
    let weights = gaussian_kernel(radius);
    let half = (weights.len() / 2) as i32;
    let channels = src.channels();
    let (sw, sh) = (src.width() as i32, src.height() as i32);

    match direction {
        BlurDirection::Horizontal => execute_rows(dst, area, |x0, y, row| {
            let full = load(src, 0, y, sw as usize * channels);
            row.fill(0.0);
            for (i, out) in row.chunks_exact_mut(channels).enumerate() {
                let x = x0 + i as i32;
                for (k, w) in weights.iter().enumerate() {
                    let sx = (x + k as i32 - half).rem_euclid(sw) as usize;
                    for c in 0..channels {
                        out[c] += full[sx * channels + c] * w;
                    }
                }
            }
        }),
        BlurDirection::Vertical => execute_rows(dst, area, |x0, y, row| {
            row.fill(0.0);
            let mut tap = vec![0.0; row.len()];
            for (k, w) in weights.iter().enumerate() {
                let sy = (y + k as i32 - half).rem_euclid(sh);
                src.load_row(x0, sy, &mut tap);
                for (o, v) in row.iter_mut().zip(&tap) {
                    *o += v * w;
                }
            }
        }),
    }
    true
}

fn vignette(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::Vignette { center, radius, strength } = *op else {
        return false;
    };
    let (Some(dst), Some(src)) = (as_cpu(dst), sources_cpu(sources, 1)) else {
        return false;
    };
    let src = src[0];
    let channels = dst.channels();
    let (w, h) = (dst.width() as f32, dst.height() as f32);
    let (cx, cy) = (w * 0.01 * center[0], h * 0.01 * center[1]);
    let max_dist = radius * 0.01 * h;

    execute_rows(dst, area, |x0, y, row| {
        let input = load(src, x0, y, row.len());
        for (i, (out, px)) in row.chunks_exact_mut(channels).zip(input.chunks_exact(channels)).enumerate() {
            let (dx, dy) = ((x0 + i as i32) as f32 - cx, y as f32 - cy);
            let dist = (dx * dx + dy * dy).sqrt();
            let v = if max_dist > 0.0 { strength * 0.01 * dist / max_dist } else { 0.0 };
            for (o, c) in out.iter_mut().zip(px) {
                *o = ((1.0 - v) * c + v * c * c).clamp(0.0, 1.0);
            }
        }
    });
    true
}

fn splittone(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::SplitTone { highlights, shadows, balance } = *op else {
        return false;
    };
    let (Some(dst), Some(src)) = (as_cpu(dst), sources_cpu(sources, 1)) else {
        return false;
    };
    let src = src[0];
    let channels = dst.channels();
    if channels < 3 {
        return false;
    }
    execute_rows(dst, area, |x, y, row| {
        let input = load(src, x, y, row.len());
        for (out, px) in row.chunks_exact_mut(channels).zip(input.chunks_exact(channels)) {
            let intensity = px[0];
            let hi = intensity * balance;
            let rest = 1.0 - hi;
            let sh = rest * rest;
            let orig = 1.0 - hi - sh;
            for c in 0..3 {
                let v = overlay(px[c], highlights[c]) * hi + overlay(px[c], shadows[c]) * sh + intensity * orig;
                out[c] = v.clamp(0.0, 1.0);
            }
            if channels == 4 {
                out[3] = px[3];
            }
        }
    });
    true
}

fn adaptive_bw(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::AdaptiveBw { balance, highlights, shadows } = *op else {
        return false;
    };
    let (Some(dst), Some(src)) = (as_cpu(dst), sources_cpu(sources, 1)) else {
        return false;
    };
    let src = src[0];
    let channels = dst.channels();
    if channels < 3 {
        return false;
    }
    execute_rows(dst, area, |x, y, row| {
        let input = load(src, x, y, row.len());
        for (out, px) in row.chunks_exact_mut(channels).zip(input.chunks_exact(channels)) {
            let luma = (balance + 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2]).clamp(0.0, 1.0);
            let dot = |w: [f32; 3]| (px[0] * w[0] + px[1] * w[1] + px[2] * w[2]).clamp(0.0, 1.0);
            let combined = dot(shadows) * (1.0 - luma) + dot(highlights) * luma;
            out[..3].fill(combined.clamp(0.0, 1.0));
            if channels == 4 {
                out[3] = px[3];
            }
        }
    });
    true
}

fn filmgrain(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::FilmGrain(curve) = *op else {
        return false;
    };
    if curve.is_empty() {
        return false;
    }
    map2(dst, sources, area, move |c, g| {
        let w = curve_lookup(curve, c);
        c * (1.0 - w) + overlay(c, g) * w
    })
}

fn cascaded_sharpen4(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::CascadedSharpen4 { strengths, threshold } = *op else {
        return false;
    };
    let (Some(dst), Some(src)) = (as_cpu(dst), sources_cpu(sources, 5)) else {
        return false;
    };
    execute_rows(dst, area, |x, y, row| {
        let base = load(src[0], x, y, row.len());
        let blurs: Vec<Vec<f32>> = src[1..].iter().map(|b| load(b, x, y, row.len())).collect();
        for (i, out) in row.iter_mut().enumerate() {
            let blurred = [blurs[0][i], blurs[1][i], blurs[2][i], blurs[3][i]];
            *out = cascade_pixel(base[i], &blurred, &strengths, threshold);
        }
    });
    true
}

// ============================================================================
// Samplers
// ============================================================================

fn load_all(src: &CpuImageObject) -> Vec<f32> {
    let mut out = vec![0.0; src.data().len() / src.format().bytes_per_channel()];
    decode_samples(src.format(), src.data(), &mut out);
    out
}

fn write_resampled(dst: &mut CpuImageObject, area: Rect32I, pixels: &[f32]) {
    let channels = dst.channels();
    let width = dst.width() as usize;
    execute_rows(dst, area, |x, y, row| {
        let start = (y as usize * width + x as usize) * channels;
        row.copy_from_slice(&pixels[start..start + row.len()]);
    });
}

fn weighted_sum(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::WeightedSum { size, weights } = *op else {
        return false;
    };
    let (Some(dst), Some(src)) = (as_cpu(dst), sources_cpu(sources, 1)) else {
        return false;
    };
    let src = src[0];
    let pixels = weighted_sum_f32(
        &load_all(src),
        (src.width(), src.height()),
        src.channels(),
        (dst.width(), dst.height()),
        size,
        weights,
    );
    write_resampled(dst, area, &pixels);
    true
}

fn resample(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::Resample(filter) = *op else {
        return false;
    };
    let (Some(dst), Some(src)) = (as_cpu(dst), sources_cpu(sources, 1)) else {
        return false;
    };
    let src = src[0];
    let pixels = resample_f32(
        &load_all(src),
        (src.width(), src.height()),
        src.channels(),
        (dst.width(), dst.height()),
        filter,
    );
    write_resampled(dst, area, &pixels);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use blacksilk_core::PixelFormat;

    #[test]
    fn test_curve_lookup() {
        let curve = [0.0, 0.5, 1.0];
        assert_eq!(curve_lookup(&curve, 0.0), 0.0);
        assert_eq!(curve_lookup(&curve, 0.4), 0.5);
        assert_eq!(curve_lookup(&curve, 2.0), 1.0);
    }

    #[test]
    fn test_binary_kernel_direct() {
        let a = CpuImageObject::new(1, PixelFormat::Mono8, 2, 1).unwrap();
        let mut b = CpuImageObject::new(1, PixelFormat::Mono8, 2, 1).unwrap();
        b.data_mut().copy_from_slice(&[100, 200]);
        let mut out = CpuImageObject::new(1, PixelFormat::Mono8, 2, 1).unwrap();
        let op = Op::Binary(BinaryOp::Add);
        assert!(binary(&op, &mut out, &[&a, &b], Rect32I::from_size(2, 1)));
        assert_eq!(out.data(), &[100, 200]);
        // wrong arity is rejected
        assert!(!binary(&op, &mut out, &[&a], Rect32I::from_size(2, 1)));
    }
}
