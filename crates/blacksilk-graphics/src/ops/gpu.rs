//! GPU kernels.
//!
//! Each kernel packs its parameters into [`KernelParams`] and launches one of
//! the four compute pipelines. [`OpKind::AdaptiveBw`] and the samplers have
//! no kernel here and take the generic or host path.

use blacksilk_core::Rect32I;
use bytemuck::{Pod, Zeroable};

#[allow(unused_imports)]
use tracing::{error, trace};

use super::complex::gaussian_kernel;
use super::{BlurDirection, KernelTable, Op, OpKind};
use crate::backend::gpu::GpuImageObject;
use crate::backend::ImageObject;

/// Uniform block shared by every shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct KernelParams {
    /// x, y, width, height of the destination area.
    area: [i32; 4],
    /// width, height, channels, 0.
    dims: [u32; 4],
    /// op code, sub-op, extra, 0.
    code: [u32; 4],
    p: [[f32; 4]; 4],
}

impl KernelParams {
    fn new(dst: &GpuImageObject, area: Rect32I, code: u32) -> Self {
        Self {
            area: [area.x, area.y, area.width, area.height],
            dims: [dst.width(), dst.height(), dst.format().channel_count() as u32, 0],
            code: [code, 0, 0, 0],
            ..Default::default()
        }
    }

    fn sub(mut self, sub: u32) -> Self {
        self.code[1] = sub;
        self
    }

    fn param(mut self, index: usize, value: [f32; 4]) -> Self {
        self.p[index] = value;
        self
    }
}

#[derive(Clone, Copy)]
enum Stage {
    Fill,
    Unary,
    Binary,
    Sharpen,
}

// unary op codes
const SCALAR: u32 = 0;
const NEGATE: u32 = 1;
const CURVE: u32 = 2;
const SCALE: u32 = 3;
const MONOCHROME: u32 = 4;
const VIGNETTE: u32 = 5;
const SPLIT_TONE: u32 = 6;
const BLUR_H: u32 = 7;
const BLUR_V: u32 = 8;

// binary op codes
const BINARY: u32 = 0;
const ALPHA_BLEND: u32 = 1;
const FILM_GRAIN: u32 = 2;

/// Kernel table of the GPU backend.
pub(crate) fn gpu_kernels() -> KernelTable {
    let mut table = KernelTable::new();
    table.register(OpKind::Blit, blit);
    table.register(OpKind::Fill, fill);
    table.register(OpKind::FillChannel, fill);
    table.register(OpKind::Binary, binary);
    table.register(OpKind::AlphaBlend, binary);
    table.register(OpKind::FilmGrain, binary);
    table.register(OpKind::Scalar, unary);
    table.register(OpKind::Negate, unary);
    table.register(OpKind::BrightnessCurve, unary);
    table.register(OpKind::BrightnessScale, unary);
    table.register(OpKind::Monochrome, unary);
    table.register(OpKind::Blur, unary);
    table.register(OpKind::Vignette, unary);
    table.register(OpKind::SplitTone, unary);
    table.register(OpKind::CascadedSharpen4, cascaded_sharpen4);
    table
}

// ============================================================================
// Launch
// ============================================================================

fn as_gpu(dst: &mut dyn ImageObject) -> Option<&mut GpuImageObject> {
    dst.as_any_mut().downcast_mut::<GpuImageObject>()
}

fn sources_gpu<'a>(sources: &[&'a dyn ImageObject], count: usize) -> Option<Vec<&'a GpuImageObject>> {
    if sources.len() != count {
        return None;
    }
    sources
        .iter()
        .map(|s| s.as_any().downcast_ref::<GpuImageObject>())
        .collect()
}

/// Binds `dst`, `sources`, the params and an optional lookup table, then
/// runs one invocation per pixel of `area`.
fn launch(
    stage: Stage,
    dst: &GpuImageObject,
    sources: &[&GpuImageObject],
    params: &KernelParams,
    area: Rect32I,
    lut: Option<&[f32]>,
) -> bool {
    let ctx = dst.context();
    if sources.iter().any(|s| !std::sync::Arc::ptr_eq(s.context(), ctx)) {
        error!("gpu kernel sources live on another device");
        return false;
    }
    let Some(dst_buf) = dst.buffer() else {
        return false;
    };
    let Some(src_bufs) = sources.iter().map(|s| s.buffer()).collect::<Option<Vec<_>>>() else {
        return false;
    };

    let uniform = ctx.uniform(params);
    let table = lut.map(|l| ctx.storage("kernel_lut", l));
    let dummy = match (stage, &table) {
        (Stage::Unary | Stage::Binary, None) => Some(ctx.storage("kernel_lut", &[])),
        _ => None,
    };

    let mut buffers: Vec<&wgpu::Buffer> = vec![dst_buf];
    buffers.extend(src_bufs);
    buffers.push(&uniform);
    if let Some(t) = table.as_ref().or(dummy.as_ref()) {
        buffers.push(t);
    }

    let pipelines = ctx.pipelines();
    let pipeline = match stage {
        Stage::Fill => &pipelines.fill,
        Stage::Unary => &pipelines.unary,
        Stage::Binary => &pipelines.binary,
        Stage::Sharpen => &pipelines.sharpen,
    };
    trace!(?area, "gpu dispatch");
    ctx.dispatch(pipeline, &buffers, (area.width * area.height) as u32);
    true
}

// ============================================================================
// Kernels
// ============================================================================

fn blit(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let (Op::Blit { dest_x, dest_y }, [src]) = (*op, sources) else {
        return false;
    };
    as_gpu(dst).is_some_and(|dst| dst.copy_from(*src, area, dest_x, dest_y))
}

fn fill(op: &Op<'_>, dst: &mut dyn ImageObject, _sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Some(dst) = as_gpu(dst) else {
        return false;
    };
    let params = match *op {
        Op::Fill(color) => KernelParams::new(dst, area, 0).param(0, color),
        Op::FillChannel { channel, value } => KernelParams::new(dst, area, 1)
            .sub(channel as u32)
            .param(0, [value, 0.0, 0.0, 0.0]),
        _ => return false,
    };
    launch(Stage::Fill, dst, &[], &params, area, None)
}

fn unary(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let (Some(dst), Some(src)) = (as_gpu(dst), sources_gpu(sources, 1)) else {
        return false;
    };
    let base = |code| KernelParams::new(dst, area, code);
    let (params, lut): (KernelParams, Option<Vec<f32>>) = match *op {
        Op::Scalar(kind, value) => (base(SCALAR).sub(kind as u32).param(0, [value, 0.0, 0.0, 0.0]), None),
        Op::Negate => (base(NEGATE), None),
        Op::BrightnessCurve(curve) => (base(CURVE), Some(curve.to_vec())),
        Op::BrightnessScale(value) => (base(SCALE).param(0, [value, 0.0, 0.0, 0.0]), None),
        Op::Monochrome(f) => (base(MONOCHROME).param(0, [f[0], f[1], f[2], 0.0]), None),
        Op::Blur { radius, direction } => {
            let weights = gaussian_kernel(radius);
            let code = match direction {
                BlurDirection::Horizontal => BLUR_H,
                BlurDirection::Vertical => BLUR_V,
            };
            (base(code).sub((weights.len() / 2) as u32), Some(weights))
        }
        Op::Vignette { center, radius, strength } => {
            let (w, h) = (dst.width() as f32, dst.height() as f32);
            let p = [w * 0.01 * center[0], h * 0.01 * center[1], radius * 0.01 * h, strength * 0.01];
            (base(VIGNETTE).param(0, p), None)
        }
        Op::SplitTone { highlights, shadows, balance } => {
            let hi = [highlights[0], highlights[1], highlights[2], balance];
            let sh = [shadows[0], shadows[1], shadows[2], 0.0];
            (base(SPLIT_TONE).param(0, hi).param(1, sh), None)
        }
        _ => return false,
    };
    if matches!(*op, Op::Monochrome(_) | Op::SplitTone { .. }) && dst.format().channel_count() < 3 {
        return false;
    }
    launch(Stage::Unary, dst, &src, &params, area, lut.as_deref())
}

fn binary(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let (Some(dst), Some(src)) = (as_gpu(dst), sources_gpu(sources, 2)) else {
        return false;
    };
    let (params, lut) = match *op {
        Op::Binary(kind) => (KernelParams::new(dst, area, BINARY).sub(kind as u32), None),
        Op::AlphaBlend(alpha) => (
            KernelParams::new(dst, area, ALPHA_BLEND).param(0, [alpha, 0.0, 0.0, 0.0]),
            None,
        ),
        Op::FilmGrain(curve) if !curve.is_empty() => (KernelParams::new(dst, area, FILM_GRAIN), Some(curve)),
        _ => return false,
    };
    launch(Stage::Binary, dst, &src, &params, area, lut)
}

fn cascaded_sharpen4(op: &Op<'_>, dst: &mut dyn ImageObject, sources: &[&dyn ImageObject], area: Rect32I) -> bool {
    let Op::CascadedSharpen4 { strengths, threshold } = *op else {
        return false;
    };
    let (Some(dst), Some(src)) = (as_gpu(dst), sources_gpu(sources, 5)) else {
        return false;
    };
    let params = KernelParams::new(dst, area, 0)
        .param(0, strengths)
        .param(1, [threshold, 0.0, 0.0, 0.0]);
    launch(Stage::Sharpen, dst, &src, &params, area, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<KernelParams>(), 112);
    }

    #[test]
    fn test_gpu_table_leaves_adaptive_bw_generic() {
        let table = gpu_kernels();
        assert!(!table.supports(OpKind::AdaptiveBw));
        assert!(!table.supports(OpKind::Resample));
        assert!(table.supports(OpKind::CascadedSharpen4));
    }
}
