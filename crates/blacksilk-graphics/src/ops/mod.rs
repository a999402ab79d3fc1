//! Image operations and backend dispatch.
//!
//! Every public operation follows the same policy:
//!
//! 1. Validate preconditions (non-empty layers, area inside the layers).
//! 2. For each backend on which the destination and all sources hold valid
//!    data, run that backend's kernel from its [`KernelTable`].
//! 3. When a backend has the data but no kernel for the operation, run the
//!    generic composition built from simpler operations.
//! 4. At least one execution must happen, otherwise the call fails.
//!
//! ```text
//! op fn (validate) ──► dispatch ──► KernelTable[OpKind] ──► cpu / gpu kernel
//!                          │
//!                          └── Unsupported ──► generic composition
//! ```
//!
//! Kernels compute in normalized `f32`; stores clamp to [0,1].

pub mod basic;
pub mod complex;
pub mod samplers;

mod cpu;
#[cfg(feature = "wgpu")]
mod gpu;

use std::collections::HashMap;

use blacksilk_core::Rect32I;

#[allow(unused_imports)]
use tracing::{debug, error, trace};

use crate::backend::{BackendId, ImageObject};
use crate::layer::ImageLayer;

pub use basic::*;
pub use complex::*;
pub use samplers::*;

pub(crate) use cpu::cpu_kernels;
#[cfg(feature = "wgpu")]
pub(crate) use gpu::gpu_kernels;

// ============================================================================
// Operation descriptors
// ============================================================================

/// Two-input per-sample operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BinaryOp {
    /// a + b
    Add = 0,
    /// a - b
    Subtract = 1,
    /// a * b
    Multiply = 2,
    /// a / b, b == 0 yields 1
    Divide = 3,
    /// min(a, b)
    Min = 4,
    /// max(a, b)
    Max = 5,
    /// a - b + 0.5
    GrainExtract = 6,
    /// a + b - 0.5
    GrainMerge = 7,
    /// a * (a + 2b(1 - a))
    Overlay = 8,
    /// 1 - (1 - a)(1 - b)
    Screen = 9,
    /// |a - b|
    Difference = 10,
}

impl BinaryOp {
    /// Applies the operation to one sample pair.
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => {
                if b == 0.0 {
                    1.0
                } else {
                    a / b
                }
            }
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::GrainExtract => a - b + 0.5,
            Self::GrainMerge => a + b - 0.5,
            Self::Overlay => overlay(a, b),
            Self::Screen => 1.0 - (1.0 - a) * (1.0 - b),
            Self::Difference => (a - b).abs(),
        }
    }
}

/// Sample-with-constant operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ScalarOp {
    /// a + v
    Add = 0,
    /// a - v
    Subtract = 1,
    /// a * v
    Multiply = 2,
    /// a / v, v == 0 yields 1
    Divide = 3,
    /// min(a, v)
    Min = 4,
    /// max(a, v)
    Max = 5,
    /// (a - 0.5) * v + 0.5
    GrainMultiply = 6,
}

impl ScalarOp {
    /// Applies the operation to one sample.
    #[inline]
    pub fn apply(self, a: f32, v: f32) -> f32 {
        match self {
            Self::Add => a + v,
            Self::Subtract => a - v,
            Self::Multiply => a * v,
            Self::Divide => {
                if v == 0.0 {
                    1.0
                } else {
                    a / v
                }
            }
            Self::Min => a.min(v),
            Self::Max => a.max(v),
            Self::GrainMultiply => (a - 0.5) * v + 0.5,
        }
    }
}

/// Blur direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlurDirection {
    /// Along x.
    Horizontal,
    /// Along y.
    Vertical,
}

/// Overlay blend of `i` with `m`.
#[inline]
pub fn overlay(i: f32, m: f32) -> f32 {
    i * (i + 2.0 * m * (1.0 - i))
}

/// One kernel invocation with its parameters.
///
/// The area passed alongside is in destination coordinates. Sources are
/// listed per variant.
#[derive(Debug, Clone, Copy)]
pub enum Op<'a> {
    /// Copy from `[src]`; area is the source rectangle.
    Blit {
        /// Destination x.
        dest_x: i32,
        /// Destination y.
        dest_y: i32,
    },
    /// Set every channel; no sources.
    Fill([f32; 4]),
    /// Set one channel; no sources.
    FillChannel {
        /// Channel index.
        channel: usize,
        /// Normalized value.
        value: f32,
    },
    /// `[a, b]`.
    Binary(BinaryOp),
    /// `[src]`.
    Scalar(ScalarOp, f32),
    /// `[a, b]`: `a * (1 - alpha) + b * alpha`.
    AlphaBlend(f32),
    /// `[src]`: `1 - x`.
    Negate,
    /// `[src]`: lookup in a sampled curve.
    BrightnessCurve(&'a [f32]),
    /// `[src]`: `min(x * v, 1)`.
    BrightnessScale(f32),
    /// `[src]`: weighted channel sum into every color channel.
    Monochrome([f32; 3]),
    /// `[src]`: one gaussian pass, wrap-around edges.
    Blur {
        /// Blur radius in pixels.
        radius: f32,
        /// Pass direction.
        direction: BlurDirection,
    },
    /// `[src]`: radial darkening.
    Vignette {
        /// Center in percent of width/height.
        center: [f32; 2],
        /// Radius in percent of height.
        radius: f32,
        /// Strength in percent.
        strength: f32,
    },
    /// `[src]`: overlay-tint highlights and shadows.
    SplitTone {
        /// Highlight tint.
        highlights: [f32; 3],
        /// Shadow tint.
        shadows: [f32; 3],
        /// Highlight/shadow balance.
        balance: f32,
    },
    /// `[src]`: luminance-weighted mix of two channel mixes.
    AdaptiveBw {
        /// Added to the luminance weight.
        balance: f32,
        /// Mix for bright pixels.
        highlights: [f32; 3],
        /// Mix for dark pixels.
        shadows: [f32; 3],
    },
    /// `[src, grain]`.
    FilmGrain(&'a [f32]),
    /// `[base, blur0, blur1, blur2, blur3]`.
    CascadedSharpen4 {
        /// Strength per cascade in percent.
        strengths: [f32; 4],
        /// Threshold in percent.
        threshold: f32,
    },
    /// `[src]`: n x n weighted sum downsampling; area is the destination.
    WeightedSum {
        /// Matrix edge (2..=6).
        size: usize,
        /// Row-major weights, `size * size` entries.
        weights: &'a [f32],
    },
    /// `[src]`: separable filter resampling; area is the destination.
    Resample(ResampleFilter),
}

/// Capability-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    /// [`Op::Blit`]
    Blit,
    /// [`Op::Fill`]
    Fill,
    /// [`Op::FillChannel`]
    FillChannel,
    /// [`Op::Binary`]
    Binary,
    /// [`Op::Scalar`]
    Scalar,
    /// [`Op::AlphaBlend`]
    AlphaBlend,
    /// [`Op::Negate`]
    Negate,
    /// [`Op::BrightnessCurve`]
    BrightnessCurve,
    /// [`Op::BrightnessScale`]
    BrightnessScale,
    /// [`Op::Monochrome`]
    Monochrome,
    /// [`Op::Blur`]
    Blur,
    /// [`Op::Vignette`]
    Vignette,
    /// [`Op::SplitTone`]
    SplitTone,
    /// [`Op::AdaptiveBw`]
    AdaptiveBw,
    /// [`Op::FilmGrain`]
    FilmGrain,
    /// [`Op::CascadedSharpen4`]
    CascadedSharpen4,
    /// [`Op::WeightedSum`]
    WeightedSum,
    /// [`Op::Resample`]
    Resample,
}

impl Op<'_> {
    /// Table key for this operation.
    pub fn kind(&self) -> OpKind {
        match self {
            Op::Blit { .. } => OpKind::Blit,
            Op::Fill(_) => OpKind::Fill,
            Op::FillChannel { .. } => OpKind::FillChannel,
            Op::Binary(_) => OpKind::Binary,
            Op::Scalar(..) => OpKind::Scalar,
            Op::AlphaBlend(_) => OpKind::AlphaBlend,
            Op::Negate => OpKind::Negate,
            Op::BrightnessCurve(_) => OpKind::BrightnessCurve,
            Op::BrightnessScale(_) => OpKind::BrightnessScale,
            Op::Monochrome(_) => OpKind::Monochrome,
            Op::Blur { .. } => OpKind::Blur,
            Op::Vignette { .. } => OpKind::Vignette,
            Op::SplitTone { .. } => OpKind::SplitTone,
            Op::AdaptiveBw { .. } => OpKind::AdaptiveBw,
            Op::FilmGrain(_) => OpKind::FilmGrain,
            Op::CascadedSharpen4 { .. } => OpKind::CascadedSharpen4,
            Op::WeightedSum { .. } => OpKind::WeightedSum,
            Op::Resample(_) => OpKind::Resample,
        }
    }
}

// ============================================================================
// Capability table
// ============================================================================

/// Backend kernel: `(op, destination, sources, area) -> rendered`.
pub type KernelFn = fn(&Op<'_>, &mut dyn ImageObject, &[&dyn ImageObject], Rect32I) -> bool;

/// Per-backend map from operation kind to kernel.
#[derive(Clone, Default)]
pub struct KernelTable {
    kernels: HashMap<OpKind, KernelFn>,
}

impl KernelTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a kernel.
    pub fn register(&mut self, kind: OpKind, kernel: KernelFn) {
        self.kernels.insert(kind, kernel);
    }

    /// Kernel for `kind`.
    pub fn get(&self, kind: OpKind) -> Option<KernelFn> {
        self.kernels.get(&kind).copied()
    }

    /// True if a kernel exists for `kind`.
    pub fn supports(&self, kind: OpKind) -> bool {
        self.kernels.contains_key(&kind)
    }

    /// Number of registered kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// True if no kernel is registered.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

impl std::fmt::Debug for KernelTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.kernels.keys().collect();
        kinds.sort();
        f.debug_struct("KernelTable").field("kinds", &kinds).finish()
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Outcome of [`dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// At least one backend rendered.
    Rendered,
    /// Data was present but no backend had a kernel.
    Unsupported,
    /// No backend could run the operation.
    Failed,
}

/// Runs `op` on every backend holding valid data for `dst` and all
/// `sources`. Backends that rendered become the only valid
/// representations of `dst`.
pub fn dispatch(op: &Op<'_>, dst: &mut ImageLayer, sources: &[&ImageLayer], area: Rect32I) -> Dispatch {
    let kind = op.kind();
    let mut executed: Vec<BackendId> = Vec::new();
    let mut unsupported = false;

    for rep in dst.representations_mut().iter_mut().filter(|r| r.is_valid()) {
        let backend = rep.device().backend_id();
        let objects: Option<Vec<&dyn ImageObject>> = sources
            .iter()
            .map(|s| s.internal_image_for_backend(backend))
            .collect();
        let Some(objects) = objects else {
            continue;
        };
        let Some(kernel) = rep.device().kernels().get(kind) else {
            unsupported = true;
            continue;
        };

        let (device, object) = rep.split_mut();
        let rendered = device.execute(&mut || kernel(op, &mut *object, &objects, area));
        if rendered {
            trace!(?kind, %backend, "kernel executed");
            executed.push(backend);
        } else {
            error!(?kind, %backend, "kernel failed");
        }
    }

    if !executed.is_empty() {
        dst.mark_written(&executed);
        Dispatch::Rendered
    } else if unsupported {
        debug!(?kind, "no backend kernel, using generic composition");
        Dispatch::Unsupported
    } else {
        error!(?kind, layer = dst.name(), "operation rendered on no backend");
        Dispatch::Failed
    }
}

// ============================================================================
// Precondition helpers
// ============================================================================

/// Checks `area` against the destination and same-sized sources.
pub(crate) fn check_area(dst: &ImageLayer, sources: &[&ImageLayer], area: Rect32I) -> bool {
    let ok = !area.is_empty()
        && !dst.is_empty()
        && area.fits_within(dst.width(), dst.height())
        && sources
            .iter()
            .all(|s| !s.is_empty() && s.format() == dst.format() && area.fits_within(s.width(), s.height()));
    if !ok {
        error!(?area, layer = dst.name(), "operation precondition violated");
    }
    ok
}

/// Dispatches and maps the outcome to a bool, running `fallback` when no
/// backend kernel exists.
pub(crate) fn run_with_fallback(
    op: &Op<'_>,
    dst: &mut ImageLayer,
    sources: &[&ImageLayer],
    area: Rect32I,
    fallback: impl FnOnce(&mut ImageLayer) -> bool,
) -> bool {
    match dispatch(op, dst, sources, area) {
        Dispatch::Rendered => true,
        Dispatch::Unsupported => fallback(dst),
        Dispatch::Failed => false,
    }
}

/// Dispatches without a fallback.
pub(crate) fn run(op: &Op<'_>, dst: &mut ImageLayer, sources: &[&ImageLayer], area: Rect32I) -> bool {
    match dispatch(op, dst, sources, area) {
        Dispatch::Rendered => true,
        Dispatch::Unsupported => {
            error!(kind = ?op.kind(), "no kernel and no generic composition");
            false
        }
        Dispatch::Failed => false,
    }
}

/// Scratch layer shaped like `like`, on the same backends.
pub(crate) fn temp_like(like: &ImageLayer) -> Option<ImageLayer> {
    like.new_like().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_ops() {
        assert_eq!(BinaryOp::GrainExtract.apply(0.7, 0.2), 0.7 - 0.2 + 0.5);
        assert_eq!(BinaryOp::Divide.apply(0.5, 0.0), 1.0);
        assert_eq!(BinaryOp::Overlay.apply(0.5, 0.5), 0.5);
        assert_eq!(ScalarOp::GrainMultiply.apply(0.5, 3.0), 0.5);
    }

    #[test]
    fn test_cpu_table_covers_core_ops() {
        let table = cpu_kernels();
        for kind in [OpKind::Blit, OpKind::Monochrome, OpKind::CascadedSharpen4, OpKind::Resample] {
            assert!(table.supports(kind), "{kind:?}");
        }
    }
}
