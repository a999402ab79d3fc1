//! Filter protocol.
//!
//! A [`Filter`] is a stateful wrapper around one operation. It is bound to a
//! device at construction, can be cloned through [`Filter::clone_box`] and
//! serializes its parameters only through presets.
//!
//! Filters are re-entrant: nothing prevents two threads from processing with
//! clones of the same filter.

use std::fmt;
use std::sync::Arc;

use blacksilk_core::Point32F;

#[allow(unused_imports)]
use tracing::{debug, error, trace};

use crate::backend::{AsAny, BackendDevice};
use crate::layer::ImageLayer;
use crate::preset::FilterPreset;

/// Name written into presets produced by [`Filter::to_preset`].
pub const CURRENT_PRESET_NAME: &str = "Current";

/// Stateful image filter.
pub trait Filter: Send + Sync + AsAny {
    /// Filter name; matches the `filter_name` of its presets.
    fn name(&self) -> &str;

    /// Bound device.
    fn device(&self) -> &Arc<dyn BackendDevice>;

    /// Rebinds the filter.
    fn set_device(&mut self, device: Arc<dyn BackendDevice>);

    /// Renders `src` into `dst` on the bound device.
    fn process(&mut self, dst: &mut ImageLayer, src: &ImageLayer) -> bool {
        let device = self.device().clone();
        self.process_with(&device, dst, src)
    }

    /// Renders `src` into `dst` on `device`.
    ///
    /// `dst` is reallocated on `device` when its shape differs from `src`
    /// or it holds no valid data there.
    fn process_with(&mut self, device: &Arc<dyn BackendDevice>, dst: &mut ImageLayer, src: &ImageLayer) -> bool;

    /// Deep copy of the parameters sharing the device binding.
    fn clone_box(&self) -> Box<dyn Filter>;

    /// Current parameters as a preset called `"Current"`.
    fn to_preset(&self) -> FilterPreset;

    /// Applies recognized keys of `preset`; true iff at least one was.
    fn from_preset(&mut self, preset: &FilterPreset) -> bool;
}

impl Clone for Box<dyn Filter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl fmt::Debug for dyn Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name())
            .field("backend", &self.device().backend_id())
            .finish()
    }
}

/// Runs `filter`, logging failures.
pub fn apply_filter(filter: &mut dyn Filter, dst: &mut ImageLayer, src: &ImageLayer) -> bool {
    let ok = filter.process(dst, src);
    if !ok {
        error!(filter = filter.name(), layer = src.name(), "filter failed");
    }
    ok
}

// ============================================================================
// Helpers shared by the filters
// ============================================================================

/// Makes `dst` a valid target for `src` on `device`.
pub(crate) fn prepare_target(device: &Arc<dyn BackendDevice>, dst: &mut ImageLayer, src: &ImageLayer) -> bool {
    let backend = device.backend_id();
    if !src.contains_data_for_backend(backend) {
        error!(layer = src.name(), %backend, "source holds no data for the filter backend");
        return false;
    }
    let compatible = dst.format() == src.format()
        && dst.width() == src.width()
        && dst.height() == src.height()
        && dst.contains_data_for_backend(backend);
    if compatible {
        return true;
    }
    trace!(layer = dst.name(), %backend, "reallocating filter target");
    dst.reset(device, src.format(), src.width(), src.height())
}

/// Empty preset for the filter `name`.
pub(crate) fn current_preset(name: &str) -> FilterPreset {
    FilterPreset::for_filter(CURRENT_PRESET_NAME, name)
}

/// Overwrites `value` with the float `key`; true if present.
pub(crate) fn read_float(preset: &FilterPreset, key: &str, value: &mut f32) -> bool {
    match preset.float(key) {
        Some(v) => {
            *value = v;
            true
        }
        None => false,
    }
}

/// Reads `<prefix>.R`, `.G` and `.B` into `rgb`; true if any was present.
pub(crate) fn read_rgb(preset: &FilterPreset, prefix: &str, rgb: &mut [f32; 3]) -> bool {
    let mut any = false;
    for (suffix, value) in ["R", "G", "B"].iter().zip(rgb.iter_mut()) {
        any |= read_float(preset, &format!("{prefix}.{suffix}"), value);
    }
    any
}

/// Stores `rgb` under `<prefix>.R`, `.G` and `.B`.
pub(crate) fn write_rgb(preset: &mut FilterPreset, prefix: &str, rgb: [f32; 3]) {
    for (suffix, value) in ["R", "G", "B"].iter().zip(rgb) {
        preset.set_float(format!("{prefix}.{suffix}"), value);
    }
}

/// Stores curve control points as `Point0..PointN` plus `Length`, the
/// sampled curve size.
pub(crate) fn write_curve_points(preset: &mut FilterPreset, points: &[Point32F], sampled_len: usize) {
    preset.set_int("Length", sampled_len as i32);
    for (i, p) in points.iter().enumerate() {
        preset.set_point(format!("Point{i}"), *p);
    }
}

/// Every stored point sorted by x; `None` without points.
pub(crate) fn read_curve_points(preset: &FilterPreset) -> Option<Vec<Point32F>> {
    if preset.points().is_empty() {
        return None;
    }
    let mut points: Vec<Point32F> = preset.points().values().copied().collect();
    points.sort_by(|a, b| a.x.total_cmp(&b.x));
    Some(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendId, CpuDevice};
    use blacksilk_core::PixelFormat;

    #[test]
    fn test_prepare_target_reallocates() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let src = ImageLayer::new(&device, PixelFormat::Rgb16, 3, 2).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Mono8, 1, 1);
        assert!(prepare_target(&device, &mut dst, &src));
        assert_eq!((dst.format(), dst.width(), dst.height()), (PixelFormat::Rgb16, 3, 2));
        assert!(dst.contains_data_for_backend(BackendId::Cpu));
    }

    #[test]
    fn test_prepare_target_needs_source_data() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let src = ImageLayer::empty(PixelFormat::Rgb8, 2, 2);
        let mut dst = ImageLayer::new(&device, PixelFormat::Rgb8, 2, 2).unwrap();
        assert!(!prepare_target(&device, &mut dst, &src));
    }

    #[test]
    fn test_rgb_keys() {
        let mut preset = current_preset("SplitTone");
        write_rgb(&mut preset, "ShadowsFactor", [0.1, 0.2, 0.3]);
        preset.floats_mut().remove("ShadowsFactor.G");
        let mut rgb = [0.0; 3];
        assert!(read_rgb(&preset, "ShadowsFactor", &mut rgb));
        assert_eq!(rgb, [0.1, 0.0, 0.3]);
        assert!(!read_rgb(&preset, "HighlightsFactor", &mut rgb));
    }

    #[test]
    fn test_curve_points_sorted() {
        let mut preset = current_preset("Curves");
        preset.set_point("Point0", Point32F::new(1.0, 1.0));
        preset.set_point("Point1", Point32F::new(0.0, 0.2));
        let points = read_curve_points(&preset).unwrap();
        assert_eq!(points[0], Point32F::new(0.0, 0.2));
        assert!(read_curve_points(&current_preset("Curves")).is_none());
    }
}
