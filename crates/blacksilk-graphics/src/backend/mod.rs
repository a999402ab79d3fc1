//! Compute backends.
//!
//! A [`BackendDevice`] creates [`ImageObject`]s (backend-specific pixel
//! buffers) and runs kernels on them. Two backends exist:
//!
//! ```text
//! BackendDevice
//!     +-- CpuDevice  (rayon, interleaved u8/u16 storage)
//!     +-- GpuDevice  (wgpu compute, normalized f32 storage buffers)
//! ```
//!
//! Routing is decided by [`BackendId`]: an operation runs on every backend
//! for which both its destination and its sources hold valid data.

pub mod cpu;
pub mod pool;
pub mod resource;
pub mod tiling;

#[cfg(feature = "wgpu")]
pub mod gpu;
#[cfg(feature = "wgpu")]
mod shaders;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use blacksilk_core::{Bitmap, PixelFormat, Rect32I};

use crate::config::DeviceConfig;
use crate::ops::KernelTable;
use crate::{GraphicsError, GraphicsResult};

pub use cpu::{CpuDevice, CpuImageObject};
pub use pool::{Pool, PoolGuard};
pub use resource::Resource;

#[cfg(feature = "wgpu")]
pub use gpu::{GpuDevice, GpuImageObject};

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_device_id() -> u64 {
    NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// Backend identity
// ============================================================================

/// Stable backend tag used for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum BackendId {
    /// Host memory, rayon kernels.
    Cpu = 0,
    /// GPU memory, compute shaders.
    Gpu = 1,
}

impl BackendId {
    /// Every backend id.
    pub const ALL: [BackendId; 2] = [BackendId::Cpu, BackendId::Gpu];

    /// Lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Backend selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// GPU when available, else CPU.
    #[default]
    Auto,
    /// CPU backend.
    Cpu,
    /// GPU backend (requires the `wgpu` feature).
    Gpu,
}

impl BackendKind {
    /// Check if this backend is usable on the current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto | Self::Cpu => true,
            #[cfg(feature = "wgpu")]
            Self::Gpu => GpuDevice::is_available(),
            #[cfg(not(feature = "wgpu"))]
            Self::Gpu => false,
        }
    }

    /// Lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = GraphicsError;

    fn from_str(s: &str) -> GraphicsResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "gpu" | "wgpu" => Ok(Self::Gpu),
            other => Err(GraphicsError::BackendNotAvailable(other.to_string())),
        }
    }
}

/// Helper trait for downcasting.
pub trait AsAny: 'static {
    /// `&dyn Any` view.
    fn as_any(&self) -> &dyn std::any::Any;
    /// `&mut dyn Any` view.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

// ============================================================================
// Image objects
// ============================================================================

/// Backend-specific 2D pixel buffer.
///
/// Transfer buffers are tightly packed rows of the requested rectangle in
/// the object's [`PixelFormat`]. Out-of-bounds rectangles and size
/// mismatches are contract violations and return `false`.
pub trait ImageObject: Send + Sync + AsAny {
    /// Backend this object lives on.
    fn backend_id(&self) -> BackendId;

    /// Id of the creating device.
    fn device_id(&self) -> u64;

    /// Pixel format.
    fn format(&self) -> PixelFormat;

    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// True once the backing storage is gone.
    fn is_empty(&self) -> bool;

    /// Copies `rect` into `buffer`.
    fn retrieve(&self, buffer: &mut [u8], rect: Rect32I) -> bool;

    /// Writes `data` into `rect`.
    fn upload(&mut self, data: &[u8], rect: Rect32I) -> bool;

    /// Drops pending deferred writes and pooled storage that is not needed.
    fn discard_buffers(&mut self);

    /// Commits pending writes; blocks until the backend is idle.
    fn synchronize(&mut self) -> bool;

    /// Full-size rectangle.
    fn rect(&self) -> Rect32I {
        Rect32I::from_size(self.width(), self.height())
    }

    /// Bytes needed to transfer `rect`.
    fn transfer_size(&self, rect: Rect32I) -> usize {
        rect.area() as usize * self.format().pixel_size()
    }

    /// Block copy from `source`; formats must match and both rectangles
    /// must be in bounds.
    fn copy_from(&mut self, source: &dyn ImageObject, source_rect: Rect32I, dest_x: i32, dest_y: i32) -> bool {
        if source.format() != self.format() {
            return false;
        }
        let target = Rect32I::new(dest_x, dest_y, source_rect.width, source_rect.height);
        if !source_rect.fits_within(source.width(), source.height())
            || !target.fits_within(self.width(), self.height())
        {
            return false;
        }
        let mut staging = vec![0u8; source.transfer_size(source_rect)];
        source.retrieve(&mut staging, source_rect) && self.upload(&staging, target)
    }

    /// Copies the whole object into a new bitmap.
    fn retrieve_bitmap(&self) -> Option<Bitmap> {
        let mut bitmap = Bitmap::new(self.format(), self.width(), self.height()).ok()?;
        let rect = self.rect();
        self.retrieve(bitmap.buffer_mut(), rect).then_some(bitmap)
    }

    /// Writes `bitmap` at (`dest_x`, `dest_y`).
    fn upload_bitmap(&mut self, bitmap: &Bitmap, dest_x: i32, dest_y: i32) -> bool {
        if bitmap.format() != self.format() {
            return false;
        }
        let rect = bitmap.rect().translate(dest_x, dest_y);
        self.upload(bitmap.buffer(), rect)
    }
}

// ============================================================================
// Devices
// ============================================================================

/// Factory and executor for image objects on one backend.
pub trait BackendDevice: Send + Sync {
    /// Backend tag.
    fn backend_id(&self) -> BackendId;

    /// Unique id of this device instance.
    fn device_id(&self) -> u64;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Device settings.
    fn config(&self) -> &DeviceConfig;

    /// Allocates a `width` x `height` object, optionally initialized from
    /// tightly packed `data`. `None` on zero size, oversize or a length
    /// mismatch.
    fn create_texture_2d(
        &self,
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Option<Box<dyn ImageObject>>;

    /// Releases an object; false if this device did not create it.
    fn destroy_texture_2d(&self, object: Box<dyn ImageObject>) -> bool {
        if object.backend_id() != self.backend_id() || object.device_id() != self.device_id() {
            return false;
        }
        drop(object);
        true
    }

    /// Kernels this device provides.
    fn kernels(&self) -> &KernelTable;

    /// Runs `job` in the device's execution context.
    fn execute(&self, job: &mut (dyn FnMut() -> bool + Send)) -> bool {
        job()
    }

    /// Waits until queued work has finished.
    fn synchronize(&self) {}
}

/// Creates a device for `kind`.
///
/// `Auto` prefers the GPU when the `wgpu` feature is enabled and an adapter
/// exists, falling back to the CPU.
pub fn create_device(kind: BackendKind, config: DeviceConfig) -> GraphicsResult<Arc<dyn BackendDevice>> {
    match kind {
        BackendKind::Cpu => Ok(Arc::new(CpuDevice::with_config(config)?)),
        BackendKind::Gpu => {
            #[cfg(feature = "wgpu")]
            {
                Ok(Arc::new(GpuDevice::with_config(config)?))
            }
            #[cfg(not(feature = "wgpu"))]
            {
                Err(GraphicsError::BackendNotAvailable(
                    "wgpu feature not enabled".to_string(),
                ))
            }
        }
        BackendKind::Auto => {
            #[cfg(feature = "wgpu")]
            {
                if let Ok(device) = GpuDevice::with_config(config.clone()) {
                    return Ok(Arc::new(device));
                }
            }
            Ok(Arc::new(CpuDevice::with_config(config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("CPU".parse::<BackendKind>().unwrap(), BackendKind::Cpu);
        assert_eq!("wgpu".parse::<BackendKind>().unwrap(), BackendKind::Gpu);
        assert!("metal".parse::<BackendKind>().is_err());
        assert!(BackendKind::Cpu.is_available());
    }

    #[test]
    fn test_destroy_checks_owner() {
        let a = CpuDevice::new();
        let b = CpuDevice::new();
        let obj = a.create_texture_2d(PixelFormat::Rgb8, 2, 2, None).unwrap();
        assert!(!b.destroy_texture_2d(obj));
        let obj = a.create_texture_2d(PixelFormat::Rgb8, 2, 2, None).unwrap();
        assert!(a.destroy_texture_2d(obj));
    }
}
