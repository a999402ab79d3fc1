//! Shared fixtures for the blacksilk benchmarks.

use std::sync::Arc;

use blacksilk_core::PixelFormat;
use blacksilk_graphics::{BackendDevice, CpuDevice, GraphicsResult, ImageLayer};

/// CPU device used by every benchmark.
pub fn cpu_device() -> Arc<dyn BackendDevice> {
    Arc::new(CpuDevice::new())
}

/// Square RGB8 layer with a diagonal gradient.
pub fn gradient_layer(device: &Arc<dyn BackendDevice>, size: u32) -> GraphicsResult<ImageLayer> {
    let mut data = Vec::with_capacity(size as usize * size as usize * 3);
    for y in 0..size {
        for x in 0..size {
            let v = ((x + y) * 255 / (2 * size.max(1))) as u8;
            data.extend_from_slice(&[v, v / 2, 255 - v]);
        }
    }
    ImageLayer::from_data(device, PixelFormat::Rgb8, size, size, &data)
}
