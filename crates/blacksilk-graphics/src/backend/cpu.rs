//! CPU backend: host-memory image objects and rayon execution.
//!
//! Storage is interleaved, 8-bit samples as `u8`, 16-bit samples as
//! native-endian `u16`. Kernels work on normalized `f32` rows decoded on the
//! fly ([`decode_samples`], [`encode_samples`]); stores round to the nearest
//! representable value.

use rayon::prelude::*;

use blacksilk_core::{Bitmap, PixelFormat, Rect32I};

#[allow(unused_imports)]
use tracing::{debug, trace, warn};

use super::tiling::{TILE_SIZE, horizontal_tile_count, tiles_for_rectangle};
use super::{AsAny, BackendDevice, BackendId, ImageObject, next_device_id};
use crate::config::DeviceConfig;
use crate::ops::KernelTable;
use crate::{GraphicsError, GraphicsResult};

// ============================================================================
// Sample codec
// ============================================================================

/// Decodes packed samples into normalized floats.
#[inline]
pub fn decode_samples(format: PixelFormat, bytes: &[u8], out: &mut [f32]) {
    match format.bytes_per_channel() {
        1 => {
            for (o, b) in out.iter_mut().zip(bytes) {
                *o = *b as f32 / 255.0;
            }
        }
        _ => {
            for (o, b) in out.iter_mut().zip(bytes.chunks_exact(2)) {
                *o = u16::from_ne_bytes([b[0], b[1]]) as f32 / 65535.0;
            }
        }
    }
}

/// Encodes normalized floats, clamping to [0,1] and rounding.
#[inline]
pub fn encode_samples(format: PixelFormat, values: &[f32], bytes: &mut [u8]) {
    match format.bytes_per_channel() {
        1 => {
            for (b, v) in bytes.iter_mut().zip(values) {
                *b = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
        _ => {
            for (b, v) in bytes.chunks_exact_mut(2).zip(values) {
                let s = (v.clamp(0.0, 1.0) * 65535.0).round() as u16;
                b.copy_from_slice(&s.to_ne_bytes());
            }
        }
    }
}

fn allocate(size: usize) -> Option<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(size).ok()?;
    data.resize(size, 0);
    Some(data)
}

// ============================================================================
// Image object
// ============================================================================

/// Host-memory image object.
///
/// Writes go to the primary buffer. [`CpuImageObject::write_deferred`]
/// stages writes in a back buffer instead; [`ImageObject::synchronize`]
/// commits them and [`ImageObject::discard_buffers`] drops them.
#[derive(Debug, Clone)]
pub struct CpuImageObject {
    device_id: u64,
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
    pending: Option<Vec<u8>>,
}

impl CpuImageObject {
    /// Zeroed object; `None` on zero size or allocation failure.
    pub fn new(device_id: u64, format: PixelFormat, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let data = allocate(format.buffer_size(width, height)?)?;
        Some(Self {
            device_id,
            format,
            width,
            height,
            data,
            pending: None,
        })
    }

    /// Reinitializes storage; false on zero size or allocation failure.
    pub fn create(&mut self, format: PixelFormat, width: u32, height: u32) -> bool {
        match Self::new(self.device_id, format, width, height) {
            Some(fresh) => {
                *self = fresh;
                true
            }
            None => false,
        }
    }

    /// Reinitializes from tightly packed bytes; false on a length mismatch.
    pub fn create_from_data(&mut self, format: PixelFormat, width: u32, height: u32, data: &[u8]) -> bool {
        if format.buffer_size(width, height) != Some(data.len()) {
            return false;
        }
        if !self.create(format, width, height) {
            return false;
        }
        self.data.copy_from_slice(data);
        true
    }

    /// Reinitializes from a bitmap.
    pub fn create_from_bitmap(&mut self, bitmap: &Bitmap) -> bool {
        self.create_from_data(bitmap.format(), bitmap.width(), bitmap.height(), bitmap.buffer())
    }

    /// Primary buffer.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable primary buffer.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.pixel_size()
    }

    /// Channels per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.format.channel_count()
    }

    /// Decodes `out.len() / channels` pixels of row `y` starting at `x`.
    #[inline]
    pub fn load_row(&self, x: i32, y: i32, out: &mut [f32]) {
        let px = self.format.pixel_size();
        let start = y as usize * self.stride() + x as usize * px;
        let len = out.len() / self.channels() * px;
        decode_samples(self.format, &self.data[start..start + len], out);
    }

    /// Decodes one pixel.
    #[inline]
    pub fn load_pixel(&self, x: i32, y: i32, out: &mut [f32]) {
        self.load_row(x, y, &mut out[..self.channels()]);
    }

    /// Stages a write in the back buffer.
    ///
    /// No operation writes through here; it is the entry point for hosts
    /// and plugins that patch a layer's CPU copy in several steps and commit
    /// them at once with [`ImageLayer::synchronize`](crate::ImageLayer::synchronize).
    pub fn write_deferred(&mut self, data: &[u8], rect: Rect32I) -> bool {
        if !self.check_transfer(data.len(), rect) {
            return false;
        }
        let back = self.pending.get_or_insert_with(|| self.data.clone());
        write_rect(back, self.width, self.format, data, rect);
        true
    }

    /// True while staged writes are waiting for [`ImageObject::synchronize`].
    pub fn has_pending_writes(&self) -> bool {
        self.pending.is_some()
    }

    fn check_transfer(&self, len: usize, rect: Rect32I) -> bool {
        let ok = !self.data.is_empty()
            && rect.fits_within(self.width, self.height)
            && len == rect.area() as usize * self.format.pixel_size();
        debug_assert!(ok, "transfer {rect:?} ({len} bytes) outside {}x{}", self.width, self.height);
        ok
    }
}

fn write_rect(target: &mut [u8], width: u32, format: PixelFormat, data: &[u8], rect: Rect32I) {
    let px = format.pixel_size();
    let stride = width as usize * px;
    let row_len = rect.width as usize * px;
    for (i, src) in data.chunks_exact(row_len).enumerate() {
        let start = (rect.y as usize + i) * stride + rect.x as usize * px;
        target[start..start + row_len].copy_from_slice(src);
    }
}

impl AsAny for CpuImageObject {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl ImageObject for CpuImageObject {
    fn backend_id(&self) -> BackendId {
        BackendId::Cpu
    }

    fn device_id(&self) -> u64 {
        self.device_id
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn retrieve(&self, buffer: &mut [u8], rect: Rect32I) -> bool {
        if !self.check_transfer(buffer.len(), rect) {
            return false;
        }
        let px = self.format.pixel_size();
        let stride = self.stride();
        let row_len = rect.width as usize * px;
        for (i, dst) in buffer.chunks_exact_mut(row_len).enumerate() {
            let start = (rect.y as usize + i) * stride + rect.x as usize * px;
            dst.copy_from_slice(&self.data[start..start + row_len]);
        }
        true
    }

    fn upload(&mut self, data: &[u8], rect: Rect32I) -> bool {
        if !self.check_transfer(data.len(), rect) {
            return false;
        }
        write_rect(&mut self.data, self.width, self.format, data, rect);
        true
    }

    fn copy_from(&mut self, source: &dyn ImageObject, source_rect: Rect32I, dest_x: i32, dest_y: i32) -> bool {
        let Some(src) = source.as_any().downcast_ref::<CpuImageObject>() else {
            // cross-backend copy goes through a staging buffer
            let mut staging = vec![0u8; source.transfer_size(source_rect)];
            let target = Rect32I::new(dest_x, dest_y, source_rect.width, source_rect.height);
            return source.format() == self.format
                && source.retrieve(&mut staging, source_rect)
                && self.upload(&staging, target);
        };
        if src.format != self.format {
            return false;
        }
        let target = Rect32I::new(dest_x, dest_y, source_rect.width, source_rect.height);
        if !source_rect.fits_within(src.width, src.height) || !target.fits_within(self.width, self.height) {
            return false;
        }
        let px = self.format.pixel_size();
        let row_len = source_rect.width as usize * px;
        let (src_stride, dst_stride) = (src.stride(), self.stride());
        for row in 0..source_rect.height as usize {
            let s = (source_rect.y as usize + row) * src_stride + source_rect.x as usize * px;
            let d = (dest_y as usize + row) * dst_stride + dest_x as usize * px;
            self.data[d..d + row_len].copy_from_slice(&src.data[s..s + row_len]);
        }
        true
    }

    fn discard_buffers(&mut self) {
        if self.pending.take().is_some() {
            trace!("discarded deferred writes");
        }
    }

    fn synchronize(&mut self) -> bool {
        if let Some(back) = self.pending.take() {
            self.data = back;
        }
        true
    }
}

// ============================================================================
// Row and tile execution
// ============================================================================

/// Runs `kernel(x, y, row)` over every row of `area` in parallel.
///
/// `row` holds the decoded destination pixels of that row segment on entry;
/// whatever the kernel leaves in it is encoded back.
pub fn execute_rows<F>(dst: &mut CpuImageObject, area: Rect32I, kernel: F)
where
    F: Fn(i32, i32, &mut [f32]) + Sync + Send,
{
    if area.is_empty() {
        return;
    }
    let format = dst.format;
    let px = format.pixel_size();
    let stride = dst.stride();
    let channels = format.channel_count();
    let (x0, x1) = (area.x as usize * px, area.right() as usize * px);
    let region = &mut dst.data[area.y as usize * stride..area.bottom() as usize * stride];

    region.par_chunks_mut(stride).enumerate().for_each_init(
        || vec![0.0f32; area.width as usize * channels],
        |scratch, (i, row)| {
            let segment = &mut row[x0..x1];
            decode_samples(format, segment, scratch);
            kernel(area.x, area.y + i as i32, scratch);
            encode_samples(format, scratch, segment);
        },
    );
}

/// Runs `kernel(x, y, row)` tile by tile.
///
/// Bands of [`TILE_SIZE`] rows run in parallel; tiles within a band run in
/// order. Empty tiles are skipped.
pub fn execute_tile_based<F>(dst: &mut CpuImageObject, area: Rect32I, kernel: F)
where
    F: Fn(i32, i32, &mut [f32]) + Sync + Send,
{
    if area.is_empty() {
        return;
    }
    let tiles = tiles_for_rectangle(area, TILE_SIZE);
    let cols = horizontal_tile_count(area, TILE_SIZE) as usize;
    trace!(tiles = tiles.len(), cols, "tile-based execution");

    let format = dst.format;
    let px = format.pixel_size();
    let stride = dst.stride();
    let channels = format.channel_count();
    let band_rows = TILE_SIZE as usize;
    let region = &mut dst.data[area.y as usize * stride..area.bottom() as usize * stride];

    region
        .par_chunks_mut(band_rows * stride)
        .enumerate()
        .for_each(|(band, chunk)| {
            let mut scratch = Vec::new();
            for tile in tiles.iter().skip(band * cols).take(cols).filter(|t| !t.is_empty()) {
                scratch.resize(tile.width as usize * channels, 0.0);
                for y in tile.y..tile.bottom() {
                    let local = (y - area.y) as usize - band * band_rows;
                    let start = local * stride + tile.x as usize * px;
                    let segment = &mut chunk[start..start + tile.width as usize * px];
                    decode_samples(format, segment, &mut scratch);
                    kernel(tile.x, y, &mut scratch);
                    encode_samples(format, &scratch, segment);
                }
            }
        });
}

// ============================================================================
// Device
// ============================================================================

/// CPU backend device.
pub struct CpuDevice {
    id: u64,
    config: DeviceConfig,
    pool: Option<rayon::ThreadPool>,
    kernels: KernelTable,
    memory_limit: u64,
}

impl CpuDevice {
    /// Device using the global rayon pool.
    pub fn new() -> Self {
        Self::build(DeviceConfig::default(), None)
    }

    /// Device with its own worker pool when `worker_threads > 0`.
    pub fn with_config(config: DeviceConfig) -> GraphicsResult<Self> {
        let pool = if config.worker_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.worker_threads)
                .thread_name(|i| format!("blacksilk-cpu-{i}"))
                .build()
                .map_err(|e| GraphicsError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self::build(config, pool))
    }

    fn build(config: DeviceConfig, pool: Option<rayon::ThreadPool>) -> Self {
        // fallback to 4GB if detection fails
        let memory_limit = sys_info::mem_info()
            .map(|m| m.total * 1024)
            .unwrap_or(4 * 1024 * 1024 * 1024);
        let device = Self {
            id: next_device_id(),
            config,
            pool,
            kernels: crate::ops::cpu_kernels(),
            memory_limit,
        };
        debug!(
            id = device.id,
            threads = device.thread_count(),
            memory_mb = memory_limit / (1024 * 1024),
            "CPU device created"
        );
        device
    }

    /// Worker threads kernels run on.
    pub fn thread_count(&self) -> usize {
        self.pool
            .as_ref()
            .map(|p| p.current_num_threads())
            .unwrap_or_else(rayon::current_num_threads)
    }

    /// Host memory considered available for image objects.
    pub fn memory_limit(&self) -> u64 {
        self.memory_limit
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuDevice")
            .field("id", &self.id)
            .field("threads", &self.thread_count())
            .finish()
    }
}

impl BackendDevice for CpuDevice {
    fn backend_id(&self) -> BackendId {
        BackendId::Cpu
    }

    fn device_id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        "CPU"
    }

    fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn create_texture_2d(
        &self,
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Option<Box<dyn ImageObject>> {
        if width > self.config.max_texture_dim || height > self.config.max_texture_dim {
            warn!(width, height, "texture exceeds max dimension");
            return None;
        }
        let size = format.buffer_size(width, height)? as u64;
        if size > self.memory_limit {
            warn!(size, limit = self.memory_limit, "texture exceeds host memory");
            return None;
        }
        let mut object = CpuImageObject::new(self.id, format, width, height)?;
        if let Some(data) = data {
            if data.len() != object.data.len() {
                return None;
            }
            object.data.copy_from_slice(data);
        }
        Some(Box::new(object))
    }

    fn kernels(&self) -> &KernelTable {
        &self.kernels
    }

    fn execute(&self, job: &mut (dyn FnMut() -> bool + Send)) -> bool {
        match &self.pool {
            Some(pool) => pool.install(|| job()),
            None => job(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_roundtrip_u16() {
        let values = [0.0, 0.25, 1.0];
        let mut bytes = [0u8; 6];
        encode_samples(PixelFormat::Rgb16, &values, &mut bytes);
        let mut back = [0.0f32; 3];
        decode_samples(PixelFormat::Rgb16, &bytes, &mut back);
        for (a, b) in values.iter().zip(back) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_retrieve_sub_rect() {
        let device = CpuDevice::new();
        let data: Vec<u8> = (0..16).collect();
        let obj = device
            .create_texture_2d(PixelFormat::Mono8, 4, 4, Some(&data))
            .unwrap();
        let mut out = [0u8; 4];
        assert!(obj.retrieve(&mut out, Rect32I::new(1, 1, 2, 2)));
        assert_eq!(out, [5, 6, 9, 10]);
    }

    #[test]
    fn test_deferred_writes() {
        let mut obj = CpuImageObject::new(1, PixelFormat::Mono8, 2, 2).unwrap();
        assert!(obj.write_deferred(&[7, 7], Rect32I::new(0, 1, 2, 1)));
        assert!(obj.has_pending_writes());
        assert_eq!(obj.data(), &[0, 0, 0, 0]);
        obj.discard_buffers();
        assert!(!obj.has_pending_writes());

        assert!(obj.write_deferred(&[9], Rect32I::new(1, 0, 1, 1)));
        assert!(obj.synchronize());
        assert_eq!(obj.data(), &[0, 9, 0, 0]);
    }

    #[test]
    fn test_copy_between_objects() {
        let src = CpuImageObject {
            device_id: 1,
            format: PixelFormat::Mono8,
            width: 2,
            height: 2,
            data: vec![1, 2, 3, 4],
            pending: None,
        };
        let mut dst = CpuImageObject::new(1, PixelFormat::Mono8, 3, 3).unwrap();
        assert!(dst.copy_from(&src, Rect32I::new(0, 0, 2, 2), 1, 1));
        assert_eq!(dst.data(), &[0, 0, 0, 0, 1, 2, 0, 3, 4]);
        assert!(!dst.copy_from(&src, Rect32I::new(0, 0, 2, 2), 2, 2));
    }

    #[test]
    fn test_tile_execution_covers_area() {
        let mut obj = CpuImageObject::new(1, PixelFormat::Mono8, 8, 4).unwrap();
        execute_tile_based(&mut obj, Rect32I::new(2, 1, 4, 2), |_, _, row| row.fill(1.0));
        let touched = obj.data().iter().filter(|v| **v == 255).count();
        assert_eq!(touched, 8);
        assert_eq!(obj.data()[8 + 2], 255);
        assert_eq!(obj.data()[8 + 1], 0);
    }
}
