//! wgpu compute backend.
//!
//! Image objects are storage buffers of normalized `f32` samples, taken
//! from a [`Pool`] of [`Resource`](super::Resource)-guarded buffers keyed by
//! byte size. Transfers convert to and from the object's [`PixelFormat`]
//! on the host.

use std::sync::Arc;

use blacksilk_core::{PixelFormat, Rect32I};
use bytemuck::Pod;
use wgpu::util::DeviceExt;

#[allow(unused_imports)]
use tracing::{debug, error, trace, warn};

use super::cpu::{decode_samples, encode_samples};
use super::pool::{Pool, PoolGuard};
use super::{AsAny, BackendDevice, BackendId, ImageObject, next_device_id};
use crate::config::DeviceConfig;
use crate::ops::KernelTable;
use crate::{GraphicsError, GraphicsResult};

const WORKGROUP_SIZE: u32 = 256;
const MAX_WORKGROUPS_PER_DIM: u32 = 65535;

// =============================================================================
// Context
// =============================================================================

/// Compute pipelines, one per shader.
pub(crate) struct Pipelines {
    pub(crate) fill: wgpu::ComputePipeline,
    pub(crate) unary: wgpu::ComputePipeline,
    pub(crate) binary: wgpu::ComputePipeline,
    pub(crate) sharpen: wgpu::ComputePipeline,
}

/// Device, queue, pipelines and buffer pool shared by a device and its
/// objects.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: Pipelines,
    pool: Pool<u64, wgpu::Buffer>,
    limits: wgpu::Limits,
}

impl GpuContext {
    pub(crate) fn pipelines(&self) -> &Pipelines {
        &self.pipelines
    }

    /// Read-only storage buffer holding `data` (at least one element).
    pub(crate) fn storage(&self, label: &str, data: &[f32]) -> wgpu::Buffer {
        let contents: &[f32] = if data.is_empty() { &[0.0] } else { data };
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(contents),
            usage: wgpu::BufferUsages::STORAGE,
        })
    }

    /// Uniform buffer holding `value`.
    pub(crate) fn uniform<T: Pod>(&self, value: &T) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kernel_params"),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }

    /// Binds `buffers` to consecutive bindings of group 0 and runs
    /// `invocations` threads, waiting for completion.
    pub(crate) fn dispatch(&self, pipeline: &wgpu::ComputePipeline, buffers: &[&wgpu::Buffer], invocations: u32) {
        if invocations == 0 {
            return;
        }
        let layout = pipeline.get_bind_group_layout(0);
        let entries: Vec<wgpu::BindGroupEntry<'_>> = buffers
            .iter()
            .enumerate()
            .map(|(i, b)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: b.as_entire_binding(),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel_bind_group"),
            layout: &layout,
            entries: &entries,
        });

        let groups = invocations.div_ceil(WORKGROUP_SIZE);
        let x = groups.min(MAX_WORKGROUPS_PER_DIM);
        let y = groups.div_ceil(MAX_WORKGROUPS_PER_DIM);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("compute_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("compute_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(x, y, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Pooled, zeroed storage buffer of `bytes`.
    fn allocate(&self, bytes: u64) -> Option<PoolGuard<u64, wgpu::Buffer>> {
        let guard = self.pool.acquire(bytes, || {
            Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("image_storage"),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }))
        })?;
        // reused buffers keep old contents
        let mut encoder = self.device.create_command_encoder(&Default::default());
        encoder.clear_buffer(&guard, 0, None);
        self.queue.submit(std::iter::once(encoder.finish()));
        Some(guard)
    }

    /// Reads `size` bytes at `offset` back as `f32`.
    fn download(&self, buffer: &wgpu::Buffer, offset: u64, size: u64) -> Option<Vec<f32>> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging_buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self.device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(buffer, offset, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "staging map failed");
                return None;
            }
            Err(_) => {
                error!("staging map channel closed");
                return None;
            }
        }
        let data = slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();
        Some(result)
    }
}

// =============================================================================
// Image object
// =============================================================================

/// GPU-resident image: one storage buffer of normalized samples.
pub struct GpuImageObject {
    device_id: u64,
    format: PixelFormat,
    width: u32,
    height: u32,
    ctx: Arc<GpuContext>,
    storage: Option<PoolGuard<u64, wgpu::Buffer>>,
}

impl GpuImageObject {
    /// Storage buffer, `None` once discarded.
    pub(crate) fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.storage.as_deref()
    }

    pub(crate) fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Samples per row.
    fn row_len(&self) -> usize {
        self.width as usize * self.format.channel_count()
    }

    fn check_transfer(&self, len: usize, rect: Rect32I) -> bool {
        let ok = !rect.is_empty() && rect.fits_within(self.width, self.height) && len == self.transfer_size(rect);
        debug_assert!(ok, "transfer {rect:?} with {len} bytes out of contract");
        if !ok {
            error!(?rect, len, "gpu transfer out of bounds");
        }
        ok
    }
}

impl std::fmt::Debug for GpuImageObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuImageObject")
            .field("device_id", &self.device_id)
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("allocated", &self.storage.is_some())
            .finish()
    }
}

impl AsAny for GpuImageObject {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl ImageObject for GpuImageObject {
    fn backend_id(&self) -> BackendId {
        BackendId::Gpu
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
        self.storage.is_none()
    }

    fn retrieve(&self, buffer: &mut [u8], rect: Rect32I) -> bool {
        let Some(storage) = self.buffer() else {
            return false;
        };
        if !self.check_transfer(buffer.len(), rect) {
            return false;
        }
        let row = self.row_len();
        let channels = self.format.channel_count();
        let offset = (rect.y as usize * row * 4) as u64;
        let size = (rect.height as usize * row * 4) as u64;
        let Some(samples) = self.ctx.download(storage, offset, size) else {
            return false;
        };

        let out_row = rect.width as usize * self.format.pixel_size();
        let (x0, x1) = (rect.x as usize * channels, rect.right() as usize * channels);
        for (src, dst) in samples.chunks_exact(row).zip(buffer.chunks_exact_mut(out_row)) {
            encode_samples(self.format, &src[x0..x1], dst);
        }
        true
    }

    fn upload(&mut self, data: &[u8], rect: Rect32I) -> bool {
        let Some(storage) = self.storage.as_deref() else {
            return false;
        };
        if !self.check_transfer(data.len(), rect) {
            return false;
        }
        let channels = self.format.channel_count();
        let row = self.row_len();
        let in_row = rect.width as usize * self.format.pixel_size();
        let mut samples = vec![0.0f32; rect.width as usize * channels];
        for (i, bytes) in data.chunks_exact(in_row).enumerate() {
            decode_samples(self.format, bytes, &mut samples);
            let offset = ((rect.y as usize + i) * row + rect.x as usize * channels) * 4;
            self.ctx
                .queue
                .write_buffer(storage, offset as u64, bytemuck::cast_slice(&samples));
        }
        true
    }

    fn copy_from(&mut self, source: &dyn ImageObject, source_rect: Rect32I, dest_x: i32, dest_y: i32) -> bool {
        if source.format() != self.format {
            return false;
        }
        let target = Rect32I::new(dest_x, dest_y, source_rect.width, source_rect.height);
        if !source_rect.fits_within(source.width(), source.height()) || !target.fits_within(self.width, self.height) {
            return false;
        }

        let same_context = source
            .as_any()
            .downcast_ref::<GpuImageObject>()
            .filter(|s| Arc::ptr_eq(&s.ctx, &self.ctx));
        if let (Some(src), Some(dst_buf)) = (same_context, self.storage.as_deref()) {
            let Some(src_buf) = src.buffer() else {
                return false;
            };
            let channels = self.format.channel_count();
            let span = (source_rect.width as usize * channels * 4) as u64;
            let mut encoder = self.ctx.device.create_command_encoder(&Default::default());
            for r in 0..source_rect.height as usize {
                let from = ((source_rect.y as usize + r) * src.row_len() + source_rect.x as usize * channels) * 4;
                let to = ((dest_y as usize + r) * self.row_len() + dest_x as usize * channels) * 4;
                encoder.copy_buffer_to_buffer(src_buf, from as u64, dst_buf, to as u64, span);
            }
            self.ctx.queue.submit(std::iter::once(encoder.finish()));
            return true;
        }

        let mut staging = vec![0u8; source.transfer_size(source_rect)];
        source.retrieve(&mut staging, source_rect) && self.upload(&staging, target)
    }

    fn discard_buffers(&mut self) {
        self.ctx.pool.trim();
    }

    fn synchronize(&mut self) -> bool {
        self.ctx.device.poll(wgpu::Maintain::Wait);
        true
    }
}

// =============================================================================
// Device
// =============================================================================

/// wgpu compute device.
pub struct GpuDevice {
    id: u64,
    name: String,
    config: DeviceConfig,
    ctx: Arc<GpuContext>,
    kernels: KernelTable,
}

impl GpuDevice {
    /// Check if a wgpu adapter is available.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .is_some()
        })
    }

    /// Device with default settings.
    pub fn new() -> GraphicsResult<Self> {
        Self::with_config(DeviceConfig::default())
    }

    /// Device with `config`.
    pub fn with_config(config: DeviceConfig) -> GraphicsResult<Self> {
        pollster::block_on(Self::new_async(config))
    }

    async fn new_async(config: DeviceConfig) -> GraphicsResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GraphicsError::NoAdapter)?;

        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("blacksilk_gpu_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| GraphicsError::DeviceCreation(e.to_string()))?;

        let pipelines = create_pipelines(&device);
        let info = adapter.get_info();
        debug!(adapter = %info.name, backend = ?info.backend, "gpu device created");

        let ctx = GpuContext {
            device,
            queue,
            pipelines,
            pool: Pool::new(config.pool_capacity, config.pool_attempts),
            limits,
        };
        Ok(Self {
            id: next_device_id(),
            name: format!("gpu ({})", info.name),
            config,
            ctx: Arc::new(ctx),
            kernels: crate::ops::gpu_kernels(),
        })
    }

    /// Buffers currently held by the pool.
    pub fn pooled_buffers(&self) -> usize {
        self.ctx.pool.len()
    }

    fn max_dim(&self) -> u32 {
        self.config.max_texture_dim.min(self.ctx.limits.max_texture_dimension_2d.max(1))
    }
}

fn create_pipelines(device: &wgpu::Device) -> Pipelines {
    let create = |source: String, label: &str| {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: None,
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        })
    };
    Pipelines {
        fill: create(super::shaders::fill(), "fill_pipeline"),
        unary: create(super::shaders::unary(), "unary_pipeline"),
        binary: create(super::shaders::binary(), "binary_pipeline"),
        sharpen: create(super::shaders::sharpen(), "sharpen_pipeline"),
    }
}

impl std::fmt::Debug for GpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuDevice")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kernels", &self.kernels)
            .finish()
    }
}

impl BackendDevice for GpuDevice {
    fn backend_id(&self) -> BackendId {
        BackendId::Gpu
    }

    fn device_id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
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
        if width == 0 || height == 0 || width > self.max_dim() || height > self.max_dim() {
            warn!(width, height, "gpu texture size rejected");
            return None;
        }
        let bytes = (width as u64) * (height as u64) * (format.channel_count() as u64) * 4;
        let max_binding = self.ctx.limits.max_storage_buffer_binding_size as u64;
        if bytes > self.ctx.limits.max_buffer_size || bytes > max_binding {
            warn!(bytes, "gpu buffer exceeds device limits");
            return None;
        }
        if let Some(data) = data {
            if Some(data.len()) != format.buffer_size(width, height) {
                return None;
            }
        }

        let storage = self.ctx.allocate(bytes)?;
        let mut object = GpuImageObject {
            device_id: self.id,
            format,
            width,
            height,
            ctx: self.ctx.clone(),
            storage: Some(storage),
        };
        if let Some(data) = data {
            let rect = object.rect();
            if !object.upload(data, rect) {
                return None;
            }
        }
        trace!(width, height, %format, "gpu texture created");
        Some(Box::new(object))
    }

    fn kernels(&self) -> &KernelTable {
        &self.kernels
    }

    fn synchronize(&self) {
        self.ctx.device.poll(wgpu::Maintain::Wait);
    }
}
