//! Scratch layer cache for blur and grain buffers.
//!
//! Filters that keep blurred copies of their input (cascade buffers, unsharp
//! masks, blurred grain) take layers from a [`BlurCache`] and hand them back
//! when they are replaced. Layers are keyed by device, format and size, so a
//! buffer is reused only when it matches exactly. Nothing is invalidated
//! implicitly: owners call [`BlurCache::invalidate`] or
//! [`BlurCache::invalidate_backend`] when cached layers must not be reused.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use blacksilk_core::PixelFormat;

#[allow(unused_imports)]
use tracing::{debug, trace};

use crate::backend::{BackendDevice, BackendId};
use crate::layer::ImageLayer;

/// Default byte budget of a cache.
pub const DEFAULT_BLUR_CACHE_BUDGET: u64 = 256 * 1024 * 1024;

/// Identity of a cached layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlurKey {
    /// Backend of the owning device.
    pub backend: BackendId,
    /// Owning device.
    pub device_id: u64,
    /// Pixel format.
    pub format: PixelFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl BlurKey {
    fn for_device(device: &dyn BackendDevice, format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            backend: device.backend_id(),
            device_id: device.device_id(),
            format,
            width,
            height,
        }
    }

    fn of_layer(layer: &ImageLayer) -> Option<Self> {
        let rep = layer.representations().first()?;
        Some(Self::for_device(rep.device().as_ref(), layer.format(), layer.width(), layer.height()))
    }

    fn size_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.pixel_size() as u64
    }
}

/// Pool of idle scratch layers.
pub struct BlurCache {
    layers: HashMap<BlurKey, Vec<ImageLayer>>,
    /// Release order for eviction (front = oldest).
    order: VecDeque<BlurKey>,
    total_bytes: u64,
    max_bytes: u64,
    hits: u64,
    misses: u64,
}

impl BlurCache {
    /// Cache with [`DEFAULT_BLUR_CACHE_BUDGET`].
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_BLUR_CACHE_BUDGET)
    }

    /// Cache holding at most `max_bytes` of idle layers.
    pub fn with_budget(max_bytes: u64) -> Self {
        Self {
            layers: HashMap::new(),
            order: VecDeque::new(),
            total_bytes: 0,
            max_bytes,
            hits: 0,
            misses: 0,
        }
    }

    /// A `width` x `height` layer on `device`, reused when one is idle.
    ///
    /// Reused layers keep their old pixels.
    pub fn acquire(
        &mut self,
        device: &Arc<dyn BackendDevice>,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Option<ImageLayer> {
        let key = BlurKey::for_device(device.as_ref(), format, width, height);
        if let Some(layer) = self.layers.get_mut(&key).and_then(Vec::pop) {
            self.hits += 1;
            self.total_bytes = self.total_bytes.saturating_sub(key.size_bytes());
            if let Some(pos) = self.order.iter().position(|k| *k == key) {
                self.order.remove(pos);
            }
            trace!(?key, "blur cache hit");
            return Some(layer);
        }
        self.misses += 1;
        match ImageLayer::new(device, format, width, height) {
            Ok(layer) => Some(layer),
            Err(e) => {
                debug!(error = %e, "blur buffer allocation failed");
                None
            }
        }
    }

    /// Returns an idle layer; layers larger than the budget are dropped.
    pub fn release(&mut self, layer: ImageLayer) {
        let Some(key) = BlurKey::of_layer(&layer) else {
            return;
        };
        let size = key.size_bytes();
        if size > self.max_bytes {
            return;
        }
        while self.total_bytes + size > self.max_bytes && self.evict_oldest() {}
        self.layers.entry(key).or_default().push(layer);
        self.order.push_back(key);
        self.total_bytes += size;
    }

    fn evict_oldest(&mut self) -> bool {
        let Some(key) = self.order.pop_front() else {
            return false;
        };
        if let Some(list) = self.layers.get_mut(&key) {
            if list.pop().is_some() {
                self.total_bytes = self.total_bytes.saturating_sub(key.size_bytes());
            }
            if list.is_empty() {
                self.layers.remove(&key);
            }
        }
        true
    }

    /// Drops every idle layer.
    pub fn invalidate(&mut self) {
        if !self.is_empty() {
            debug!(layers = self.len(), "blur cache invalidated");
        }
        self.layers.clear();
        self.order.clear();
        self.total_bytes = 0;
    }

    /// Drops idle layers living on `backend`.
    pub fn invalidate_backend(&mut self, backend: BackendId) {
        self.layers.retain(|k, _| k.backend != backend);
        self.order.retain(|k| k.backend != backend);
        self.total_bytes = self
            .layers
            .iter()
            .map(|(k, v)| k.size_bytes() * v.len() as u64)
            .sum();
    }

    /// Number of idle layers.
    pub fn len(&self) -> usize {
        self.layers.values().map(Vec::len).sum()
    }

    /// True if no layer is idle.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held by idle layers.
    pub fn size_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Acquisitions served from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Acquisitions that allocated.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for BlurCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BlurCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlurCache")
            .field("layers", &self.len())
            .field("bytes", &self.total_bytes)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;

    fn device() -> Arc<dyn BackendDevice> {
        Arc::new(CpuDevice::new())
    }

    #[test]
    fn test_reuses_matching_layers_only() {
        let device = device();
        let mut cache = BlurCache::new();
        let layer = cache.acquire(&device, PixelFormat::Rgb8, 4, 4).unwrap();
        assert_eq!(cache.misses(), 1);
        cache.release(layer);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 48);

        assert!(cache.acquire(&device, PixelFormat::Rgb16, 4, 4).is_some());
        assert_eq!(cache.misses(), 2);
        let again = cache.acquire(&device, PixelFormat::Rgb8, 4, 4).unwrap();
        assert_eq!(cache.hits(), 1);
        assert_eq!((again.width(), again.format()), (4, PixelFormat::Rgb8));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_budget_evicts_oldest() {
        let device = device();
        let mut cache = BlurCache::with_budget(100);
        let a = cache.acquire(&device, PixelFormat::Rgb8, 4, 4).unwrap();
        let b = cache.acquire(&device, PixelFormat::Rgb8, 4, 4).unwrap();
        let c = cache.acquire(&device, PixelFormat::Rgb8, 4, 4).unwrap();
        cache.release(a);
        cache.release(b);
        cache.release(c);
        assert_eq!(cache.len(), 2);
        assert!(cache.size_bytes() <= 100);
    }

    #[test]
    fn test_invalidate_backend() {
        let device = device();
        let mut cache = BlurCache::new();
        let layer = cache.acquire(&device, PixelFormat::Mono8, 2, 2).unwrap();
        cache.release(layer);
        cache.invalidate_backend(BackendId::Gpu);
        assert_eq!(cache.len(), 1);
        cache.invalidate_backend(BackendId::Cpu);
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }
}
