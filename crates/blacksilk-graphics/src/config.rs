//! Device configuration.

use serde::{Deserialize, Serialize};

/// Default edge length of GPU texture limits when the adapter reports none.
pub const DEFAULT_MAX_TEXTURE_DIM: u32 = 16384;

/// Settings shared by CPU and GPU devices.
///
/// ```rust
/// use blacksilk_graphics::DeviceConfig;
///
/// let config = DeviceConfig::default().with_worker_threads(4).with_pool_attempts(2);
/// assert_eq!(config.worker_threads, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// CPU worker threads; 0 uses the global rayon pool.
    pub worker_threads: usize,
    /// Maximum number of pooled GPU buffers kept alive.
    pub pool_capacity: usize,
    /// Candidates tried before the pool allocates a fresh buffer.
    pub pool_attempts: usize,
    /// Largest accepted image edge.
    pub max_texture_dim: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            pool_capacity: 32,
            pool_attempts: 8,
            max_texture_dim: DEFAULT_MAX_TEXTURE_DIM * 2,
        }
    }
}

impl DeviceConfig {
    /// Sets the CPU worker count.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Sets the GPU pool capacity.
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Sets the bounded acquire attempts.
    pub fn with_pool_attempts(mut self, attempts: usize) -> Self {
        self.pool_attempts = attempts.max(1);
        self
    }

    /// Sets the largest accepted image edge.
    pub fn with_max_texture_dim(mut self, dim: u32) -> Self {
        self.max_texture_dim = dim;
        self
    }
}
