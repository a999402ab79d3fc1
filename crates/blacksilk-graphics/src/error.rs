//! Error types for blacksilk-graphics.
//!
//! Engine operations keep a `bool`/`Option` surface (a failed dispatch is a
//! caller bug, not a runtime condition). These enums cover the fallible
//! edges: device creation, layer construction and preset IO.

use thiserror::Error;

/// Backend, device and layer errors.
#[derive(Debug, Error)]
pub enum GraphicsError {
    /// Requested backend is not compiled in or has no usable device.
    #[error("backend not available: {0}")]
    BackendNotAvailable(String),

    /// No GPU adapter matched the request.
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    /// Device creation failed.
    #[error("failed to create device: {0}")]
    DeviceCreation(String),

    /// Worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    /// Backing storage could not be allocated.
    #[error("failed to allocate {width}x{height} {format} image on {backend}")]
    Allocation {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Pixel format name.
        format: String,
        /// Backend name.
        backend: String,
    },

    /// Layer holds no valid representation.
    #[error("layer '{0}' holds no valid data")]
    EmptyLayer(String),

    /// Layer size or format does not match its owner.
    #[error("layer mismatch: {0}")]
    LayerMismatch(String),

    /// Core type error.
    #[error(transparent)]
    Core(#[from] blacksilk_core::Error),
}

/// Result alias for graphics operations.
pub type GraphicsResult<T> = Result<T, GraphicsError>;

/// Preset file errors.
#[derive(Debug, Error)]
pub enum PresetError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed line in a text preset.
    #[error("line {line}: {msg}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        msg: String,
    },

    /// Preset has no filter name.
    #[error("preset '{0}' names no filter")]
    MissingFilter(String),
}

/// Result alias for preset IO.
pub type PresetResult<T> = Result<T, PresetError>;
