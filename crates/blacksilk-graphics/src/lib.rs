//! Dual-backend image processing for blacksilk.
//!
//! Layers hold one representation per backend. Operations run on every
//! backend that holds valid data for all participating layers, falling back
//! to a composition of simpler operations where a backend has no kernel.
//! Filters wrap operations with state and preset serialization.
//!
//! # Architecture
//!
//! ```text
//! FilterStack / FilterCollection
//!     └── Filter (BWMixer, Vignette, CascadedSharpen, FilmGrain, ...)
//!             └── ops (dispatch by BackendId + KernelTable, generic fallback)
//!                     └── ImageLayer ── Representation per backend
//!                             ├── CpuImageObject (rayon)
//!                             └── GpuImageObject (wgpu, feature "wgpu")
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use blacksilk_core::PixelFormat;
//! use blacksilk_graphics::{BackendDevice, CpuDevice, ImageLayer, Filter};
//! use blacksilk_graphics::filters::BWMixer;
//!
//! let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
//! let data = vec![200u8, 100, 50, 10, 20, 30];
//! let src = ImageLayer::from_data(&device, PixelFormat::Rgb8, 2, 1, &data).unwrap();
//! let mut dst = src.new_like().unwrap();
//!
//! let mut mixer = BWMixer::new(device.clone());
//! mixer.set_sensitivities(1.0, 0.0, 0.0);
//! assert!(mixer.process(&mut dst, &src));
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod blur_cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod filter;
pub mod filters;
pub mod image;
pub mod layer;
pub mod ops;
pub mod preset;
pub mod stack;
pub mod task;

pub use backend::{
    BackendDevice, BackendId, BackendKind, CpuDevice, CpuImageObject, ImageObject, Resource, create_device,
};
#[cfg(feature = "wgpu")]
pub use backend::{GpuDevice, GpuImageObject};
pub use blur_cache::BlurCache;
pub use collection::FilterCollection;
pub use config::DeviceConfig;
pub use error::{GraphicsError, GraphicsResult, PresetError, PresetResult};
pub use filter::{Filter, apply_filter};
pub use image::{Image, ImageMeta};
pub use layer::{ImageLayer, SharedLayer};
pub use preset::{FilterPreset, FilterPresetCollection};
pub use stack::FilterStack;
pub use task::{
    AsyncTask, BackgroundTask, LogListener, PrepareSharpenTask, RenderGrainTask, Session, TaskListener, run_task,
};
