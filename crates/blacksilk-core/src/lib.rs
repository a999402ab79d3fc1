//! # blacksilk-core
//!
//! Core types shared by every blacksilk crate.
//!
//! - [`Format`], [`PixelFormat`] - Backend-neutral and backend pixel layouts
//! - [`Rect32I`], [`Point32F`] and friends - Geometry used by operations
//! - [`Bitmap`] - Plain CPU pixel buffer, the data-transfer surface for plugins
//! - [`curve`] - Curve sampling (linear and bezier) for tone curves
//! - [`color`] - Small typed color values stored in filter presets
//!
//! ## Crate Structure
//!
//! ```text
//! blacksilk-core (this crate)
//!    ^
//!    |
//!    +-- blacksilk-graphics (backends, layers, operations, filters)
//!    +-- blacksilk-cli
//! ```
//!
//! ## Example
//!
//! ```rust
//! use blacksilk_core::{Format, PixelFormat, from_compatible_format, to_compatible_format};
//!
//! let format = Format::RGB8;
//! let pixel = from_compatible_format(format).unwrap();
//! assert_eq!(pixel, PixelFormat::Rgb8);
//! assert_eq!(to_compatible_format(pixel), format);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bitmap;
pub mod color;
pub mod curve;
pub mod error;
pub mod format;
pub mod geometry;

pub use bitmap::Bitmap;
pub use color::{Argb8, Argb16, Mono8, Mono16, Rgb8, Rgb16};
pub use curve::{Curve, calc_bezier, calc_linear};
pub use error::{Error, Result};
pub use format::{Format, FormatFamily, PixelFormat, from_compatible_format, to_compatible_format};
pub use geometry::{Line32F, Point32F, Point32I, Rect32F, Rect32I};

/// Prelude module for convenient imports.
///
/// ```
/// use blacksilk_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bitmap::Bitmap;
    pub use crate::curve::Curve;
    pub use crate::error::{Error, Result};
    pub use crate::format::{Format, FormatFamily, PixelFormat};
    pub use crate::geometry::{Point32F, Point32I, Rect32I};
}
