//! Error types for blacksilk-core.
//!
//! Most engine entry points report contract failures through `bool`/`Option`
//! returns. The fallible constructors in this crate (bitmaps, formats parsed
//! from identifiers) use [`Error`] instead so callers outside the engine can
//! propagate them with `?`.
//!
//! # Usage
//!
//! ```rust
//! use blacksilk_core::{Bitmap, Error, PixelFormat};
//!
//! let err = Bitmap::from_data(PixelFormat::Rgb8, 2, 2, vec![0; 3]).unwrap_err();
//! assert!(matches!(err, Error::BufferSizeMismatch { expected: 12, actual: 3 }));
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Width or height is zero, or too large to address.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// A buffer does not match the size implied by format and dimensions.
    ///
    /// `expected` is `width * height * pixel_size`.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },

    /// The format identifier or channel/byte combination is unknown.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// A rectangle reaches outside the buffer it addresses.
    #[error("region {x},{y} {width}x{height} exceeds {bound_width}x{bound_height}")]
    OutOfBounds {
        /// Region left edge.
        x: i32,
        /// Region top edge.
        y: i32,
        /// Region width.
        width: i32,
        /// Region height.
        height: i32,
        /// Width of the addressed buffer.
        bound_width: u32,
        /// Height of the addressed buffer.
        bound_height: u32,
    },
}
