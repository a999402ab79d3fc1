//! Pixel layouts.
//!
//! Two views of the same thing:
//!
//! - [`Format`] - backend-neutral description (family, channels, byte size, bit depth)
//! - [`PixelFormat`] - the enum backends and image objects are keyed by
//!
//! Byte size and channel count jointly pick exactly one [`PixelFormat`], so
//! the conversion in both directions is lossless for the six supported
//! layouts (Mono8/16, RGB8/16, RGBA8/16).
//!
//! # Usage
//!
//! ```rust
//! use blacksilk_core::format::{Format, PixelFormat, from_compatible_format};
//!
//! let f = Format::RGBA16;
//! assert_eq!(f.byte_size, 8);
//! assert_eq!(from_compatible_format(f), Some(PixelFormat::Rgba16));
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Channel family of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatFamily {
    /// Single gray channel.
    Mono,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
}

impl FormatFamily {
    /// Number of channels for this family.
    #[inline]
    pub const fn channels(&self) -> u32 {
        match self {
            Self::Mono => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Backend-neutral pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Format {
    /// Channel family.
    pub family: FormatFamily,
    /// Channel count (1, 3 or 4).
    pub channels: u32,
    /// Bytes per pixel.
    pub byte_size: u32,
    /// Bits per channel (8 or 16).
    pub bit_depth: u32,
}

impl Format {
    /// 8-bit gray.
    pub const MONO8: Format = Format::new(FormatFamily::Mono, 8);
    /// 16-bit gray.
    pub const MONO16: Format = Format::new(FormatFamily::Mono, 16);
    /// 8-bit RGB.
    pub const RGB8: Format = Format::new(FormatFamily::Rgb, 8);
    /// 16-bit RGB.
    pub const RGB16: Format = Format::new(FormatFamily::Rgb, 16);
    /// 8-bit RGBA.
    pub const RGBA8: Format = Format::new(FormatFamily::Rgba, 8);
    /// 16-bit RGBA.
    pub const RGBA16: Format = Format::new(FormatFamily::Rgba, 16);

    /// All supported layouts.
    pub const ALL: [Format; 6] = [
        Self::MONO8,
        Self::MONO16,
        Self::RGB8,
        Self::RGB16,
        Self::RGBA8,
        Self::RGBA16,
    ];

    /// Builds a format from family and bit depth; byte size follows.
    pub const fn new(family: FormatFamily, bit_depth: u32) -> Self {
        let channels = family.channels();
        Self {
            family,
            channels,
            byte_size: channels * (bit_depth / 8),
            bit_depth,
        }
    }
}

/// Backend pixel-format enum.
///
/// Storage is interleaved, 8-bit samples as `u8`, 16-bit samples as
/// native-endian `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum PixelFormat {
    /// 8-bit gray.
    Mono8 = 1,
    /// 16-bit gray.
    Mono16 = 2,
    /// 8-bit RGB.
    Rgb8 = 3,
    /// 16-bit RGB.
    Rgb16 = 4,
    /// 8-bit RGBA.
    Rgba8 = 5,
    /// 16-bit RGBA.
    Rgba16 = 6,
}

impl PixelFormat {
    /// All supported pixel formats.
    pub const ALL: [PixelFormat; 6] = [
        Self::Mono8,
        Self::Mono16,
        Self::Rgb8,
        Self::Rgb16,
        Self::Rgba8,
        Self::Rgba16,
    ];

    /// Channels per pixel.
    #[inline]
    pub const fn channel_count(&self) -> usize {
        match self {
            Self::Mono8 | Self::Mono16 => 1,
            Self::Rgb8 | Self::Rgb16 => 3,
            Self::Rgba8 | Self::Rgba16 => 4,
        }
    }

    /// Bytes per channel sample.
    #[inline]
    pub const fn bytes_per_channel(&self) -> usize {
        match self {
            Self::Mono8 | Self::Rgb8 | Self::Rgba8 => 1,
            Self::Mono16 | Self::Rgb16 | Self::Rgba16 => 2,
        }
    }

    /// Bytes per pixel.
    #[inline]
    pub const fn pixel_size(&self) -> usize {
        self.channel_count() * self.bytes_per_channel()
    }

    /// Largest sample value.
    #[inline]
    pub const fn max_value(&self) -> u32 {
        match self.bytes_per_channel() {
            1 => u8::MAX as u32,
            _ => u16::MAX as u32,
        }
    }

    /// Bytes needed for a `width` x `height` buffer, `None` on overflow.
    pub fn buffer_size(&self, width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.pixel_size())
    }

    /// Stable numeric identifier, used by on-disk containers.
    #[inline]
    pub const fn id(&self) -> u32 {
        *self as u32
    }

    /// Looks up a format by its [`id`](Self::id).
    pub fn from_id(id: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.id() == id)
            .ok_or_else(|| Error::UnsupportedFormat(format!("id {id}")))
    }

    /// Short lowercase name (`"rgb8"`).
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mono8 => "mono8",
            Self::Mono16 => "mono16",
            Self::Rgb8 => "rgb8",
            Self::Rgb16 => "rgb16",
            Self::Rgba8 => "rgba8",
            Self::Rgba16 => "rgba16",
        }
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == lower)
            .ok_or_else(|| Error::UnsupportedFormat(s.to_string()))
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps a neutral [`Format`] to the backend enum.
///
/// Only byte size and channel count are consulted. Returns `None` for
/// combinations no backend supports.
pub fn from_compatible_format(format: Format) -> Option<PixelFormat> {
    match (format.channels, format.byte_size) {
        (1, 1) => Some(PixelFormat::Mono8),
        (1, 2) => Some(PixelFormat::Mono16),
        (3, 3) => Some(PixelFormat::Rgb8),
        (3, 6) => Some(PixelFormat::Rgb16),
        (4, 4) => Some(PixelFormat::Rgba8),
        (4, 8) => Some(PixelFormat::Rgba16),
        _ => None,
    }
}

/// Maps a backend enum back to its neutral [`Format`].
pub fn to_compatible_format(format: PixelFormat) -> Format {
    match format {
        PixelFormat::Mono8 => Format::MONO8,
        PixelFormat::Mono16 => Format::MONO16,
        PixelFormat::Rgb8 => Format::RGB8,
        PixelFormat::Rgb16 => Format::RGB16,
        PixelFormat::Rgba8 => Format::RGBA8,
        PixelFormat::Rgba16 => Format::RGBA16,
    }
}

impl From<PixelFormat> for Format {
    fn from(value: PixelFormat) -> Self {
        to_compatible_format(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_sizes() {
        assert_eq!(Format::MONO8.byte_size, 1);
        assert_eq!(Format::MONO16.byte_size, 2);
        assert_eq!(Format::RGB16.byte_size, 6);
        assert_eq!(Format::RGBA8.byte_size, 4);
    }

    #[test]
    fn test_unknown_combination() {
        let odd = Format {
            family: FormatFamily::Rgb,
            channels: 3,
            byte_size: 12,
            bit_depth: 32,
        };
        assert_eq!(from_compatible_format(odd), None);
    }

    #[test]
    fn test_id_and_name_lookup() {
        for f in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_id(f.id()).unwrap(), f);
            assert_eq!(f.name().parse::<PixelFormat>().unwrap(), f);
        }
        assert!(PixelFormat::from_id(99).is_err());
    }
}
