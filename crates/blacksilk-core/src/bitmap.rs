//! Plain CPU pixel buffer.
//!
//! A [`Bitmap`] is what import/export plugins hand to the engine and what
//! they get back. It carries no backend state; layers and image objects
//! copy from and into it.
//!
//! ```rust
//! use blacksilk_core::{Bitmap, PixelFormat, Rect32I};
//!
//! let mut bmp = Bitmap::new(PixelFormat::Rgb8, 4, 2).unwrap();
//! bmp.pixel_mut(1, 1).copy_from_slice(&[10, 20, 30]);
//! let part = bmp.copy_region(Rect32I::new(1, 1, 1, 1)).unwrap();
//! assert_eq!(part.buffer(), &[10, 20, 30]);
//! ```

use crate::{Error, PixelFormat, Rect32I, Result};

/// Owned interleaved pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// Zero-initialized bitmap.
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Result<Self> {
        let size = Self::checked_size(format, width, height)?;
        Ok(Self {
            format,
            width,
            height,
            data: vec![0; size],
        })
    }

    /// Wraps existing bytes; the length must match exactly.
    pub fn from_data(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = Self::checked_size(format, width, height)?;
        if data.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    fn checked_size(format: PixelFormat, width: u32, height: u32) -> Result<usize> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        format
            .buffer_size(width, height)
            .ok_or(Error::InvalidDimensions { width, height })
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Full-size rectangle.
    #[inline]
    pub fn rect(&self) -> Rect32I {
        Rect32I::from_size(self.width, self.height)
    }

    /// Raw bytes.
    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw bytes.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes the bitmap, returning its bytes.
    pub fn into_buffer(self) -> Vec<u8> {
        self.data
    }

    /// Bytes of one row.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * self.format.pixel_size();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Bytes of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let px = self.format.pixel_size();
        let start = (y as usize * self.width as usize + x as usize) * px;
        &self.data[start..start + px]
    }

    /// Mutable bytes of one pixel.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let px = self.format.pixel_size();
        let start = (y as usize * self.width as usize + x as usize) * px;
        &mut self.data[start..start + px]
    }

    /// Copies `rect` into a new bitmap.
    pub fn copy_region(&self, rect: Rect32I) -> Result<Bitmap> {
        if rect.is_empty() || !rect.fits_within(self.width, self.height) {
            return Err(self.out_of_bounds(rect));
        }
        let px = self.format.pixel_size();
        let mut out = Vec::with_capacity(rect.area() as usize * px);
        for y in rect.y..rect.bottom() {
            let row = self.row(y as u32);
            out.extend_from_slice(&row[rect.x as usize * px..rect.right() as usize * px]);
        }
        Bitmap::from_data(self.format, rect.width as u32, rect.height as u32, out)
    }

    /// Writes `src` at (`dx`, `dy`); formats must match.
    pub fn paste(&mut self, src: &Bitmap, dx: i32, dy: i32) -> Result<()> {
        if src.format != self.format {
            return Err(Error::UnsupportedFormat(format!(
                "cannot paste {} into {}",
                src.format, self.format
            )));
        }
        let target = Rect32I::new(dx, dy, src.width as i32, src.height as i32);
        if !target.fits_within(self.width, self.height) {
            return Err(self.out_of_bounds(target));
        }
        let px = self.format.pixel_size();
        let stride = self.width as usize * px;
        for y in 0..src.height {
            let start = (dy as usize + y as usize) * stride + dx as usize * px;
            self.data[start..start + src.width as usize * px].copy_from_slice(src.row(y));
        }
        Ok(())
    }

    fn out_of_bounds(&self, rect: Rect32I) -> Error {
        Error::OutOfBounds {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            bound_width: self.width,
            bound_height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_rejected() {
        assert!(Bitmap::new(PixelFormat::Rgb8, 0, 4).is_err());
    }

    #[test]
    fn test_paste_roundtrip() {
        let mut big = Bitmap::new(PixelFormat::Mono16, 4, 4).unwrap();
        let small = Bitmap::from_data(PixelFormat::Mono16, 2, 1, vec![1, 2, 3, 4]).unwrap();
        big.paste(&small, 2, 3).unwrap();
        let back = big.copy_region(Rect32I::new(2, 3, 2, 1)).unwrap();
        assert_eq!(back, small);
        assert!(big.paste(&small, 3, 3).is_err());
    }
}
