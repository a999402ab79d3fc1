//! BSRAW container.
//!
//! A minimal uncompressed layout used to move pixels in and out of the
//! engine:
//!
//! ```text
//! offset  size  field
//! 0       8     magic "BSRAW\0\0\x01"
//! 8       4     width  (u32 LE)
//! 12      4     height (u32 LE)
//! 16      4     pixel format id (u32 LE)
//! 20      ...   interleaved samples, 16-bit samples little-endian
//! ```

use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use blacksilk_core::{Bitmap, PixelFormat};

/// File signature.
pub const MAGIC: &[u8; 8] = b"BSRAW\0\0\x01";

const HEADER_LEN: usize = 20;

/// Serializes `bitmap` into a byte vector.
pub fn encode(bitmap: &Bitmap) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + bitmap.buffer().len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&bitmap.width().to_le_bytes());
    out.extend_from_slice(&bitmap.height().to_le_bytes());
    out.extend_from_slice(&bitmap.format().id().to_le_bytes());
    if bitmap.format().bytes_per_channel() == 2 {
        for pair in bitmap.buffer().chunks_exact(2) {
            out.extend_from_slice(&u16::from_ne_bytes([pair[0], pair[1]]).to_le_bytes());
        }
    } else {
        out.extend_from_slice(bitmap.buffer());
    }
    out
}

/// Parses a BSRAW byte stream.
pub fn decode(bytes: &[u8]) -> Result<Bitmap> {
    ensure!(bytes.len() >= HEADER_LEN, "truncated header ({} bytes)", bytes.len());
    if &bytes[..8] != MAGIC {
        bail!("not a BSRAW file");
    }
    let field = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let (width, height) = (field(8), field(12));
    let format = PixelFormat::from_id(field(16))?;
    let expected = format
        .buffer_size(width, height)
        .with_context(|| format!("{width}x{height} image is too large"))?;
    let payload = &bytes[HEADER_LEN..];
    ensure!(
        payload.len() == expected,
        "payload holds {} bytes, {width}x{height} {format} needs {expected}",
        payload.len()
    );
    let data = if format.bytes_per_channel() == 2 {
        payload
            .chunks_exact(2)
            .flat_map(|pair| u16::from_le_bytes([pair[0], pair[1]]).to_ne_bytes())
            .collect()
    } else {
        payload.to_vec()
    };
    Ok(Bitmap::from_data(format, width, height, data)?)
}

/// Reads a BSRAW file.
pub fn read(path: &Path) -> Result<Bitmap> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read: {}", path.display()))?;
    decode(&bytes).with_context(|| format!("Failed to decode: {}", path.display()))
}

/// Writes a BSRAW file.
pub fn write(path: &Path, bitmap: &Bitmap) -> Result<()> {
    std::fs::write(path, encode(bitmap)).with_context(|| format!("Failed to write: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb16_round_trip() {
        let data: Vec<u8> = (0..2 * 2 * 6).map(|i| i as u8 * 11).collect();
        let bitmap = Bitmap::from_data(PixelFormat::Rgb16, 2, 2, data).unwrap();
        let bytes = encode(&bitmap);
        assert_eq!(bytes.len(), HEADER_LEN + 24);
        assert_eq!(decode(&bytes).unwrap(), bitmap);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(decode(b"BSRAW").is_err());
        let mut bytes = encode(&Bitmap::new(PixelFormat::Mono8, 2, 2).unwrap());
        bytes.pop();
        assert!(decode(&bytes).is_err());
        bytes[0] = b'X';
        assert!(decode(&bytes).is_err());
    }
}
