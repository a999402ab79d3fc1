//! Format mapping and bitmap layout checks.

use blacksilk_core::{Bitmap, Format, PixelFormat, Rect32I, from_compatible_format, to_compatible_format};

#[test]
fn test_every_format_maps_both_ways() {
    for format in Format::ALL {
        let pixel = from_compatible_format(format).unwrap();
        assert_eq!(to_compatible_format(pixel), format);
        assert_eq!(pixel.pixel_size() as u32, format.byte_size);
        assert_eq!(pixel.channel_count() as u32, format.channels);
    }
    for pixel in PixelFormat::ALL {
        assert_eq!(PixelFormat::from_id(pixel.id()).unwrap(), pixel);
        assert_eq!(pixel.name().parse::<PixelFormat>().unwrap(), pixel);
    }
}

#[test]
fn test_unsupported_combination() {
    let mut odd = Format::RGB8;
    odd.byte_size = 5;
    assert_eq!(from_compatible_format(odd), None);
    assert!(PixelFormat::from_id(0).is_err());
}

#[test]
fn test_bitmap_region_copy() {
    let data: Vec<u8> = (0..16).collect();
    let bitmap = Bitmap::from_data(PixelFormat::Mono8, 4, 4, data).unwrap();
    let region = bitmap.copy_region(Rect32I::new(1, 1, 2, 2)).unwrap();
    assert_eq!(region.buffer(), &[5, 6, 9, 10]);
    assert!(Bitmap::from_data(PixelFormat::Rgb8, 2, 2, vec![0; 5]).is_err());
}
