//! End-to-end checks of layers, filters and presets on the CPU backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use blacksilk_core::{PixelFormat, Rect32I};
use blacksilk_graphics::backend::tiling::{tile_count_for_rectangle, tiles_for_rectangle};
use blacksilk_graphics::filters::{BWMixer, Cascade, CascadedSharpen, FilmGrain, Vignette, create_filter};
use blacksilk_graphics::ops;
use blacksilk_graphics::{
    BackendDevice, CpuDevice, Filter, FilterPreset, FilterStack, ImageLayer, Resource,
};

fn cpu() -> Arc<dyn BackendDevice> {
    Arc::new(CpuDevice::new())
}

/// 2x2 RGB8 test card.
fn card(device: &Arc<dyn BackendDevice>) -> ImageLayer {
    let data = [
        200u8, 40, 10, //
        10, 180, 60, //
        30, 30, 220, //
        128, 128, 128,
    ];
    ImageLayer::from_data(device, PixelFormat::Rgb8, 2, 2, &data).unwrap()
}

#[test]
fn test_resource_single_owner_across_threads() {
    let resource = Arc::new(Resource::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let resource = resource.clone();
            let inside = inside.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    resource.acquire();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    inside.fetch_sub(1, Ordering::SeqCst);
                    assert!(resource.release());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(!resource.is_acquired());
}

#[test]
fn test_stack_matches_sequential_application() {
    let device = cpu();
    let src = card(&device);

    let mut mixer = BWMixer::new(device.clone());
    mixer.set_sensitivities(0.3, 0.5, 0.2);
    let mut vignette = Vignette::new(device.clone());
    vignette.set_strength(80.0);

    let mut mid = ImageLayer::empty(PixelFormat::Rgb8, 2, 2);
    let mut expected = ImageLayer::empty(PixelFormat::Rgb8, 2, 2);
    assert!(mixer.process(&mut mid, &src));
    assert!(vignette.process(&mut expected, &mid));

    let mut stack = FilterStack::new().with(Box::new(mixer)).with(Box::new(vignette));
    let mut actual = ImageLayer::empty(PixelFormat::Rgb8, 2, 2);
    assert!(stack.process(&mut actual, &src));

    assert_eq!(actual.retrieve_bitmap(), expected.retrieve_bitmap());
}

#[test]
fn test_cascade_counts_render() {
    let device = cpu();
    let src = card(&device);
    for count in [3usize, 4, 5] {
        let cascades: Vec<Cascade> = (0..count)
            .map(|i| Cascade {
                blur_radius: 1.0 + i as f32,
                strength: 20.0,
            })
            .collect();
        let mut sharpen = CascadedSharpen::with_cascades(device.clone(), &cascades);
        let mut dst = ImageLayer::empty(PixelFormat::Rgb8, 2, 2);
        assert!(sharpen.process(&mut dst, &src), "{count} cascades");
        assert_eq!((dst.width(), dst.height(), dst.format()), (2, 2, PixelFormat::Rgb8));
        assert!(!sharpen.needs_update());
    }
}

#[test]
fn test_bwmixer_preset_survives_text_file() {
    let device = cpu();
    let mut mixer = BWMixer::new(device.clone());
    mixer.set_sensitivities(0.3, 0.5, 0.2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixer.preset");
    mixer.to_preset().write_to_file(&path).unwrap();

    let preset = FilterPreset::read_from_file(&path).unwrap();
    assert_eq!(preset.filter_name(), BWMixer::NAME);
    let mut restored = create_filter(BWMixer::NAME, device).unwrap();
    assert!(restored.from_preset(&preset));
    assert_eq!(restored.to_preset(), mixer.to_preset());
}

#[test]
fn test_monochrome_red_only_copies_red_channel() {
    let device = cpu();
    let src = card(&device);
    let mut dst = src.new_like().unwrap();
    assert!(ops::convert_to_monochrome(&mut dst, &src, src.rect(), [1.0, 0.0, 0.0]));
    let out = dst.retrieve_bitmap().unwrap();
    let reds: Vec<u8> = src.retrieve_bitmap().unwrap().buffer().chunks(3).map(|p| p[0]).collect();
    for (px, red) in out.buffer().chunks(3).zip(reds) {
        assert_eq!(px, [red, red, red]);
    }
}

#[test]
fn test_retrieve_upload_is_bit_identical() {
    let device = cpu();
    let values: Vec<u8> = (0..4 * 3 * 3 * 2).map(|i| (i * 37 % 256) as u8).collect();
    let src = ImageLayer::from_data(&device, PixelFormat::Rgb16, 4, 3, &values).unwrap();
    let bitmap = src.retrieve_bitmap().unwrap();
    assert_eq!(bitmap.buffer(), values.as_slice());

    let mut copy = ImageLayer::new(&device, PixelFormat::Rgb16, 4, 3).unwrap();
    assert!(copy.upload(bitmap.buffer(), copy.rect()));
    assert_eq!(copy.retrieve_bitmap().unwrap(), bitmap);
}

#[test]
fn test_tile_counts() {
    let area = Rect32I::from_size(2048, 1024);
    assert_eq!(tile_count_for_rectangle(area, 1024), 5);
    let tiles = tiles_for_rectangle(area, 1024);
    assert_eq!(tiles.len(), 6);
    let covered: i64 = tiles.iter().map(|t| t.width as i64 * t.height as i64).sum();
    assert_eq!(covered, 2048 * 1024);
}

#[test]
fn test_film_grain_keeps_shape() {
    let device = cpu();
    let src = card(&device);
    let mut grain = FilmGrain::new(device);
    grain.set_seed(7);
    let mut dst = ImageLayer::empty(PixelFormat::Mono8, 1, 1);
    assert!(grain.process(&mut dst, &src));
    assert_eq!((dst.width(), dst.height(), dst.format()), (2, 2, PixelFormat::Rgb8));
    assert_eq!(grain.grain().map(|g| g.format()), Some(PixelFormat::Rgb8));
}
