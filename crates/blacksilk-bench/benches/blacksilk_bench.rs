//! Benchmarks for the CPU operations.
//!
//! Run with: `cargo bench -p blacksilk-bench`

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use blacksilk_bench::{cpu_device, gradient_layer};
use blacksilk_graphics::filters::{Cascade, CascadedSharpen};
use blacksilk_graphics::{Filter, ImageLayer, ops};

const SIZES: [u32; 2] = [256, 1024];

fn bench_blur(c: &mut Criterion) {
    let device = cpu_device();
    let mut group = c.benchmark_group("gaussian_blur");
    for size in SIZES {
        let src = gradient_layer(&device, size).expect("benchmark layer");
        let mut dst = src.new_like().expect("blur target");
        group.throughput(Throughput::Elements(size as u64 * size as u64));
        for radius in [2.0f32, 8.0] {
            group.bench_with_input(BenchmarkId::new(format!("r{radius}"), size), &src, |b, src| {
                b.iter(|| ops::gaussian_blur(&mut dst, src, src.rect(), black_box(radius)))
            });
        }
    }
    group.finish();
}

fn bench_monochrome(c: &mut Criterion) {
    let device = cpu_device();
    let mut group = c.benchmark_group("monochrome");
    for size in SIZES {
        let src = gradient_layer(&device, size).expect("benchmark layer");
        let mut dst = src.new_like().expect("monochrome target");
        group.throughput(Throughput::Elements(size as u64 * size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &src, |b, src| {
            b.iter(|| ops::convert_to_monochrome(&mut dst, src, src.rect(), black_box(ops::LUMA_WEIGHTS)))
        });
    }
    group.finish();
}

fn bench_sharpen(c: &mut Criterion) {
    let device = cpu_device();
    let mut group = c.benchmark_group("cascaded_sharpen");
    group.sample_size(20);
    for count in [3usize, 4] {
        let cascades: Vec<Cascade> = (0..count)
            .map(|i| Cascade {
                blur_radius: (1 << i) as f32,
                strength: 20.0,
            })
            .collect();
        let src = gradient_layer(&device, 512).expect("benchmark layer");
        let mut sharpen = CascadedSharpen::with_cascades(device.clone(), &cascades);
        let mut dst = ImageLayer::empty(src.format(), src.width(), src.height());
        // First run builds the blur buffers; the loop measures the combination.
        sharpen.process(&mut dst, &src);
        group.bench_with_input(BenchmarkId::from_parameter(count), &src, |b, src| {
            b.iter(|| sharpen.process(&mut dst, black_box(src)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_blur, bench_monochrome, bench_sharpen);
criterion_main!(benches);
