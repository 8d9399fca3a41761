use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};
use lab_monitor::capture::Frame;
use lab_monitor::preprocess::{PreprocessConfig, Preprocessor};

fn synthetic_frame(width: u32, height: u32) -> Frame {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    });
    Frame::from_rgb(&image, 92, 1).expect("encode synthetic frame")
}

fn bench_enhance(c: &mut Criterion) {
    let preprocessor = Preprocessor::new(PreprocessConfig::default());
    let vga = synthetic_frame(640, 480);
    let full_hd = synthetic_frame(1920, 1080);

    c.bench_function("preprocess.enhance.640x480", |b| {
        b.iter(|| preprocessor.enhance(black_box(&vga)));
    });
    c.bench_function("preprocess.enhance.1920x1080", |b| {
        b.iter(|| preprocessor.enhance(black_box(&full_hd)));
    });
}

fn bench_filters_only(c: &mut Criterion) {
    let preprocessor = Preprocessor::new(PreprocessConfig::default());
    let image = RgbImage::from_pixel(640, 480, Rgb([90, 140, 200]));

    c.bench_function("preprocess.apply_filters.640x480", |b| {
        b.iter(|| preprocessor.apply_filters(black_box(&image)));
    });
}

criterion_group!(benches, bench_enhance, bench_filters_only);
criterion_main!(benches);
