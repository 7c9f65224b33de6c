mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_qr_live::config::PreprocessConfig;
use rust_qr_live::preprocess::Preprocessor;
use rust_qr_live::preprocess::filters::{adjust_contrast, enhance_edges, sharpen};
use rust_qr_live::utils::binarization::{AdaptiveParams, adaptive_threshold};
use rust_qr_live::utils::grayscale::rgb_to_grayscale;

fn bench_grayscale(c: &mut Criterion) {
    let image = vec![128u8; 1280 * 720 * 3];
    c.bench_function("grayscale_1280x720", |b| {
        b.iter(|| rgb_to_grayscale(black_box(&image), black_box(1280), black_box(720)))
    });
}

fn bench_contrast(c: &mut Criterion) {
    let mut image = vec![100u8; 1280 * 720];
    c.bench_function("contrast_1280x720", |b| {
        b.iter(|| adjust_contrast(black_box(&mut image), 1, 1, 1.3))
    });
}

fn bench_sharpen(c: &mut Criterion) {
    let image = vec![100u8; 1280 * 720];
    c.bench_function("sharpen_1280x720", |b| {
        b.iter(|| sharpen(black_box(&image), 1280, 720, 1, 1))
    });
}

fn bench_threshold(c: &mut Criterion) {
    let gray = common::qr_frame("threshold", 1280, 720, 400, 150, 12).into_pixels();
    let per_pixel = AdaptiveParams {
        sample_step: 1,
        ..AdaptiveParams::default()
    };
    c.bench_function("adaptive_threshold_step2_1280x720", |b| {
        b.iter(|| adaptive_threshold(black_box(&gray), 1280, 720, AdaptiveParams::default()))
    });
    c.bench_function("adaptive_threshold_step1_1280x720", |b| {
        b.iter(|| adaptive_threshold(black_box(&gray), 1280, 720, per_pixel))
    });
}

fn bench_edges(c: &mut Criterion) {
    let gray = common::qr_frame("edges", 1280, 720, 400, 150, 12).into_pixels();
    c.bench_function("enhance_edges_1280x720", |b| {
        b.iter(|| {
            let mut pixels = gray.clone();
            enhance_edges(black_box(&mut pixels), 1280, 720, 1, 1, 96)
        })
    });
}

fn bench_full_preprocess(c: &mut Criterion) {
    let frame = common::to_rgb(&common::qr_frame("full", 1280, 720, 400, 150, 12));
    let mut default = Preprocessor::new(PreprocessConfig {
        budget_ms: u64::MAX,
        ..PreprocessConfig::default()
    });
    let mut everything = Preprocessor::new(PreprocessConfig {
        threshold_enabled: true,
        edge_enhancement: true,
        budget_ms: u64::MAX,
        ..PreprocessConfig::default()
    });
    c.bench_function("preprocess_default_1280x720", |b| {
        b.iter(|| default.process(black_box(&frame)))
    });
    c.bench_function("preprocess_all_stages_1280x720", |b| {
        b.iter(|| everything.process(black_box(&frame)))
    });
}

criterion_group!(
    benches,
    bench_grayscale,
    bench_contrast,
    bench_sharpen,
    bench_threshold,
    bench_edges,
    bench_full_preprocess
);
criterion_main!(benches);
