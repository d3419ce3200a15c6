//! Latency benchmarks for the per-request path
//!
//! Measures preprocessing and a full forward pass on a small randomly
//! initialised ViT, so no weights need to be downloaded.
//!
//! Run with: cargo bench -p vitserve-classifiers

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::vit;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};

use vitserve_classifiers::{
    ImageClassifier, ImageProcessor, ImageProcessorConfig, LabelTable, VitClassifier,
};

fn small_vit() -> VitClassifier {
    let config: vit::Config = serde_json::from_value(serde_json::json!({
        "hidden_size": 64,
        "num_hidden_layers": 2,
        "num_attention_heads": 4,
        "intermediate_size": 128,
        "hidden_act": "gelu",
        "layer_norm_eps": 1e-12,
        "image_size": 64,
        "patch_size": 16,
        "num_channels": 3,
        "qkv_bias": true
    }))
    .expect("valid ViT config");

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let processor = ImageProcessor::new(ImageProcessorConfig::default().with_size(64))
        .expect("valid processor config");
    let labels = LabelTable::new(["Real", "Fake"]).expect("non-empty labels");

    VitClassifier::from_parts("bench-vit", &config, processor, labels, vb).expect("model builds")
}

/// Benchmark resize + normalize for common input sizes
fn benchmark_preprocess(c: &mut Criterion) {
    let processor = ImageProcessor::new(ImageProcessorConfig::default()).expect("default config");

    let mut group = c.benchmark_group("Preprocess_224");
    for (name, width, height) in [("small", 64, 64), ("native", 224, 224), ("photo", 1024, 768)] {
        let image = RgbImage::from_pixel(width, height, Rgb([90, 140, 200]));
        group.bench_with_input(BenchmarkId::new("preprocess", name), &image, |b, image| {
            b.iter(|| processor.preprocess(black_box(image), &Device::Cpu).unwrap());
        });
    }
    group.finish();
}

/// Benchmark a full classify call on the small model
fn benchmark_classify(c: &mut Criterion) {
    let classifier = small_vit();
    let image = RgbImage::from_pixel(224, 224, Rgb([10, 20, 30]));

    c.bench_function("classify_small_vit", |b| {
        b.iter(|| classifier.classify(black_box(&image)).unwrap());
    });
}

criterion_group!(benches, benchmark_preprocess, benchmark_classify);
criterion_main!(benches);
