use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, SeedableRng};
use saliency_data::{
    transforms::{
        vision::{Normalize, RandomCrop, RandomFlip},
        RandomTransform, Transform,
    },
    MultiScaleCollator, SalientSample,
};
use tch::{Device, Kind, Tensor};

/// Benchmarks for the per-sample training augmentation and per-batch
/// multi-scale collation.
///
/// To run these, use:
/// ```bash
/// cargo bench --bench collate_bench
/// ```

/// Batch sizes swept by the collation benchmark.
const BATCH_SIZES: [usize; 3] = [4, 16, 32];
/// The smallest and largest default collation sizes.
const SCALES: [i64; 2] = [224, 352];

/// Builds a raw triple with DUTS-like dimensions and 0-255 values.
fn make_sample(height: i64, width: i64) -> SalientSample {
    SalientSample::new(
        Tensor::rand([height, width, 3], (Kind::Float, Device::Cpu)) * 255.0,
        Tensor::rand([height, width], (Kind::Float, Device::Cpu)) * 255.0,
        Tensor::rand([height, width], (Kind::Float, Device::Cpu)) * 255.0,
    )
    .expect("aligned sample")
}

/// Normalize -> RandomCrop -> RandomFlip on one 300x400 sample.
fn bench_augmentation(c: &mut Criterion) {
    let normalize = Normalize::duts();
    let flip = RandomFlip::default();
    let sample = make_sample(300, 400);
    let mut rng = StdRng::seed_from_u64(0);

    c.bench_function("train augmentation 300x400", |b| {
        b.iter(|| {
            let out: SalientSample = normalize.apply(sample.clone()).unwrap();
            let out: SalientSample = RandomCrop.apply_with(out, &mut rng).unwrap();
            let out: SalientSample = flip.apply_with(out, &mut rng).unwrap();
            black_box(out)
        })
    });
}

/// Resize + pack + stack at a fixed scale.
fn bench_collate(c: &mut Criterion) {
    let mut group = c.benchmark_group("Multi-scale Collation");
    let collator = MultiScaleCollator::default();

    for &batch_size in &BATCH_SIZES {
        let samples: Vec<_> = (0..batch_size)
            .map(|i| make_sample(280 + (i as i64 % 5) * 10, 360 + (i as i64 % 3) * 20))
            .collect();
        group.throughput(Throughput::Elements(batch_size as u64));

        for &scale in &SCALES {
            group.bench_with_input(
                BenchmarkId::new(format!("{scale}x{scale}"), batch_size),
                &samples,
                |b, samples| b.iter(|| black_box(collator.collate_at(samples, scale).unwrap())),
            );
        }
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(2))
        .measurement_time(std::time::Duration::from_secs(5))
        .sample_size(30);
    targets = bench_augmentation, bench_collate
);
criterion_main!(benches);
