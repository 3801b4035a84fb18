use batchnorm::layers::{BatchNormalization, LayerTrait};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array2, Array3, ArrayD};

fn batch_2d(rows: usize, features: usize) -> ArrayD<f32> {
    Array2::from_shape_fn((rows, features), |(i, j)| ((i * 31 + j * 7) % 97) as f32 * 0.1).into_dyn()
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for &rows in &[32usize, 256, 2048] {
        let x = batch_2d(rows, 64);

        group.bench_with_input(BenchmarkId::new("per_batch", rows), &x, |b, x| {
            let mut layer = BatchNormalization::with_mode(&[64], 0).unwrap();
            b.iter(|| layer.normalize(black_box(x.view()), true).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("running_train", rows), &x, |b, x| {
            let mut layer = BatchNormalization::with_mode(&[64], 1).unwrap();
            b.iter(|| layer.normalize(black_box(x.view()), true).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("running_infer", rows), &x, |b, x| {
            let mut layer = BatchNormalization::with_mode(&[64], 1).unwrap();
            b.iter(|| layer.normalize(black_box(x.view()), false).unwrap());
        });
    }

    group.finish();
}

fn bench_sequence_input(c: &mut Criterion) {
    let x = Array3::from_shape_fn((32, 50, 64), |(a, t, f)| ((a + t * 3 + f) % 23) as f32).into_dyn();
    let mut layer = BatchNormalization::with_mode(&[50, 64], 1).unwrap();

    c.bench_function("normalize_sequence_32x50x64", |b| {
        b.iter(|| layer.normalize(black_box(x.view()), true).unwrap())
    });
}

fn bench_backward(c: &mut Criterion) {
    let x = batch_2d(256, 64);
    let dy = batch_2d(256, 64);
    let layer = BatchNormalization::with_mode(&[64], 0).unwrap();

    c.bench_function("backward_256x64", |b| {
        b.iter(|| layer.backward(black_box(x.view()), black_box(dy.view()), true).unwrap())
    });
}

criterion_group!(benches, bench_normalize, bench_sequence_input, bench_backward);
criterion_main!(benches);
