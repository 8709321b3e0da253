use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use galaxy_zoo::data::MemoryImageStore;
use galaxy_zoo::features::KMeansFeatures;
use galaxy_zoo::training::{ExtraTrees, ForestParams, RandomForest, Regressor, RidgeRegression};
use image::{Rgb, RgbImage};
use ndarray::Array2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize, n_outputs: usize) -> (Array2<f64>, Array2<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>());
    let y = Array2::from_shape_fn((n_rows, n_outputs), |(i, k)| {
        (x[[i, k % n_features]] + 0.1 * rng.gen::<f64>()).min(1.0)
    });
    (x, y)
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    for n_rows in [500, 2000].iter() {
        let (x, y) = create_regression_data(*n_rows, 75, 37);

        group.bench_with_input(BenchmarkId::new("random_forest", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = RandomForest::new(ForestParams::default().with_n_estimators(10));
                model.fit(black_box(x), black_box(y)).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("extra_trees", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = ExtraTrees::new(ForestParams::default().with_n_estimators(10));
                model.fit(black_box(x), black_box(y)).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("ridge", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = RidgeRegression::new(14.0);
                model.fit(black_box(x), black_box(y)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_kmeans_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans_features");
    group.sample_size(10);

    let mut store = MemoryImageStore::new();
    for id in 0..50u64 {
        store.insert(
            id,
            RgbImage::from_fn(60, 60, |x, y| {
                let v = ((x * 13 + y * 7 + id as u32 * 31) % 256) as u8;
                Rgb([v, v / 2, 255 - v])
            }),
        );
    }

    let mut km = KMeansFeatures::new(6, 50, 5000).with_crop(Some(50), 0.5).with_max_iter(20);
    group.bench_function("fit", |b| b.iter(|| km.clone().fit(black_box(&store)).map(|_| ()).unwrap()));

    km.fit(&store).unwrap();
    group.bench_function("transform", |b| b.iter(|| km.transform(black_box(&store), 50).unwrap()));

    group.finish();
}

criterion_group!(benches, bench_training, bench_kmeans_features);
criterion_main!(benches);
