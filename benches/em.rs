use criterion::black_box;
use criterion::BatchSize;
use criterion::Criterion;
use criterion::{criterion_group, criterion_main};
use mixem::prelude::*;
use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;

fn blobs(n: usize, dims: usize) -> Vec<DVector<f64>> {
    let mut rng = rand::rngs::SmallRng::seed_from_u64(0xABCD);
    let truth = Gmm::new(
        vec![0.5, 0.5],
        vec![
            MvGaussian::new(DVector::zeros(dims), DMatrix::identity(dims, dims))
                .unwrap(),
            MvGaussian::new(
                DVector::from_element(dims, 5.0),
                DMatrix::identity(dims, dims),
            )
            .unwrap(),
        ],
    )
    .unwrap();
    truth.sample(n, &mut rng)
}

fn bench_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("EmFit::estimate, K=2");
    for (n, dims) in [(500, 2), (500, 5), (2_000, 2)] {
        let xs = blobs(n, dims);
        let fitter = EmFit::new(
            50,
            1e-8,
            KMeans::default().with_seed(1),
            PositiveDefiniteConstraint,
        )
        .with_observer(NullObserver);
        group.bench_function(format!("N={n}, {dims} dims"), |b| {
            b.iter_batched_ref(
                || Gmm::with_dims(2, dims).unwrap(),
                |gmm| {
                    let (cpnts, weights) = gmm.parts_mut();
                    black_box(fitter.estimate(&xs, cpnts, weights, false))
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_estimate_diagonal(c: &mut Criterion) {
    let mut group = c.benchmark_group("EmFit::estimate, diagonal, K=2");
    for dims in [2, 5, 10] {
        let xs = blobs(1_000, dims);
        let fitter = EmFit::default()
            .with_constraint(DiagonalConstraint)
            .with_observer(NullObserver);
        group.bench_function(format!("{dims} dims"), |b| {
            b.iter_batched_ref(
                || Gmm::with_dims(2, dims).unwrap(),
                |gmm| {
                    let (cpnts, weights) = gmm.parts_mut();
                    black_box(fitter.estimate(&xs, cpnts, weights, false))
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_kmeans(c: &mut Criterion) {
    let mut group = c.benchmark_group("KMeans::cluster");
    for k in [2, 4, 8] {
        let xs = blobs(1_000, 3);
        let km = KMeans::default().with_seed(3);
        group.bench_function(format!("K={k}"), |b| {
            b.iter(|| black_box(km.cluster(&xs, k)))
        });
    }
}

criterion_group!(
    em_benches,
    bench_estimate,
    bench_estimate_diagonal,
    bench_kmeans
);
criterion_main!(em_benches);
