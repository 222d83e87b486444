use criterion::black_box;
use criterion::BatchSize;
use criterion::Criterion;
use criterion::{criterion_group, criterion_main};
use mixem::dist::MvGaussian;
use mixem::traits::*;
use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;

fn bench_mvg_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("MvGaussian, draw 1");
    for dims in [2, 3, 5, 10] {
        group.bench_with_input(format!("{} dims", dims), &dims, |b, &dims| {
            let mvg = MvGaussian::standard(dims).unwrap();
            b.iter_batched_ref(
                rand::thread_rng,
                |mut rng| black_box::<DVector<f64>>(mvg.draw(&mut rng)),
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_mvg_ln_f(c: &mut Criterion) {
    let mut group = c.benchmark_group("MvGaussian ln f(x)");
    for dims in [2, 3, 5, 10] {
        let mvg = &MvGaussian::standard(dims).unwrap();
        let x = DVector::<f64>::zeros(dims);
        group.bench_function(format!("{} dims", dims), |b| {
            b.iter(|| black_box(mvg.ln_f(&x)))
        });
    }
}

// Setting the covariance refactors it
fn bench_mvg_set_cov(c: &mut Criterion) {
    let mut group = c.benchmark_group("MvGaussian set_cov");
    for dims in [2, 5, 10, 20] {
        let mut rng = rand::rngs::SmallRng::seed_from_u64(dims as u64);
        let a = DMatrix::<f64>::from_fn(dims, dims, |_, _| {
            rand::Rng::gen_range(&mut rng, -1.0..1.0)
        });
        let cov = &a * a.transpose() + DMatrix::identity(dims, dims);
        group.bench_function(format!("{} dims", dims), |b| {
            b.iter_batched_ref(
                || MvGaussian::standard(dims).unwrap(),
                |mvg| mvg.set_cov_unchecked(black_box(cov.clone())),
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_mvg_probability(c: &mut Criterion) {
    let mvg = MvGaussian::standard(5).unwrap();
    let mut rng = rand::rngs::SmallRng::seed_from_u64(0x1234);
    let mut group = c.benchmark_group("5-D MvGaussian, probability");
    for n in [10, 100, 1_000] {
        let xs: Vec<DVector<f64>> = mvg.sample(n, &mut rng);
        group.bench_with_input(n.to_string(), &xs, |b, xs| {
            b.iter(|| black_box(mvg.probability(xs)))
        });
    }
}

criterion_group!(
    mvg_benches,
    bench_mvg_draw,
    bench_mvg_ln_f,
    bench_mvg_set_cov,
    bench_mvg_probability
);
criterion_main!(mvg_benches);
