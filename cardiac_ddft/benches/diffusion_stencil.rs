/// Profiler friendly version of the host-side diffusion reference used by
/// the integration tests, run at a grid size large enough to show up in a
/// flamegraph.
use criterion::{criterion_group, criterion_main, Criterion};

use cardiac_ddft::mathref::neumann_laplacian_grid;

fn my_benchmark(c: &mut Criterion) {
    const NX: usize = 512;
    const NY: usize = 512;
    let v: Vec<f64> = (0..NX * NY)
        .map(|i| ((i as f64) * 0.01).sin())
        .collect();

    c.bench_function("neumann_laplacian_grid_512x512", |b| {
        b.iter(|| neumann_laplacian_grid(&v, NX, NY, 1.0, 1.0))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = my_benchmark
}
criterion_main!(benches);
