use criterion::{Criterion, criterion_group, criterion_main};
use srf_cavity::tolerance::tolerance_factor;
use std::hint::black_box;

fn bench_tolerance(c: &mut Criterion) {
    c.bench_function("tolerance_factor_sweep", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            let mut steps = 1.0;
            while steps < 1e8 {
                acc += tolerance_factor(black_box(steps));
                steps *= 1.5;
            }
            acc
        })
    });

    c.bench_function("tolerance_factor_interpolated", |b| {
        b.iter(|| tolerance_factor(black_box(500_000.0)))
    });
}

criterion_group!(benches, bench_tolerance);
criterion_main!(benches);
