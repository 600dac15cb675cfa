// benches/bench_direction_scorer.rs
use adaptive_signal::control_system::direction_scorer::{score, score_axis};
use adaptive_signal::shared_data::{Axis, SampleCounts};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

fn bench_direction_scorer(c: &mut Criterion) {
    let mut group = c.benchmark_group("direction_scorer");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));

    group.bench_function("score_grid_32x32", |b| {
        b.iter(|| {
            let mut total = 0u64;
            for axis_max in 0..32u32 {
                for other in 0..32u32 {
                    total += score(black_box(axis_max), black_box(other));
                }
            }
            black_box(total)
        });
    });

    let counts = SampleCounts::new(4, 1, 2, 7);
    group.bench_function("score_axis", |b| {
        b.iter(|| {
            black_box(score_axis(Axis::EW, black_box(&counts)));
            black_box(score_axis(Axis::NS, black_box(&counts)));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_direction_scorer);
criterion_main!(benches);
