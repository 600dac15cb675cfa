// benches/bench_phase_scheduler.rs
use adaptive_signal::control_system::phase_scheduler::PhaseScheduler;
use adaptive_signal::shared_data::SampleCounts;
use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

// Pre-generated samples so the RNG stays out of the measured loop.
fn random_samples(n: usize) -> Vec<SampleCounts> {
    let mut rng = SmallRng::seed_from_u64(1);
    (0..n)
        .map(|_| SampleCounts {
            north: rng.random_range(0..=6),
            south: rng.random_range(0..=6),
            east: rng.random_range(0..=6),
            west: rng.random_range(0..=6),
        })
        .collect()
}

fn bench_phase_scheduler(c: &mut Criterion) {
    let mut group = c.benchmark_group("phase_scheduler");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    // One simulated tick every 33ms, over runs of different length.
    for &ticks in [300usize, 3_000, 30_000].iter() {
        let samples = random_samples(ticks);
        group.bench_function(format!("evaluate_{}_ticks", ticks), |b| {
            b.iter(|| {
                let t0 = Instant::now();
                let mut scheduler = PhaseScheduler::new(t0);
                for (i, counts) in samples.iter().enumerate() {
                    let now = t0 + Duration::from_millis(33 * i as u64);
                    black_box(scheduler.evaluate(counts, now));
                }
                black_box(&scheduler);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_phase_scheduler);
criterion_main!(benches);
