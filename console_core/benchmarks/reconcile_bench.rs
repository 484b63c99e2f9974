use console_core::{EntityCategory, EventPhase, LatLon, SnapshotReconciler, TrackedEntity};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn snapshot(size: usize, shift: f64) -> Vec<TrackedEntity> {
    (0..size)
        .map(|i| TrackedEntity {
            id: format!("agent-{i}"),
            position: LatLon::new(23.13 + (i % 100) as f64 * 0.001 + shift, 75.73 + (i / 100) as f64 * 0.001),
            category: match i % 3 {
                0 => EntityCategory::Random,
                1 => EntityCategory::Routed,
                _ => EntityCategory::Event(EventPhase::ToDest),
            },
            stopped: i % 17 == 0,
        })
        .collect()
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for size in [100usize, 1_000, 5_000, 20_000] {
        let first = snapshot(size, 0.0);
        let moved = snapshot(size, 0.0001);
        group.bench_with_input(BenchmarkId::new("moved", size), &size, |b, _| {
            b.iter_batched(
                || {
                    let mut reconciler = SnapshotReconciler::new();
                    reconciler.apply(&first);
                    reconciler
                },
                |mut reconciler| {
                    reconciler.apply(&moved);
                },
                BatchSize::SmallInput,
            )
        });

        // Half the population leaves and is replaced.
        let churned: Vec<TrackedEntity> = snapshot(size + size / 2, 0.0)
            .into_iter()
            .skip(size / 2)
            .collect();
        group.bench_with_input(BenchmarkId::new("churn", size), &size, |b, _| {
            b.iter_batched(
                || {
                    let mut reconciler = SnapshotReconciler::new();
                    reconciler.apply(&first);
                    reconciler
                },
                |mut reconciler| {
                    reconciler.apply(&churned);
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(reconcile_benches, bench_reconcile);
criterion_main!(reconcile_benches);
