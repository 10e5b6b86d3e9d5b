/// Benchmark suite for the task queue
/// Measures push/dispatch/wait round trips against rayon's scope.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cluster_raster::{TaskQueue, TaskQueueConfig};
use std::sync::atomic::{AtomicU64, Ordering};

fn bench_round_trip(c: &mut Criterion) {
    let queue = TaskQueue::new(TaskQueueConfig::default()).unwrap();
    let mut group = c.benchmark_group("task_round_trip");

    for jobs in [1usize, 8, 32] {
        group.bench_with_input(BenchmarkId::new("task_queue", jobs), &jobs, |b, &jobs| {
            let sum = AtomicU64::new(0);
            b.iter(|| {
                queue.scope(|s| {
                    for i in 0..jobs {
                        let sum = &sum;
                        s.push(move |_| {
                            sum.fetch_add(black_box(i as u64), Ordering::Relaxed);
                        })
                        .unwrap();
                    }
                });
            });
        });

        group.bench_with_input(BenchmarkId::new("rayon_scope", jobs), &jobs, |b, &jobs| {
            let sum = AtomicU64::new(0);
            b.iter(|| {
                rayon::scope(|s| {
                    for i in 0..jobs {
                        let sum = &sum;
                        s.spawn(move |_| {
                            sum.fetch_add(black_box(i as u64), Ordering::Relaxed);
                        });
                    }
                });
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_round_trip);
criterion_main!(benches);
