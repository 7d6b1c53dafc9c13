//! Benchmarks for the tick loop.
//!
//! Benchmarks cover:
//! - Tick throughput over plain (one-step) tasks
//! - Priority ordering cost with mixed priorities
//! - Suspension-heavy workloads across many ticks
//! - Tag-group cancellation

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::IndexedRandom;
use std::hint::black_box;
use std::time::Duration;

use tickloop::core::{EventLoop, StepOutcome, Task, TickOptions};

// ============================================================================
// Helper Functions
// ============================================================================

fn one_shot_task() -> Task {
    Task::from_fn(|_cx| Ok(StepOutcome::Complete))
}

fn suspending_task(steps: u32) -> Task {
    let mut remaining = steps;
    Task::from_fn(move |_cx| {
        remaining -= 1;
        if remaining == 0 {
            Ok(StepOutcome::Complete)
        } else {
            Ok(StepOutcome::Pending)
        }
    })
}

// ============================================================================
// Tick Benchmarks
// ============================================================================

fn bench_tick_one_shot_tasks(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_one_shot_tasks");

    for size in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut el = EventLoop::new();
                for _ in 0..size {
                    el.add(one_shot_task());
                }
                el.tick(&TickOptions::default()).unwrap();
                black_box(el.len());
            });
        });
    }
    group.finish();
}

fn bench_tick_sorted_mixed_priorities(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_sorted_mixed_priorities");

    for size in [100_u64, 1_000, 5_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let priorities = [-10, -1, 0, 5, 100];
            let mut rng = rand::rng();
            b.iter(|| {
                let mut el = EventLoop::new();
                for _ in 0..size {
                    let priority = *priorities.choose(&mut rng).unwrap();
                    el.add(one_shot_task().with_priority(priority));
                }
                el.tick(&TickOptions::sorted()).unwrap();
                black_box(el.len());
            });
        });
    }
    group.finish();
}

fn bench_suspension_heavy_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("suspension_heavy_workload");

    for tasks in [100_u64, 1_000] {
        let ticks = 10_u64;
        group.throughput(Throughput::Elements(tasks * ticks));
        group.bench_with_input(BenchmarkId::from_parameter(tasks), &tasks, |b, &tasks| {
            b.iter(|| {
                let mut el = EventLoop::new();
                for _ in 0..tasks {
                    el.add(suspending_task(u32::try_from(ticks).unwrap()));
                }
                for _ in 0..ticks {
                    el.tick(&TickOptions::default()).unwrap();
                }
                black_box(el.is_empty());
            });
        });
    }
    group.finish();
}

fn bench_cancel_by_tags(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancel_by_tags");

    for size in [1_000_u64, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut el = EventLoop::new();
                for i in 0..size {
                    let task = suspending_task(1_000).with_timeout(Duration::from_secs(600));
                    let task = if i % 2 == 0 {
                        task.with_tags(["sensor", "lidar"])
                    } else {
                        task.with_tag("sensor")
                    };
                    el.add(task);
                }
                let removed = el.cancel_tags(["sensor", "lidar"]);
                black_box(removed);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(
    tick_benches,
    bench_tick_one_shot_tasks,
    bench_tick_sorted_mixed_priorities,
    bench_suspension_heavy_workload
);

criterion_group!(cancel_benches, bench_cancel_by_tags);

criterion_main!(tick_benches, cancel_benches);
