//! Benchmarks for the future scheduler.
//!
//! Benchmarks cover:
//! - Slot acquire/release on the wait-group
//! - Raw dispatch throughput of the worker pool
//! - End-to-end submit and drain through a scheduler
//! - Callback delivery

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

use prometheus_future_scheduler::config::WorkerPoolConfig;
use prometheus_future_scheduler::core::{callback, Executor, FutureScheduler, SlotTracker, WorkerPool};
use serde_json::json;

// ============================================================================
// Helper Functions
// ============================================================================

fn bench_pool(workers: usize) -> WorkerPool {
    WorkerPool::new(
        WorkerPoolConfig::new()
            .with_worker_count(workers)
            .with_max_queue_depth(100_000),
    )
    .expect("Failed to create pool")
}

// ============================================================================
// Slot Benchmarks
// ============================================================================

fn bench_slot_acquire_release(c: &mut Criterion) {
    let tracker = Arc::new(SlotTracker::new());
    c.bench_function("slot_acquire_release", |b| {
        b.iter(|| {
            let slot = tracker.try_acquire();
            black_box(&slot);
            drop(slot);
        });
    });
}

// ============================================================================
// Worker Pool Benchmarks
// ============================================================================

fn bench_pool_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_dispatch");

    for workers in [1_usize, 4] {
        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                let pool = bench_pool(workers);
                for i in 0..1_000_u64 {
                    pool.dispatch(Box::new(move || {
                        black_box(i);
                    }))
                    .expect("queue has room");
                }
                pool.shutdown();
            });
        });
    }

    group.finish();
}

// ============================================================================
// Scheduler Benchmarks
// ============================================================================

fn bench_submit_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_submit_and_drain");

    for task_count in [100_u64, 1_000] {
        group.throughput(Throughput::Elements(task_count));
        group.bench_with_input(
            BenchmarkId::from_parameter(task_count),
            &task_count,
            |b, &task_count| {
                b.iter(|| {
                    let scheduler = FutureScheduler::with_executor("bench", bench_pool(4));
                    for i in 0..task_count {
                        let submission = scheduler.submit(move || {
                            black_box(i);
                            Ok(())
                        });
                        black_box(submission.accepted);
                    }
                    scheduler.shutdown();
                });
            },
        );
    }

    group.finish();
}

fn bench_callback_delivery(c: &mut Criterion) {
    let scheduler = FutureScheduler::with_executor("bench-callback", bench_pool(2));

    c.bench_function("callback_delivery", |b| {
        b.iter(|| {
            let (tx, rx) = flume::bounded(1);
            let submission = scheduler
                .submit_with_callback(
                    || Ok(vec![json!("thumbnail"), json!(64)]),
                    callback(move |results| {
                        let _ = tx.send(results);
                    }),
                )
                .expect("callable");
            black_box(submission.accepted);
            black_box(rx.recv().expect("delivered"));
        });
    });
}

criterion_group!(
    benches,
    bench_slot_acquire_release,
    bench_pool_dispatch,
    bench_submit_and_drain,
    bench_callback_delivery,
);
criterion_main!(benches);
