//! Benchmark comparing LockFreeQueue with crossbeam's SegQueue.
//!
//! Run with: cargo bench --package handoff-crossbeam --bench queue_benchmark

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use crossbeam::queue::SegQueue;
use mimalloc::MiMalloc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use handoff_core::LockFreeQueue;
use handoff_core::common_tests::Job;
use handoff_crossbeam::EpochGuard;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const OPS_PER_THREAD: usize = 10_000;

type EpochQueue = LockFreeQueue<Job, EpochGuard>;

// ============================================================================
// Enqueue/dequeue pairs (every thread does both)
// ============================================================================

fn bench_handoff_pairs(thread_count: usize, ops_per_thread: usize) {
    let queue: Arc<EpochQueue> = Arc::new(EpochQueue::new());
    let mut handles = vec![];

    for t in 0..thread_count {
        let queue_clone = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            for i in 0..ops_per_thread {
                queue_clone.enqueue(Job::boxed(t, i));
                black_box(queue_clone.dequeue());
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_crossbeam_pairs(thread_count: usize, ops_per_thread: usize) {
    let queue: Arc<SegQueue<Box<Job>>> = Arc::new(SegQueue::new());
    let mut handles = vec![];

    for t in 0..thread_count {
        let queue_clone = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            for i in 0..ops_per_thread {
                queue_clone.push(Job::boxed(t, i));
                black_box(queue_clone.pop());
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Producers/consumers (half the threads enqueue, half dequeue)
// ============================================================================

fn bench_handoff_mpmc(thread_count: usize, ops_per_thread: usize) {
    let queue: Arc<EpochQueue> = Arc::new(EpochQueue::new());
    let producers = (thread_count / 2).max(1);
    let consumers = (thread_count - producers).max(1);
    let total = producers * ops_per_thread;
    let taken = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for t in 0..producers {
        let queue_clone = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                queue_clone.enqueue(Job::boxed(t, i));
            }
        }));
    }

    for _ in 0..consumers {
        let queue_clone = Arc::clone(&queue);
        let taken_clone = Arc::clone(&taken);
        handles.push(thread::spawn(move || {
            while taken_clone.load(Ordering::Relaxed) < total {
                if let Some(job) = queue_clone.dequeue() {
                    black_box(job.seq);
                    taken_clone.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_crossbeam_mpmc(thread_count: usize, ops_per_thread: usize) {
    let queue: Arc<SegQueue<Box<Job>>> = Arc::new(SegQueue::new());
    let producers = (thread_count / 2).max(1);
    let consumers = (thread_count - producers).max(1);
    let total = producers * ops_per_thread;
    let taken = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for t in 0..producers {
        let queue_clone = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                queue_clone.push(Job::boxed(t, i));
            }
        }));
    }

    for _ in 0..consumers {
        let queue_clone = Arc::clone(&queue);
        let taken_clone = Arc::clone(&taken);
        handles.push(thread::spawn(move || {
            while taken_clone.load(Ordering::Relaxed) < total {
                if let Some(job) = queue_clone.pop() {
                    black_box(job.seq);
                    taken_clone.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Criterion benchmark groups
// ============================================================================

fn pairs_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairs_benchmark_queue");

    for threads in [1, 2, 4, 8, 12, 16] {
        group.bench_with_input(
            BenchmarkId::new("pairs_benchmark_handoff", threads),
            &threads,
            |b, &threads| {
                b.iter(|| bench_handoff_pairs(black_box(threads), black_box(OPS_PER_THREAD)))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("pairs_benchmark_crossbeam", threads),
            &threads,
            |b, &threads| {
                b.iter(|| bench_crossbeam_pairs(black_box(threads), black_box(OPS_PER_THREAD)))
            },
        );
    }

    group.finish();
}

fn mpmc_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_benchmark_queue");

    for threads in [2, 4, 8, 12, 16] {
        group.bench_with_input(
            BenchmarkId::new("mpmc_benchmark_handoff", threads),
            &threads,
            |b, &threads| {
                b.iter(|| bench_handoff_mpmc(black_box(threads), black_box(OPS_PER_THREAD)))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("mpmc_benchmark_crossbeam", threads),
            &threads,
            |b, &threads| {
                b.iter(|| bench_crossbeam_mpmc(black_box(threads), black_box(OPS_PER_THREAD)))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, pairs_benchmark, mpmc_benchmark);
criterion_main!(benches);
