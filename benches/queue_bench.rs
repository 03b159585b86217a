// Throughput benchmarks for the bounded MPMC queue, one entry per wait
// strategy so the strategies can be compared on the same workload.

use std::hint;
use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use mpmc_queue::{BoundedQueue, CpuRelax, ExponentialBackoff, NoWait, SyncWait, WaitStrategy, YieldWait};

#[cfg(target_os = "linux")]
use mpmc_queue::FutexWait;

const MESSAGES: u64 = 100_000;
const CAPACITY: u32 = 1024;
const PRODUCERS: u64 = 4;
const CONSUMERS: u64 = 4;

fn spin() -> impl FnMut() -> bool {
    || {
        hint::spin_loop();
        false
    }
}

fn run_spsc<W: WaitStrategy + 'static>(use_spin_backoff: bool) {
    let queue = Arc::new(BoundedQueue::<u64, W>::with_capacity(CAPACITY).unwrap());

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for i in 0..MESSAGES {
                if use_spin_backoff {
                    queue.enqueue_with(black_box(i), spin());
                } else {
                    queue.enqueue(black_box(i));
                }
            }
        })
    };
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for _ in 0..MESSAGES {
                if use_spin_backoff {
                    let _ = queue.dequeue_with(spin());
                } else {
                    let _ = queue.dequeue();
                }
            }
        })
    };

    producer.join().unwrap();
    consumer.join().unwrap();
}

fn run_mpmc<W: WaitStrategy + 'static>(use_spin_backoff: bool) {
    let queue = Arc::new(BoundedQueue::<u64, W>::with_capacity(CAPACITY).unwrap());
    let mut handles = Vec::new();

    for p in 0..PRODUCERS {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..MESSAGES / PRODUCERS {
                let value = p * MESSAGES + i;
                if use_spin_backoff {
                    queue.enqueue_with(black_box(value), spin());
                } else {
                    queue.enqueue(black_box(value));
                }
            }
        }));
    }
    for _ in 0..CONSUMERS {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for _ in 0..MESSAGES / CONSUMERS {
                if use_spin_backoff {
                    let _ = queue.dequeue_with(spin());
                } else {
                    let _ = queue.dequeue();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_spsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_1p_1c");
    group.throughput(Throughput::Elements(MESSAGES));

    group.bench_function("no_wait_spin", |b| b.iter(|| run_spsc::<NoWait>(true)));
    group.bench_function("yield_wait", |b| b.iter(|| run_spsc::<YieldWait>(false)));
    group.bench_function("sync_wait", |b| b.iter(|| run_spsc::<SyncWait>(false)));
    #[cfg(target_os = "linux")]
    group.bench_function("futex_wait", |b| b.iter(|| run_spsc::<FutexWait>(false)));

    group.finish();
}

fn bench_mpmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_4p_4c");
    group.throughput(Throughput::Elements(MESSAGES));

    group.bench_function("no_wait_spin", |b| b.iter(|| run_mpmc::<NoWait>(true)));
    group.bench_function("yield_wait", |b| b.iter(|| run_mpmc::<YieldWait>(false)));
    group.bench_function("sync_wait", |b| b.iter(|| run_mpmc::<SyncWait>(false)));
    #[cfg(target_os = "linux")]
    group.bench_function("futex_wait", |b| b.iter(|| run_mpmc::<FutexWait>(false)));

    group.finish();
}

// Backoff escalation against the futex strategy: spin a while, then park.
fn bench_backoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_4p_4c_backoff");
    group.throughput(Throughput::Elements(MESSAGES));

    group.bench_function("sync_wait_exponential", |b| {
        b.iter(|| {
            let queue = Arc::new(BoundedQueue::<u64, SyncWait>::with_capacity(CAPACITY).unwrap());
            let mut handles = Vec::new();
            for p in 0..PRODUCERS {
                let queue = Arc::clone(&queue);
                handles.push(thread::spawn(move || {
                    for i in 0..MESSAGES / PRODUCERS {
                        queue.enqueue_with(
                            black_box(p * MESSAGES + i),
                            ExponentialBackoff::<CpuRelax>::new(1024),
                        );
                    }
                }));
            }
            for _ in 0..CONSUMERS {
                let queue = Arc::clone(&queue);
                handles.push(thread::spawn(move || {
                    for _ in 0..MESSAGES / CONSUMERS {
                        let _ = queue.dequeue_with(ExponentialBackoff::<CpuRelax>::new(1024));
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_spsc, bench_mpmc, bench_backoff);
criterion_main!(benches);
