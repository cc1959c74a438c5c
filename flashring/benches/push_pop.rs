//! Microbenchmarks for push, pop, and open-time recovery.
//!
//! The `memfs` groups measure the queue logic alone; the `file` groups
//! include a real `sync_data` per operation.
//!
//! Run with: `cargo bench -p flashring -- push`

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use flashring::{MemFs, OpenFlags, Queue, QueueConfig};
use tempfile::tempdir;

/// Creates a full in-memory queue of `capacity` `u64` records.
fn setup_memfs(capacity: u32) -> Queue<u64, MemFs> {
    let mut queue = Queue::with_fs(MemFs::new(), QueueConfig::new(capacity).unwrap()).unwrap();
    queue.open("bench.bin", OpenFlags::default()).unwrap();
    for v in 0..u64::from(capacity) {
        queue.push(v).unwrap();
    }
    queue
}

fn bench_push_circular(c: &mut Criterion) {
    let mut group = c.benchmark_group("push/memfs_circular");

    for capacity in [16, 256, 4096] {
        let mut queue = setup_memfs(capacity);
        let mut value = 0u64;

        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, _| {
            b.iter(|| {
                value += 1;
                queue.push(black_box(value)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_push_pop_cycle(c: &mut Criterion) {
    let mut queue = setup_memfs(256);
    let mut value = 0u64;

    c.bench_function("push_pop/memfs_cycle", |b| {
        b.iter(|| {
            value += 1;
            queue.push(black_box(value)).unwrap();
            black_box(queue.pop().unwrap());
        });
    });
}

fn bench_push_file(c: &mut Criterion) {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("bench.bin");

    let mut queue: Queue<u64> = Queue::new(QueueConfig::new(1024).unwrap()).unwrap();
    queue.open(&path, OpenFlags::default().reset(true)).unwrap();
    let mut value = 0u64;

    c.bench_function("push/file_synced", |b| {
        b.iter(|| {
            value += 1;
            queue.push(black_box(value)).unwrap();
        });
    });
}

fn bench_open_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("open/recovery_scan");

    for capacity in [16, 256, 4096] {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bench.bin");

        let mut queue: Queue<u64> = Queue::new(QueueConfig::new(capacity).unwrap()).unwrap();
        queue.open(&path, OpenFlags::default().reset(true)).unwrap();
        // Leave the image wrapped and half full
        for v in 0..u64::from(capacity + capacity / 2) {
            queue.push(v).unwrap();
        }
        for _ in 0..capacity / 2 {
            queue.pop().unwrap();
        }
        queue.close().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, _| {
            b.iter(|| {
                queue.open(black_box(&path), OpenFlags::default()).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_push_circular,
    bench_push_pop_cycle,
    bench_push_file,
    bench_open_recovery,
);
criterion_main!(benches);
