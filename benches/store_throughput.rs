//! Store throughput benchmarks.
//!
//! Benchmarks:
//! - Upserts into one namespace
//! - Exact reads of a populated table
//! - Prefix scans, unbounded and paged
//! - Concurrent writers on tables of one database
//!
//! Run with:
//! ```bash
//! cargo bench --bench store_throughput
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use kvlite::{ReadOptions, Record, Store, StoreOptions, WriteOptions};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn open(tmp: &TempDir) -> Store {
    Store::open(StoreOptions::default().with_dir(tmp.path())).unwrap()
}

fn populate(store: &Store, n: usize) {
    for i in 0..n {
        let record = Record::new(format!("user:{i:06}"), vec![0u8; 128])
            .with_metadata("shard", i % 16);
        store.write(&record, WriteOptions::default()).unwrap();
    }
}

fn write_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    group.measurement_time(Duration::from_secs(5));

    for size in [64usize, 1024, 16 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("upsert", size), &size, |b, &size| {
            let tmp = TempDir::new().unwrap();
            let store = open(&tmp);
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                let record = Record::new(format!("k{}", i % 1_000), vec![0u8; size]);
                store.write(black_box(&record), WriteOptions::default()).unwrap();
            });
        });
    }

    group.finish();
}

fn read_benchmarks(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp);
    populate(&store, 10_000);

    let mut group = c.benchmark_group("read");

    group.bench_function("exact", |b| {
        b.iter(|| {
            store
                .read(black_box("user:004242"), ReadOptions::default())
                .unwrap()
        });
    });

    group.bench_function("prefix_scan_100", |b| {
        b.iter(|| {
            store
                .read(black_box("user:0042"), ReadOptions::default().prefix())
                .unwrap()
        });
    });

    for limit in [10usize, 100] {
        group.bench_with_input(
            BenchmarkId::new("prefix_page", limit),
            &limit,
            |b, &limit| {
                b.iter(|| {
                    store
                        .read("user:", ReadOptions::default().prefix().page(limit, 500))
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

fn concurrency_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.sample_size(20);

    for num_threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements((num_threads * 100) as u64));
        group.bench_with_input(
            BenchmarkId::new("writers", num_threads),
            &num_threads,
            |b, &num_threads| {
                let tmp = TempDir::new().unwrap();
                let store = Arc::new(open(&tmp));
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|t| {
                            let store = Arc::clone(&store);
                            std::thread::spawn(move || {
                                let options = WriteOptions::to_table("", format!("t{t}"));
                                for i in 0..100 {
                                    let record = Record::new(format!("k{i}"), "v");
                                    store.write(&record, options.clone()).unwrap();
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    write_benchmarks,
    read_benchmarks,
    concurrency_benchmarks
);
criterion_main!(benches);
