// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Benchmarks for core cache operations and single-flight resolution.

#![allow(clippy::unwrap_used, missing_docs, reason = "Benchmarks have relaxed requirements")]

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{Criterion, criterion_group, criterion_main};
use futures::executor::block_on;
use lruflight::{BoxError, LruCache};
use tokio::runtime::Runtime;

const ENTRIES: u64 = 1_000;

fn populated(max: u64) -> LruCache<u64, String> {
    let cache = LruCache::builder().max_entries(max).build().unwrap();
    for i in 0..ENTRIES {
        cache.set(i, format!("value_{i}"));
    }
    cache
}

fn bench_cache_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_operations");

    group.bench_function("get_hit", |b| {
        let cache = populated(0);
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % ENTRIES;
            black_box(block_on(cache.get(&i)).unwrap());
        });
    });

    group.bench_function("get_miss", |b| {
        let cache = populated(0);
        let mut i = ENTRIES;
        b.iter(|| {
            i += 1;
            black_box(block_on(cache.get(&i)).unwrap());
        });
    });

    group.bench_function("set_existing", |b| {
        let cache = populated(0);
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % ENTRIES;
            cache.set(i, "updated".to_string());
        });
    });

    group.bench_function("set_evicting", |b| {
        let cache = populated(ENTRIES);
        let mut i = ENTRIES;
        b.iter(|| {
            i += 1;
            cache.set(i, "fresh".to_string());
        });
    });

    group.bench_function("has", |b| {
        let cache = populated(0);
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % ENTRIES;
            black_box(cache.has(&i));
        });
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("resolution");

    static SINGLE: AtomicU64 = AtomicU64::new(0);
    let cache = Arc::new(
        LruCache::<u64, u64>::builder()
            .max_entries(10_000)
            .resolver(|key: u64| async move { Ok::<_, BoxError>(Some(key)) })
            .build()
            .unwrap(),
    );

    group.bench_function("resolve_miss", |b| {
        b.to_async(&rt).iter(|| {
            let cache = Arc::clone(&cache);
            async move {
                let key = SINGLE.fetch_add(1, Ordering::Relaxed);
                black_box(cache.get(&key).await.unwrap())
            }
        });
    });

    static SHARED: AtomicU64 = AtomicU64::new(0);
    group.bench_function("concurrent_10_tasks", |b| {
        b.to_async(&rt).iter(|| {
            let cache = Arc::clone(&cache);
            async move {
                let key = SHARED.fetch_add(1, Ordering::Relaxed) + u64::MAX / 2;
                let handles: Vec<_> = (0..10)
                    .map(|_| {
                        let cache = Arc::clone(&cache);
                        tokio::spawn(async move { cache.get(&key).await })
                    })
                    .collect();

                for handle in handles {
                    black_box(handle.await.unwrap().unwrap());
                }
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_cache_operations, bench_resolution);
criterion_main!(benches);
