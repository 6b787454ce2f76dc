//! Benchmarks for entry-store and cache-manager operations
//!
//! This benchmark suite measures the performance of:
//! - Plain string set/get on the cost-aware store
//! - Cache hit vs miss latency
//! - Admission under budget pressure (eviction sweeps)
//! - Map-array payloads of different sizes
//! - List-key construction

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use hr_cache::{
    CacheBackend, CacheConfig, CacheManager, CostAwareStore, EmployeeQuery, Record, cache_keys,
};
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(300);

fn setup_manager(max_cost: i64) -> CacheManager {
    let config = CacheConfig {
        max_cost,
        ..CacheConfig::default()
    };
    CacheManager::new(Arc::new(CostAwareStore::new(max_cost)), config)
}

/// Generate `count` employee-shaped rows
fn test_rows(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            [
                ("identityNumber", format!("ID{i:05}")),
                ("name", format!("Employee {i}")),
                ("employeeImageUri", format!("https://img.example.com/{i}.png")),
                ("gender", "female".to_string()),
                ("departmentId", "7d9f7c0e-2f3c-4c7a-9f7e-1b2d3c4d5e6f".to_string()),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
        })
        .collect()
}

/// Benchmark plain string writes
fn bench_store_set(c: &mut Criterion) {
    let store = CostAwareStore::new(1 << 30);
    let mut group = c.benchmark_group("store_set");

    for size in &[16, 256, 4096] {
        let value = "x".repeat(*size);
        let cost = i64::try_from(*size).unwrap_or(i64::MAX);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let key = format!("bench:set:{}", rand::random::<u32>());
                store.set_with_cost(&key, black_box(value.clone()), cost, TTL);
            });
        });
    }

    group.finish();
}

/// Benchmark cache hit performance
fn bench_store_hit(c: &mut Criterion) {
    let store = CostAwareStore::new(1 << 30);
    for i in 0..100 {
        store.set_with_cost(&format!("bench:hit:{i}"), "x".repeat(256), 256, TTL);
    }

    c.bench_function("store_hit", |b| {
        b.iter(|| {
            let key = format!("bench:hit:{}", rand::random::<u8>() % 100);
            black_box(store.get(&key));
        });
    });
}

/// Benchmark cache miss performance
fn bench_store_miss(c: &mut Criterion) {
    let store = CostAwareStore::new(1 << 30);

    c.bench_function("store_miss", |b| {
        b.iter(|| {
            let key = format!("bench:miss:{}", rand::random::<u32>());
            black_box(store.get(&key));
        });
    });
}

/// Benchmark admission when every write has to evict
fn bench_eviction_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction_pressure");

    for entries in &[100_i64, 1_000] {
        let store = CostAwareStore::new(entries * 100);
        for i in 0..*entries {
            store.set_with_cost(&format!("bench:fill:{i}"), "x".into(), 100, TTL);
        }

        group.bench_with_input(BenchmarkId::from_parameter(entries), entries, |b, _| {
            b.iter(|| {
                let key = format!("bench:evict:{}", rand::random::<u32>());
                black_box(store.set_with_cost(&key, "x".into(), 150, TTL));
            });
        });
    }

    group.finish();
}

/// Benchmark list payload encode + store and read + decode
fn bench_map_array(c: &mut Criterion) {
    let manager = setup_manager(1 << 30);
    let mut group = c.benchmark_group("map_array");

    for rows in &[5, 50, 500] {
        let records = test_rows(*rows);
        let key = format!("bench:rows:{rows}");

        group.bench_with_input(BenchmarkId::new("set", rows), rows, |b, _| {
            b.iter(|| {
                manager
                    .set_as_map_array_with_ttl_and_cost_multiplier(&key, black_box(&records), 4, TTL)
                    .unwrap_or_else(|_| panic!("Failed to set rows"));
            });
        });

        group.bench_with_input(BenchmarkId::new("get", rows), rows, |b, _| {
            b.iter(|| {
                black_box(
                    manager
                        .get_as_map_array(&key)
                        .unwrap_or_else(|_| panic!("Failed to get rows")),
                );
            });
        });
    }

    group.finish();
}

/// Benchmark list-key construction
fn bench_list_key(c: &mut Criterion) {
    let plain = EmployeeQuery::new("b1946ac9-2f3c-4c7a-9f7e-1b2d3c4d5e6f");
    let filtered = plain
        .clone()
        .page(10, 20)
        .name("Jo & Co")
        .gender("female")
        .identity_number("ID0");

    let mut group = c.benchmark_group("list_key");
    group.bench_function("unfiltered", |b| {
        b.iter(|| black_box(cache_keys::employee_list(black_box(3), &plain)));
    });
    group.bench_function("filtered", |b| {
        b.iter(|| black_box(cache_keys::employee_list(black_box(3), &filtered)));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_store_set,
    bench_store_hit,
    bench_store_miss,
    bench_eviction_pressure,
    bench_map_array,
    bench_list_key
);
criterion_main!(benches);
