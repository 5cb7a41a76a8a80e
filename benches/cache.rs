//! Benchmarks for cache reads and the latest-timestamp scan behind status derivation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use homeboard::cache::TtlCache;
use homeboard::clock::ManualClock;
use homeboard::status::derive_status;
use homeboard::store::MemoryStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const NOW: i64 = 1_710_072_000_000;

/// Cache holding `apps` cards with `metrics` metric keys each.
fn populated_cache(apps: usize, metrics: usize) -> TtlCache {
    let cache = TtlCache::new(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(NOW)));
    for a in 0..apps {
        let app_id = format!("app-{}", a);
        let base = cache.build_key(&app_id, "sonarr", None);
        cache.write(&base, json!({"totalRecords": a}), Duration::from_secs(300));
        for m in 0..metrics {
            let key = cache.build_key(&app_id, "sonarr", Some(&format!("metric{}", m)));
            cache.write(&key, json!(m), Duration::from_secs(300));
        }
    }
    cache
}

fn bench_read_fresh(c: &mut Criterion) {
    let cache = populated_cache(50, 4);
    let key = cache.build_key("app-25", "sonarr", None);

    c.bench_function("cache_read_fresh", |b| {
        b.iter(|| cache.read_fresh(black_box(&key)))
    });
}

fn bench_latest_timestamp(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_status");

    for apps in [10, 50, 200] {
        let cache = populated_cache(apps, 4);
        group.bench_with_input(BenchmarkId::from_parameter(apps), &apps, |b, _| {
            b.iter(|| derive_status(&cache, black_box("app-5"), black_box("sonarr")))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_read_fresh, bench_latest_timestamp);
criterion_main!(benches);
