//! Local TTL cache for card statistics.
//!
//! Entries are stored as JSON under `<prefix><app>_<template>[_<metric>]`.
//! Reads never delete: an expired entry still tells the status deriver when
//! the app last answered, and eviction belongs to [`TtlCache::prune`].

use crate::clock::Clock;
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CACHE_PREFIX: &str = "homeboard_cache_";

/// How long an expired entry still counts as evidence that an app is reachable.
pub const STATUS_CEILING_MS: i64 = 20 * 60 * 1000;

/// One cached value with its write time and lifetime (both milliseconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub timestamp: i64,
    pub ttl: i64,
}

impl CacheEntry {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp)
    }

    pub fn is_fresh(&self, now_ms: i64) -> bool {
        self.age_ms(now_ms) <= self.ttl
    }

    /// Fresh, or young enough to vouch for connectivity.
    pub fn is_status_usable(&self, now_ms: i64) -> bool {
        self.is_fresh(now_ms) || self.age_ms(now_ms) < STATUS_CEILING_MS
    }
}

pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    prefix: String,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_prefix(store, clock, DEFAULT_CACHE_PREFIX)
    }

    pub fn with_prefix(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn build_key(&self, app_id: &str, template_id: &str, metric_key: Option<&str>) -> String {
        match metric_key {
            Some(metric) => format!("{}{}_{}_{}", self.prefix, app_id, template_id, metric),
            None => format!("{}{}_{}", self.prefix, app_id, template_id),
        }
    }

    /// Store `value` under `key`, stamped with the current time.
    ///
    /// Storage failures are logged and otherwise ignored.
    pub fn write(&self, key: &str, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value,
            timestamp: self.clock.now_ms(),
            ttl: ttl.as_millis().min(i64::MAX as u128) as i64,
        };
        let result = serde_json::to_string(&entry)
            .map_err(crate::store::StoreError::from)
            .and_then(|json| self.store.set(key, json));
        match result {
            Ok(()) => metrics::counter!("homeboard_cache_writes_total").increment(1),
            Err(e) => tracing::warn!(key, error = %e, "Failed to write cache entry"),
        }
    }

    /// Parsed entry under `key`, if present and well-formed.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(key, error = %e, "Ignoring malformed cache entry");
                None
            }
        }
    }

    /// The cached value, only while it is within its TTL.
    pub fn read_fresh(&self, key: &str) -> Option<Value> {
        let now = self.clock.now_ms();
        self.entry(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value)
    }

    /// Write time of the entry under `key`, fresh or not.
    pub fn read_timestamp(&self, key: &str) -> Option<i64> {
        self.entry(key).map(|entry| entry.timestamp)
    }

    /// Most recent write time across the app's base key and its metric keys,
    /// counting only entries that are fresh or younger than
    /// [`STATUS_CEILING_MS`].
    pub fn read_latest_timestamp_for_app(&self, app_id: &str, template_id: &str) -> Option<i64> {
        let now = self.clock.now_ms();
        self.app_keys(app_id, template_id)
            .iter()
            .filter_map(|key| self.entry(key))
            .filter(|entry| entry.is_status_usable(now))
            .map(|entry| entry.timestamp)
            .max()
    }

    /// Remove every entry for the app/template pair. Returns the number removed.
    pub fn clear_app(&self, app_id: &str, template_id: &str) -> usize {
        let mut removed = 0;
        for key in self.app_keys(app_id, template_id) {
            match self.store.remove(&key) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(key = %key, error = %e, "Failed to remove cache entry"),
            }
        }
        removed
    }

    /// Evict entries that are both expired and past the status ceiling, plus
    /// any malformed entries under the cache prefix.
    pub fn prune(&self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;
        for key in self.store.keys_with_prefix(&self.prefix) {
            let evict = match self.entry(&key) {
                Some(entry) => !entry.is_status_usable(now),
                None => true,
            };
            if !evict {
                continue;
            }
            match self.store.remove(&key) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(key = %key, error = %e, "Failed to prune cache entry"),
            }
        }
        removed
    }

    fn app_keys(&self, app_id: &str, template_id: &str) -> Vec<String> {
        let base = self.build_key(app_id, template_id, None);
        self.store
            .keys_with_prefix(&base)
            .into_iter()
            .filter(|key| key.len() == base.len() || key[base.len()..].starts_with('_'))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{MemoryStore, NullStore};
    use serde_json::json;

    const START: i64 = 1_700_000_000_000;

    fn cache() -> (TtlCache, Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::new(START));
        let store = Arc::new(MemoryStore::new());
        let cache = TtlCache::new(store.clone(), clock.clone());
        (cache, clock, store)
    }

    #[test]
    fn test_build_key() {
        let (cache, _, _) = cache();
        assert_eq!(cache.build_key("tv", "sonarr", None), "homeboard_cache_tv_sonarr");
        assert_eq!(
            cache.build_key("tv", "sonarr", Some("queue")),
            "homeboard_cache_tv_sonarr_queue"
        );
    }

    #[test]
    fn test_read_fresh_expires_but_keeps_timestamp() {
        let (cache, clock, _) = cache();
        let key = cache.build_key("a", "t", None);
        cache.write(&key, json!({"x": 1}), Duration::from_millis(1000));

        assert_eq!(cache.read_fresh(&key), Some(json!({"x": 1})));

        clock.advance(1000);
        assert!(cache.read_fresh(&key).is_some(), "exactly ttl old is still fresh");

        clock.advance(1);
        assert!(cache.read_fresh(&key).is_none());
        assert_eq!(cache.read_timestamp(&key), Some(START));
    }

    #[test]
    fn test_malformed_entry_reads_as_absent() {
        let (cache, _, store) = cache();
        let key = cache.build_key("a", "t", None);
        store.set(&key, "not json".into()).unwrap();
        assert!(cache.read_fresh(&key).is_none());
        assert!(cache.read_timestamp(&key).is_none());
        assert!(cache.read_latest_timestamp_for_app("a", "t").is_none());
    }

    #[test]
    fn test_extreme_timestamp_reads_as_stale() {
        let (cache, _, store) = cache();
        let key = cache.build_key("a", "t", None);
        store
            .set(&key, r#"{"value":1,"timestamp":-9223372036854775808,"ttl":1}"#.into())
            .unwrap();

        assert!(cache.read_fresh(&key).is_none());
        assert_eq!(cache.read_timestamp(&key), Some(i64::MIN));
        assert!(cache.read_latest_timestamp_for_app("a", "t").is_none());
        assert_eq!(cache.prune(), 1);
    }

    #[test]
    fn test_latest_timestamp_spans_metric_keys() {
        let (cache, clock, _) = cache();
        let ttl = Duration::from_secs(300);
        cache.write(&cache.build_key("tv", "sonarr", None), json!(1), ttl);
        clock.advance(5_000);
        cache.write(&cache.build_key("tv", "sonarr", Some("queue")), json!(2), ttl);
        clock.advance(5_000);
        // Different app sharing the id prefix must not count.
        cache.write(&cache.build_key("tv2", "sonarr", None), json!(3), ttl);

        assert_eq!(
            cache.read_latest_timestamp_for_app("tv", "sonarr"),
            Some(START + 5_000)
        );
    }

    #[test]
    fn test_latest_timestamp_ignores_entries_past_ceiling() {
        let (cache, clock, _) = cache();
        let key = cache.build_key("tv", "sonarr", None);
        cache.write(&key, json!(1), Duration::from_secs(60));

        clock.advance(19 * 60 * 1000);
        assert_eq!(cache.read_latest_timestamp_for_app("tv", "sonarr"), Some(START));

        clock.advance(60 * 1000);
        assert!(cache.read_latest_timestamp_for_app("tv", "sonarr").is_none());
        assert_eq!(cache.read_timestamp(&key), Some(START));
    }

    #[test]
    fn test_long_ttl_outlives_ceiling() {
        let (cache, clock, _) = cache();
        cache.write(
            &cache.build_key("nas", "truenas", None),
            json!(1),
            Duration::from_secs(3600),
        );
        clock.advance(30 * 60 * 1000);
        assert_eq!(cache.read_latest_timestamp_for_app("nas", "truenas"), Some(START));
    }

    #[test]
    fn test_clear_app_removes_base_and_metric_keys() {
        let (cache, _, store) = cache();
        let ttl = Duration::from_secs(60);
        cache.write(&cache.build_key("tv", "sonarr", None), json!(1), ttl);
        cache.write(&cache.build_key("tv", "sonarr", Some("queue")), json!(2), ttl);
        cache.write(&cache.build_key("movies", "radarr", None), json!(3), ttl);

        assert_eq!(cache.clear_app("tv", "sonarr"), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_prune_evicts_only_dead_entries() {
        let (cache, clock, store) = cache();
        cache.write("homeboard_cache_old_t", json!(1), Duration::from_secs(60));
        clock.advance(21 * 60 * 1000);
        cache.write("homeboard_cache_new_t", json!(2), Duration::from_secs(60));
        store.set("homeboard_cache_broken_t", "{".into()).unwrap();
        store.set("unrelated", "{".into()).unwrap();

        assert_eq!(cache.prune(), 2);
        assert!(cache.read_fresh("homeboard_cache_new_t").is_some());
        assert!(store.get("unrelated").is_some());
    }

    #[test]
    fn test_unavailable_store_degrades_to_misses() {
        let clock = Arc::new(ManualClock::new(START));
        let cache = TtlCache::new(Arc::new(NullStore), clock);
        let key = cache.build_key("a", "t", None);
        cache.write(&key, json!(1), Duration::from_secs(60));
        assert!(cache.read_fresh(&key).is_none());
        assert!(cache.read_latest_timestamp_for_app("a", "t").is_none());
        assert_eq!(cache.clear_app("a", "t"), 0);
        assert_eq!(cache.prune(), 0);
    }
}
