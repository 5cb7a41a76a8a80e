//! Append-only metric history used for trend charts.
//!
//! Each `(app, template, key)` series is one JSON array in the store, kept in
//! timestamp order and capped at [`MAX_ENTRIES_PER_SERIES`].

use crate::clock::Clock;
use crate::store::{KeyValueStore, StoreError};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const DEFAULT_METRICS_PREFIX: &str = "homeboard_metrics_";
pub const MAX_ENTRIES_PER_SERIES: usize = 1000;
pub const RETENTION_DAYS: u32 = 90;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// One recorded sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEntry {
    pub app_id: String,
    pub template_id: String,
    pub key: String,
    pub value: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// Mean of one UTC calendar day, rounded to the nearest integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAverage {
    pub date: NaiveDate,
    pub value: i64,
}

/// Outcome of a retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub series_scanned: usize,
    pub entries_removed: usize,
    pub series_removed: usize,
}

pub struct MetricsStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    prefix: String,
    // Serializes read-modify-write of series.
    write_lock: Mutex<()>,
}

impl MetricsStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_prefix(store, clock, DEFAULT_METRICS_PREFIX)
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
            write_lock: Mutex::new(()),
        }
    }

    pub fn series_key(&self, app_id: &str, template_id: &str, key: &str) -> String {
        format!("{}{}_{}_{}", self.prefix, app_id, template_id, key)
    }

    /// Record `entry`, dropping the oldest samples beyond the series cap.
    pub fn append(&self, entry: MetricEntry) -> Result<(), StoreError> {
        let _guard = self.lock();
        let series_key = self.series_key(&entry.app_id, &entry.template_id, &entry.key);
        let mut series = self.load(&series_key);

        // Samples normally arrive in order; insert in place otherwise.
        let at = series.partition_point(|e| e.timestamp <= entry.timestamp);
        series.insert(at, entry);
        if series.len() > MAX_ENTRIES_PER_SERIES {
            let excess = series.len() - MAX_ENTRIES_PER_SERIES;
            series.drain(..excess);
        }

        self.save(&series_key, &series)
    }

    /// Samples from the last `period_days` days, oldest first.
    pub fn query(
        &self,
        app_id: &str,
        template_id: &str,
        key: &str,
        period_days: u32,
    ) -> Vec<MetricEntry> {
        let cutoff = self.clock.now_ms() - i64::from(period_days) * DAY_MS;
        let mut series = self.load(&self.series_key(app_id, template_id, key));
        series.retain(|e| e.timestamp >= cutoff);
        series
    }

    /// Per-day averages over the last `period_days` days, ascending by date.
    pub fn daily_average(
        &self,
        app_id: &str,
        template_id: &str,
        key: &str,
        period_days: u32,
    ) -> Vec<DailyAverage> {
        let mut days: BTreeMap<NaiveDate, (f64, u32)> = BTreeMap::new();
        for entry in self.query(app_id, template_id, key, period_days) {
            let Some(date) = DateTime::from_timestamp_millis(entry.timestamp) else {
                continue;
            };
            let slot = days.entry(date.date_naive()).or_insert((0.0, 0));
            slot.0 += entry.value;
            slot.1 += 1;
        }

        days.into_iter()
            .map(|(date, (sum, count))| DailyAverage {
                date,
                value: (sum / f64::from(count)).round() as i64,
            })
            .collect()
    }

    /// Drop samples older than `retention_days` and remove emptied series.
    pub fn sweep(&self, retention_days: u32) -> SweepStats {
        let _guard = self.lock();
        let cutoff = self.clock.now_ms() - i64::from(retention_days) * DAY_MS;
        let mut stats = SweepStats::default();

        for series_key in self.store.keys_with_prefix(&self.prefix) {
            stats.series_scanned += 1;
            let mut series = self.load(&series_key);
            let before = series.len();
            series.retain(|e| e.timestamp >= cutoff);
            let removed = before - series.len();

            let result = if series.is_empty() {
                stats.series_removed += 1;
                self.store.remove(&series_key)
            } else if removed > 0 {
                self.save(&series_key, &series)
            } else {
                Ok(())
            };

            match result {
                Ok(()) => stats.entries_removed += removed,
                Err(e) => {
                    tracing::warn!(series = %series_key, error = %e, "Failed to sweep metric series")
                }
            }
        }
        stats
    }

    /// Remove every series of the app/template pair. Returns the number removed.
    pub fn clear_app(&self, app_id: &str, template_id: &str) -> usize {
        let _guard = self.lock();
        let prefix = format!("{}{}_{}_", self.prefix, app_id, template_id);
        let mut removed = 0;
        for series_key in self.store.keys_with_prefix(&prefix) {
            match self.store.remove(&series_key) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(series = %series_key, error = %e, "Failed to remove metric series")
                }
            }
        }
        removed
    }

    fn load(&self, series_key: &str) -> Vec<MetricEntry> {
        let Some(raw) = self.store.get(series_key) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<MetricEntry>>(&raw) {
            Ok(mut series) => {
                series.sort_by_key(|e| e.timestamp);
                series
            }
            Err(e) => {
                tracing::debug!(series = %series_key, error = %e, "Ignoring malformed metric series");
                Vec::new()
            }
        }
    }

    fn save(&self, series_key: &str, series: &[MetricEntry]) -> Result<(), StoreError> {
        let json = serde_json::to_string(series)?;
        self.store.set(series_key, json)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
