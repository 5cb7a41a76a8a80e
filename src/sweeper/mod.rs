//! Periodic eviction of dead cache entries and expired metric samples.

use crate::cache::TtlCache;
use crate::config::SweepConfig;
use crate::trends::MetricsStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub cache_entries_removed: usize,
    pub metric_entries_removed: usize,
    pub metric_series_removed: usize,
}

pub struct Sweeper {
    cache: Arc<TtlCache>,
    trends: Arc<MetricsStore>,
    config: SweepConfig,
}

impl Sweeper {
    pub fn new(cache: Arc<TtlCache>, trends: Arc<MetricsStore>, config: SweepConfig) -> Self {
        Self {
            cache,
            trends,
            config,
        }
    }

    pub fn sweep_once(&self) -> SweepReport {
        let cache_entries_removed = self.cache.prune();
        let stats = self.trends.sweep(self.config.retention_days);
        let report = SweepReport {
            cache_entries_removed,
            metric_entries_removed: stats.entries_removed,
            metric_series_removed: stats.series_removed,
        };
        tracing::info!(
            cache_entries = report.cache_entries_removed,
            metric_entries = report.metric_entries_removed,
            metric_series = report.metric_series_removed,
            "Sweep completed"
        );
        report
    }

    /// Sweep immediately and then every `interval_seconds` until cancelled.
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.config.interval_seconds.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_seconds = self.config.interval_seconds,
                retention_days = self.config.retention_days,
                "Sweeper started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        self.sweep_once();
                    }
                }
            }
        })
    }
}
