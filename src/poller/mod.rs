//! Background polling of every configured card.
//!
//! Each app gets its own task ticking at its `poll_interval_seconds`, so a
//! slow integration never delays the others. The poller also tracks which
//! apps have a fetch in flight, which is what turns an `unknown` status into
//! `pending`.

use crate::classify::StructuredError;
use crate::config::AppConfig;
use crate::fetcher::StatFetcher;
use crate::status::{derive_report, StatusReport};
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

pub struct CardPoller {
    fetcher: Arc<StatFetcher>,
    apps: Vec<AppConfig>,
    in_flight: DashSet<String>,
    last_errors: DashMap<String, StructuredError>,
}

/// Clears the in-flight mark even when the fetch future is dropped mid-way.
struct InFlight<'a> {
    set: &'a DashSet<String>,
    app_id: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(self.app_id);
    }
}

impl CardPoller {
    pub fn new(fetcher: Arc<StatFetcher>, apps: Vec<AppConfig>) -> Self {
        Self {
            fetcher,
            apps,
            in_flight: DashSet::new(),
            last_errors: DashMap::new(),
        }
    }

    pub fn fetcher(&self) -> &Arc<StatFetcher> {
        &self.fetcher
    }

    pub fn apps(&self) -> &[AppConfig] {
        &self.apps
    }

    pub fn app(&self, app_id: &str) -> Option<&AppConfig> {
        self.apps.iter().find(|app| app.id == app_id)
    }

    pub fn is_in_flight(&self, app_id: &str) -> bool {
        self.in_flight.contains(app_id)
    }

    /// Error from the app's most recent fetch, cleared by the next success.
    pub fn last_error(&self, app_id: &str) -> Option<StructuredError> {
        self.last_errors.get(app_id).map(|e| e.value().clone())
    }

    /// Derived connection status, reported as pending while a first fetch runs.
    pub fn status(&self, app: &AppConfig) -> StatusReport {
        derive_report(self.fetcher.cache(), &app.id, &app.template)
            .with_pending(self.is_in_flight(&app.id))
    }

    /// Fetch one app now and remember the outcome.
    pub async fn poll_app(&self, app: &AppConfig) -> Result<Value, StructuredError> {
        self.in_flight.insert(app.id.clone());
        let _in_flight = InFlight {
            set: &self.in_flight,
            app_id: &app.id,
        };

        let result = self.fetcher.fetch(app).await;
        match &result {
            Ok(_) => {
                self.last_errors.remove(&app.id);
            }
            Err(e) => {
                self.last_errors.insert(app.id.clone(), e.clone());
            }
        }
        result
    }

    /// Start one polling task per app. The returned handle completes once
    /// every task has observed cancellation.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            for app in self.apps.iter().cloned() {
                if app.poll_interval_seconds == 0 {
                    tracing::warn!(app = %app.id, "Poll interval is zero, not polling");
                    continue;
                }
                tasks.spawn(Arc::clone(&self).poll_loop(app, cancel_token.clone()));
            }

            tracing::info!(apps = tasks.len(), "Card poller started");
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Polling task failed");
                }
            }
            tracing::info!("Card poller stopped");
        })
    }

    async fn poll_loop(self: Arc<Self>, app: AppConfig, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(app.poll_interval_seconds));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        _ = cancel_token.cancelled() => break,
                        result = self.poll_app(&app) => {
                            if result.is_ok() {
                                tracing::trace!(app = %app.id, "Poll completed");
                            }
                        }
                    }
                }
            }
        }
        tracing::debug!(app = %app.id, "Polling stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::classify::ErrorKind;
    use crate::clock::ManualClock;
    use crate::retry::RetryOptions;
    use crate::status::ConnectionStatus;
    use crate::store::MemoryStore;
    use crate::transport::{FetchError, StatRequest, StatResponse, Transport};
    use crate::trends::MetricsStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting {
        calls: AtomicU32,
        status: u16,
    }

    #[async_trait]
    impl Transport for Counting {
        async fn execute(
            &self,
            _request: &StatRequest,
            _timeout: Duration,
        ) -> Result<StatResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StatResponse::new(self.status, "{}"))
        }
    }

    /// Never answers.
    struct Hanging;

    #[async_trait]
    impl Transport for Hanging {
        async fn execute(
            &self,
            _request: &StatRequest,
            _timeout: Duration,
        ) -> Result<StatResponse, FetchError> {
            std::future::pending().await
        }
    }

    fn poller(transport: Arc<dyn Transport>, apps: Vec<AppConfig>) -> Arc<CardPoller> {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(TtlCache::new(store.clone(), clock.clone()));
        let trends = Arc::new(MetricsStore::new(store, clock));
        let fetcher = StatFetcher::new(transport, cache, trends).with_retry(RetryOptions {
            max_retries: 1,
            ..RetryOptions::default()
        });
        Arc::new(CardPoller::new(Arc::new(fetcher), apps))
    }

    #[tokio::test]
    async fn test_poll_app_tracks_errors() {
        let poller = poller(
            Arc::new(Counting {
                calls: AtomicU32::new(0),
                status: 500,
            }),
            vec![],
        );
        let app = AppConfig::new("tv", "sonarr", "http://sonarr.lan");

        assert!(poller.poll_app(&app).await.is_err());
        assert_eq!(poller.last_error("tv").map(|e| e.kind), Some(ErrorKind::Server));
        assert!(!poller.is_in_flight("tv"));
        assert_eq!(poller.status(&app).status, ConnectionStatus::Unknown);
    }

    #[tokio::test]
    async fn test_success_clears_error_and_goes_online() {
        let poller = poller(
            Arc::new(Counting {
                calls: AtomicU32::new(0),
                status: 200,
            }),
            vec![],
        );
        let app = AppConfig::new("tv", "sonarr", "http://sonarr.lan");
        poller
            .last_errors
            .insert("tv".to_string(), StructuredError::configuration("stale"));

        poller.poll_app(&app).await.unwrap();
        assert!(poller.last_error("tv").is_none());
        assert_eq!(poller.status(&app).status, ConnectionStatus::Online);
    }

    #[tokio::test]
    async fn test_in_flight_fetch_reports_pending() {
        let app = AppConfig::new("nas", "truenas", "http://nas.lan");
        let poller = poller(Arc::new(Hanging), vec![app.clone()]);

        let background = Arc::clone(&poller);
        let polling = {
            let app = app.clone();
            tokio::spawn(async move { background.poll_app(&app).await })
        };
        tokio::task::yield_now().await;
        while !poller.is_in_flight("nas") {
            tokio::task::yield_now().await;
        }
        assert_eq!(poller.status(&app).status, ConnectionStatus::Pending);

        polling.abort();
        let _ = polling.await;
        assert!(!poller.is_in_flight("nas"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_polls_each_app_until_cancelled() {
        let transport = Arc::new(Counting {
            calls: AtomicU32::new(0),
            status: 200,
        });
        let mut fast = AppConfig::new("tv", "sonarr", "http://sonarr.lan");
        fast.poll_interval_seconds = 10;
        let mut idle = AppConfig::new("off", "plex", "http://plex.lan");
        idle.poll_interval_seconds = 0;

        let poller = poller(transport.clone(), vec![fast, idle]);
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&poller).start(cancel.clone());

        // Immediate first tick, then one every 10s.
        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }
}
