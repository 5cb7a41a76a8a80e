//! Wiring of storage, cache, trends, fetcher and poller from configuration.

use crate::cache::TtlCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, HomeboardConfig};
use crate::fetcher::StatFetcher;
use crate::poller::CardPoller;
use crate::secrets::{FieldCipher, KEY_ENV_VAR};
use crate::store::{open_store, KeyValueStore};
use crate::sweeper::Sweeper;
use crate::timeout::TemplateRegistry;
use crate::transport::{ReqwestTransport, Transport};
use crate::trends::MetricsStore;
use std::sync::Arc;
use std::time::Duration;

/// Headroom over the slowest refresh for routing and serialization.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// All long-lived components of a running instance.
pub struct Engine {
    pub config: Arc<HomeboardConfig>,
    pub store: Arc<dyn KeyValueStore>,
    pub cache: Arc<TtlCache>,
    pub trends: Arc<MetricsStore>,
    pub templates: Arc<TemplateRegistry>,
    pub fetcher: Arc<StatFetcher>,
    pub poller: Arc<CardPoller>,
    pub cipher: FieldCipher,
}

impl Engine {
    /// Production wiring: reqwest transport, system clock, key from the environment.
    pub fn from_config(config: HomeboardConfig) -> Result<Self, ConfigError> {
        let store = open_store(&config.storage);
        Self::with_parts(
            config,
            store,
            Arc::new(ReqwestTransport::new()),
            Arc::new(SystemClock),
            FieldCipher::from_env(),
        )
    }

    pub fn with_parts(
        config: HomeboardConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        cipher: FieldCipher,
    ) -> Result<Self, ConfigError> {
        config.storage.validate_prefixes()?;
        if config.secrets.require_encryption && !cipher.is_enabled() {
            return Err(ConfigError::EncryptionKeyRequired(KEY_ENV_VAR));
        }

        let cache = Arc::new(TtlCache::with_prefix(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.storage.cache_prefix.clone(),
        ));
        let trends = Arc::new(MetricsStore::with_prefix(
            Arc::clone(&store),
            clock,
            config.storage.metrics_prefix.clone(),
        ));
        let templates = Arc::new(TemplateRegistry::builtin().with_overrides(&config.timeouts));

        let fetcher = Arc::new(
            StatFetcher::new(transport, Arc::clone(&cache), Arc::clone(&trends))
                .with_templates(Arc::clone(&templates))
                .with_retry(config.retry.to_options())
                .with_cipher(cipher.clone())
                .with_payload_logging(config.logging.log_payloads),
        );
        let poller = Arc::new(CardPoller::new(Arc::clone(&fetcher), config.apps.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            cache,
            trends,
            templates,
            fetcher,
            poller,
            cipher,
        })
    }

    /// Timeout for API requests: the configured value, raised when needed
    /// so that a manual refresh of the slowest app can finish its retries.
    pub fn request_timeout(&self) -> Duration {
        let configured = Duration::from_secs(self.config.server.request_timeout_seconds.max(1));
        let slowest = self
            .config
            .apps
            .iter()
            .map(|app| self.fetcher.worst_case_duration(app))
            .max()
            .unwrap_or_default();

        let needed = slowest.saturating_add(REQUEST_TIMEOUT_SLACK);
        if needed > configured {
            tracing::debug!(
                configured_seconds = configured.as_secs(),
                needed_ms = needed.as_millis() as u64,
                "Raising API request timeout to cover refresh retries"
            );
            needed
        } else {
            configured
        }
    }

    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.trends),
            self.config.sweep.clone(),
        )
    }
}
