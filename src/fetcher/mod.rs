//! The card data-fetch pipeline.
//!
//! One call to [`StatFetcher::fetch`] sizes the request with the app's
//! timeout, runs it through the retry engine, turns any failure into a
//! [`StructuredError`], and on success refreshes the cache and records the
//! app's metric samples.

use crate::cache::TtlCache;
use crate::classify::StructuredError;
use crate::config::AppConfig;
use crate::retry::{fetch_with_retry, RetryOptions};
use crate::secrets::FieldCipher;
use crate::telemetry::sanitize_label;
use crate::timeout::TemplateRegistry;
use crate::transport::{StatRequest, Transport};
use crate::trends::{MetricEntry, MetricsStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct StatFetcher {
    transport: Arc<dyn Transport>,
    cache: Arc<TtlCache>,
    trends: Arc<MetricsStore>,
    templates: Arc<TemplateRegistry>,
    retry: RetryOptions,
    cipher: FieldCipher,
    log_payloads: bool,
}

impl StatFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<TtlCache>,
        trends: Arc<MetricsStore>,
    ) -> Self {
        Self {
            transport,
            cache,
            trends,
            templates: Arc::new(TemplateRegistry::builtin()),
            retry: RetryOptions::default(),
            cipher: FieldCipher::disabled(),
            log_payloads: false,
        }
    }

    pub fn with_templates(mut self, templates: Arc<TemplateRegistry>) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cipher(mut self, cipher: FieldCipher) -> Self {
        self.cipher = cipher;
        self
    }

    /// Log response bodies at debug level.
    pub fn with_payload_logging(mut self, enabled: bool) -> Self {
        self.log_payloads = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    pub fn trends(&self) -> &Arc<MetricsStore> {
        &self.trends
    }

    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    pub fn timeout_for(&self, app: &AppConfig) -> Duration {
        Duration::from_millis(
            self.templates
                .resolve_timeout(Some(&app.template), app.timeout_ms),
        )
    }

    /// Upper bound on one [`fetch`](Self::fetch) of `app`, retries included.
    pub fn worst_case_duration(&self, app: &AppConfig) -> Duration {
        self.retry.worst_case_duration(self.timeout_for(app))
    }

    /// Fetch the app's statistics now, bypassing the cache.
    pub async fn fetch(&self, app: &AppConfig) -> Result<Value, StructuredError> {
        let request = self.build_request(app)?;
        let timeout = self.timeout_for(app);
        let started = Instant::now();

        tracing::debug!(
            app = %app.id,
            template = %app.template,
            timeout_ms = timeout.as_millis() as u64,
            "Fetching stats"
        );

        let outcome = fetch_with_retry(self.transport.as_ref(), &request, timeout, &self.retry).await;
        metrics::histogram!(
            "homeboard_fetch_duration_seconds",
            "template" => sanitize_label(&app.template)
        )
        .record(started.elapsed().as_secs_f64());

        let result = match outcome {
            Err(error) => Err(StructuredError::from_failure(Some(&error), None)),
            Ok(response) if !response.is_success() => {
                Err(StructuredError::from_failure(None, Some(&response)))
            }
            Ok(response) => {
                if self.log_payloads {
                    tracing::debug!(app = %app.id, body = %response.body, "Stats payload");
                }
                response
                    .json()
                    .map_err(|e| StructuredError::malformed(response.status, e.to_string()))
            }
        };

        match result {
            Ok(value) => {
                self.record(app, &value);
                metrics::counter!(
                    "homeboard_fetches_total",
                    "app" => sanitize_label(&app.id),
                    "template" => sanitize_label(&app.template)
                )
                .increment(1);
                tracing::debug!(
                    app = %app.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Stats fetched"
                );
                Ok(value)
            }
            Err(error) => {
                metrics::counter!("homeboard_fetch_errors_total", "kind" => error.kind.as_str())
                    .increment(1);
                tracing::warn!(
                    app = %app.id,
                    template = %app.template,
                    kind = %error.kind,
                    status = ?error.status_code,
                    error = %error.message,
                    "Failed to fetch stats"
                );
                Err(error)
            }
        }
    }

    fn build_request(&self, app: &AppConfig) -> Result<StatRequest, StructuredError> {
        let headers = self.cipher.decrypt_headers(&app.headers).map_err(|e| {
            StructuredError::configuration(format!("credentials could not be decrypted ({})", e))
        })?;

        if let Some((name, _)) = headers
            .iter()
            .find(|(_, value)| FieldCipher::is_encrypted(value))
        {
            return Err(StructuredError::configuration(format!(
                "header {} is encrypted but no encryption key is configured",
                name
            )));
        }

        Ok(StatRequest {
            method: app.method.clone(),
            url: app.url.clone(),
            headers,
            body: None,
        })
    }

    /// Cache the payload and each selected metric, and append trend samples.
    fn record(&self, app: &AppConfig, value: &Value) {
        let ttl = Duration::from_secs(app.cache_ttl_seconds);
        let now = self.cache.now_ms();

        self.cache
            .write(&self.cache.build_key(&app.id, &app.template, None), value.clone(), ttl);

        for selector in &app.metrics {
            let Some(sample) = value.pointer(&selector.pointer).and_then(Value::as_f64) else {
                tracing::debug!(
                    app = %app.id,
                    metric = %selector.key,
                    pointer = %selector.pointer,
                    "Metric not present in response"
                );
                continue;
            };

            let key = self.cache.build_key(&app.id, &app.template, Some(&selector.key));
            self.cache.write(&key, Value::from(sample), ttl);

            let entry = MetricEntry {
                app_id: app.id.clone(),
                template_id: app.template.clone(),
                key: selector.key.clone(),
                value: sample,
                timestamp: now,
            };
            if let Err(e) = self.trends.append(entry) {
                tracing::warn!(app = %app.id, metric = %selector.key, error = %e, "Failed to record metric");
            }
        }
    }
}
