//! Prometheus export of engine metrics.
//!
//! ## Metrics Recorded
//!
//! **Counters:**
//! - `homeboard_fetch_attempts_total` - Individual HTTP attempts
//! - `homeboard_fetch_retries_total` - Attempts followed by a backoff
//! - `homeboard_fetch_errors_total{kind}` - Failed fetches by error kind
//! - `homeboard_fetches_total{app, template}` - Successful fetches
//! - `homeboard_cache_writes_total` - Cache entries written
//!
//! **Histograms:**
//! - `homeboard_fetch_duration_seconds{template}` - Whole fetch including retries
//!
//! **Gauges:**
//! - `homeboard_apps{status}` - Apps per connection status

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Buckets sized for integration APIs that answer in 0.05s to 2 minutes
/// (the slowest template budget times the retry count).
const FETCH_DURATION_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0,
];

/// Install the global Prometheus recorder.
pub fn setup_metrics() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("homeboard_fetch_duration_seconds".to_string()),
            FETCH_DURATION_BUCKETS,
        )?
        .install_recorder()?;
    Ok(handle)
}

/// Process-wide handle for rendering metrics, installing the recorder on
/// first use.
///
/// If another recorder was installed first, a detached handle is returned;
/// it renders an empty page.
pub fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            setup_metrics().unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Metrics recorder already installed, using detached handle");
                PrometheusBuilder::new().build_recorder().handle()
            })
        })
        .clone()
}

/// Prometheus label values may not contain quotes or newlines.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '"' | '\\' | '\n' | '\r' => '_',
            c => c,
        })
        .collect()
}
