//! Retry engine with exponential backoff and jitter.
//!
//! Wraps a [`Transport`] so that transient failures (transport errors and
//! retryable 5xx statuses) are absorbed and retried, while everything else is
//! handed straight back to the caller.
//!
//! Attempts are numbered from 1 and are strictly sequential. The delay before
//! attempt `n + 1` is `min(base * multiplier^(n-1) + jitter, max_delay)` where
//! jitter is uniform in `[0, 0.3 * base * multiplier^(n-1)]`, so concurrently
//! polled cards do not retry in lockstep.

use crate::transport::{FetchError, StatRequest, StatResponse, Transport};
use rand::Rng;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound of the jitter as a fraction of the pre-jitter delay.
pub const JITTER_RATIO: f64 = 0.3;

/// Predicate deciding whether a transport error on a given attempt is retried.
pub type ShouldRetry = Arc<dyn Fn(&FetchError, u32) -> bool + Send + Sync>;

/// Retry configuration for one logical request.
#[derive(Clone)]
pub struct RetryOptions {
    /// Total number of attempts (at least one is always made)
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub retryable_status_codes: BTreeSet<u16>,
    pub should_retry: ShouldRetry,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(30_000),
            retryable_status_codes: [500, 502, 503, 504].into_iter().collect(),
            should_retry: Arc::new(|_, _| true),
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("max_delay", &self.max_delay)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .finish_non_exhaustive()
    }
}

impl RetryOptions {
    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FetchError, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Delay after a failed `attempt` before jitter, capped at `max_delay`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        self.to_duration(self.pre_jitter_ms(attempt))
    }

    /// Full backoff for a failed `attempt`, drawing jitter from `rng`.
    pub fn backoff_with<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let pre = self.pre_jitter_ms(attempt);
        let jitter = if pre > 0.0 {
            rng.gen_range(0.0..=JITTER_RATIO * pre)
        } else {
            0.0
        };
        self.to_duration(pre + jitter)
    }

    /// Longest time one logical request can take: every attempt running to
    /// `per_attempt` plus the largest jittered sleep between each pair.
    pub fn worst_case_duration(&self, per_attempt: Duration) -> Duration {
        let attempts = self.attempts();
        let sleeps: Duration = (1..attempts)
            .map(|attempt| self.to_duration(self.pre_jitter_ms(attempt) * (1.0 + JITTER_RATIO)))
            .sum();
        per_attempt.saturating_mul(attempts).saturating_add(sleeps)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_with(attempt, &mut rand::thread_rng())
    }

    fn to_duration(&self, ms: f64) -> Duration {
        Duration::from_micros((ms * 1000.0).round() as u64).min(self.max_delay)
    }

    fn pre_jitter_ms(&self, attempt: u32) -> f64 {
        let max_ms = self.max_delay.as_secs_f64() * 1000.0;
        let base_ms = self.base_delay.as_secs_f64() * 1000.0;
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = base_ms * self.backoff_multiplier.powi(exponent);
        if raw.is_finite() {
            raw.clamp(0.0, max_ms)
        } else {
            max_ms
        }
    }
}

/// Execute `request` through `transport`, retrying transient failures.
///
/// Returns the first 2xx response, the first response whose status is not
/// retryable, or the last response once attempts run out. Returns `Err` only
/// when the final attempt failed at the transport level, or when
/// `should_retry` declined to retry a transport error.
pub async fn fetch_with_retry<T>(
    transport: &T,
    request: &StatRequest,
    timeout: Duration,
    options: &RetryOptions,
) -> Result<StatResponse, FetchError>
where
    T: Transport + ?Sized,
{
    let attempts = options.attempts();
    let mut attempt = 1;

    loop {
        metrics::counter!("homeboard_fetch_attempts_total").increment(1);

        let delay = match transport.execute(request, timeout).await {
            Ok(response) => {
                if response.is_success()
                    || !options.is_retryable_status(response.status)
                    || attempt >= attempts
                {
                    return Ok(response);
                }
                let delay = options.backoff(attempt);
                tracing::warn!(
                    url = %request.url,
                    attempt,
                    max_attempts = attempts,
                    status = response.status,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable status, backing off"
                );
                delay
            }
            Err(error) => {
                if !(options.should_retry)(&error, attempt) || attempt >= attempts {
                    return Err(error);
                }
                let delay = options.backoff(attempt);
                tracing::warn!(
                    url = %request.url,
                    attempt,
                    max_attempts = attempts,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, backing off"
                );
                delay
            }
        };

        metrics::counter!("homeboard_fetch_retries_total").increment(1);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
