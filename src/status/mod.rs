//! Connection status derived from cache recency.
//!
//! An app is considered online when it answered recently enough, offline when
//! the last answer is too old, and unknown when nothing usable is cached.
//! Nothing here is persisted; callers re-derive on an interval.

use crate::cache::TtlCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Below this age an app is online.
pub const ONLINE_THRESHOLD_MS: i64 = 5 * 60 * 1000;

/// Above this age an app is offline.
pub const OFFLINE_THRESHOLD_MS: i64 = 15 * 60 * 1000;

/// How often consumers should re-derive status.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    /// A fetch is in flight; reported by the caller, never derived
    Pending,
    Offline,
    Unknown,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Online => "online",
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Offline => "offline",
            ConnectionStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status for a last-seen age in milliseconds.
///
/// Ages between the two thresholds stay online: the entry is stale but the
/// app has not been silent long enough to be declared down.
pub fn status_for_age(age_ms: i64) -> ConnectionStatus {
    if age_ms < ONLINE_THRESHOLD_MS {
        ConnectionStatus::Online
    } else if age_ms > OFFLINE_THRESHOLD_MS {
        ConnectionStatus::Offline
    } else {
        ConnectionStatus::Online
    }
}

/// Derived status plus the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: ConnectionStatus,
    /// Epoch milliseconds of the most recent usable cache write
    pub last_seen: Option<i64>,
    pub age_ms: Option<i64>,
}

impl StatusReport {
    /// Replace a derived `unknown` with `pending` while a fetch is in flight.
    pub fn with_pending(mut self, in_flight: bool) -> Self {
        if in_flight && self.status == ConnectionStatus::Unknown {
            self.status = ConnectionStatus::Pending;
        }
        self
    }
}

pub fn derive_report(cache: &TtlCache, app_id: &str, template_id: &str) -> StatusReport {
    match cache.read_latest_timestamp_for_app(app_id, template_id) {
        Some(last_seen) => {
            let age_ms = cache.now_ms().saturating_sub(last_seen).max(0);
            StatusReport {
                status: status_for_age(age_ms),
                last_seen: Some(last_seen),
                age_ms: Some(age_ms),
            }
        }
        None => StatusReport {
            status: ConnectionStatus::Unknown,
            last_seen: None,
            age_ms: None,
        },
    }
}

pub fn derive_status(cache: &TtlCache, app_id: &str, template_id: &str) -> ConnectionStatus {
    derive_report(cache, app_id, template_id).status
}
