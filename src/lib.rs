//! Homeboard - statistics engine for home server dashboards
//!
//! Polls self-hosted integrations (media servers, download clients,
//! hypervisors), classifies and retries their failures, caches results with a
//! TTL and derives each card's connection status from cache recency. Numeric
//! values are kept as a bounded history for trend charts, and credential
//! fields are masked in output and may be stored encrypted.

pub mod api;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod fetcher;
pub mod logging;
pub mod poller;
pub mod retry;
pub mod secrets;
pub mod status;
pub mod store;
pub mod sweeper;
pub mod telemetry;
pub mod timeout;
pub mod transport;
pub mod trends;
