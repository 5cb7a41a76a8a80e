//! Shared helpers for Homeboard integration tests.

#![allow(dead_code)]

use homeboard::api::{create_router, AppState};
use homeboard::clock::{Clock, SystemClock};
use homeboard::config::{AppConfig, HomeboardConfig};
use homeboard::engine::Engine;
use homeboard::retry::RetryOptions;
use homeboard::secrets::FieldCipher;
use homeboard::store::MemoryStore;
use homeboard::transport::{ReqwestTransport, Transport};
use std::sync::Arc;
use std::time::Duration;

/// Fixed key used wherever a test needs encryption.
pub const TEST_KEY: [u8; 32] = [42u8; 32];

/// Retry policy with millisecond delays so tests stay fast.
pub fn fast_retry() -> RetryOptions {
    RetryOptions {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        ..RetryOptions::default()
    }
}

/// Config with the given apps, in-memory storage and fast retries.
pub fn test_config(apps: Vec<AppConfig>) -> HomeboardConfig {
    let mut config = HomeboardConfig::default();
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config.apps = apps;
    config
}

/// Card pointing at `path` on a mock server.
pub fn app_at(id: &str, template: &str, base_url: &str, path: &str) -> AppConfig {
    AppConfig::new(id, template, format!("{}{}", base_url, path))
}

/// Engine over a real HTTP transport and in-memory storage.
pub fn test_engine(config: HomeboardConfig, cipher: FieldCipher) -> Arc<Engine> {
    engine_with(config, Arc::new(ReqwestTransport::new()), Arc::new(SystemClock), cipher)
}

pub fn engine_with(
    config: HomeboardConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    cipher: FieldCipher,
) -> Arc<Engine> {
    Arc::new(
        Engine::with_parts(config, Arc::new(MemoryStore::new()), transport, clock, cipher)
            .expect("test engine"),
    )
}

pub fn router_for(engine: Arc<Engine>) -> axum::Router {
    create_router(Arc::new(AppState::new(engine)))
}
