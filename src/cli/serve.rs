//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::cli::ServeArgs;
use crate::config::HomeboardConfig;
use crate::engine::Engine;
use crate::logging::init_tracing;
use crate::store::spawn_flusher;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<HomeboardConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        HomeboardConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        HomeboardConfig::default()
    };

    config = config.with_env_overrides();

    // CLI flags take priority over file and environment
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.no_sweep {
        config.sweep.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    cancel_token.cancel();
}

/// Run the serve command
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    init_tracing(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        apps = config.apps.len(),
        storage = ?config.storage.backend,
        "Starting Homeboard"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let engine = Arc::new(Engine::from_config(config)?);
    if !engine.store.is_available() {
        tracing::warn!("Storage unavailable, stats will not be cached");
    }
    if !engine.cipher.is_enabled() {
        tracing::info!("No encryption key set, encrypted values cannot be read");
    }

    let cancel_token = CancellationToken::new();

    let poller_handle = if args.no_poll {
        tracing::info!("Polling disabled");
        None
    } else {
        Some(Arc::clone(&engine.poller).start(cancel_token.clone()))
    };

    let sweeper_handle = if engine.config.sweep.enabled {
        Some(engine.sweeper().start(cancel_token.clone()))
    } else {
        tracing::info!("Sweep disabled");
        None
    };

    let flusher_handle = spawn_flusher(
        Arc::clone(&engine.store),
        Duration::from_secs(engine.config.storage.flush_interval_seconds),
        cancel_token.clone(),
    );

    let app_state = Arc::new(AppState::new(Arc::clone(&engine)));
    let router = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Homeboard listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await?;

    // Server stopped on its own; make sure background tasks follow
    cancel_token.cancel();

    if let Some(handle) = poller_handle {
        tracing::info!("Waiting for poller to stop...");
        let _ = handle.await;
    }
    if let Some(handle) = sweeper_handle {
        let _ = handle.await;
    }
    // Last, so writes made while the other tasks wound down are kept
    let _ = flusher_handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(config: PathBuf) -> ServeArgs {
        ServeArgs {
            config,
            port: None,
            host: None,
            log_level: None,
            no_poll: false,
            no_sweep: false,
        }
    }

    #[test]
    fn test_overrides_apply_over_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 8000\n").unwrap();

        let mut args = args(temp.path().to_path_buf());
        args.port = Some(9100);
        args.host = Some("127.0.0.1".to_string());
        args.log_level = Some("debug".to_string());
        args.no_sweep = true;

        let config = load_config_with_overrides(&args).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "debug");
        assert!(!config.sweep.enabled);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config_with_overrides(&args(PathBuf::from("/nonexistent.toml"))).unwrap();
        assert_eq!(config.server.port, HomeboardConfig::default().server.port);
    }
}
