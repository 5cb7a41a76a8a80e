//! Status command: derived connection status of configured apps.

use crate::api::AppSummary;
use crate::cli::output::{format_json, format_status_table};
use crate::cli::{load_config, StatusArgs};
use crate::config::HomeboardConfig;
use crate::engine::Engine;
use std::time::Duration;

/// Summaries of every app, or only `app_id` when given.
pub fn collect_summaries(
    engine: &Engine,
    app_id: Option<&str>,
) -> Result<Vec<AppSummary>, Box<dyn std::error::Error>> {
    let apps: Vec<_> = match app_id {
        Some(id) => vec![engine.config.app(id)?],
        None => engine.config.apps.iter().collect(),
    };

    Ok(apps
        .into_iter()
        .map(|app| {
            AppSummary::new(
                app,
                engine.poller.status(app),
                engine.poller.last_error(&app.id),
            )
        })
        .collect())
}

pub fn render(apps: &[AppSummary], json: bool) -> Result<String, Box<dyn std::error::Error>> {
    if json {
        return Ok(format_json(&apps)?);
    }
    if apps.is_empty() {
        return Ok("No apps configured".to_string());
    }
    Ok(format_status_table(apps))
}

/// Storage is reopened on every pass so that writes made by a running
/// server show up.
fn snapshot(config: &HomeboardConfig, args: &StatusArgs) -> Result<String, Box<dyn std::error::Error>> {
    let engine = Engine::from_config(config.clone())?;
    let apps = collect_summaries(&engine, args.app_id.as_deref())?;
    render(&apps, args.json)
}

/// Handle `homeboard status`
pub async fn handle_status(args: &StatusArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;

    if !args.watch {
        println!("{}", snapshot(&config, args)?);
        return Ok(());
    }

    let seconds = args
        .interval
        .unwrap_or(config.server.status_refresh_seconds)
        .max(1);
    let mut interval = tokio::time::interval(Duration::from_secs(seconds));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = interval.tick() => {
                println!("{}", snapshot(&config, args)?);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AppConfig;
    use crate::secrets::FieldCipher;
    use crate::status::ConnectionStatus;
    use crate::store::MemoryStore;
    use crate::transport::{FetchError, StatRequest, StatResponse, Transport};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn execute(
            &self,
            _request: &StatRequest,
            _timeout: Duration,
        ) -> Result<StatResponse, FetchError> {
            Err(FetchError::Network("connection refused".to_string()))
        }
    }

    fn engine() -> Engine {
        let mut config = HomeboardConfig::default();
        config.apps = vec![
            AppConfig::new("tv", "sonarr", "http://localhost:8989"),
            AppConfig::new("films", "radarr", "http://localhost:7878"),
        ];
        Engine::with_parts(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(Unreachable),
            Arc::new(ManualClock::new(1_000_000)),
            FieldCipher::disabled(),
        )
        .unwrap()
    }

    #[test]
    fn test_collect_summaries() {
        let engine = engine();
        let key = engine.cache.build_key("tv", "sonarr", None);
        engine
            .cache
            .write(&key, json!({"ok": true}), Duration::from_secs(300));

        let all = collect_summaries(&engine, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].status, ConnectionStatus::Online);
        assert_eq!(all[1].status, ConnectionStatus::Unknown);

        let one = collect_summaries(&engine, Some("films")).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].id, "films");

        assert!(collect_summaries(&engine, Some("ghost")).is_err());
    }

    #[test]
    fn test_render_json_and_empty() {
        let engine = engine();
        let apps = collect_summaries(&engine, None).unwrap();
        let json: serde_json::Value = serde_json::from_str(&render(&apps, true).unwrap()).unwrap();
        assert_eq!(json[0]["status"], "unknown");

        assert_eq!(render(&[], false).unwrap(), "No apps configured");
    }
}
