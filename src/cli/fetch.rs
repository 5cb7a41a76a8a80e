//! Fetch command: one immediate fetch through the full pipeline.

use crate::cli::output::{format_error, format_json};
use crate::cli::{load_config, FetchArgs};
use crate::config::AppConfig;
use crate::engine::Engine;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use serde_json::Value;

/// Handle `homeboard fetch <app>`. The result is cached exactly as a poll would.
pub async fn handle_fetch(args: &FetchArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    let app = config.app(&args.app_id)?.clone();
    let engine = Engine::from_config(config)?;

    let value = engine
        .poller
        .poll_app(&app)
        .await
        .map_err(|e| format_error(&e))?;
    engine.store.flush()?;

    if args.json {
        return Ok(format_json(&value)?);
    }
    Ok(format_fetch_result(&app, &value))
}

/// Metric values extracted from the payload, then the payload itself.
pub fn format_fetch_result(app: &AppConfig, value: &Value) -> String {
    let mut out = format!("✓ {} ({}) fetched\n", app.display_name(), app.template);

    if !app.metrics.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Metric", "Value"]);
        for selector in &app.metrics {
            let shown = match value.pointer(&selector.pointer) {
                Some(Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => "-".to_string(),
            };
            table.add_row(vec![Cell::new(&selector.key), Cell::new(shown)]);
        }
        out.push_str(&table.to_string());
        out.push('\n');
    }

    out.push_str(&serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
    out
}
