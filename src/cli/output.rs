//! Output formatting helpers for CLI commands

use crate::api::AppSummary;
use crate::classify::StructuredError;
use crate::status::ConnectionStatus;
use crate::sweeper::SweepReport;
use crate::trends::DailyAverage;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;

/// Render `value` as pretty JSON.
pub fn format_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Human-friendly age such as `42s ago` or `3h 5m ago`.
pub fn format_age(age_ms: i64) -> String {
    let secs = age_ms.max(0) / 1000;
    match secs {
        s if s < 60 => format!("{}s ago", s),
        s if s < 3600 => format!("{}m {}s ago", s / 60, s % 60),
        s if s < 86_400 => format!("{}h {}m ago", s / 3600, (s % 3600) / 60),
        s => format!("{}d {}h ago", s / 86_400, (s % 86_400) / 3600),
    }
}

/// Colored status label
pub fn status_label(status: ConnectionStatus) -> String {
    match status {
        ConnectionStatus::Online => "online".green().to_string(),
        ConnectionStatus::Pending => "pending".cyan().to_string(),
        ConnectionStatus::Offline => "offline".red().to_string(),
        ConnectionStatus::Unknown => "unknown".yellow().to_string(),
    }
}

/// Get status icon for connection status
pub fn status_icon(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Online => "✓",
        ConnectionStatus::Pending => "…",
        ConnectionStatus::Offline => "✗",
        ConnectionStatus::Unknown => "?",
    }
}

/// Format app statuses as a table
pub fn format_status_table(apps: &[AppSummary]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["", "App", "Template", "Status", "Last seen"]);

    for app in apps {
        let last_seen = app
            .age_ms
            .map(format_age)
            .unwrap_or_else(|| "never".to_string());
        table.add_row(vec![
            Cell::new(status_icon(app.status)),
            Cell::new(format!("{} ({})", app.name, app.id)),
            Cell::new(&app.template),
            Cell::new(status_label(app.status)),
            Cell::new(last_seen),
        ]);
    }

    table.to_string()
}

/// Format daily averages as a table
pub fn format_trends_table(daily: &[DailyAverage]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Date", "Average"]);

    for day in daily {
        table.add_row(vec![Cell::new(day.date), Cell::new(day.value)]);
    }

    table.to_string()
}

pub fn format_sweep_report(report: &SweepReport) -> String {
    format!(
        "✓ Sweep complete: {} cache entries, {} metric samples, {} empty series removed",
        report.cache_entries_removed, report.metric_entries_removed, report.metric_series_removed
    )
}

/// Message plus hint, the way failures are shown on a card.
pub fn format_error(error: &StructuredError) -> String {
    let mut out = format!("{} {}", "✗".red(), error.message);
    out.push_str(&format!("\n  {} {}", "hint:".bold(), error.hint));
    out
}
