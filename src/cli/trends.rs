//! Trends command: daily averages of a recorded metric.

use crate::api::TrendsResponse;
use crate::cli::output::{format_json, format_trends_table};
use crate::cli::{load_config, TrendsArgs};
use crate::trends::MetricsStore;

pub fn build_trends(
    trends: &MetricsStore,
    app_id: &str,
    template_id: &str,
    key: &str,
    days: u32,
) -> Result<TrendsResponse, Box<dyn std::error::Error>> {
    if days == 0 {
        return Err("--days must be at least 1".into());
    }
    Ok(TrendsResponse {
        app_id: app_id.to_string(),
        template: template_id.to_string(),
        key: key.to_string(),
        days,
        samples: trends.query(app_id, template_id, key, days).len(),
        daily: trends.daily_average(app_id, template_id, key, days),
    })
}

/// Handle `homeboard trends <app> <key>`
pub fn handle_trends(args: &TrendsArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    let app = config.app(&args.app_id)?.clone();
    let engine = crate::engine::Engine::from_config(config)?;

    let response = build_trends(&engine.trends, &app.id, &app.template, &args.key, args.days)?;
    if args.json {
        return Ok(format_json(&response)?);
    }
    if response.daily.is_empty() {
        return Ok(format!(
            "No samples for '{}' on {} in the last {} days",
            args.key, app.id, args.days
        ));
    }
    Ok(format!(
        "{} samples over {} days\n{}",
        response.samples,
        response.days,
        format_trends_table(&response.daily)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use crate::trends::MetricEntry;
    use std::sync::Arc;

    const NOON: i64 = 1_710_072_000_000;

    #[test]
    fn test_build_trends() {
        let trends = MetricsStore::new(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(NOON)));
        for value in [10.0, 20.0] {
            trends
                .append(MetricEntry {
                    app_id: "tv".to_string(),
                    template_id: "sonarr".to_string(),
                    key: "queue".to_string(),
                    value,
                    timestamp: NOON - 1_000,
                })
                .unwrap();
        }

        let response = build_trends(&trends, "tv", "sonarr", "queue", 7).unwrap();
        assert_eq!(response.samples, 2);
        assert_eq!(response.daily.len(), 1);
        assert_eq!(response.daily[0].value, 15);
    }

    #[test]
    fn test_build_trends_rejects_zero_days() {
        let trends = MetricsStore::new(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(NOON)));
        assert!(build_trends(&trends, "tv", "sonarr", "queue", 0).is_err());
    }
}
