//! Sweep command: one eviction pass over cache and metric history.

use crate::cli::output::{format_json, format_sweep_report};
use crate::cli::{load_config, SweepArgs};
use crate::engine::Engine;

/// Handle `homeboard sweep`
pub fn handle_sweep(args: &SweepArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    let engine = Engine::from_config(config)?;
    if !engine.store.is_available() {
        return Err("storage is unavailable, nothing to sweep".into());
    }

    let report = engine.sweeper().sweep_once();
    engine.store.flush()?;
    if args.json {
        return Ok(format_json(&report)?);
    }
    Ok(format_sweep_report(&report))
}
