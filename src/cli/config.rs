//! Config command handlers

use crate::cli::{load_config, ConfigInitArgs, ConfigShowArgs};
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../homeboard.example.toml");

/// Handle `homeboard config init` command
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "File already exists: {}. Use --force to overwrite.",
            args.output.display()
        )
        .into());
    }

    fs::write(&args.output, EXAMPLE_CONFIG)?;

    println!("✓ Configuration file created: {}", args.output.display());
    println!("  Add your apps, then run `homeboard serve`.");

    Ok(())
}

/// Handle `homeboard config show`: the effective configuration as JSON,
/// credentials masked.
pub fn handle_config_show(args: &ConfigShowArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    Ok(serde_json::to_string_pretty(&config.masked()?)?)
}
