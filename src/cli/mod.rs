//! CLI module for Homeboard
//!
//! # Commands
//!
//! - `serve` - Start polling and the HTTP API
//! - `fetch` - Fetch one app's stats now
//! - `status` - Show connection status of every app
//! - `trends` - Show daily averages of a metric
//! - `sweep` - Prune dead cache entries and old metric samples
//! - `secret` - Encrypt, decrypt or mask credential values
//! - `config` - Configuration utilities (init, show)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Start with the default config file
//! homeboard serve
//!
//! # Watch app status
//! homeboard status --watch
//!
//! # Store an API key encrypted
//! HOMEBOARD_ENCRYPTION_KEY=$(homeboard secret keygen) homeboard secret encrypt my-api-key
//! ```

pub mod completions;
pub mod config;
pub mod fetch;
pub mod output;
pub mod secret;
pub mod serve;
pub mod status;
pub mod sweep;
pub mod trends;

pub use completions::handle_completions;
pub use config::{handle_config_init, handle_config_show};

use crate::config::HomeboardConfig;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "homeboard.toml";

/// Homeboard - home server dashboard statistics engine
#[derive(Parser, Debug)]
#[command(
    name = "homeboard",
    version,
    about = "Resilient statistics polling and caching for home server dashboards"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start polling apps and serve the HTTP API
    Serve(ServeArgs),
    /// Fetch one app's statistics now
    Fetch(FetchArgs),
    /// Show connection status of configured apps
    Status(StatusArgs),
    /// Show daily averages of an app metric
    Trends(TrendsArgs),
    /// Remove expired cache entries and metric samples
    Sweep(SweepArgs),
    /// Credential utilities
    #[command(subcommand)]
    Secret(SecretCommands),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "HOMEBOARD_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "HOMEBOARD_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "HOMEBOARD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Serve cached data without polling apps
    #[arg(long)]
    pub no_poll: bool,

    /// Disable the periodic sweep
    #[arg(long)]
    pub no_sweep: bool,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// App id from the configuration
    pub app_id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this app
    pub app_id: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Re-derive and print status until interrupted
    #[arg(short, long)]
    pub watch: bool,

    /// Seconds between refreshes in watch mode (default: server.status_refresh_seconds)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct TrendsArgs {
    /// App id from the configuration
    pub app_id: String,

    /// Metric key
    pub key: String,

    /// Number of days to include
    #[arg(short, long, default_value = "7")]
    pub days: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum SecretCommands {
    /// Encrypt a value with HOMEBOARD_ENCRYPTION_KEY
    Encrypt(SecretValueArgs),
    /// Decrypt an `encrypted:` value with HOMEBOARD_ENCRYPTION_KEY
    Decrypt(SecretValueArgs),
    /// Show a value the way it appears in logs and `config show`
    Mask(SecretMaskArgs),
    /// Generate a new random encryption key
    Keygen,
}

#[derive(Args, Debug)]
pub struct SecretValueArgs {
    pub value: String,
}

#[derive(Args, Debug)]
pub struct SecretMaskArgs {
    pub value: String,

    /// Characters left visible at each end
    #[arg(short, long, default_value = "4")]
    pub visible: usize,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
    /// Print the effective configuration with credentials masked
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Load the config file if present, apply env overrides and validate.
pub fn load_config(path: &Path) -> Result<HomeboardConfig, Box<dyn std::error::Error>> {
    let config = if path.exists() {
        HomeboardConfig::load(Some(path))?
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        HomeboardConfig::default()
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}
