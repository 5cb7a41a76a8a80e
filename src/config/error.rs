//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Duplicate app id: {0}")]
    DuplicateApp(String),

    #[error("Unknown app id: {0}")]
    UnknownApp(String),

    #[error("Field encryption is required but {0} is not set to a valid key")]
    EncryptionKeyRequired(&'static str),
}
