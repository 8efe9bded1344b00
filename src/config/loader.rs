//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::FileConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid flags: {0}")]
    Flags(#[from] clap::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load the optional TOML configuration file.
///
/// The file only supplies defaults; validation happens after flags and
/// environment variables have been merged on top of it.
pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content)?;

    tracing::debug!(path = %path.display(), "Configuration file loaded");
    Ok(config)
}
