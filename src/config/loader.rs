//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Pick the address to listen on.
///
/// An explicit address wins, then `PORT` (as `0.0.0.0:<PORT>`), then the
/// configured `listener.bind_address`.
pub fn resolve_bind_address(
    explicit: Option<&str>,
    port: Option<&str>,
    config: &ServerConfig,
) -> String {
    if let Some(address) = explicit.filter(|a| !a.is_empty()) {
        return address.to_string();
    }
    if let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) {
        return format!("0.0.0.0:{port}");
    }
    config.listener.bind_address.clone()
}
