//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (body limit and pool capacity > 0, port valid)
//! - Reject log filters `tracing-subscriber` cannot parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function of the config

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use super::schema::ServerConfig;

/// A single semantic problem in a [`ServerConfig`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a host:port pair")]
    BindAddress(String),

    #[error("listener.max_body_bytes must be greater than 0")]
    ZeroBodyLimit,

    #[error("pool.capacity must be greater than 0")]
    ZeroPoolCapacity,

    #[error("logging.filter `{filter}` is invalid: {reason}")]
    LogFilter { filter: String, reason: String },
}

/// Check `config` and report every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_host_port(&config.listener.bind_address) {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.pool.capacity == 0 {
        errors.push(ValidationError::ZeroPoolCapacity);
    }
    if let Err(e) = EnvFilter::try_new(&config.logging.filter) {
        errors.push(ValidationError::LogFilter {
            filter: config.logging.filter.clone(),
            reason: e.to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
