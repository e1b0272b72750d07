//! Configuration validation.
//!
//! Serde handles the syntax; this module checks value ranges. Every problem
//! found is reported, not just the first.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// Smallest line ceiling that still fits a minimal request line.
const MIN_LINE_BYTES: usize = 16;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check value ranges of a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be at least 1",
        ));
    }
    if config.listener.backlog == 0 {
        errors.push(ValidationError::new("listener.backlog", "must be at least 1"));
    }
    if config.limits.max_line_bytes < MIN_LINE_BYTES {
        errors.push(ValidationError::new(
            "limits.max_line_bytes",
            format!("must be at least {MIN_LINE_BYTES}"),
        ));
    }
    if config.timeouts.header_read_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.header_read_secs",
            "must be greater than zero",
        ));
    }
    if config.websocket.watchdog_iterations == 0 {
        errors.push(ValidationError::new(
            "websocket.watchdog_iterations",
            "must be greater than zero",
        ));
    }
    if config.websocket.read_chunk_bytes == 0 {
        errors.push(ValidationError::new(
            "websocket.read_chunk_bytes",
            "must be greater than zero",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
