//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, backlog, concurrency).
    pub listener: ListenerConfig,

    /// Request parsing limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// WebSocket session settings.
    pub websocket: WebSocketConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Pending-connection queue length handed to `listen(2)`.
    pub backlog: u32,

    /// Maximum connection lifecycles running at once.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            backlog: 10,
            max_connections: 4,
        }
    }
}

/// Limits applied while reading a request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Ceiling for a single request or header line, CRLF included.
    pub max_line_bytes: usize,

    /// Ceiling for a request body read through `Request::read_full_body`.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: 16 * 1024,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Timeout configuration for request reads.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to receive the request line and all headers.
    pub header_read_secs: u64,

    /// Time allowed to receive a full request body.
    pub body_read_secs: u64,
}

impl TimeoutConfig {
    pub fn header_read(&self) -> Duration {
        Duration::from_secs(self.header_read_secs)
    }

    pub fn body_read(&self) -> Duration {
        Duration::from_secs(self.body_read_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            header_read_secs: 30,
            body_read_secs: 30,
        }
    }
}

/// WebSocket session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Maximum decoder state transitions per feed call.
    pub watchdog_iterations: usize,

    /// Size of each socket read handed to the decoder.
    pub read_chunk_bytes: usize,

    /// Upper bound for a reassembled fragmented message.
    pub max_message_bytes: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            watchdog_iterations: 1_000,
            read_chunk_bytes: 16 * 1024,
            max_message_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [listener]
            max_connections = 16

            [websocket]
            watchdog_iterations = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.max_connections, 16);
        assert_eq!(config.listener.backlog, 10);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.limits.max_line_bytes, 16 * 1024);
        assert_eq!(config.websocket.watchdog_iterations, 50);
        assert_eq!(config.timeouts.header_read(), Duration::from_secs(30));
    }
}
