//! Configuration schema definitions.
//!
//! Every section defaults, so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::connection::ConnectionSettings;
use crate::protocol::{DEFAULT_MAX_REQUEST_BYTES, DEFAULT_MAX_RESPONSE_BODY_BYTES};
use crate::transport::EngineSettings;

/// Root configuration for the helper.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HelperConfig {
    /// Loopback listener.
    pub listener: ListenerConfig,

    /// Per-connection and transport timeouts.
    pub timeouts: TimeoutConfig,

    /// Frame and body size limits.
    pub limits: LimitsConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

impl HelperConfig {
    /// The hot-swappable slice sampled by each accepted connection.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            read_timeout: Duration::from_millis(self.timeouts.read_ms),
            write_timeout: Duration::from_millis(self.timeouts.write_ms),
            max_request_bytes: self.limits.max_request_bytes,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            connect_timeout: Duration::from_secs(self.timeouts.transport_connect_secs),
            request_timeout: Duration::from_secs(self.timeouts.transport_request_secs),
            max_response_body_bytes: self.limits.max_response_body_bytes,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address; port 0 picks an ephemeral port.
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            max_connections: 256,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Budget for receiving the whole request frame.
    pub read_ms: u64,

    /// Budget for sending the whole response frame.
    pub write_ms: u64,

    /// Upstream connect timeout, proxy handshake included.
    pub transport_connect_secs: u64,

    /// Upstream exchange timeout, body included.
    pub transport_request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_ms: 2_000,
            write_ms: 2_000,
            transport_connect_secs: 20,
            transport_request_secs: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest request frame payload accepted.
    pub max_request_bytes: usize,

    /// Largest upstream response body relayed.
    pub max_response_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            max_response_body_bytes: DEFAULT_MAX_RESPONSE_BODY_BYTES,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
