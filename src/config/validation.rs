//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Keep the listener on loopback
//! - Validate value ranges (timeouts > 0, limits within the frame prefix)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HelperConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::HelperConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),

    #[error("listener.bind_address {0} is not a loopback address")]
    NonLoopbackBind(SocketAddr),

    #[error("listener.max_connections must be greater than zero")]
    NoConnections,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("limits.{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("limits.max_request_bytes {0} does not fit a 32-bit length prefix")]
    RequestLimitTooLarge(usize),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &HelperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.listener.bind_address.parse::<SocketAddr>() {
        Ok(addr) if !addr.ip().is_loopback() => errors.push(ValidationError::NonLoopbackBind(addr)),
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone())),
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("read_ms", timeouts.read_ms),
        ("write_ms", timeouts.write_ms),
        ("transport_connect_secs", timeouts.transport_connect_secs),
        ("transport_request_secs", timeouts.transport_request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    let limits = &config.limits;
    if limits.max_request_bytes == 0 {
        errors.push(ValidationError::ZeroLimit("max_request_bytes"));
    } else if limits.max_request_bytes as u64 > u64::from(u32::MAX) {
        errors.push(ValidationError::RequestLimitTooLarge(limits.max_request_bytes));
    }
    if limits.max_response_body_bytes == 0 {
        errors.push(ValidationError::ZeroLimit("max_response_body_bytes"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
