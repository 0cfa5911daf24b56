//! Upstream proxy subsystem.
//!
//! # Data Flow
//! ```text
//! request.proxy (wire JSON)
//!     → spec.rs (ProxySpec, lenient shape)
//!     → resolver.rs (ProxyDescriptor or ProxyError)
//!     → transport (one engine client per descriptor)
//! ```

pub mod resolver;
pub mod spec;

use thiserror::Error;

pub use resolver::{resolve, ProxyDescriptor};
pub use spec::{ProxyKind, ProxySpec};

/// Reasons a proxy specification cannot be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProxyError {
    #[error("malformed proxy spec: {0}")]
    Malformed(String),

    #[error("proxy spec has no type")]
    MissingType,

    #[error("unsupported proxy type {0:?}")]
    UnsupportedType(String),

    #[error("proxy spec has no host")]
    MissingHost,

    #[error("proxy spec has no port")]
    MissingPort,

    #[error("proxy port {0} out of range")]
    InvalidPort(i64),

    #[error("proxy credentials are not supported")]
    CredentialsNotSupported,

    #[error("invalid proxy url: {0}")]
    InvalidUrl(String),
}
