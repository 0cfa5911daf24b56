//! Error taxonomy for a single transaction.
//!
//! | Class        | Reply sent?             | Connection            |
//! |--------------|-------------------------|-----------------------|
//! | `Protocol`   | no                      | closed immediately    |
//! | `Timeout`    | no                      | closed immediately    |
//! | `Io`         | no                      | closed immediately    |
//! | `Validation` | `{"error": ...}`        | closed after reply    |
//! | `Proxy`      | `{"error": ...}`        | closed after reply    |
//! | `Transport`  | `{"error": <name>}`     | closed after reply    |

use thiserror::Error;

use crate::protocol::{FrameError, Response, ValidationError};
use crate::proxy::ProxyError;
use crate::transport::TransportError;

/// Error string sent for requests refused by the allow-list.
pub const VALIDATION_FAILED: &str = "request failed validation";

/// Error string sent for unusable proxy specifications.
pub const INVALID_PROXY: &str = "invalid proxy specification";

/// Framing or decoding failures; the peer broke the protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("malformed request: {0}")]
    MalformedRequest(#[from] serde_json::Error),
}

/// Which deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reading,
    Writing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Reading => f.write_str("reading request"),
            Phase::Writing => f.write_str("writing response"),
        }
    }
}

/// Anything that can end a transaction early.
#[derive(Debug, Error)]
pub enum HelperError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("deadline exceeded while {0}")]
    Timeout(Phase),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HelperError {
    /// The reply owed to the caller, or `None` when the connection must
    /// simply be closed.
    pub fn wire_response(&self) -> Option<Response> {
        match self {
            HelperError::Validation(_) => Some(Response::error(VALIDATION_FAILED)),
            HelperError::Proxy(_) => Some(Response::error(INVALID_PROXY)),
            HelperError::Transport(e) => Some(Response::error(e.name())),
            HelperError::Protocol(_) | HelperError::Timeout(_) | HelperError::Io(_) => None,
        }
    }

    /// Short label used for logs and metrics.
    pub fn class(&self) -> &'static str {
        match self {
            HelperError::Protocol(_) => "protocol",
            HelperError::Validation(_) => "validation",
            HelperError::Proxy(_) => "proxy",
            HelperError::Transport(_) => "transport",
            HelperError::Timeout(_) => "timeout",
            HelperError::Io(_) => "io",
        }
    }
}

impl From<FrameError> for HelperError {
    fn from(err: FrameError) -> Self {
        HelperError::Protocol(ProtocolError::Frame(err))
    }
}
