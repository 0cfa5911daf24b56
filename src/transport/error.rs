//! Transport failure vocabulary.
//!
//! # Design Decisions
//! - A closed table of names; callers can match on the strings
//! - OS errors nobody mapped surface as `error <code>`
//! - Classification walks the error source chain, since the engine wraps
//!   socket errors several layers deep

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// A failed upstream exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("could not resolve host")]
    UnknownHost,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("connection reset")]
    ConnectionReset,

    #[error("timed out")]
    TimedOut,

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("reading response body failed: {0}")]
    BodyFailed(String),

    #[error("response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("os error {0}")]
    Os(i32),

    #[error("transport failed: {0}")]
    Unrecognized(String),
}

impl TransportError {
    /// Name reported to the caller in the `error` field.
    pub fn name(&self) -> String {
        match self {
            TransportError::UnknownHost => "UnknownHost".into(),
            TransportError::ConnectionRefused => "ConnectionRefused".into(),
            TransportError::ConnectionReset => "ConnectionReset".into(),
            TransportError::TimedOut => "TimedOut".into(),
            TransportError::ConnectFailed(_) => "ConnectFailed".into(),
            TransportError::InvalidRequest(_) => "InvalidRequest".into(),
            TransportError::BodyFailed(_) => "BodyFailed".into(),
            TransportError::ResponseTooLarge { .. } => "ResponseTooLarge".into(),
            TransportError::Os(code) => format!("error {code}"),
            TransportError::Unrecognized(_) => "error unknown".into(),
        }
    }

    /// Map a socket-level error, if its kind is one we name.
    pub fn from_io(err: &io::Error) -> Option<Self> {
        let mapped = match err.kind() {
            io::ErrorKind::ConnectionRefused => TransportError::ConnectionRefused,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe => {
                TransportError::ConnectionReset
            }
            io::ErrorKind::TimedOut => TransportError::TimedOut,
            _ => TransportError::Os(err.raw_os_error()?),
        };
        Some(mapped)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransportError::TimedOut;
        }
        if err.is_builder() {
            return TransportError::InvalidRequest(err.to_string());
        }
        if let Some(mapped) = source_chain(&err).find_map(|e| e.downcast_ref::<io::Error>().and_then(Self::from_io)) {
            return mapped;
        }
        if err.is_connect() {
            if mentions_dns(&err) {
                return TransportError::UnknownHost;
            }
            return TransportError::ConnectFailed(describe(&err));
        }
        if err.is_body() || err.is_decode() {
            return TransportError::BodyFailed(describe(&err));
        }
        TransportError::Unrecognized(describe(&err))
    }
}

fn source_chain<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |e| (*e).source())
}

// The engine reports resolver failures only through its message text.
fn mentions_dns(err: &(dyn StdError + 'static)) -> bool {
    source_chain(err).any(|e| {
        let msg = e.to_string().to_ascii_lowercase();
        msg.contains("dns error") || msg.contains("failed to lookup address")
    })
}

fn describe(err: &(dyn StdError + 'static)) -> String {
    source_chain(err).map(|e| e.to_string()).collect::<Vec<_>>().join(": ")
}
