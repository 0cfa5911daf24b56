//! HTTP transport boundary.
//!
//! # Data Flow
//! ```text
//! validated Request + ProxyDescriptor
//!     → TransportRequest
//!     → HttpTransport::round_trip (engine.rs: reqwest)
//!     → TransportResponse { status, body } | TransportError
//! ```
//!
//! # Design Decisions
//! - Exactly one outcome per request; nothing is retried
//! - Redirects are returned to the caller, never followed
//! - The response body cap is a failure, never a truncation

pub mod engine;
pub mod error;

use std::collections::BTreeMap;
use std::future::Future;

use crate::protocol::Request;
use crate::proxy::ProxyDescriptor;

pub use engine::{EngineSettings, ReqwestTransport};
pub use error::TransportError;

/// A fully specified upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: String,
    pub url: String,
    pub header: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub proxy: ProxyDescriptor,
}

impl TransportRequest {
    pub fn new(request: Request, proxy: ProxyDescriptor) -> Self {
        Self {
            method: request.method,
            url: request.url,
            header: request.header,
            body: request.body,
            proxy,
        }
    }
}

/// A completed upstream exchange, whatever its status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Something that can perform one HTTP exchange.
///
/// Dropping the returned future cancels the exchange.
pub trait HttpTransport: Send + Sync + 'static {
    fn round_trip(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}
