//! Request admission policy.
//!
//! # Design Decisions
//! - Allow-list, not a general validator: only `POST` to `https://` URLs
//! - Loosening it is a policy change, made here and nowhere else
//! - Produces the immutable [`Request`] the rest of the pipeline consumes

use std::collections::BTreeMap;

use thiserror::Error;

use crate::protocol::WireRequest;
use crate::proxy::ProxySpec;

/// The only method the helper will issue.
pub const ALLOWED_METHOD: &str = "POST";

/// The only URL prefix the helper will issue requests to.
pub const REQUIRED_URL_PREFIX: &str = "https://";

/// Why a decoded request was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("request has no \"method\"")]
    MissingMethod,

    #[error("request has no \"url\"")]
    MissingUrl,

    #[error("method {0:?} is not \"POST\"")]
    MethodNotAllowed(String),

    #[error("url does not start with \"https://\"")]
    InsecureUrl,
}

/// A request that passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub header: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub proxy: Option<ProxySpec>,
}

/// Check a decoded request against the allow-list.
pub fn validate(wire: WireRequest) -> Result<Request, ValidationError> {
    let method = wire.method.ok_or(ValidationError::MissingMethod)?;
    let url = wire.url.ok_or(ValidationError::MissingUrl)?;

    if method != ALLOWED_METHOD {
        return Err(ValidationError::MethodNotAllowed(method));
    }
    if !url.starts_with(REQUIRED_URL_PREFIX) {
        return Err(ValidationError::InsecureUrl);
    }

    Ok(Request {
        method,
        url,
        header: wire.header.unwrap_or_default(),
        body: wire.body,
        proxy: wire.proxy,
    })
}

/// Boolean form of [`validate`].
pub fn request_ok(wire: &WireRequest) -> bool {
    validate(wire.clone()).is_ok()
}
