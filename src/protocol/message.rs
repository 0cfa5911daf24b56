//! JSON payloads carried inside frames.
//!
//! Requests arrive as [`WireRequest`], a lenient mirror of the JSON object in
//! which every field is optional. Shape problems (wrong JSON types, bad base64)
//! fail decoding; semantic problems (missing method, non-TLS url) are left to
//! [`crate::protocol::validation`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::proxy::ProxySpec;

/// A request object exactly as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
    pub body: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxySpec>,
}

impl WireRequest {
    /// Decode a frame payload. Any JSON or base64 problem is an error.
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// The single reply written back on a connection.
///
/// Serializes to either `{"status": N, "body": "<base64>"}` or
/// `{"error": "<name>"}`; the two shapes never mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, try_from = "RawResponse")]
pub enum Response {
    Success {
        status: u16,
        #[serde(serialize_with = "base64_bytes::serialize")]
        body: Vec<u8>,
    },
    Error {
        error: String,
    },
}

impl Response {
    pub fn success(status: u16, body: Vec<u8>) -> Self {
        Response::Success { status, body }
    }

    pub fn error(name: impl Into<String>) -> Self {
        Response::Error { error: name.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// Permissive decoding target; an `error` key wins over anything else.
#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default, with = "base64_opt")]
    body: Option<Vec<u8>>,
}

impl TryFrom<RawResponse> for Response {
    type Error = String;

    fn try_from(raw: RawResponse) -> Result<Self, String> {
        match raw {
            RawResponse { error: Some(error), .. } if !error.is_empty() => Ok(Response::Error { error }),
            RawResponse { status: Some(status), body, .. } => Ok(Response::Success {
                status,
                body: body.unwrap_or_default(),
            }),
            _ => Err("response has neither \"status\" nor \"error\"".to_string()),
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }
}

mod base64_opt {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD.decode(encoded).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
