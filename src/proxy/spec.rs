//! Proxy specifications as carried in requests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::{Host, Url};

use crate::proxy::ProxyError;

/// Upstream proxy protocols the helper can route through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    /// HTTP proxy, reached with `CONNECT`.
    Http,
    Socks5,
    Socks4a,
}

impl ProxyKind {
    /// Parse the `type` field of a proxy spec. `socks` and `socks4` are not
    /// accepted: neither guarantees proxy-side name resolution.
    pub fn from_type(name: &str) -> Option<Self> {
        match name {
            "http" => Some(ProxyKind::Http),
            "socks5" => Some(ProxyKind::Socks5),
            "socks4a" => Some(ProxyKind::Socks4a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Socks5 => "socks5",
            ProxyKind::Socks4a => "socks4a",
        }
    }
}

impl std::fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `proxy` object of a request.
///
/// Decoding never fails on the proxy member itself: missing fields stay
/// `None` and anything of the wrong shape is recorded, so a bad spec
/// reaches the resolver and earns an error response instead of failing
/// request decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct ProxySpec {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,

    /// Why the received value could not be read as a spec.
    #[serde(skip)]
    pub(crate) malformed: Option<String>,
}

impl ProxySpec {
    pub fn new(kind: ProxyKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: Some(kind.as_str().to_string()),
            host: Some(host.into()),
            port: Some(i64::from(port)),
            malformed: None,
        }
    }

    /// Shape problem found while decoding, if any.
    pub fn malformed(&self) -> Option<&str> {
        self.malformed.as_deref()
    }

    /// Build a spec from an upstream proxy URL such as `socks5://127.0.0.1:9050`.
    ///
    /// The port must be explicit and credentials are refused, since the
    /// request format has no place to carry them.
    pub fn from_proxy_url(raw: &str) -> Result<Self, ProxyError> {
        let url = Url::parse(raw).map_err(|e| ProxyError::InvalidUrl(format!("{raw:?}: {e}")))?;
        let kind = ProxyKind::from_type(url.scheme()).ok_or_else(|| ProxyError::UnsupportedType(url.scheme().to_string()))?;

        if !url.username().is_empty() || url.password().is_some() {
            return Err(ProxyError::CredentialsNotSupported);
        }

        let host = match url.host() {
            Some(Host::Domain(name)) if !name.is_empty() => name.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(ProxyError::MissingHost),
        };

        let port = match url.port() {
            Some(port) => port,
            // `http://h:80` parses with the default port elided.
            None if names_default_port(raw, &url) => url.port_or_known_default().ok_or(ProxyError::MissingPort)?,
            None => return Err(ProxyError::MissingPort),
        };
        if port == 0 {
            return Err(ProxyError::InvalidPort(0));
        }

        Ok(Self::new(kind, host, port))
    }
}

/// Whether the authority of `raw` spells out the scheme's default port.
fn names_default_port(raw: &str, url: &Url) -> bool {
    let Some(default) = url.port_or_known_default() else {
        return false;
    };
    raw.split_once("://")
        .and_then(|(_, rest)| rest.split(&['/', '?', '#'][..]).next())
        .is_some_and(|authority| authority.ends_with(&format!(":{default}")))
}

impl From<Value> for ProxySpec {
    fn from(value: Value) -> Self {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Self {
                    malformed: Some(format!("expected an object, got {}", json_type(&other))),
                    ..Self::default()
                }
            }
        };

        let mut problems = Vec::new();
        let kind = take_string(&mut fields, "type", &mut problems);
        let host = take_string(&mut fields, "host", &mut problems);
        let port = match fields.remove("port") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) if n.as_i64().is_some() => n.as_i64(),
            Some(other) => {
                problems.push(format!("\"port\" must be an integer, got {}", json_type(&other)));
                None
            }
        };

        Self {
            kind,
            host,
            port,
            malformed: (!problems.is_empty()).then(|| problems.join("; ")),
        }
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str, problems: &mut Vec<String>) -> Option<String> {
    match fields.remove(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            problems.push(format!("{key:?} must be a string, got {}", json_type(&other)));
            None
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
