//! Proxy resolution.
//!
//! # Responsibilities
//! - Turn an optional [`ProxySpec`] into a [`ProxyDescriptor`]
//! - Reject unknown proxy types and incomplete specs
//!
//! # Design Decisions
//! - Every proxied descriptor resolves the target name on the proxy. A local
//!   lookup of the target would leak it to the local resolver, so there is no
//!   descriptor that proxies while resolving locally.

use crate::proxy::{ProxyError, ProxyKind, ProxySpec};

/// Concrete routing instruction handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProxyDescriptor {
    /// Connect to the target directly.
    Direct,
    /// Route through an upstream proxy of the given kind.
    Proxied { kind: ProxyKind, host: String, port: u16 },
}

impl ProxyDescriptor {
    /// Whether the target hostname is resolved by the proxy rather than here.
    pub fn resolves_remotely(&self) -> bool {
        matches!(self, ProxyDescriptor::Proxied { .. })
    }

    pub fn kind(&self) -> Option<ProxyKind> {
        match self {
            ProxyDescriptor::Direct => None,
            ProxyDescriptor::Proxied { kind, .. } => Some(*kind),
        }
    }

    /// Proxy URL in the form the HTTP engine understands.
    ///
    /// SOCKS5 maps to `socks5h` and SOCKS4a to `socks4a`, both of which hand
    /// the hostname to the proxy. HTTP proxies always tunnel with `CONNECT`
    /// for `https` targets, which also carries the hostname.
    pub fn proxy_url(&self) -> Option<String> {
        let ProxyDescriptor::Proxied { kind, host, port } = self else {
            return None;
        };
        let scheme = match kind {
            ProxyKind::Http => "http",
            ProxyKind::Socks5 => "socks5h",
            ProxyKind::Socks4a => "socks4a",
        };
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.clone()
        };
        Some(format!("{scheme}://{host}:{port}"))
    }
}

impl std::fmt::Display for ProxyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyDescriptor::Direct => f.write_str("direct"),
            ProxyDescriptor::Proxied { kind, host, port } => write!(f, "{kind} {host}:{port}"),
        }
    }
}

/// Resolve an optional spec into a descriptor.
pub fn resolve(spec: Option<&ProxySpec>) -> Result<ProxyDescriptor, ProxyError> {
    let Some(spec) = spec else {
        return Ok(ProxyDescriptor::Direct);
    };
    if let Some(reason) = spec.malformed() {
        return Err(ProxyError::Malformed(reason.to_string()));
    }

    let name = spec.kind.as_deref().ok_or(ProxyError::MissingType)?;
    let kind = ProxyKind::from_type(name).ok_or_else(|| ProxyError::UnsupportedType(name.to_string()))?;

    let host = match spec.host.as_deref() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(ProxyError::MissingHost),
    };
    let port = spec.port.ok_or(ProxyError::MissingPort)?;
    let port = u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or(ProxyError::InvalidPort(port))?;

    Ok(ProxyDescriptor::Proxied { kind, host, port })
}
