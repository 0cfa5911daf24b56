//! reqwest-backed transport.
//!
//! # Responsibilities
//! - Keep one engine client per routing descriptor (direct, or per proxy)
//! - Translate a [`TransportRequest`] into an engine request, headers verbatim
//! - Buffer the response body under a hard cap
//!
//! # Design Decisions
//! - Redirect following is disabled; a 3xx is an ordinary response
//! - HTTP/1.1 only, so a caller-supplied `Host` header goes on the wire as-is
//! - The direct client ignores environment proxy variables

use std::time::Duration;

use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect, Client, ClientBuilder, Method, Proxy};
use url::Url;

use crate::proxy::ProxyDescriptor;
use crate::transport::{HttpTransport, TransportError, TransportRequest, TransportResponse};

/// Engine tuning taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Time allowed to establish the upstream connection (proxy included).
    pub connect_timeout: Duration,
    /// Time allowed for the whole exchange, body included.
    pub request_timeout: Duration,
    /// Largest response body relayed to the caller.
    pub max_response_body_bytes: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(50),
            max_response_body_bytes: crate::protocol::DEFAULT_MAX_RESPONSE_BODY_BYTES,
        }
    }
}

/// The production [`HttpTransport`].
pub struct ReqwestTransport {
    settings: EngineSettings,
    direct: Client,
    proxied: DashMap<ProxyDescriptor, Client>,
}

impl ReqwestTransport {
    pub fn new(settings: EngineSettings) -> Result<Self, TransportError> {
        let direct = Self::client_builder(&settings).no_proxy().build()?;
        Ok(Self {
            settings,
            direct,
            proxied: DashMap::new(),
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn client_builder(settings: &EngineSettings) -> ClientBuilder {
        Client::builder()
            .redirect(redirect::Policy::none())
            .http1_only()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
    }

    /// Client routed according to `descriptor`, built on first use.
    fn client_for(&self, descriptor: &ProxyDescriptor) -> Result<Client, TransportError> {
        let Some(proxy_url) = descriptor.proxy_url() else {
            return Ok(self.direct.clone());
        };
        if let Some(client) = self.proxied.get(descriptor) {
            return Ok(client.clone());
        }

        let proxy = Proxy::all(&proxy_url).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let client = Self::client_builder(&self.settings).proxy(proxy).build()?;
        tracing::debug!(proxy = %descriptor, "Built proxied engine client");
        self.proxied.insert(descriptor.clone(), client.clone());
        Ok(client)
    }

    fn build_request(client: &Client, request: TransportRequest) -> Result<reqwest::Request, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("method: {e}")))?;
        let url = Url::parse(&request.url).map_err(|e| TransportError::InvalidRequest(format!("url: {e}")))?;

        let mut headers = HeaderMap::with_capacity(request.header.len() + 1);
        for (name, value) in &request.header {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(format!("header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = client.request(method, url);
        if let Some(body) = request.body {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
            }
            builder = builder.body(body);
        }
        builder.headers(headers).build().map_err(TransportError::from)
    }
}

impl HttpTransport for ReqwestTransport {
    async fn round_trip(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client_for(&request.proxy)?;
        let request = Self::build_request(&client, request)?;
        let mut response = client.execute(request).await?;

        let status = response.status().as_u16();
        let limit = self.settings.max_response_body_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(TransportError::ResponseTooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(TransportError::ResponseTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(TransportResponse { status, body })
    }
}
