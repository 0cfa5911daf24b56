//! Per-connection transaction state machine.
//!
//! # States
//! ```text
//! ReadingLength → ReadingObject → Dispatching → Done
//!       │               │              │
//!       └── oversized / malformed / EOF / read deadline ──→ Done (no reply)
//! ```
//!
//! # Responsibilities
//! - Read exactly one request frame under the read deadline
//! - Validate, resolve the proxy, and hand the request to the transport
//! - Write exactly one response frame under the write deadline, then close
//!
//! # Design Decisions
//! - Each handler owns its stream and decoder; handlers share nothing but the
//!   transport
//! - Read and write budgets are separate absolute deadlines
//! - The connection is closed when the handler is dropped, whatever happened

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{HelperError, Phase, ProtocolError};
use crate::observability::metrics;
use crate::protocol::frame::{self, FrameDecoder, FrameError, FramePhase};
use crate::protocol::{validate, Response, WireRequest};
use crate::proxy::resolve;
use crate::resilience::Deadline;
use crate::transport::{HttpTransport, TransportRequest, TransportResponse};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

const READ_CHUNK: usize = 16 * 1024;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a transaction currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    ReadingLength,
    ReadingObject,
    Dispatching,
    Done,
}

/// Limits sampled once when a connection is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_request_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
            max_request_bytes: crate::protocol::DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

/// How a transaction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Upstream answered; its status was relayed.
    Success { status: u16 },
    /// Refused by the allow-list; an error reply was sent.
    Rejected,
    /// Unusable proxy spec; an error reply was sent.
    ProxyRejected,
    /// The transport failed; its name was relayed.
    TransportFailed { name: String },
    /// Closed without a reply.
    Aborted { class: &'static str },
}

impl TransactionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionOutcome::Success { .. } => "success",
            TransactionOutcome::Rejected => "rejected",
            TransactionOutcome::ProxyRejected => "proxy_rejected",
            TransactionOutcome::TransportFailed { .. } => "transport_error",
            TransactionOutcome::Aborted { .. } => "aborted",
        }
    }

    fn for_reported(err: &HelperError) -> Self {
        match err {
            HelperError::Validation(_) => TransactionOutcome::Rejected,
            HelperError::Proxy(_) => TransactionOutcome::ProxyRejected,
            HelperError::Transport(e) => TransactionOutcome::TransportFailed { name: e.name() },
            other => TransactionOutcome::Aborted { class: other.class() },
        }
    }
}

/// Owns one accepted connection from first byte to close.
pub struct ConnectionHandler<S, T> {
    id: ConnectionId,
    stream: S,
    transport: Arc<T>,
    settings: ConnectionSettings,
    state: SessionState,
}

impl<S, T> ConnectionHandler<S, T>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    T: HttpTransport,
{
    pub fn new(id: ConnectionId, stream: S, transport: Arc<T>, settings: ConnectionSettings) -> Self {
        Self {
            id,
            stream,
            transport,
            settings,
            state: SessionState::ReadingLength,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the transaction to completion and close the connection.
    pub async fn run(mut self) -> TransactionOutcome {
        let started = Instant::now();
        metrics::connection_opened();

        let outcome = match self.transact().await {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    HelperError::Timeout(_) => tracing::debug!(error = %err, "Deadline expired, closing"),
                    HelperError::Io(_) => tracing::debug!(error = %err, "Connection failed, closing"),
                    _ => tracing::warn!(error = %err, "Protocol violation, closing without reply"),
                }
                TransactionOutcome::Aborted { class: err.class() }
            }
        };

        self.transition(SessionState::Done);
        metrics::connection_closed();
        metrics::record_transaction(outcome.label(), started);
        outcome
    }

    async fn transact(&mut self) -> Result<TransactionOutcome, HelperError> {
        let read_deadline = Deadline::after(self.settings.read_timeout);
        let wire = self.read_request(read_deadline).await?;

        self.transition(SessionState::Dispatching);
        let (response, outcome) = match Self::exchange(&self.transport, wire).await {
            Ok(TransportResponse { status, body }) => {
                tracing::debug!(status, body_len = body.len(), "Upstream responded");
                metrics::record_response_body(body.len());
                (Response::success(status, body), TransactionOutcome::Success { status })
            }
            Err(err) => {
                let Some(response) = err.wire_response() else {
                    return Err(err);
                };
                match &err {
                    HelperError::Transport(_) => tracing::warn!(error = %err, "Upstream request failed"),
                    _ => tracing::debug!(error = %err, "Request refused"),
                }
                (response, TransactionOutcome::for_reported(&err))
            }
        };

        let write_deadline = Deadline::after(self.settings.write_timeout);
        self.write_response(&response, write_deadline).await?;
        Ok(outcome)
    }

    /// Accumulate one frame, tolerating any chunking, and decode it.
    async fn read_request(&mut self, deadline: Deadline) -> Result<WireRequest, HelperError> {
        let mut decoder = FrameDecoder::new(self.settings.max_request_bytes);
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            if let Some(payload) = decoder.decode()? {
                return WireRequest::from_json(&payload).map_err(|e| ProtocolError::from(e).into());
            }
            self.transition(match decoder.phase() {
                FramePhase::Length => SessionState::ReadingLength,
                FramePhase::Payload(_) => SessionState::ReadingObject,
            });

            let n = deadline
                .run(self.stream.read(&mut chunk))
                .await
                .map_err(|_| HelperError::Timeout(Phase::Reading))??;
            if n == 0 {
                return Err(FrameError::UnexpectedEof { buffered: decoder.buffered() }.into());
            }
            decoder.feed(&chunk[..n]);
        }
    }

    async fn exchange(transport: &T, wire: WireRequest) -> Result<TransportResponse, HelperError> {
        let request = validate(wire)?;
        let proxy = resolve(request.proxy.as_ref())?;
        tracing::debug!(url = %request.url, proxy = %proxy, "Dispatching request");
        Ok(transport.round_trip(TransportRequest::new(request, proxy)).await?)
    }

    /// Write the whole frame, or nothing past the deadline.
    async fn write_response(&mut self, response: &Response, deadline: Deadline) -> Result<(), HelperError> {
        let payload = response
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let frame = frame::encode(&payload)?;

        let stream = &mut self.stream;
        deadline
            .run(async move {
                stream.write_all(&frame).await?;
                stream.flush().await?;
                stream.shutdown().await
            })
            .await
            .map_err(|_| HelperError::Timeout(Phase::Writing))??;
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::trace!(connection_id = %self.id, from = ?self.state, to = ?next, "State transition");
            self.state = next;
        }
    }
}
