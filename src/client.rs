//! Controller side of the helper protocol.
//!
//! A [`HelperClient`] opens one connection per request, writes one frame,
//! reads one frame and hangs up, mirroring what the helper expects.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::Phase;
use crate::protocol::frame::{self, FrameError};
use crate::protocol::{Response, WireRequest};
use crate::resilience::Deadline;

/// Default cap on a response frame read back from the helper.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10_000_000;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to helper: {0}")]
    Connect(std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("deadline exceeded while {0}")]
    Timeout(Phase),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("cannot encode request: {0}")]
    Encode(serde_json::Error),

    #[error("cannot decode helper response: {0}")]
    Decode(serde_json::Error),

    #[error("helper returned error: {0}")]
    Helper(String),
}

/// Deadlines and limits for talking to a helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Budget for connecting and sending the request frame.
    pub write_timeout: Duration,
    /// Budget for receiving the response frame.
    pub read_timeout: Duration,
    pub max_response_bytes: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(60),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// What the upstream server said, as relayed by the helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub struct HelperClient {
    addr: SocketAddr,
    options: ClientOptions,
}

impl HelperClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_options(addr, ClientOptions::default())
    }

    pub fn with_options(addr: SocketAddr, options: ClientOptions) -> Self {
        Self { addr, options }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run one transaction against the helper.
    pub async fn round_trip(&self, request: &WireRequest) -> Result<HelperResponse, ClientError> {
        let payload = request.to_json().map_err(ClientError::Encode)?;
        let outgoing = frame::encode(&payload)?;

        let write_deadline = Deadline::after(self.options.write_timeout);
        let mut stream = write_deadline
            .run(TcpStream::connect(self.addr))
            .await
            .map_err(|_| ClientError::Timeout(Phase::Writing))?
            .map_err(ClientError::Connect)?;
        write_deadline
            .run(stream.write_all(&outgoing))
            .await
            .map_err(|_| ClientError::Timeout(Phase::Writing))??;

        let read_deadline = Deadline::after(self.options.read_timeout);
        let incoming = read_deadline
            .run(frame::read_frame(&mut stream, self.options.max_response_bytes))
            .await
            .map_err(|_| ClientError::Timeout(Phase::Reading))??;

        match Response::from_json(&incoming).map_err(ClientError::Decode)? {
            Response::Success { status, body } => Ok(HelperResponse { status, body }),
            Response::Error { error } => Err(ClientError::Helper(error)),
        }
    }
}
