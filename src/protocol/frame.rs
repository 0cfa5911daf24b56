//! Length-prefixed framing.
//!
//! # Format
//! ```text
//! +----------------------+---------------------------+
//! | length: u32 (BE)     | payload: `length` bytes   |
//! +----------------------+---------------------------+
//! ```
//!
//! # Design Decisions
//! - The decoder is push-based: callers `feed` whatever the socket produced and
//!   `decode` until it returns `Ok(None)`. It never performs I/O itself.
//! - Surplus bytes past the end of a frame stay buffered for the next frame.
//! - Size limits belong to the receiver; `encode` only enforces the u32 bound.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Errors raised while framing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The peer declared a frame larger than the receiver accepts.
    #[error("declared frame length {declared} exceeds limit {limit}")]
    Oversized { declared: u64, limit: usize },

    /// A payload too long to describe with a u32 prefix.
    #[error("payload of {0} bytes cannot be framed")]
    PayloadTooLong(usize),

    /// The stream ended before a complete frame arrived.
    #[error("stream closed with {buffered} bytes of an incomplete frame buffered")]
    UnexpectedEof { buffered: usize },
}

/// Which part of a frame the decoder is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Accumulating the 4-byte length prefix.
    Length,
    /// Accumulating a payload of the given length.
    Payload(usize),
}

/// Incremental decoder for length-prefixed frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    phase: FramePhase,
    max_len: usize,
}

impl FrameDecoder {
    /// Create a decoder that rejects frames longer than `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(LENGTH_PREFIX_LEN),
            phase: FramePhase::Length,
            max_len,
        }
    }

    /// Append bytes received from the peer.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Try to produce the next complete payload.
    ///
    /// Returns `Ok(None)` when more input is needed. An oversized length prefix
    /// is reported as soon as the four prefix bytes are available, before any
    /// payload space is reserved.
    pub fn decode(&mut self) -> Result<Option<Bytes>, FrameError> {
        loop {
            match self.phase {
                FramePhase::Length => {
                    if self.buf.len() < LENGTH_PREFIX_LEN {
                        return Ok(None);
                    }
                    let declared = self.buf.get_u32();
                    if declared as u64 > self.max_len as u64 {
                        return Err(FrameError::Oversized {
                            declared: declared as u64,
                            limit: self.max_len,
                        });
                    }
                    let len = declared as usize;
                    self.buf.reserve(len.saturating_sub(self.buf.len()));
                    self.phase = FramePhase::Payload(len);
                }
                FramePhase::Payload(len) => {
                    if self.buf.len() < len {
                        return Ok(None);
                    }
                    let payload = self.buf.split_to(len).freeze();
                    self.phase = FramePhase::Length;
                    return Ok(Some(payload));
                }
            }
        }
    }

    /// Current phase of the decoder.
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Bytes still missing before the current phase completes.
    pub fn bytes_remaining(&self) -> usize {
        let wanted = match self.phase {
            FramePhase::Length => LENGTH_PREFIX_LEN,
            FramePhase::Payload(len) => len,
        };
        wanted.saturating_sub(self.buf.len())
    }

    /// Bytes received but not yet consumed by a completed phase.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// Prefix `payload` with its big-endian u32 length.
pub fn encode(payload: &[u8]) -> Result<Bytes, FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLong(payload.len()))?;
    let mut out = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out.freeze())
}

/// Read exactly one frame from `reader`.
///
/// Used by the client side, where the stream carries a single frame. The
/// decoder reads in whatever chunk sizes the stream yields.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new(max_len);
    let mut chunk = [0u8; 8 * 1024];
    loop {
        match decoder.decode() {
            Ok(Some(payload)) => return Ok(payload),
            Ok(None) => {}
            Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                FrameError::UnexpectedEof { buffered: decoder.buffered() },
            ));
        }
        decoder.feed(&chunk[..n]);
    }
}
