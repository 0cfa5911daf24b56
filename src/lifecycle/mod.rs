//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build transport → Bind → Announce port
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Abort live handlers → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listen announcement is printed only once the socket is bound
//! - In-flight transactions are not drained; callers retry on a new connection

pub mod shutdown;
pub mod signals;

use std::io::Write;
use std::net::SocketAddr;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;

/// Prefix of the line announcing the bound address on stdout.
pub const LISTEN_ANNOUNCEMENT: &str = "meek-http-helper: listen";

/// The announcement line for `addr`, without the trailing newline.
pub fn listen_line(addr: SocketAddr) -> String {
    format!("{LISTEN_ANNOUNCEMENT} {addr}")
}

/// Print the announcement line and flush it.
pub fn announce_listen<W: Write>(out: &mut W, addr: SocketAddr) -> std::io::Result<()> {
    writeln!(out, "{}", listen_line(addr))?;
    out.flush()
}
