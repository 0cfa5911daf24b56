//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming loopback TCP connection
//!     → listener.rs (accept, connection limits)
//!     → server.rs (spawn handler, registry bookkeeping)
//!     → connection.rs (one frame in, one frame out, close)
//!
//! Connection States:
//!     ReadingLength → ReadingObject → Dispatching → Done
//! ```
//!
//! # Design Decisions
//! - Bounded accept via semaphore prevents resource exhaustion
//! - Handlers share nothing mutable; the registry only tracks liveness
//! - Loopback only: the listener refuses any other address

pub mod connection;
pub mod listener;
pub mod server;

pub use connection::{ConnectionHandler, ConnectionId, ConnectionSettings, SessionState, TransactionOutcome};
pub use listener::{Listener, ListenerError};
pub use server::{HandlerRegistry, HelperServer};
