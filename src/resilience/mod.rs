//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connection accepted:
//!     → timeouts.rs (read deadline armed)
//!     → every socket read bounded by what is left of it
//! Response ready:
//!     → timeouts.rs (write deadline armed)
//!     → frame write + close bounded by it
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every socket wait has a deadline
//! - Nothing is retried; the caller reconnects and resends

pub mod timeouts;

pub use timeouts::Deadline;
