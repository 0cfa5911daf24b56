//! Wire protocol subsystem.
//!
//! # Data Flow
//! ```text
//! socket bytes
//!     → frame.rs (4-byte BE length + payload, incremental)
//!     → message.rs (WireRequest JSON)
//!     → validation.rs (allow-list → Request)
//!     ... dispatch ...
//!     → message.rs (Response JSON)
//!     → frame.rs (encode)
//!     → socket bytes
//! ```
//!
//! # Design Decisions
//! - One frame in, one frame out, per connection
//! - Framing never looks at payload contents

pub mod frame;
pub mod message;
pub mod validation;

pub use frame::{FrameDecoder, FrameError, FramePhase};
pub use message::{Response, WireRequest};
pub use validation::{validate, Request, ValidationError};

/// Largest request frame accepted by default.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1_000_000;

/// Largest upstream response body relayed by default.
pub const DEFAULT_MAX_RESPONSE_BODY_BYTES: usize = 1_000_000;
