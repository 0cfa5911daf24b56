//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every connection runs inside a `connection` span (id, peer):
//!     → logging.rs (structured events on stderr)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → whoever launched the helper (stderr)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Bodies never reach the logs, only sizes and outcomes
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
