//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every socket suspension point of a transaction
//! - Keep read and write budgets independent
//!
//! # Design Decisions
//! - Deadlines are absolute instants; each await gets only what is left, so
//!   a peer trickling bytes cannot stretch a transaction
//! - Uses Tokio's `timeout_at`; expiry drops the wrapped future

use std::future::Future;
use std::time::Duration;

use tokio::time::{error::Elapsed, Instant};

/// A fixed point in time by which an operation must finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self { at: Instant::now() + budget }
    }

    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Budget left; zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Run `fut`, giving up when the deadline passes.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        tokio::time::timeout_at(self.at, fut).await
    }
}
