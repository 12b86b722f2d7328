//! Internal deadline bookkeeping for timed operations.
//!
//! All blocking operations in this crate treat a timeout as a
//! whole-operation budget. A [`Deadline`] converts that budget into an
//! absolute instant once, so a wait that is retried (e.g. after a
//! condition wake that did not satisfy the predicate) only ever waits for
//! the time that remains.

use std::time::{Duration, Instant};

/// An absolute point in time by which an operation must complete.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Start a deadline `budget` from now.
    pub(crate) fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Time left before the deadline, `Duration::ZERO` once it has passed.
    pub(crate) fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    pub(crate) fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}
