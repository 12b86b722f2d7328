//! Blocking queues with cancellation.
//!
//! All queues serialize access with one internal lock and coordinate
//! producers, consumers, and drain observers through
//! [`Condition`](crate::Condition)s over that lock. Cancellation is a
//! terminal state: once [`Queue::cancel`] has run, every producer is
//! rejected, and consumers drain the remaining items before failing.
//!
//! - [`BlockingQueue`]: unbounded; consumers block while empty
//! - [`BoundedQueue`]: adds a capacity producers block on, and an
//!   `empty` drain observer
//! - [`MonitoredQueue`]: unbounded with the drain observer
//!
//! Every queue also implements [`Lockable`](crate::Lockable), exposing
//! its serialization lock so callers can compose several queue
//! operations into one atomic step.

mod blocking;
mod bounded;
mod monitored;

pub use blocking::BlockingQueue;
pub use bounded::BoundedQueue;
pub use monitored::MonitoredQueue;

use std::time::Duration;

use crate::error::Result;

/// Capability shared by the queues in this module.
pub trait Queue<T> {
    /// Appends `item`, blocking while the queue cannot accept it.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Canceled`](crate::ErrorKind::Canceled) once the queue
    /// is canceled; [`ErrorKind::Interrupted`](crate::ErrorKind::Interrupted)
    /// if the thread was interrupted while blocked.
    fn add(&self, item: T) -> Result<()>;

    /// Like [`Queue::add`] with a whole-operation time budget.
    ///
    /// Returns `Ok(false)` if the item could not be added in time.
    fn add_timeout(&self, item: T, timeout: Duration) -> Result<bool>;

    /// Removes and returns the head item, blocking while the queue is
    /// empty and not canceled.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Canceled`](crate::ErrorKind::Canceled) once the queue
    /// is canceled *and* drained;
    /// [`ErrorKind::Interrupted`](crate::ErrorKind::Interrupted) if the
    /// thread was interrupted while blocked.
    fn next(&self) -> Result<T>;

    /// Like [`Queue::next`] with a whole-operation time budget.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Timeout`](crate::ErrorKind::Timeout) if no item
    /// arrived in time, in addition to the [`Queue::next`] errors.
    fn next_timeout(&self, timeout: Duration) -> Result<T>;

    /// Number of items currently stored.
    fn size(&self) -> usize;

    /// Cancels the queue: a terminal transition that wakes every blocked
    /// producer and consumer.
    fn cancel(&self);

    /// Whether the queue has been canceled.
    fn is_canceled(&self) -> bool;
}
