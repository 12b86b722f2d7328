//! Blocking synchronization primitives.
//!
//! Everything in this module waits through the per-thread
//! [`Monitor`](crate::Monitor): a primitive keeps an ordered list of the
//! waiting threads' monitors and wakes them through a non-blocking
//! handoff. The primitives differ in their fairness discipline:
//!
//! - [`FastLock`]: uncontended-fast raw lock, no queue discipline
//! - [`Mutex`]: FIFO handoff, interruptible, deadlock-checked
//! - [`Semaphore`]: FIFO once any waiter is queued
//! - [`Condition`]: signal wakes the head acquirable waiter
//! - [`BiasedRwLock`]: wakeup policy prefers writers
//! - [`FairRwLock`]: FIFO between readers and writers
//!
//! Scoped acquisition goes through [`Guard`], which releases on every
//! exit path.

mod condition;
mod fast_lock;
mod guard;
mod mutex;
mod rwlock;
mod semaphore;

pub use condition::Condition;
pub use fast_lock::FastLock;
pub use guard::{Guard, UnlockedGuard};
pub use mutex::Mutex;
pub use rwlock::{
    BiasedReadLock, BiasedRwLock, BiasedWriteLock, FairReadLock, FairRwLock, FairWriteLock,
    ReadWriteLock,
};
pub use semaphore::Semaphore;

use std::time::Duration;

use crate::error::Result;

/// Capability shared by every lock-like object in this crate.
///
/// `acquire` and `release` are deliberately split (rather than fused into
/// a guard-returning method) so that locks can be handed between scopes
/// and threads of control; [`Guard`] layers scope-exit safety on top.
pub trait Lockable {
    /// Blocks until the lock is held by the calling thread.
    ///
    /// # Errors
    ///
    /// Implementations that wait through a monitor surface
    /// [`ErrorKind::Interrupted`](crate::ErrorKind::Interrupted); the
    /// monitor-based [`Mutex`] additionally reports
    /// [`ErrorKind::Deadlock`](crate::ErrorKind::Deadlock) on self-reentry.
    fn acquire(&self) -> Result<()>;

    /// Attempts to acquire within `timeout`.
    ///
    /// A zero timeout probes exactly once and never sleeps. Returns
    /// `Ok(false)` if the lock could not be acquired in time.
    fn try_acquire(&self, timeout: Duration) -> Result<bool>;

    /// Releases the lock.
    ///
    /// Must be called by the acquiring thread. Release never fails
    /// observably; misuse is a debug assertion.
    fn release(&self);

    /// Acquires the lock, deferring any interrupt to the caller's next
    /// blocking wait.
    ///
    /// Release paths (guard drops, condition re-acquisition) go through
    /// this so they cannot fail halfway through restoring an invariant.
    fn acquire_uninterruptibly(&self);
}
