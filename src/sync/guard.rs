//! Scoped lock holders.
//!
//! A [`Guard`] pins a protection scope to a lexical scope: the lock is
//! acquired when the guard is created and released on every exit path.
//! Two variations reshape an existing scope without giving it up:
//!
//! - [`Guard::unlocked`] inverts the scope: the lock is released for the
//!   lifetime of the [`UnlockedGuard`] and re-acquired when it ends.
//! - [`Guard::transfer_to`] hands the protection over to another lock and
//!   disables the original guard, so its drop becomes a no-op.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::sync::Lockable;

/// Scoped holder for a [`Lockable`].
///
/// # Example
///
/// ```
/// use blocksync::{FastLock, Guard};
///
/// let lock = FastLock::new();
/// {
///     let _guard = Guard::acquire(&lock).unwrap();
///     // critical section
/// }
/// // released here
/// assert!(lock.try_acquire_now());
/// lock.release();
/// ```
#[must_use = "the protection scope ends as soon as the guard is dropped"]
pub struct Guard<'a, L: Lockable + ?Sized> {
    lock: &'a L,
    enabled: bool,
}

impl<'a, L: Lockable + ?Sized> Guard<'a, L> {
    /// Acquires `lock` and returns a guard that releases it on drop.
    pub fn acquire(lock: &'a L) -> Result<Self> {
        lock.acquire()?;
        Ok(Self {
            lock,
            enabled: true,
        })
    }

    /// Attempts to acquire `lock` within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Timeout`](crate::ErrorKind::Timeout) if the
    /// lock could not be acquired in time.
    pub fn try_acquire(lock: &'a L, timeout: Duration) -> Result<Self> {
        if lock.try_acquire(timeout)? {
            Ok(Self {
                lock,
                enabled: true,
            })
        } else {
            Err(Error::timeout().with_context("lock not acquired within the timeout"))
        }
    }

    /// Temporarily exits the protection scope.
    ///
    /// The lock is released immediately and re-acquired when the returned
    /// [`UnlockedGuard`] is dropped. The borrow keeps this guard alive, so
    /// the scopes nest correctly.
    pub fn unlocked(&self) -> UnlockedGuard<'_, L> {
        self.lock.release();
        UnlockedGuard { lock: self.lock }
    }

    /// Transfers the protection scope to `other`.
    ///
    /// `other` is acquired first, then this guard's lock is released and
    /// the guard disabled; the two scopes overlap rather than gap.
    pub fn transfer_to<'b, M: Lockable + ?Sized>(mut self, other: &'b M) -> Result<Guard<'b, M>> {
        other.acquire()?;
        self.lock.release();
        self.enabled = false;
        Ok(Guard {
            lock: other,
            enabled: true,
        })
    }

    /// Ends the protection scope before the guard goes out of scope.
    pub fn release_early(mut self) {
        self.lock.release();
        self.enabled = false;
    }
}

impl<L: Lockable + ?Sized> Drop for Guard<'_, L> {
    fn drop(&mut self) {
        if self.enabled {
            self.lock.release();
        }
    }
}

/// Inverse scope over a lock held by a [`Guard`].
///
/// Created by [`Guard::unlocked`]; re-acquires the lock on drop. The
/// re-acquisition is uninterruptible; a scope exit must restore the
/// protection it found.
#[must_use = "the lock is re-acquired as soon as this guard is dropped"]
pub struct UnlockedGuard<'a, L: Lockable + ?Sized> {
    lock: &'a L,
}

impl<L: Lockable + ?Sized> Drop for UnlockedGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.acquire_uninterruptibly();
    }
}
