//! Process-local raw lock, uncontended-fast.

use std::time::Duration;

use parking_lot::lock_api::{RawMutex as _, RawMutexTimed as _};

use crate::error::Result;
use crate::sync::Lockable;

/// A non-recursive raw lock that spins briefly and then backs off to the
/// OS waiter under contention.
///
/// `FastLock` serializes short critical sections; it keeps no waiter
/// queue of its own and makes no fairness promise. Releasing from a
/// thread other than the acquirer is a debug assertion and undefined in
/// release builds.
pub struct FastLock {
    raw: parking_lot::RawMutex,
    #[cfg(debug_assertions)]
    owner: parking_lot::Mutex<Option<std::thread::ThreadId>>,
}

impl std::fmt::Debug for FastLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastLock").finish_non_exhaustive()
    }
}

impl FastLock {
    /// Creates an unlocked `FastLock`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: parking_lot::RawMutex::INIT,
            #[cfg(debug_assertions)]
            owner: parking_lot::Mutex::new(None),
        }
    }

    /// Blocks until the lock is held.
    pub fn acquire(&self) {
        self.raw.lock();
        self.note_acquired();
    }

    /// Probes the lock exactly once, without sleeping.
    pub fn try_acquire_now(&self) -> bool {
        let acquired = self.raw.try_lock();
        if acquired {
            self.note_acquired();
        }
        acquired
    }

    /// Attempts to acquire within `timeout`. A zero timeout never sleeps.
    pub fn try_acquire(&self, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return self.try_acquire_now();
        }
        let acquired = self.raw.try_lock_for(timeout);
        if acquired {
            self.note_acquired();
        }
        acquired
    }

    /// Releases the lock. Must be called by the acquiring thread.
    #[allow(unsafe_code)]
    pub fn release(&self) {
        self.note_released();
        // Owner discipline is asserted above in debug builds.
        unsafe { self.raw.unlock() }
    }

    #[cfg(debug_assertions)]
    fn note_acquired(&self) {
        *self.owner.lock() = Some(std::thread::current().id());
    }

    #[cfg(not(debug_assertions))]
    fn note_acquired(&self) {}

    #[cfg(debug_assertions)]
    fn note_released(&self) {
        let mut owner = self.owner.lock();
        debug_assert_eq!(
            *owner,
            Some(std::thread::current().id()),
            "FastLock released by a thread that does not hold it"
        );
        *owner = None;
    }

    #[cfg(not(debug_assertions))]
    fn note_released(&self) {}
}

impl Default for FastLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Lockable for FastLock {
    fn acquire(&self) -> Result<()> {
        Self::acquire(self);
        Ok(())
    }

    fn try_acquire(&self, timeout: Duration) -> Result<bool> {
        Ok(Self::try_acquire(self, timeout))
    }

    fn release(&self) {
        Self::release(self);
    }

    fn acquire_uninterruptibly(&self) {
        Self::acquire(self);
    }
}
