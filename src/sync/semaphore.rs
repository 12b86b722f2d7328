//! Counting semaphore with an ordered waiter list.
//!
//! The semaphore tracks a count of available permits. `acquire` takes the
//! fast path only while no other thread is queued; the moment anyone is
//! on the waiter list, new acquirers queue behind it, so permits are
//! granted in arrival order.
//!
//! # Handoff
//!
//! `release` raises the count and then walks the waiter list from the
//! head, attempting a non-blocking notify of each waiter's monitor. A
//! waiter whose monitor cannot be locked is mid-transition into its wait
//! and is retried after a short backoff; a waiter whose wait already
//! ended (interrupted) is dropped from the list and the walk continues.
//! The raised count is the ground truth either way: a woken waiter
//! re-checks it under the lock before claiming a permit.
//!
//! # Checked mode
//!
//! A semaphore created with [`Semaphore::new`] enforces its maximum
//! count: releasing past it is an
//! [`InvalidOperation`](crate::ErrorKind::InvalidOperation) error.
//! [`Semaphore::unchecked`] disables the bound.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};
use crate::monitor::{Monitor, NotifyOutcome, WaitStatus};

#[derive(Debug)]
struct SemaphoreState {
    count: usize,
    entry_count: usize,
    waiters: VecDeque<Arc<Monitor>>,
}

/// A counting semaphore with FIFO waiter ordering.
#[derive(Debug)]
pub struct Semaphore {
    state: parking_lot::Mutex<SemaphoreState>,
    max_count: usize,
    checked: bool,
}

impl Semaphore {
    /// Creates a checked semaphore with `count` permits available and a
    /// hard maximum of `max_count`.
    ///
    /// # Panics
    ///
    /// Panics if `count > max_count`.
    #[must_use]
    pub fn new(count: usize, max_count: usize) -> Self {
        assert!(
            count <= max_count,
            "initial count cannot exceed the maximum"
        );
        Self {
            state: parking_lot::Mutex::new(SemaphoreState {
                count,
                entry_count: 0,
                waiters: VecDeque::new(),
            }),
            max_count,
            checked: true,
        }
    }

    /// Creates an unchecked semaphore: `release` never fails and the
    /// count has no upper bound.
    #[must_use]
    pub fn unchecked(count: usize) -> Self {
        Self {
            state: parking_lot::Mutex::new(SemaphoreState {
                count,
                entry_count: 0,
                waiters: VecDeque::new(),
            }),
            max_count: usize::MAX,
            checked: false,
        }
    }

    /// Returns the current permit count.
    #[must_use]
    pub fn count(&self) -> usize {
        self.state.lock().count
    }

    /// Returns the number of threads queued for a permit.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Acquires a permit, blocking while none is available.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Interrupted`] if the thread was interrupted while
    /// queued.
    pub fn acquire(&self) -> Result<()> {
        let monitor = Monitor::current();

        let mut state = self.state.lock();

        // Take a permit directly only while nobody is queued; otherwise
        // fall in behind the queue to preserve arrival order.
        if state.count > 0 && state.entry_count == 0 {
            state.count -= 1;
            return Ok(());
        }

        state.entry_count += 1;
        state.waiters.push_back(Arc::clone(&monitor));
        let monitor_guard = monitor.lock();
        drop(state);

        let status = monitor.wait(monitor_guard);

        let mut state = self.state.lock();
        // Unlink unconditionally: the monitor is sticky, so the wake may
        // have come from a releaser that already removed us, or from an
        // interrupt that did not.
        remove_waiter(&mut state.waiters, &monitor);
        state.entry_count -= 1;

        match status {
            WaitStatus::Signaled => {
                state.count -= 1;
                Ok(())
            }
            WaitStatus::Interrupted => Err(Error::interrupted()),
            WaitStatus::TimedOut => Err(Error::new(ErrorKind::Internal)
                .with_context("untimed semaphore wait reported a timeout")),
        }
    }

    /// Attempts to acquire a permit within `timeout`.
    ///
    /// A zero timeout decides from the current count without ever
    /// touching the monitor. Returns `Ok(false)` if no permit was
    /// acquired in time.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Interrupted`] if the thread was interrupted while
    /// queued.
    pub fn try_acquire(&self, timeout: Duration) -> Result<bool> {
        let monitor = Monitor::current();

        let mut state = self.state.lock();
        if state.count > 0 && state.entry_count == 0 {
            state.count -= 1;
            return Ok(true);
        }
        if timeout.is_zero() {
            return Ok(false);
        }

        state.entry_count += 1;
        state.waiters.push_back(Arc::clone(&monitor));
        let monitor_guard = monitor.lock();
        drop(state);

        let status = monitor.wait_for(monitor_guard, timeout);

        let mut state = self.state.lock();
        remove_waiter(&mut state.waiters, &monitor);
        state.entry_count -= 1;

        match status {
            WaitStatus::Signaled => {
                state.count -= 1;
                Ok(true)
            }
            WaitStatus::TimedOut => Ok(false),
            WaitStatus::Interrupted => Err(Error::interrupted()),
        }
    }

    /// Releases a permit and wakes the longest-queued waiter, if any.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidOperation`] if the semaphore is checked and
    /// already at its maximum count.
    pub fn release(&self) -> Result<()> {
        let mut state = self.state.lock();

        if self.checked && state.count == self.max_count {
            return Err(Error::new(ErrorKind::InvalidOperation)
                .with_context("checked semaphore released past its maximum count"));
        }

        state.count += 1;

        loop {
            let mut index = 0;
            while index < state.waiters.len() {
                let waiter = Arc::clone(&state.waiters[index]);
                match waiter.try_notify() {
                    NotifyOutcome::Woke => {
                        state.waiters.remove(index);
                        return Ok(());
                    }
                    NotifyOutcome::Missed => {
                        // The wait already ended without us; keep walking.
                        state.waiters.remove(index);
                    }
                    NotifyOutcome::Busy => index += 1,
                }
            }

            if state.waiters.is_empty() {
                // Nobody left to hand to; the raised count stands.
                return Ok(());
            }

            // Remaining waiters are mid-transition into their waits.
            tracing::trace!("semaphore release backing off for mid-transition waiters");
            parking_lot::MutexGuard::unlocked(&mut state, || {
                for _ in 0..64 {
                    std::hint::spin_loop();
                }
                std::thread::yield_now();
            });
        }
    }
}

fn remove_waiter(waiters: &mut VecDeque<Arc<Monitor>>, monitor: &Arc<Monitor>) {
    if let Some(position) = waiters.iter().position(|m| Arc::ptr_eq(m, monitor)) {
        waiters.remove(position);
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        debug_assert!(
            self.state.get_mut().waiters.is_empty(),
            "semaphore dropped with threads still queued"
        );
    }
}
