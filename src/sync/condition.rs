//! Condition variable over an external lock.
//!
//! A [`Condition`] keeps an ordered list of waiting threads' monitors.
//! `wait` atomically trades the caller's hold on the external lock for a
//! slot on that list: the caller's monitor is enqueued and locked
//! *before* the external lock is released, so a signal arriving in
//! between cannot be missed. On wake the external lock is re-acquired
//! before control returns, whatever the wake was.
//!
//! Waits return a [`WaitStatus`] rather than an error so callers can roll
//! back their own bookkeeping (wait counters, predicates) while still
//! holding the lock, then translate the status themselves.
//!
//! Two wait forms cover the two ways state is guarded in this crate:
//! [`Condition::wait`]/[`Condition::wait_for`] exchange a
//! `parking_lot::MutexGuard`, and [`Condition::wait_raw`]/
//! [`Condition::wait_raw_for`] work over any [`Lockable`] the caller
//! holds.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::monitor::{Monitor, NotifyOutcome, WaitStatus};
use crate::sync::Lockable;

/// A condition variable backed by a waiter list of per-thread monitors.
#[derive(Debug, Default)]
pub struct Condition {
    waiters: parking_lot::Mutex<VecDeque<Arc<Monitor>>>,
}

impl Condition {
    /// Creates a condition with no waiters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            waiters: parking_lot::Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the number of threads currently waiting.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Releases `guard`, waits to be signaled, and re-locks `lock`.
    ///
    /// The caller must pass the guard obtained from `lock`. Returns the
    /// re-acquired guard together with the wake's terminal status; on
    /// [`WaitStatus::Interrupted`] the lock is held just the same, so the
    /// caller can undo its bookkeeping before reporting the error.
    pub fn wait<'a, S: ?Sized>(
        &self,
        lock: &'a parking_lot::Mutex<S>,
        guard: parking_lot::MutexGuard<'a, S>,
    ) -> (parking_lot::MutexGuard<'a, S>, WaitStatus) {
        let monitor = Monitor::current();
        let monitor_guard = self.enqueue(&monitor);
        drop(guard);
        let status = monitor.wait(monitor_guard);
        self.remove(&monitor);
        (lock.lock(), status)
    }

    /// Like [`Condition::wait`], but gives up after `timeout`.
    pub fn wait_for<'a, S: ?Sized>(
        &self,
        lock: &'a parking_lot::Mutex<S>,
        guard: parking_lot::MutexGuard<'a, S>,
        timeout: Duration,
    ) -> (parking_lot::MutexGuard<'a, S>, WaitStatus) {
        let monitor = Monitor::current();
        let monitor_guard = self.enqueue(&monitor);
        drop(guard);
        let status = monitor.wait_for(monitor_guard, timeout);
        self.remove(&monitor);
        (lock.lock(), status)
    }

    /// Releases the held `lock`, waits to be signaled, and re-acquires it.
    ///
    /// The caller must hold `lock`. Re-acquisition is uninterruptible: an
    /// interrupt delivered during it is deferred to the caller's next
    /// blocking wait.
    pub fn wait_raw<L: Lockable + ?Sized>(&self, lock: &L) -> WaitStatus {
        let monitor = Monitor::current();
        let monitor_guard = self.enqueue(&monitor);
        lock.release();
        let status = monitor.wait(monitor_guard);
        self.remove(&monitor);
        lock.acquire_uninterruptibly();
        status
    }

    /// Like [`Condition::wait_raw`], but gives up after `timeout`.
    pub fn wait_raw_for<L: Lockable + ?Sized>(&self, lock: &L, timeout: Duration) -> WaitStatus {
        let monitor = Monitor::current();
        let monitor_guard = self.enqueue(&monitor);
        lock.release();
        let status = monitor.wait_for(monitor_guard, timeout);
        self.remove(&monitor);
        lock.acquire_uninterruptibly();
        status
    }

    /// Wakes the longest-waiting thread whose monitor accepts the notify.
    pub fn signal(&self) {
        loop {
            {
                let mut waiters = self.waiters.lock();
                let mut index = 0;
                while index < waiters.len() {
                    let waiter = Arc::clone(&waiters[index]);
                    match waiter.try_notify() {
                        NotifyOutcome::Woke => {
                            waiters.remove(index);
                            return;
                        }
                        NotifyOutcome::Missed => {
                            // The wait already ended; drop the stale entry.
                            waiters.remove(index);
                        }
                        NotifyOutcome::Busy => index += 1,
                    }
                }
                if waiters.is_empty() {
                    return;
                }
            }
            // Remaining waiters are mid-transition into their waits.
            for _ in 0..64 {
                std::hint::spin_loop();
            }
            std::thread::yield_now();
        }
    }

    /// Wakes every waiter.
    ///
    /// A waiter mid-transition into its wait is retried after a short
    /// backoff rather than skipped: broadcast is used for terminal
    /// transitions (cancellation, drain) where no later signal would
    /// come along to sweep a stragglers list.
    pub fn broadcast(&self) {
        loop {
            {
                let mut waiters = self.waiters.lock();
                let mut index = 0;
                while index < waiters.len() {
                    let waiter = Arc::clone(&waiters[index]);
                    match waiter.try_notify() {
                        NotifyOutcome::Woke | NotifyOutcome::Missed => {
                            waiters.remove(index);
                        }
                        NotifyOutcome::Busy => index += 1,
                    }
                }
                if waiters.is_empty() {
                    return;
                }
            }
            // Remaining waiters are mid-transition into their waits.
            for _ in 0..64 {
                std::hint::spin_loop();
            }
            std::thread::yield_now();
        }
    }

    /// Enqueues a waiter and locks its monitor in one step, so a signaler
    /// either sees it Busy (and retries) or finds a real waiter.
    fn enqueue<'m>(&self, monitor: &'m Arc<Monitor>) -> crate::monitor::MonitorGuard<'m> {
        let mut waiters = self.waiters.lock();
        waiters.push_back(Arc::clone(monitor));
        monitor.lock()
    }

    fn remove(&self, monitor: &Arc<Monitor>) {
        let mut waiters = self.waiters.lock();
        if let Some(position) = waiters.iter().position(|m| Arc::ptr_eq(m, monitor)) {
            waiters.remove(position);
        }
    }
}

impl Drop for Condition {
    fn drop(&mut self) {
        debug_assert!(
            self.waiters.get_mut().is_empty(),
            "condition dropped with threads still waiting"
        );
    }
}
