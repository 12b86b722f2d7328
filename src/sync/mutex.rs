//! FIFO mutex with monitor-based waiting.
//!
//! Unlike [`FastLock`](crate::FastLock), this mutex queues contenders and
//! hands the lock directly to the longest-waiting thread on release, so
//! acquisition order is exactly arrival order. Waiting is interruptible:
//! a queued thread woken by [`Thread::interrupt`](crate::Thread::interrupt)
//! leaves the queue with an error instead of the lock.
//!
//! The mutex is non-recursive. A thread that already holds it and calls
//! `acquire` again gets a [`Deadlock`](crate::ErrorKind::Deadlock) error
//! rather than a hang.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};
use crate::monitor::{Monitor, NotifyOutcome, WaitStatus};
use crate::sync::Lockable;

#[derive(Debug)]
struct MutexState {
    locked: bool,
    owner: Option<ThreadId>,
    waiters: VecDeque<(ThreadId, Arc<Monitor>)>,
}

/// A fair, interruptible mutual-exclusion lock.
///
/// The lock itself carries no data; pair it with [`Guard`](crate::Guard)
/// to scope a critical section.
#[derive(Debug)]
pub struct Mutex {
    state: parking_lot::Mutex<MutexState>,
}

impl Mutex {
    /// Creates an unlocked mutex.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new(MutexState {
                locked: false,
                owner: None,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Returns true if some thread currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Returns the number of threads queued for the lock.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Blocks until the calling thread holds the lock.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Deadlock`] if the calling thread already holds the
    /// lock; [`ErrorKind::Interrupted`] if the thread was interrupted
    /// while queued.
    pub fn acquire(&self) -> Result<()> {
        let me = std::thread::current().id();
        let monitor = Monitor::current();

        let mut state = self.state.lock();
        if !state.locked {
            state.locked = true;
            state.owner = Some(me);
            return Ok(());
        }
        if state.owner == Some(me) {
            return Err(Error::new(ErrorKind::Deadlock)
                .with_context("thread re-acquired a mutex it already holds"));
        }

        state.waiters.push_back((me, Arc::clone(&monitor)));
        let monitor_guard = monitor.lock();
        drop(state);

        let status = monitor.wait(monitor_guard);

        let mut state = self.state.lock();
        remove_waiter(&mut state, &monitor);
        match status {
            // Ownership was handed over before the wake.
            WaitStatus::Signaled => {
                debug_assert_eq!(state.owner, Some(me));
                Ok(())
            }
            WaitStatus::Interrupted => Err(Error::interrupted()),
            WaitStatus::TimedOut => Err(Error::new(ErrorKind::Internal)
                .with_context("untimed mutex wait reported a timeout")),
        }
    }

    /// Attempts to acquire within `timeout`.
    ///
    /// A zero timeout probes once without queuing. Returns `Ok(false)` if
    /// the lock was not acquired in time.
    ///
    /// # Errors
    ///
    /// Same as [`Mutex::acquire`].
    pub fn try_acquire(&self, timeout: Duration) -> Result<bool> {
        let me = std::thread::current().id();
        let monitor = Monitor::current();

        let mut state = self.state.lock();
        if !state.locked {
            state.locked = true;
            state.owner = Some(me);
            return Ok(true);
        }
        if state.owner == Some(me) {
            return Err(Error::new(ErrorKind::Deadlock)
                .with_context("thread re-acquired a mutex it already holds"));
        }
        if timeout.is_zero() {
            return Ok(false);
        }

        state.waiters.push_back((me, Arc::clone(&monitor)));
        let monitor_guard = monitor.lock();
        drop(state);

        let status = monitor.wait_for(monitor_guard, timeout);

        let mut state = self.state.lock();
        remove_waiter(&mut state, &monitor);
        match status {
            WaitStatus::Signaled => {
                debug_assert_eq!(state.owner, Some(me));
                Ok(true)
            }
            WaitStatus::TimedOut => Ok(false),
            WaitStatus::Interrupted => Err(Error::interrupted()),
        }
    }

    /// Releases the lock, handing it to the longest-waiting thread.
    pub fn release(&self) {
        let mut state = self.state.lock();
        debug_assert_eq!(
            state.owner,
            Some(std::thread::current().id()),
            "mutex released by a thread that does not hold it"
        );

        loop {
            let mut index = 0;
            while index < state.waiters.len() {
                let (waiter_id, waiter) = state.waiters[index].clone();
                match waiter.try_notify() {
                    NotifyOutcome::Woke => {
                        // Direct handoff: the lock never becomes free, so
                        // late arrivals cannot barge past the queue.
                        state.owner = Some(waiter_id);
                        state.waiters.remove(index);
                        return;
                    }
                    NotifyOutcome::Missed => {
                        // The waiter already left its wait (interrupted or
                        // timed out); it will unlink itself, but don't
                        // re-check it on this pass.
                        state.waiters.remove(index);
                    }
                    NotifyOutcome::Busy => index += 1,
                }
            }

            if state.waiters.is_empty() {
                state.locked = false;
                state.owner = None;
                return;
            }

            // Every remaining waiter is mid-transition into its wait.
            parking_lot::MutexGuard::unlocked(&mut state, || {
                backoff();
            });
        }
    }

    /// Acquires the lock, deferring any interrupt delivered while queued
    /// to the caller's next blocking wait.
    pub fn acquire_uninterruptibly(&self) {
        let me = std::thread::current().id();
        let monitor = Monitor::current();
        let mut deferred_interrupt = false;

        let mut state = self.state.lock();
        loop {
            if !state.locked {
                state.locked = true;
                state.owner = Some(me);
                break;
            }
            if state.owner == Some(me) {
                debug_assert!(false, "thread re-acquired a mutex it already holds");
                break;
            }

            state.waiters.push_back((me, Arc::clone(&monitor)));
            let monitor_guard = monitor.lock();
            drop(state);

            let status = monitor.wait(monitor_guard);

            state = self.state.lock();
            remove_waiter(&mut state, &monitor);
            match status {
                WaitStatus::Signaled => {
                    debug_assert_eq!(state.owner, Some(me));
                    break;
                }
                WaitStatus::Interrupted => {
                    deferred_interrupt = true;
                }
                WaitStatus::TimedOut => {}
            }
        }
        drop(state);

        if deferred_interrupt {
            monitor.interrupt();
        }
    }
}

fn remove_waiter(state: &mut MutexState, monitor: &Arc<Monitor>) {
    if let Some(position) = state
        .waiters
        .iter()
        .position(|(_, m)| Arc::ptr_eq(m, monitor))
    {
        state.waiters.remove(position);
    }
}

fn backoff() {
    for _ in 0..64 {
        std::hint::spin_loop();
    }
    std::thread::yield_now();
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        debug_assert!(
            self.state.get_mut().waiters.is_empty(),
            "mutex dropped with threads still queued"
        );
    }
}

impl Lockable for Mutex {
    fn acquire(&self) -> Result<()> {
        Self::acquire(self)
    }

    fn try_acquire(&self, timeout: Duration) -> Result<bool> {
        Self::try_acquire(self, timeout)
    }

    fn release(&self) {
        Self::release(self);
    }

    fn acquire_uninterruptibly(&self) {
        Self::acquire_uninterruptibly(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn uncontended_lock_unlock() {
        init_test("uncontended_lock_unlock");
        let mutex = Mutex::new();
        mutex.acquire().expect("acquire");
        assert!(mutex.is_locked());
        mutex.release();
        assert!(!mutex.is_locked());
        crate::test_complete!("uncontended_lock_unlock");
    }

    #[test]
    fn reentry_is_a_deadlock_error() {
        init_test("reentry_is_a_deadlock_error");
        let mutex = Mutex::new();
        mutex.acquire().expect("first acquire");
        let err = mutex.acquire().expect_err("second acquire must fail");
        crate::assert_with_log!(
            err.kind() == ErrorKind::Deadlock,
            "error kind",
            ErrorKind::Deadlock,
            err.kind()
        );
        mutex.release();
        crate::test_complete!("reentry_is_a_deadlock_error");
    }

    #[test]
    fn zero_timeout_probe() {
        let mutex = Arc::new(Mutex::new());
        mutex.acquire().expect("acquire");

        let contender = Arc::clone(&mutex);
        let held = thread::spawn(move || contender.try_acquire(Duration::ZERO))
            .join()
            .expect("probe thread panicked")
            .expect("probe failed");
        assert!(!held);

        mutex.release();
    }

    #[test]
    fn timed_acquire_times_out() {
        let mutex = Arc::new(Mutex::new());
        mutex.acquire().expect("acquire");

        let contender = Arc::clone(&mutex);
        let held = thread::spawn(move || contender.try_acquire(Duration::from_millis(40)))
            .join()
            .expect("contender panicked")
            .expect("contend failed");
        assert!(!held);

        mutex.release();
    }

    #[test]
    fn handoff_is_fifo() {
        init_test("handoff_is_fifo");
        let mutex = Arc::new(Mutex::new());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        mutex.acquire().expect("primary acquire");

        let mut handles = Vec::new();
        for id in 0..3 {
            let thread_mutex = Arc::clone(&mutex);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                thread_mutex.acquire().expect("queued acquire");
                order.lock().push(id);
                thread_mutex.release();
            }));
            // Serialize queue entry so arrival order is the thread index.
            while mutex.waiting_count() < id + 1 {
                thread::yield_now();
            }
        }

        mutex.release();
        for handle in handles {
            handle.join().expect("waiter panicked");
        }

        let recorded = order.lock().clone();
        crate::assert_with_log!(
            recorded == vec![0, 1, 2],
            "wake order",
            vec![0usize, 1, 2],
            recorded
        );
        crate::test_complete!("handoff_is_fifo");
    }

    #[test]
    fn interrupt_unblocks_queued_thread() {
        init_test("interrupt_unblocks_queued_thread");
        let mutex = Arc::new(Mutex::new());
        mutex.acquire().expect("acquire");

        let contender = Arc::clone(&mutex);
        let monitor_slot = Arc::new(parking_lot::Mutex::new(None));
        let slot = Arc::clone(&monitor_slot);
        let handle = thread::spawn(move || {
            *slot.lock() = Some(Monitor::current());
            contender.acquire()
        });

        // Wait until the contender is queued, then interrupt it.
        while mutex.waiting_count() == 0 {
            thread::yield_now();
        }
        monitor_slot
            .lock()
            .as_ref()
            .expect("monitor registered")
            .interrupt();

        let result = handle.join().expect("contender panicked");
        let err = result.expect_err("acquire must be interrupted");
        assert!(err.is_interrupted());
        assert_eq!(mutex.waiting_count(), 0);

        mutex.release();
        crate::test_complete!("interrupt_unblocks_queued_thread");
    }

    #[test]
    fn mutual_exclusion_under_contention() {
        init_test("mutual_exclusion_under_contention");
        let mutex = Arc::new(Mutex::new());
        let in_section = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let mutex = Arc::clone(&mutex);
            let in_section = Arc::clone(&in_section);
            let overlaps = Arc::clone(&overlaps);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    mutex.acquire().expect("acquire");
                    if in_section.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    in_section.fetch_sub(1, Ordering::SeqCst);
                    mutex.release();
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker panicked");
        }

        let observed = overlaps.load(Ordering::SeqCst);
        crate::assert_with_log!(observed == 0, "critical section overlaps", 0usize, observed);
        crate::test_complete!("mutual_exclusion_under_contention");
    }
}
