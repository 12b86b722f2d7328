//! Unbounded queue with a drain observer.

use std::collections::VecDeque;
use std::mem;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::monitor::WaitStatus;
use crate::queue::Queue;
use crate::sync::{Condition, Lockable};
use crate::time::Deadline;

#[derive(Debug)]
struct Store<T> {
    items: VecDeque<T>,
    canceled: bool,
}

/// An unbounded queue that, unlike [`BlockingQueue`](crate::BlockingQueue),
/// also lets observers wait for the moment it drains.
///
/// [`MonitoredQueue::empty`] carries the same contract as the bounded
/// variant: it *waits* for emptiness rather than testing it.
#[derive(Debug)]
pub struct MonitoredQueue<T> {
    state: parking_lot::Mutex<Store<T>>,
    not_empty: Condition,
    is_empty: Condition,
}

impl<T> MonitoredQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new(Store {
                items: VecDeque::new(),
                canceled: false,
            }),
            not_empty: Condition::new(),
            is_empty: Condition::new(),
        }
    }

    /// Blocks the caller until the queue is empty.
    ///
    /// **This waits for a drain, it does not test emptiness.**
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Interrupted`](crate::ErrorKind::Interrupted) if the
    /// thread was interrupted while waiting.
    pub fn empty(&self) -> Result<()> {
        let mut state = self.state.lock();
        while !state.items.is_empty() {
            let (guard, status) = self.is_empty.wait(&self.state, state);
            state = guard;
            if status == WaitStatus::Interrupted {
                return Err(Error::interrupted());
            }
        }
        Ok(())
    }

    /// Like [`MonitoredQueue::empty`] with a whole-operation time budget.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Timeout`](crate::ErrorKind::Timeout) if the queue did
    /// not drain in time.
    pub fn empty_timeout(&self, timeout: Duration) -> Result<()> {
        let deadline = Deadline::after(timeout);
        let mut state = self.state.lock();
        while !state.items.is_empty() {
            if deadline.expired() {
                return Err(Error::timeout());
            }
            let (guard, status) = self
                .is_empty
                .wait_for(&self.state, state, deadline.remaining());
            state = guard;
            match status {
                WaitStatus::Interrupted => return Err(Error::interrupted()),
                WaitStatus::TimedOut if !state.items.is_empty() => {
                    return Err(Error::timeout());
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl<T> Default for MonitoredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Queue<T> for MonitoredQueue<T> {
    fn add(&self, item: T) -> Result<()> {
        let mut state = self.state.lock();
        if state.canceled {
            return Err(Error::canceled());
        }
        state.items.push_back(item);
        drop(state);

        self.not_empty.signal();
        Ok(())
    }

    fn add_timeout(&self, item: T, _timeout: Duration) -> Result<bool> {
        // Producers never wait on an unbounded queue; the budget is moot.
        self.add(item).map(|()| true)
    }

    fn next(&self) -> Result<T> {
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.canceled {
            let (guard, status) = self.not_empty.wait(&self.state, state);
            state = guard;
            if status == WaitStatus::Interrupted {
                return Err(Error::interrupted());
            }
        }
        let Some(item) = state.items.pop_front() else {
            return Err(Error::canceled());
        };
        let drained = state.items.is_empty();
        drop(state);

        if drained {
            self.is_empty.broadcast();
        }
        Ok(item)
    }

    fn next_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Deadline::after(timeout);
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.canceled {
            if deadline.expired() {
                return Err(Error::timeout());
            }
            let (guard, status) = self
                .not_empty
                .wait_for(&self.state, state, deadline.remaining());
            state = guard;
            match status {
                WaitStatus::Interrupted => return Err(Error::interrupted()),
                WaitStatus::TimedOut if state.items.is_empty() && !state.canceled => {
                    return Err(Error::timeout());
                }
                _ => {}
            }
        }
        let Some(item) = state.items.pop_front() else {
            return Err(Error::canceled());
        };
        let drained = state.items.is_empty();
        drop(state);

        if drained {
            self.is_empty.broadcast();
        }
        Ok(item)
    }

    fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    fn cancel(&self) {
        let mut state = self.state.lock();
        state.canceled = true;
        drop(state);

        tracing::debug!("monitored queue canceled");
        self.not_empty.broadcast();
    }

    fn is_canceled(&self) -> bool {
        self.state.lock().canceled
    }
}

#[allow(unsafe_code)]
impl<T: Send> Lockable for MonitoredQueue<T> {
    fn acquire(&self) -> Result<()> {
        mem::forget(self.state.lock());
        Ok(())
    }

    fn try_acquire(&self, timeout: Duration) -> Result<bool> {
        let guard = if timeout.is_zero() {
            self.state.try_lock()
        } else {
            self.state.try_lock_for(timeout)
        };
        Ok(guard.map(mem::forget).is_some())
    }

    fn release(&self) {
        // Held via `acquire` above, which leaked the guard.
        unsafe { self.state.force_unlock() }
    }

    fn acquire_uninterruptibly(&self) {
        mem::forget(self.state.lock());
    }
}
