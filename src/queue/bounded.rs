//! Bounded blocking queue.

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

/// A queue with a maximum capacity.
///
/// Three parties coordinate over one lock: producers wait for room on
/// `not_full`, consumers wait for values on `not_empty`, and drain
/// observers wait on `is_empty` for the moment the queue empties out.
///
/// Cancellation wakes both producers and consumers. Consumers drain the
/// remaining items first; producers fail immediately.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    capacity: usize,
    state: parking_lot::Mutex<Store<T>>,
    not_full: Condition,
    not_empty: Condition,
    is_empty: Condition,
}

impl<T> BoundedQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be at least 1");
        Self {
            capacity,
            state: parking_lot::Mutex::new(Store {
                items: VecDeque::with_capacity(capacity),
                canceled: false,
            }),
            not_full: Condition::new(),
            not_empty: Condition::new(),
            is_empty: Condition::new(),
        }
    }

    /// Maximum number of items the queue will hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Blocks the caller until the queue is empty.
    ///
    /// **This waits for a drain, it does not test emptiness.** A call on
    /// a non-empty queue parks the thread until consumers remove the last
    /// item. Use [`Queue::size`] to inspect without blocking.
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

    /// Like [`BoundedQueue::empty`] with a whole-operation time budget.
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

impl<T: Send> Queue<T> for BoundedQueue<T> {
    fn add(&self, item: T) -> Result<()> {
        let mut state = self.state.lock();
        while state.items.len() == self.capacity && !state.canceled {
            let (guard, status) = self.not_full.wait(&self.state, state);
            state = guard;
            if status == WaitStatus::Interrupted {
                return Err(Error::interrupted());
            }
        }
        if state.canceled {
            return Err(Error::canceled());
        }
        state.items.push_back(item);
        drop(state);

        self.not_empty.signal();
        Ok(())
    }

    fn add_timeout(&self, item: T, timeout: Duration) -> Result<bool> {
        let deadline = Deadline::after(timeout);
        let mut state = self.state.lock();
        while state.items.len() == self.capacity && !state.canceled {
            if deadline.expired() {
                return Ok(false);
            }
            let (guard, status) = self
                .not_full
                .wait_for(&self.state, state, deadline.remaining());
            state = guard;
            match status {
                WaitStatus::Interrupted => return Err(Error::interrupted()),
                WaitStatus::TimedOut
                    if state.items.len() == self.capacity && !state.canceled =>
                {
                    return Ok(false);
                }
                _ => {}
            }
        }
        if state.canceled {
            return Err(Error::canceled());
        }
        state.items.push_back(item);
        drop(state);

        self.not_empty.signal();
        Ok(true)
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

        self.not_full.signal();
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

        self.not_full.signal();
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

        tracing::debug!("bounded queue canceled");
        // Wake both sides; a consumer broadcast alone would leave
        // producers parked on a queue that will never drain below
        // capacity for them.
        self.not_empty.broadcast();
        self.not_full.broadcast();
    }

    fn is_canceled(&self) -> bool {
        self.state.lock().canceled
    }
}

#[allow(unsafe_code)]
impl<T: Send> Lockable for BoundedQueue<T> {
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
