//! Unbounded blocking queue.

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

/// A queue whose consumers block until a value becomes available.
///
/// Producers never block: the queue is unbounded. Cancellation wakes all
/// blocked consumers; they drain whatever is stored and then fail with
/// [`Canceled`](crate::ErrorKind::Canceled).
#[derive(Debug)]
pub struct BlockingQueue<T> {
    state: parking_lot::Mutex<Store<T>>,
    not_empty: Condition,
}

impl<T> BlockingQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new(Store {
                items: VecDeque::new(),
                canceled: false,
            }),
            not_empty: Condition::new(),
        }
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Queue<T> for BlockingQueue<T> {
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
        match state.items.pop_front() {
            Some(item) => Ok(item),
            None => Err(Error::canceled()),
        }
    }

    fn next_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Deadline::after(timeout);
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.canceled {
            if deadline.expired() {
                return Err(Error::timeout());
            }
            let (guard, status) =
                self.not_empty
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
        match state.items.pop_front() {
            Some(item) => Ok(item),
            None => Err(Error::canceled()),
        }
    }

    fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    fn cancel(&self) {
        let mut state = self.state.lock();
        state.canceled = true;
        drop(state);

        tracing::debug!("blocking queue canceled");
        self.not_empty.broadcast();
    }

    fn is_canceled(&self) -> bool {
        self.state.lock().canceled
    }
}

#[allow(unsafe_code)]
impl<T: Send> Lockable for BlockingQueue<T> {
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
