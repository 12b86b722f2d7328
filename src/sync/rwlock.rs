//! Read-write locks with selectable fairness.
//!
//! Both locks expose their two roles as [`Lockable`] views, so a reader
//! or writer side can be handed to anything that takes a lock,
//! [`Guard`](crate::Guard) included.
//!
//! # Choosing a discipline
//!
//! - [`BiasedRwLock`] prefers writers: every release wakes a waiting
//!   writer before any waiting reader. Readers can still join an active
//!   cohort while a writer waits, and can starve under continuous write
//!   pressure.
//! - [`FairRwLock`] serves readers and writers in arrival order,
//!   inheriting the FIFO discipline of the [`Mutex`] underneath it.
//!   Neither side can starve, at the price of less read parallelism when
//!   writers are frequent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::monitor::WaitStatus;
use crate::sync::{Condition, Lockable, Mutex};
use crate::time::Deadline;

/// Capability exposing a read-side and a write-side lock.
pub trait ReadWriteLock {
    /// The lock protecting read-only access.
    fn read_lock(&self) -> &dyn Lockable;
    /// The lock protecting read-write access.
    fn write_lock(&self) -> &dyn Lockable;
}

// ---------------------------------------------------------------------------
// Biased (writer-preferring)
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BiasedState {
    active_readers: usize,
    active_writers: usize,
    waiting_readers: usize,
    waiting_writers: usize,
}

#[derive(Debug)]
struct BiasedCore {
    state: parking_lot::Mutex<BiasedState>,
    reader_wake: Condition,
    writer_wake: Condition,
}

impl BiasedCore {
    fn allow_reader(state: &BiasedState) -> bool {
        // Only an active writer bars readers, so a reader cohort can keep
        // growing while a writer waits; the bias lives in the wake policy.
        state.active_writers == 0
    }

    fn allow_writer(state: &BiasedState) -> bool {
        state.active_writers == 0 && state.active_readers == 0
    }

    fn before_read(&self, timeout: Option<Duration>) -> Result<bool> {
        let deadline = timeout.map(Deadline::after);
        let mut state = self.state.lock();
        state.waiting_readers += 1;

        while !Self::allow_reader(&state) {
            let (guard, status) = match &deadline {
                None => self.reader_wake.wait(&self.state, state),
                Some(deadline) => {
                    if deadline.expired() {
                        state.waiting_readers -= 1;
                        return Ok(false);
                    }
                    self.reader_wake
                        .wait_for(&self.state, state, deadline.remaining())
                }
            };
            state = guard;
            match status {
                WaitStatus::Interrupted => {
                    state.waiting_readers -= 1;
                    return Err(Error::interrupted());
                }
                WaitStatus::TimedOut if !Self::allow_reader(&state) => {
                    state.waiting_readers -= 1;
                    return Ok(false);
                }
                _ => {}
            }
        }

        state.waiting_readers -= 1;
        state.active_readers += 1;
        Ok(true)
    }

    fn after_read(&self) {
        let (wake_reader, wake_writer) = {
            let mut state = self.state.lock();
            debug_assert!(state.active_readers > 0);
            state.active_readers -= 1;
            (state.waiting_readers > 0, state.waiting_writers > 0)
        };
        if wake_writer {
            self.writer_wake.signal();
        } else if wake_reader {
            self.reader_wake.signal();
        }
    }

    fn before_write(&self, timeout: Option<Duration>) -> Result<bool> {
        let deadline = timeout.map(Deadline::after);
        let mut state = self.state.lock();
        state.waiting_writers += 1;

        while !Self::allow_writer(&state) {
            let (guard, status) = match &deadline {
                None => self.writer_wake.wait(&self.state, state),
                Some(deadline) => {
                    if deadline.expired() {
                        state.waiting_writers -= 1;
                        return Ok(false);
                    }
                    self.writer_wake
                        .wait_for(&self.state, state, deadline.remaining())
                }
            };
            state = guard;
            match status {
                WaitStatus::Interrupted => {
                    state.waiting_writers -= 1;
                    return Err(Error::interrupted());
                }
                WaitStatus::TimedOut if !Self::allow_writer(&state) => {
                    state.waiting_writers -= 1;
                    return Ok(false);
                }
                _ => {}
            }
        }

        state.waiting_writers -= 1;
        state.active_writers += 1;
        Ok(true)
    }

    fn after_write(&self) {
        let (wake_reader, wake_writer) = {
            let mut state = self.state.lock();
            debug_assert_eq!(state.active_writers, 1);
            state.active_writers -= 1;
            (state.waiting_readers > 0, state.waiting_writers > 0)
        };
        if wake_writer {
            self.writer_wake.signal();
        } else if wake_reader {
            // Each reader wakes the next on its own release.
            self.reader_wake.signal();
        }
    }
}

/// Read-side view of a [`BiasedRwLock`].
#[derive(Debug)]
pub struct BiasedReadLock {
    core: Arc<BiasedCore>,
}

/// Write-side view of a [`BiasedRwLock`].
#[derive(Debug)]
pub struct BiasedWriteLock {
    core: Arc<BiasedCore>,
}

impl Lockable for BiasedReadLock {
    fn acquire(&self) -> Result<()> {
        self.core.before_read(None).map(|_| ())
    }

    fn try_acquire(&self, timeout: Duration) -> Result<bool> {
        self.core.before_read(Some(timeout))
    }

    fn release(&self) {
        self.core.after_read();
    }

    fn acquire_uninterruptibly(&self) {
        let mut deferred_interrupt = false;
        loop {
            match self.core.before_read(None) {
                Ok(_) => break,
                Err(_) => deferred_interrupt = true,
            }
        }
        if deferred_interrupt {
            crate::monitor::Monitor::current().interrupt();
        }
    }
}

impl Lockable for BiasedWriteLock {
    fn acquire(&self) -> Result<()> {
        self.core.before_write(None).map(|_| ())
    }

    fn try_acquire(&self, timeout: Duration) -> Result<bool> {
        self.core.before_write(Some(timeout))
    }

    fn release(&self) {
        self.core.after_write();
    }

    fn acquire_uninterruptibly(&self) {
        let mut deferred_interrupt = false;
        loop {
            match self.core.before_write(None) {
                Ok(_) => break,
                Err(_) => deferred_interrupt = true,
            }
        }
        if deferred_interrupt {
            crate::monitor::Monitor::current().interrupt();
        }
    }
}

/// A read-write lock whose wakeup policy prefers writers.
///
/// Readers may join an existing reader cohort while no writer is
/// *active*, but a release always wakes a waiting writer before any
/// waiting reader.
#[derive(Debug)]
pub struct BiasedRwLock {
    read: BiasedReadLock,
    write: BiasedWriteLock,
}

impl BiasedRwLock {
    /// Creates an uncontended lock.
    #[must_use]
    pub fn new() -> Self {
        let core = Arc::new(BiasedCore {
            state: parking_lot::Mutex::new(BiasedState::default()),
            reader_wake: Condition::new(),
            writer_wake: Condition::new(),
        });
        Self {
            read: BiasedReadLock {
                core: Arc::clone(&core),
            },
            write: BiasedWriteLock { core },
        }
    }

    /// The read-side lock.
    #[must_use]
    pub fn read(&self) -> &BiasedReadLock {
        &self.read
    }

    /// The write-side lock.
    #[must_use]
    pub fn write(&self) -> &BiasedWriteLock {
        &self.write
    }
}

impl Default for BiasedRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadWriteLock for BiasedRwLock {
    fn read_lock(&self) -> &dyn Lockable {
        &self.read
    }

    fn write_lock(&self) -> &dyn Lockable {
        &self.write
    }
}

// ---------------------------------------------------------------------------
// Fair (FIFO)
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FairCore {
    lock: Mutex,
    readers_drained: Condition,
    // Only touched while `lock` is held; atomic for interior mutability.
    readers: AtomicUsize,
}

/// Read-side view of a [`FairRwLock`].
#[derive(Debug)]
pub struct FairReadLock {
    core: Arc<FairCore>,
}

/// Write-side view of a [`FairRwLock`].
#[derive(Debug)]
pub struct FairWriteLock {
    core: Arc<FairCore>,
}

impl Lockable for FairReadLock {
    fn acquire(&self) -> Result<()> {
        self.core.lock.acquire()?;
        self.core.readers.fetch_add(1, Ordering::Release);
        self.core.lock.release();
        Ok(())
    }

    fn try_acquire(&self, timeout: Duration) -> Result<bool> {
        if !self.core.lock.try_acquire(timeout)? {
            return Ok(false);
        }
        self.core.readers.fetch_add(1, Ordering::Release);
        self.core.lock.release();
        Ok(true)
    }

    fn release(&self) {
        self.core.lock.acquire_uninterruptibly();
        if self.core.readers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.core.readers_drained.signal();
        }
        self.core.lock.release();
    }

    fn acquire_uninterruptibly(&self) {
        self.core.lock.acquire_uninterruptibly();
        self.core.readers.fetch_add(1, Ordering::Release);
        self.core.lock.release();
    }
}

impl Lockable for FairWriteLock {
    fn acquire(&self) -> Result<()> {
        self.core.lock.acquire()?;
        while self.core.readers.load(Ordering::Acquire) > 0 {
            if self.core.readers_drained.wait_raw(&self.core.lock) == WaitStatus::Interrupted {
                self.core.lock.release();
                return Err(Error::interrupted());
            }
        }
        // The mutex stays held for the duration of the write.
        Ok(())
    }

    fn try_acquire(&self, timeout: Duration) -> Result<bool> {
        let deadline = Deadline::after(timeout);
        if !self.core.lock.try_acquire(timeout)? {
            return Ok(false);
        }
        while self.core.readers.load(Ordering::Acquire) > 0 {
            if deadline.expired() {
                self.core.lock.release();
                return Ok(false);
            }
            let status = self
                .core
                .readers_drained
                .wait_raw_for(&self.core.lock, deadline.remaining());
            if status == WaitStatus::Interrupted {
                self.core.lock.release();
                return Err(Error::interrupted());
            }
        }
        Ok(true)
    }

    fn release(&self) {
        self.core.lock.release();
    }

    fn acquire_uninterruptibly(&self) {
        let mut deferred_interrupt = false;
        self.core.lock.acquire_uninterruptibly();
        while self.core.readers.load(Ordering::Acquire) > 0 {
            if self.core.readers_drained.wait_raw(&self.core.lock) == WaitStatus::Interrupted {
                deferred_interrupt = true;
            }
        }
        if deferred_interrupt {
            crate::monitor::Monitor::current().interrupt();
        }
    }
}

/// A read-write lock that grants both roles in arrival order.
///
/// A single FIFO [`Mutex`] serializes entry: readers take it only long
/// enough to raise the reader count, writers hold it for the whole write
/// and first wait for the reader count to drain.
#[derive(Debug)]
pub struct FairRwLock {
    read: FairReadLock,
    write: FairWriteLock,
}

impl FairRwLock {
    /// Creates an uncontended lock.
    #[must_use]
    pub fn new() -> Self {
        let core = Arc::new(FairCore {
            lock: Mutex::new(),
            readers_drained: Condition::new(),
            readers: AtomicUsize::new(0),
        });
        Self {
            read: FairReadLock {
                core: Arc::clone(&core),
            },
            write: FairWriteLock { core },
        }
    }

    /// The read-side lock.
    #[must_use]
    pub fn read(&self) -> &FairReadLock {
        &self.read
    }

    /// The write-side lock.
    #[must_use]
    pub fn write(&self) -> &FairWriteLock {
        &self.write
    }
}

impl Default for FairRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadWriteLock for FairRwLock {
    fn read_lock(&self) -> &dyn Lockable {
        &self.read
    }

    fn write_lock(&self) -> &dyn Lockable {
        &self.write
    }
}
