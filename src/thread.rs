//! Thread handles with join and interrupt.
//!
//! [`Thread::spawn`] pre-creates the new thread's
//! [`Monitor`](crate::Monitor) and installs it before user code runs, so
//! the handle can interrupt the thread at any point in its life,
//! including before its first blocking call, which the sticky interrupt
//! flag then turns into an immediate wake.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, ErrorKind, Result};
use crate::monitor::Monitor;
use crate::task::Runnable;

static NEXT_THREAD_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Completion latch: set exactly once when the thread's body finishes,
/// even if it panics.
#[derive(Debug)]
struct Completion {
    done: AtomicBool,
    mutex: Mutex<()>,
    cond: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            mutex: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    fn signal_done(&self) {
        self.done.store(true, Ordering::Release);
        let _guard = self.mutex.lock();
        self.cond.notify_all();
    }

    fn wait(&self) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let mut guard = self.mutex.lock();
        while !self.done.load(Ordering::Acquire) {
            self.cond.wait(&mut guard);
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.done.load(Ordering::Acquire) {
            return true;
        }
        let deadline = std::time::Instant::now() + timeout;
        let mut guard = self.mutex.lock();
        while !self.done.load(Ordering::Acquire) {
            if self.cond.wait_until(&mut guard, deadline).timed_out()
                && !self.done.load(Ordering::Acquire)
            {
                return false;
            }
        }
        true
    }
}

/// Signals the completion latch on every exit path of the thread body.
struct SignalOnDrop(Arc<Completion>);

impl Drop for SignalOnDrop {
    fn drop(&mut self) {
        self.0.signal_done();
    }
}

/// Handle to a spawned thread.
#[derive(Debug)]
pub struct Thread {
    monitor: Arc<Monitor>,
    completion: Arc<Completion>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Thread {
    /// Spawns a thread running `runnable`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Initialization`] if the OS refuses to create the
    /// thread.
    pub fn spawn(runnable: impl Runnable + Send + 'static) -> Result<Self> {
        let monitor = Arc::new(Monitor::new());
        let completion = Arc::new(Completion::new());
        let serial = NEXT_THREAD_SERIAL.fetch_add(1, Ordering::Relaxed);

        let thread_monitor = Arc::clone(&monitor);
        let thread_completion = Arc::clone(&completion);
        let handle = std::thread::Builder::new()
            .name(format!("blocksync-{serial}"))
            .spawn(move || {
                Monitor::install(&thread_monitor);
                let _latch = SignalOnDrop(thread_completion);
                Box::new(runnable).run();
            })
            .map_err(|e| {
                Error::new(ErrorKind::Initialization)
                    .with_context("failed to spawn thread")
                    .with_source(e)
            })?;

        tracing::trace!(serial, "thread spawned");
        Ok(Self {
            monitor,
            completion,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Blocks until the thread finishes, then reaps it. Idempotent.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Deadlock`] if a thread waits on itself.
    pub fn wait(&self) -> Result<()> {
        self.check_self_join()?;
        self.completion.wait();
        self.reap();
        Ok(())
    }

    /// Like [`Thread::wait`] with a time budget. Returns whether the
    /// thread finished in time.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Deadlock`] if a thread waits on itself.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
        self.check_self_join()?;
        if self.completion.wait_timeout(timeout) {
            self.reap();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Interrupts the thread: its current (or next) blocking call fails
    /// with [`ErrorKind::Interrupted`].
    pub fn interrupt(&self) {
        self.monitor.interrupt();
    }

    /// Reads the thread's sticky interrupt flag without consuming it.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.monitor.is_interrupted()
    }

    /// Whether the thread's body has finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.completion.done.load(Ordering::Acquire)
    }

    fn check_self_join(&self) -> Result<()> {
        let joins_self = self
            .handle
            .lock()
            .as_ref()
            .is_some_and(|h| h.thread().id() == std::thread::current().id());
        if joins_self {
            return Err(
                Error::new(ErrorKind::Deadlock).with_context("thread attempted to join itself")
            );
        }
        Ok(())
    }

    fn reap(&self) {
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::error!("joined thread had panicked");
            }
        }
    }
}
