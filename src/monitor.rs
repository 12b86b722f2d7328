//! Per-thread wait/notify channel.
//!
//! A [`Monitor`] is the atom every blocking primitive in this crate is
//! built from. Each thread owns exactly one monitor, created lazily on
//! first use and torn down with the thread. A primitive that needs to
//! block a thread enqueues a reference to that thread's monitor on its
//! own waiter list, then waits on the monitor; whoever later wants to
//! wake the thread notifies the monitor through the list entry.
//!
//! # Protocol
//!
//! The waiting side must call [`Monitor::lock`] *before* releasing the
//! primitive's own state lock, and only then wait. This closes the window
//! in which a notifier could observe the waiter on the list but find its
//! monitor idle. The notifying side goes through [`Monitor::try_notify`],
//! which refuses to block: a monitor whose internal lock is held is still
//! between those two steps and will be retried.
//!
//! # Stickiness
//!
//! A wake is terminal: the monitor keeps its SIGNALED / INTERRUPTED /
//! TIMEDOUT state until the wait's return path consumes it. Higher
//! primitives therefore always re-check their own predicates after a
//! wake. The interrupt flag is sticky in the other direction as well:
//! interrupting a thread that is not waiting makes its *next* wait return
//! interrupted immediately.

use std::cell::OnceCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

thread_local! {
    static CURRENT_MONITOR: OnceCell<Arc<Monitor>> = const { OnceCell::new() };
}

/// Terminal state of a completed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Woken by [`Monitor::notify`] or [`Monitor::try_notify`].
    Signaled,
    /// Woken by [`Monitor::interrupt`], or the sticky interrupt flag was
    /// already set when the wait started.
    Interrupted,
    /// The wait's time budget elapsed.
    TimedOut,
}

/// Outcome of a non-blocking notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The waiter was waiting and has been woken.
    Woke,
    /// The monitor was not waiting; the waiter already left (or never
    /// reached) its wait.
    Missed,
    /// The monitor's internal lock is held; the waiter is mid-transition.
    /// Try again.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Waiting,
    Signaled,
    Interrupted,
    TimedOut,
}

#[derive(Debug)]
struct Inner {
    state: State,
    interrupted: bool,
}

/// A one-shot wait/notify channel bound to a specific thread.
///
/// At most one thread (the owner) ever waits on a monitor; any thread may
/// notify or interrupt it.
#[derive(Debug)]
pub struct Monitor {
    inner: Mutex<Inner>,
    cond: Condvar,
}

/// Guard over a monitor's internal lock.
///
/// Obtained from [`Monitor::lock`] and consumed by [`Monitor::wait`] /
/// [`Monitor::wait_for`]. Holding it keeps notifiers in the
/// [`NotifyOutcome::Busy`] state.
#[must_use = "dropping the guard reopens the missed-wakeup window"]
pub struct MonitorGuard<'a> {
    inner: MutexGuard<'a, Inner>,
}

impl Monitor {
    /// Creates a monitor in the idle state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Idle,
                interrupted: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Returns the calling thread's monitor, creating it on first use.
    #[must_use]
    pub fn current() -> Arc<Self> {
        CURRENT_MONITOR.with(|cell| Arc::clone(cell.get_or_init(|| Arc::new(Self::new()))))
    }

    /// Installs `monitor` as the calling thread's monitor.
    ///
    /// No-op if the thread already initialized one. Used by thread spawning
    /// so a handle can target the thread before it runs.
    pub(crate) fn install(monitor: &Arc<Self>) {
        CURRENT_MONITOR.with(|cell| {
            let _ = cell.set(Arc::clone(monitor));
        });
    }

    /// Acquires the monitor's internal lock.
    ///
    /// Call this while still holding the owning primitive's state lock,
    /// then release that lock and hand the guard to [`Monitor::wait`].
    pub fn lock(&self) -> MonitorGuard<'_> {
        MonitorGuard {
            inner: self.inner.lock(),
        }
    }

    /// Blocks the owner thread until notified or interrupted.
    ///
    /// The guard must come from [`Monitor::lock`] on this same monitor.
    pub fn wait(&self, guard: MonitorGuard<'_>) -> WaitStatus {
        self.wait_inner(guard, None)
    }

    /// Like [`Monitor::wait`], but gives up after `timeout`.
    pub fn wait_for(&self, guard: MonitorGuard<'_>, timeout: Duration) -> WaitStatus {
        self.wait_inner(guard, Some(timeout))
    }

    fn wait_inner(&self, guard: MonitorGuard<'_>, timeout: Option<Duration>) -> WaitStatus {
        let mut inner = guard.inner;

        // A pending interrupt is consumed without ever sleeping.
        if inner.interrupted {
            inner.interrupted = false;
            inner.state = State::Idle;
            return WaitStatus::Interrupted;
        }

        inner.state = State::Waiting;

        match timeout {
            None => {
                while inner.state == State::Waiting {
                    self.cond.wait(&mut inner);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while inner.state == State::Waiting {
                    if Instant::now() >= deadline {
                        inner.state = State::TimedOut;
                        break;
                    }
                    let result = self.cond.wait_until(&mut inner, deadline);
                    if result.timed_out() && inner.state == State::Waiting {
                        inner.state = State::TimedOut;
                        break;
                    }
                }
            }
        }

        let status = match inner.state {
            State::Interrupted => {
                inner.interrupted = false;
                WaitStatus::Interrupted
            }
            State::TimedOut => WaitStatus::TimedOut,
            _ => WaitStatus::Signaled,
        };
        inner.state = State::Idle;
        status
    }

    /// Wakes the owner if it is currently waiting.
    ///
    /// Returns whether a WAITING → SIGNALED transition occurred. `false`
    /// means the owner already left its wait (or never entered one); the
    /// notification is not stored.
    pub fn notify(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == State::Waiting {
            inner.state = State::Signaled;
            self.cond.notify_one();
            true
        } else {
            false
        }
    }

    /// Non-blocking notification attempt, the handoff step used when
    /// walking a waiter list.
    pub fn try_notify(&self) -> NotifyOutcome {
        let Some(mut inner) = self.inner.try_lock() else {
            return NotifyOutcome::Busy;
        };
        if inner.state == State::Waiting {
            inner.state = State::Signaled;
            self.cond.notify_one();
            NotifyOutcome::Woke
        } else {
            NotifyOutcome::Missed
        }
    }

    /// Interrupts the owner thread.
    ///
    /// Sets the sticky interrupt flag; if the owner is waiting it is woken
    /// with [`WaitStatus::Interrupted`]. Returns whether a waiting thread
    /// was woken.
    pub fn interrupt(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.interrupted = true;
        if inner.state == State::Waiting {
            inner.state = State::Interrupted;
            self.cond.notify_one();
            tracing::trace!("interrupt delivered to waiting monitor");
            true
        } else {
            false
        }
    }

    /// Consumes and returns the sticky interrupt flag without waiting.
    pub fn interrupted(&self) -> bool {
        let mut inner = self.inner.lock();
        let was = inner.interrupted;
        inner.interrupted = false;
        was
    }

    /// Reads the sticky interrupt flag without consuming it.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.inner.lock().interrupted
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
