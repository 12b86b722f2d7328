//! Task executors over worker thread pools.
//!
//! An executor multiplexes submitted [`Task`](crate::Task)s onto worker
//! threads that loop on an internal [`BlockingQueue`](crate::BlockingQueue).
//! Cancellation goes through the queue: workers observe it on their next
//! dequeue, finish the task in hand, and exit. Interruption stamps the
//! set of tasks already submitted; each of those raises its worker's
//! sticky interrupt flag once, at the task boundary.

mod concurrent;
mod pool;

pub use concurrent::ConcurrentExecutor;
pub use pool::{PoolExecutor, PoolExecutorOptions};

use std::time::Duration;

use crate::error::Result;
use crate::task::Task;

/// Capability for submitting tasks to a pool of workers.
pub trait Executor {
    /// Enqueues `task` for execution.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Canceled`](crate::ErrorKind::Canceled) once the
    /// executor is canceled; the task is not enqueued.
    fn execute(&self, task: Task) -> Result<()>;

    /// Cancels the executor: submission is rejected from now on, workers
    /// finish their current task and exit, and queued tasks are
    /// discarded.
    fn cancel(&self);

    /// Whether the executor has been canceled.
    fn is_canceled(&self) -> bool;

    /// Blocks until every submitted task has been executed or discarded.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Interrupted`](crate::ErrorKind::Interrupted) if the
    /// waiting thread is interrupted.
    fn wait(&self) -> Result<()>;

    /// Like [`Executor::wait`] with a time budget. Returns whether the
    /// executor drained in time.
    fn wait_timeout(&self, timeout: Duration) -> Result<bool>;

    /// Marks every task submitted so far (queued or in flight) for a
    /// one-shot interrupt at its task boundary. Later submissions are
    /// unaffected.
    fn interrupt(&self);
}
