//! Single-threaded serial executor.

use std::time::Duration;

use crate::error::Result;
use crate::executor::{Executor, PoolExecutor, PoolExecutorOptions};
use crate::task::Task;

/// An executor that services all tasks with a single thread.
///
/// Because one worker drives the whole queue, tasks execute strictly in
/// submission order. Cancellation, waiting, and interruption behave
/// exactly like [`PoolExecutor`].
#[derive(Debug)]
pub struct ConcurrentExecutor {
    executor: PoolExecutor,
}

impl ConcurrentExecutor {
    /// Creates the executor and its worker thread.
    #[must_use]
    pub fn new() -> Self {
        Self {
            executor: PoolExecutor::new(1),
        }
    }

    /// Creates the executor with the given options.
    #[must_use]
    pub fn with_options(options: PoolExecutorOptions) -> Self {
        Self {
            executor: PoolExecutor::with_options(1, options),
        }
    }

    /// Number of tasks submitted but not yet executed or discarded.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.executor.pending_count()
    }
}

impl Default for ConcurrentExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ConcurrentExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        self.executor.execute(task)
    }

    fn cancel(&self) {
        self.executor.cancel();
    }

    fn is_canceled(&self) -> bool {
        self.executor.is_canceled()
    }

    fn wait(&self) -> Result<()> {
        self.executor.wait()
    }

    fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
        self.executor.wait_timeout(timeout)
    }

    fn interrupt(&self) {
        self.executor.interrupt();
    }
}
