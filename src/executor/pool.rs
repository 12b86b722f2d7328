//! Fixed-size worker pool executor.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::monitor::{Monitor, WaitStatus};
use crate::queue::{BlockingQueue, Queue};
use crate::sync::Condition;
use crate::task::Task;
use crate::time::Deadline;

/// Configuration options for a [`PoolExecutor`].
#[derive(Clone)]
pub struct PoolExecutorOptions {
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
    /// Callback invoked on each worker thread as it starts.
    pub on_worker_start: Option<Arc<dyn Fn() + Send + Sync>>,
    /// Callback invoked on each worker thread as it stops.
    pub on_worker_stop: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Default for PoolExecutorOptions {
    fn default() -> Self {
        Self {
            thread_name_prefix: "blocksync".to_string(),
            on_worker_start: None,
            on_worker_stop: None,
        }
    }
}

impl std::fmt::Debug for PoolExecutorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolExecutorOptions")
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("on_worker_start", &self.on_worker_start.is_some())
            .field("on_worker_stop", &self.on_worker_stop.is_some())
            .finish()
    }
}

/// A task carrying its submission serial for the interrupt watermark.
#[derive(Debug)]
struct PoolTask {
    serial: u64,
    task: Task,
}

#[derive(Debug)]
struct Progress {
    pending: usize,
}

#[derive(Debug)]
struct PoolShared {
    queue: BlockingQueue<PoolTask>,
    progress: parking_lot::Mutex<Progress>,
    idle: Condition,
    next_serial: AtomicU64,
    /// Tasks with a serial below this mark get a one-shot interrupt.
    interrupt_mark: AtomicU64,
    /// Serial and monitor of each task currently in flight, so an
    /// interrupt can reach it mid-execution.
    running: parking_lot::Mutex<Vec<(u64, Arc<Monitor>)>>,
}

impl PoolShared {
    fn finish_one(&self) {
        let drained = {
            let mut progress = self.progress.lock();
            progress.pending -= 1;
            progress.pending == 0
        };
        if drained {
            self.idle.broadcast();
        }
    }
}

/// An executor that services its task queue with a fixed set of worker
/// threads.
///
/// Each worker repeatedly dequeues one task and executes it; task-start
/// order is FIFO within a worker but unordered across workers. A panic
/// inside a task is caught and logged so the worker and the pending-count
/// accounting survive it.
///
/// Dropping the executor cancels it and joins all workers.
#[derive(Debug)]
pub struct PoolExecutor {
    shared: Arc<PoolShared>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl PoolExecutor {
    /// Creates a pool with `workers` threads and default options.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self::with_options(workers, PoolExecutorOptions::default())
    }

    /// Creates a pool with `workers` threads and the given options.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero, or if the OS refuses to spawn a
    /// worker thread.
    #[must_use]
    pub fn with_options(workers: usize, options: PoolExecutorOptions) -> Self {
        assert!(workers > 0, "a pool needs at least one worker");

        let shared = Arc::new(PoolShared {
            queue: BlockingQueue::new(),
            progress: parking_lot::Mutex::new(Progress { pending: 0 }),
            idle: Condition::new(),
            next_serial: AtomicU64::new(0),
            interrupt_mark: AtomicU64::new(0),
            running: parking_lot::Mutex::new(Vec::new()),
        });

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let worker_shared = Arc::clone(&shared);
            let on_start = options.on_worker_start.clone();
            let on_stop = options.on_worker_stop.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-worker-{index}", options.thread_name_prefix))
                .spawn(move || {
                    if let Some(callback) = on_start {
                        callback();
                    }
                    worker_loop(&worker_shared);
                    if let Some(callback) = on_stop {
                        callback();
                    }
                })
                .expect("failed to spawn pool worker");
            handles.push(handle);
        }

        tracing::debug!(workers, "pool executor started");
        Self {
            shared,
            workers: parking_lot::Mutex::new(handles),
        }
    }

    /// Number of tasks submitted but not yet executed or discarded.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.progress.lock().pending
    }

    fn join_workers(&self) {
        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("pool worker exited by panic");
            }
        }
    }
}

impl Executor for PoolExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        if self.shared.queue.is_canceled() {
            return Err(Error::canceled().with_context("executor is canceled"));
        }

        let serial = self.shared.next_serial.fetch_add(1, Ordering::AcqRel);
        self.shared.progress.lock().pending += 1;

        match self.shared.queue.add(PoolTask { serial, task }) {
            Ok(()) => Ok(()),
            Err(e) => {
                // Lost the race with cancel; undo the accounting.
                self.shared.finish_one();
                Err(e)
            }
        }
    }

    fn cancel(&self) {
        tracing::debug!("pool executor canceled");
        self.shared.queue.cancel();
    }

    fn is_canceled(&self) -> bool {
        self.shared.queue.is_canceled()
    }

    fn wait(&self) -> Result<()> {
        let mut progress = self.shared.progress.lock();
        while progress.pending > 0 {
            let (guard, status) = self.shared.idle.wait(&self.shared.progress, progress);
            progress = guard;
            if status == WaitStatus::Interrupted {
                return Err(Error::interrupted());
            }
        }
        Ok(())
    }

    fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
        let deadline = Deadline::after(timeout);
        let mut progress = self.shared.progress.lock();
        while progress.pending > 0 {
            if deadline.expired() {
                return Ok(false);
            }
            let (guard, status) =
                self.shared
                    .idle
                    .wait_for(&self.shared.progress, progress, deadline.remaining());
            progress = guard;
            match status {
                WaitStatus::Interrupted => return Err(Error::interrupted()),
                WaitStatus::TimedOut if progress.pending > 0 => return Ok(false),
                _ => {}
            }
        }
        Ok(true)
    }

    fn interrupt(&self) {
        // Stamp everything submitted so far; later serials are unaffected.
        let mark = self.shared.next_serial.load(Ordering::Acquire);
        self.shared.interrupt_mark.fetch_max(mark, Ordering::AcqRel);

        // Tasks already in flight are interrupted where they stand;
        // queued ones pick the mark up at their own start.
        let running = self.shared.running.lock();
        for (serial, monitor) in running.iter() {
            if *serial < mark {
                monitor.interrupt();
            }
        }
        tracing::debug!(mark, "pool executor interrupt requested");
    }
}

impl Drop for PoolExecutor {
    fn drop(&mut self) {
        self.cancel();
        self.join_workers();
    }
}

fn worker_loop(shared: &PoolShared) {
    tracing::trace!("pool worker running");
    let monitor = Monitor::current();
    loop {
        let Ok(PoolTask { serial, task }) = shared.queue.next() else {
            // The queue is canceled and drained.
            break;
        };

        if shared.queue.is_canceled() {
            // Canceled before this task was picked up: discard it.
            shared.finish_one();
            continue;
        }

        if serial >= shared.interrupt_mark.load(Ordering::Acquire) {
            // A mark a previous task never consumed must not leak into
            // later submissions.
            let _ = monitor.interrupted();
        }
        shared.running.lock().push((serial, Arc::clone(&monitor)));
        if serial < shared.interrupt_mark.load(Ordering::Acquire) {
            // In the system when interrupt() ran: one-shot flag at the
            // task boundary.
            monitor.interrupt();
        }

        if catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
            tracing::error!(serial, "task panicked");
        }
        shared.running.lock().retain(|(s, _)| *s != serial);
        shared.finish_one();
    }
    tracing::trace!("pool worker exiting");
}
