//! Units of work for threads and executors.

use std::fmt;

/// Capability for anything that can be run once.
///
/// Closures get it for free, so `Thread::spawn(|| …)` and
/// `executor.execute(Task::new(|| …))` both work without ceremony.
pub trait Runnable {
    /// Runs the unit of work, consuming it.
    fn run(self: Box<Self>);
}

impl<F: FnOnce()> Runnable for F {
    fn run(self: Box<Self>) {
        (*self)();
    }
}

/// An opaque callable submitted to an executor.
///
/// A task runs exactly once, on exactly one worker, unless its executor
/// is canceled before a worker dequeues it.
pub struct Task {
    runnable: Box<dyn Runnable + Send>,
}

impl Task {
    /// Wraps `runnable` into a task.
    pub fn new(runnable: impl Runnable + Send + 'static) -> Self {
        Self {
            runnable: Box::new(runnable),
        }
    }

    /// Runs the task, consuming it.
    pub fn run(self) {
        self.runnable.run();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn closure_runs_through_the_capability() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&count);
        let task = Task::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        task.run();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    struct Job(Arc<AtomicUsize>);

    impl Runnable for Job {
        fn run(self: Box<Self>) {
            self.0.fetch_add(10, Ordering::SeqCst);
        }
    }

    #[test]
    fn custom_runnable_runs() {
        let count = Arc::new(AtomicUsize::new(0));
        Task::new(Job(Arc::clone(&count))).run();
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }
}
