//! Executor scheduling, cancellation, and interruption scenarios.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use blocksync::{ConcurrentExecutor, Executor, PoolExecutor, Semaphore, Task};

/// A single worker runs tasks strictly in submission order, and `wait`
/// returns only after the last one.
#[test]
fn concurrent_executor_runs_in_submission_order() {
    common::init_logging();

    let executor = ConcurrentExecutor::new();
    let outputs = Arc::new(parking_lot::Mutex::new(Vec::new()));

    for id in 1..=4u32 {
        let outputs = Arc::clone(&outputs);
        executor
            .execute(Task::new(move || {
                outputs.lock().push(id);
                thread::sleep(Duration::from_millis(10));
            }))
            .expect("execute");
    }

    executor.wait().expect("wait");
    assert_eq!(outputs.lock().clone(), vec![1, 2, 3, 4]);
}

/// Tasks spread across a pool all execute exactly once.
#[test]
fn pool_executes_every_task_once() {
    common::init_logging();

    let executor = PoolExecutor::new(4);
    let executions = Arc::new(AtomicUsize::new(0));

    for _ in 0..200 {
        let executions = Arc::clone(&executions);
        executor
            .execute(Task::new(move || {
                executions.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("execute");
    }

    executor.wait().expect("wait");
    assert_eq!(executions.load(Ordering::SeqCst), 200);
    assert_eq!(executor.pending_count(), 0);
}

/// Once canceled, an executor rejects every later submission.
#[test]
fn cancellation_is_final() {
    common::init_logging();

    let executor = PoolExecutor::new(2);
    executor
        .execute(Task::new(|| {}))
        .expect("pre-cancel execute");
    executor.cancel();
    assert!(executor.is_canceled());

    for _ in 0..3 {
        let err = executor
            .execute(Task::new(|| {}))
            .expect_err("post-cancel execute");
        assert!(err.is_canceled());
    }
    executor.wait().expect("wait");
}

/// `interrupt` reaches a task blocked inside the pool exactly once, and
/// leaves tasks submitted afterwards untouched.
#[test]
fn interrupt_covers_exactly_the_submitted_tasks() {
    common::init_logging();

    let executor = ConcurrentExecutor::new();
    let gate = Arc::new(Semaphore::new(0, 1));
    let first_outcome = Arc::new(parking_lot::Mutex::new(None));

    let blocked = Arc::clone(&gate);
    let seen = Arc::clone(&first_outcome);
    executor
        .execute(Task::new(move || {
            *seen.lock() = Some(blocked.acquire());
        }))
        .expect("execute blocked task");

    while gate.waiting_count() == 0 {
        thread::yield_now();
    }
    executor.interrupt();

    // Submitted after the interrupt: its blocking wait must time out
    // normally instead of seeing a stale interrupt.
    let second_outcome = Arc::new(parking_lot::Mutex::new(None));
    let seen = Arc::clone(&second_outcome);
    let probe = Arc::new(Semaphore::new(0, 1));
    executor
        .execute(Task::new(move || {
            *seen.lock() = Some(probe.try_acquire(Duration::from_millis(40)));
        }))
        .expect("execute follow-up task");

    executor.wait().expect("wait");

    let first = first_outcome.lock().take().expect("first task ran");
    assert!(first
        .expect_err("blocked task must be interrupted")
        .is_interrupted());

    let second = second_outcome.lock().take().expect("second task ran");
    assert!(matches!(second, Ok(false)), "follow-up saw the interrupt");
}

/// Workers survive task panics; the pool keeps draining.
#[test]
fn pool_outlives_panicking_tasks() {
    common::init_logging();

    let executor = PoolExecutor::new(2);
    let completed = Arc::new(AtomicUsize::new(0));

    for n in 0..20 {
        let completed = Arc::clone(&completed);
        executor
            .execute(Task::new(move || {
                assert!(n % 5 != 0, "intentional panic");
                completed.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("execute");
    }

    executor.wait().expect("wait");
    assert_eq!(completed.load(Ordering::SeqCst), 16);
}
