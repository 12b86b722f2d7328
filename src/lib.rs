//! Blocksync: monitor-based blocking synchronization for OS threads.
//!
//! # Overview
//!
//! Blocksync is a threading and synchronization library built around one
//! idea: every blocking wait in the system goes through the waiting
//! thread's own [`Monitor`], a reusable one-shot wait/notify channel
//! created lazily per thread. Higher primitives keep ordered lists of
//! foreign monitors and wake them with a non-blocking handoff, which is
//! what makes fair ordering, robust cancellation, and one-shot
//! interruption composable across the whole stack.
//!
//! # The stack
//!
//! - [`FastLock`]: raw process-local lock, uncontended-fast
//! - [`Monitor`]: per-thread wait/notify with sticky interrupt
//! - Waiter-list primitives: [`Mutex`], [`Semaphore`], [`Condition`],
//!   [`BiasedRwLock`], [`FairRwLock`]
//! - Compound primitives: [`BlockingQueue`], [`BoundedQueue`],
//!   [`MonitoredQueue`], [`PoolExecutor`], [`ConcurrentExecutor`]
//! - Cross-cutting: [`Guard`] scoped holders, [`CountedPtr`] shared
//!   handles, [`Thread`] spawn/join/interrupt
//!
//! # Interruption and cancellation
//!
//! [`Thread::interrupt`] sets a sticky per-thread flag consumed by
//! exactly one subsequent blocking call, which fails with
//! [`ErrorKind::Interrupted`]. Queue and executor cancellation is a
//! terminal transition: blocked threads wake promptly and later
//! operations fail with [`ErrorKind::Canceled`].
//!
//! # Example
//!
//! ```
//! use blocksync::{BoundedQueue, Queue, Thread};
//!
//! let queue = std::sync::Arc::new(BoundedQueue::new(3));
//!
//! let producer = std::sync::Arc::clone(&queue);
//! let worker = Thread::spawn(move || {
//!     for n in 0..10u32 {
//!         producer.add(n).expect("queue canceled");
//!     }
//! })
//! .expect("spawn failed");
//!
//! for n in 0..10 {
//!     assert_eq!(queue.next().expect("queue canceled"), n);
//! }
//! worker.wait().expect("join failed");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod counted;
pub mod error;
pub mod executor;
pub mod monitor;
pub mod queue;
pub mod sync;
pub mod task;
pub mod thread;
mod time;

#[cfg(test)]
pub mod test_utils;

pub use counted::CountedPtr;
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use executor::{ConcurrentExecutor, Executor, PoolExecutor, PoolExecutorOptions};
pub use monitor::{Monitor, NotifyOutcome, WaitStatus};
pub use queue::{BlockingQueue, BoundedQueue, MonitoredQueue, Queue};
pub use sync::{
    BiasedRwLock, Condition, FairRwLock, FastLock, Guard, Lockable, Mutex, ReadWriteLock,
    Semaphore, UnlockedGuard,
};
pub use task::{Runnable, Task};
pub use thread::Thread;
