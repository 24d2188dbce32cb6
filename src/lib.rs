//! # Prometheus Future Scheduler
//!
//! A drain-on-shutdown task scheduler for background work in the Prometheus AI
//! Platform.
//!
//! The scheduler hands work to a bounded pool of worker threads, counts every
//! accepted task, and on shutdown refuses new work and blocks until all
//! accepted work has finished. Results come back through a future and,
//! optionally, a callback.
//!
//! ## Core Problem Solved
//!
//! Subsystems that fire off background work (indexing, thumbnailing, script
//! callbacks) must not be torn down while that work still touches their
//! state:
//!
//! - **Shutdown races**: a submission racing shutdown is either counted and
//!   waited for, or refused; never both, never neither
//! - **Failing work**: errors and panics inside a task are logged and turned
//!   into default results, they never reach the submitter
//! - **Lost capacity**: a task that is refused by the executor, dropped
//!   unrun, or panics still gives back its slot
//!
//! ## Key Features
//!
//! - **FutureScheduler**: accept/reject, in-flight counting, blocking drain
//! - **SlotTracker**: reusable wait-group with RAII slots
//! - **WorkerPool**: fixed-size OS thread pool with a bounded queue
//! - **Global pool**: process-wide pool whose size is configured exactly once
//! - **TaskFuture**: blocking, non-blocking, and `async` result access plus
//!   completion observers
//! - **Callback thread**: result callbacks run off the pool, so they may
//!   re-enter or shut down their scheduler
//! - **TokioExecutor**: run jobs on a tokio runtime's blocking pool
//!
//! ## Example
//!
//! ```rust
//! use prometheus_future_scheduler::config::WorkerPoolConfig;
//! use prometheus_future_scheduler::core::{callback, FutureScheduler, WorkerPool};
//! use serde_json::json;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(4))?;
//! let scheduler = FutureScheduler::with_executor("indexer", pool);
//!
//! // Fire-and-forget.
//! let submission = scheduler.submit(|| Ok(()));
//! assert!(submission.accepted);
//!
//! // Result delivered to a callback once the task finishes.
//! let (tx, rx) = flume::bounded(1);
//! let submission = scheduler.submit_with_callback(
//!     || Ok(vec![json!("indexed"), json!(128)]),
//!     callback(move |results| {
//!         let _ = tx.send(results);
//!     }),
//! )?;
//! assert!(submission.accepted);
//! assert_eq!(rx.recv()?, vec![json!("indexed"), json!(128)]);
//!
//! // Blocks until both tasks are done; later submissions are refused.
//! scheduler.shutdown();
//! assert!(!scheduler.submit(|| Ok(())).accepted);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - shutdown, drain, and failure isolation scenarios
//! - `tests/global_pool_test.rs` - one-time pool configuration

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and in-flight accounting.
pub mod core;
/// Configuration models for worker pools and schedulers.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Runtime adapters (tokio) implementing the executor interface.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    callback, configure_global_pool, FutureScheduler, ResultCallback, ResultList,
    SchedulerError, SchedulerStats, Submission, TaskFuture, WorkerPool,
};
pub use crate::config::WorkerPoolConfig;
