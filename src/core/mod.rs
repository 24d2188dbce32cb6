//! Core scheduling abstractions and in-flight accounting.

pub mod callback;
pub mod callback_thread;
pub mod completion;
pub mod error;
pub mod executor;
pub mod global_pool;
pub mod scheduler;
pub mod slots;
pub mod worker_pool;

pub use callback::{callback, FnCallback, NullCallback, ResultCallback, ResultList};
pub use callback_thread::CallbackThread;
pub use completion::{promise, Promise, TaskFuture};
pub use error::{AppResult, SchedulerError};
pub use executor::{Executor, Job};
pub use global_pool::{configure_global_pool, global_pool, global_worker_count, GlobalPool};
pub use scheduler::{FutureScheduler, SchedulerStats, Submission, TaskId};
pub use slots::{Slot, SlotTracker};
pub use worker_pool::{PoolStats, WorkerPool};
