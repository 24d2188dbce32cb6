//! Executor abstraction consumed by the scheduler.

use std::sync::Arc;

use super::SchedulerError;

/// Unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs dispatched jobs on worker threads.
///
/// Implementations must either accept the job (and eventually run or drop
/// it) or reject it synchronously. A rejected job must be dropped, never run:
/// the scheduler relies on the job's destructor to release the capacity it
/// reserved for it.
///
/// # Example
///
/// ```rust
/// use prometheus_future_scheduler::core::{Executor, Job, SchedulerError};
///
/// /// Runs every job on a fresh OS thread.
/// struct ThreadPerJob;
///
/// impl Executor for ThreadPerJob {
///     fn dispatch(&self, job: Job) -> Result<(), SchedulerError> {
///         std::thread::Builder::new()
///             .spawn(job)
///             .map(drop)
///             .map_err(|e| SchedulerError::Internal(e.to_string()))
///     }
/// }
/// ```
pub trait Executor: Send + Sync + 'static {
    /// Enqueue a job without blocking.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::QueueFull`] if the executor has no room
    /// - [`SchedulerError::PoolShutdown`] if the executor stopped accepting work
    fn dispatch(&self, job: Job) -> Result<(), SchedulerError>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn dispatch(&self, job: Job) -> Result<(), SchedulerError> {
        (**self).dispatch(job)
    }
}

impl<E: Executor + ?Sized> Executor for &'static E {
    fn dispatch(&self, job: Job) -> Result<(), SchedulerError> {
        (**self).dispatch(job)
    }
}

impl Executor for Box<dyn Executor> {
    fn dispatch(&self, job: Job) -> Result<(), SchedulerError> {
        (**self).dispatch(job)
    }
}
