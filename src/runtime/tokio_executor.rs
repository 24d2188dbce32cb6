//! Tokio runtime executor implementation.

use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::core::{Executor, Job, SchedulerError};

/// Executor running jobs on a tokio runtime's blocking thread pool.
///
/// Scheduler jobs are synchronous closures, so they go through
/// `spawn_blocking` rather than onto the async workers.
///
/// # Runtime shutdown
///
/// A tokio [`Handle`] cannot report whether its runtime has shut down, so
/// [`dispatch`](Executor::dispatch) always succeeds. When an executor built
/// with [`new`](Self::new) or [`current`](Self::current) outlives its
/// runtime, tokio drops each job unrun: the submission is reported as
/// accepted, its slot is released, no callback runs, and its future resolves
/// to [`SchedulerError::Abandoned`]. Executors from
/// [`with_blocking_threads`](Self::with_blocking_threads) own their runtime
/// and cannot outlive it.
#[derive(Clone)]
pub struct TokioExecutor {
    handle: Handle,
    /// Keeps an owned runtime alive; `None` when borrowing an existing one.
    _runtime: Option<Arc<Runtime>>,
}

impl TokioExecutor {
    /// Create a `TokioExecutor` from a tokio runtime handle.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self {
            handle,
            _runtime: None,
        }
    }

    /// Use the runtime the caller is running inside.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Internal`] when called outside a tokio runtime.
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::Internal(format!("no tokio runtime: {e}")))
    }

    /// Create a `TokioExecutor` owning a runtime capped at `max_threads`
    /// blocking threads.
    ///
    /// The runtime is shut down when the last clone is dropped, which must
    /// happen outside any async context.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Internal`] if the runtime cannot be built.
    pub fn with_blocking_threads(max_threads: usize) -> Result<Self, SchedulerError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_threads.max(1))
            .thread_name("fs-tokio")
            .enable_all()
            .build()
            .map_err(|e| SchedulerError::Internal(format!("failed to build tokio runtime: {e}")))?;
        Ok(Self {
            handle: runtime.handle().clone(),
            _runtime: Some(Arc::new(runtime)),
        })
    }

    /// Handle of the runtime jobs are spawned onto.
    #[must_use]
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Executor for TokioExecutor {
    fn dispatch(&self, job: Job) -> Result<(), SchedulerError> {
        // A shut-down runtime drops the job unrun, which releases its slot and
        // abandons its future.
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }
}
