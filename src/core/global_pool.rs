//! Process-wide shared worker pool.
//!
//! The thread count is fixed the first time it is needed: either by an
//! explicit [`configure_global_pool`] call during startup, or by the first
//! dispatch through [`GlobalPool`], which falls back to
//! [`DEFAULT_GLOBAL_WORKERS`]. Both paths go through the same once-flag, so
//! later configuration attempts are no-ops.

use std::sync::OnceLock;

use tracing::{debug, info};

use crate::config::WorkerPoolConfig;
use crate::core::{Executor, Job, SchedulerError, WorkerPool};

/// Thread count used when nothing configured the global pool.
pub const DEFAULT_GLOBAL_WORKERS: usize = 4;

static GLOBAL_WORKER_COUNT: OnceLock<usize> = OnceLock::new();
static GLOBAL_POOL: OnceLock<WorkerPool> = OnceLock::new();

/// Fix the global pool's thread count.
///
/// Returns `true` if this call applied the setting, `false` if the count was
/// already fixed (by an earlier call or by first use of the pool). A count of
/// zero is raised to one.
pub fn configure_global_pool(max_threads: usize) -> bool {
    let mut applied = false;
    let effective = *GLOBAL_WORKER_COUNT.get_or_init(|| {
        applied = true;
        max_threads.max(1)
    });

    if applied {
        info!(worker_count = effective, "Global worker pool configured");
    } else {
        debug!(
            requested = max_threads,
            worker_count = effective,
            "Global worker pool already configured; ignoring"
        );
    }
    applied
}

/// Thread count the global pool uses, or would use if created now.
///
/// Read-only: it does not fix the count, so a later
/// [`configure_global_pool`] still applies.
#[must_use]
pub fn global_worker_count() -> usize {
    GLOBAL_WORKER_COUNT
        .get()
        .copied()
        .unwrap_or(DEFAULT_GLOBAL_WORKERS)
}

/// The shared pool, created on first use.
///
/// # Errors
///
/// Propagates [`WorkerPool::new`] failures; a later call retries.
pub fn global_pool() -> Result<&'static WorkerPool, SchedulerError> {
    if let Some(pool) = GLOBAL_POOL.get() {
        return Ok(pool);
    }

    let worker_count = *GLOBAL_WORKER_COUNT.get_or_init(|| DEFAULT_GLOBAL_WORKERS);
    let pool = WorkerPool::new(
        WorkerPoolConfig::new()
            .with_worker_count(worker_count)
            .with_thread_name_prefix("fs-global"),
    )?;
    // A racing initializer may win; the losing pool shuts its threads down on drop.
    let _ = GLOBAL_POOL.set(pool);
    GLOBAL_POOL
        .get()
        .ok_or_else(|| SchedulerError::Internal("global worker pool unavailable".into()))
}

/// Executor handle dispatching onto the process-wide pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalPool;

impl Executor for GlobalPool {
    fn dispatch(&self, job: Job) -> Result<(), SchedulerError> {
        global_pool()?.dispatch(job)
    }
}
