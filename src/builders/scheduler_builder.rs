//! Builders to construct schedulers, each on its own worker pool.

use std::collections::HashMap;

use tracing::info;

use crate::config::{SchedulerConfig, WorkerPoolConfig};
use crate::core::{FutureScheduler, SchedulerError, WorkerPool};

/// Build one scheduler backed by a dedicated worker pool.
///
/// # Errors
///
/// Propagates [`WorkerPool::new`] failures.
pub fn build_scheduler(
    name: &str,
    pool_cfg: &WorkerPoolConfig,
) -> Result<FutureScheduler<WorkerPool>, SchedulerError> {
    let pool = WorkerPool::new(pool_cfg.clone())?;
    Ok(FutureScheduler::with_executor(name, pool))
}

/// Build every scheduler named in the configuration.
///
/// # Errors
///
/// [`SchedulerError::InvalidConfig`] if the configuration fails validation;
/// otherwise the first pool construction failure.
pub fn build_schedulers(
    cfg: &SchedulerConfig,
) -> Result<HashMap<String, FutureScheduler<WorkerPool>>, SchedulerError> {
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let mut schedulers = HashMap::with_capacity(cfg.schedulers.len());
    for (name, pool_cfg) in &cfg.schedulers {
        let scheduler = build_scheduler(name, pool_cfg)?;
        schedulers.insert(name.clone(), scheduler);
    }

    info!(count = schedulers.len(), "Schedulers built from configuration");
    Ok(schedulers)
}
