//! Worker pool and scheduler configuration structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// Environment variable overriding [`WorkerPoolConfig::worker_count`].
pub const ENV_WORKERS: &str = "FUTURE_SCHEDULER_WORKERS";
/// Environment variable overriding [`WorkerPoolConfig::max_queue_depth`].
pub const ENV_QUEUE_DEPTH: &str = "FUTURE_SCHEDULER_QUEUE_DEPTH";
/// Environment variable overriding [`WorkerPoolConfig::thread_stack_size`].
pub const ENV_STACK_SIZE: &str = "FUTURE_SCHEDULER_STACK_SIZE";

/// Smallest stack a worker thread may be configured with.
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of OS worker threads.
    pub worker_count: usize,
    /// Maximum queued jobs before dispatch is refused.
    pub max_queue_depth: usize,
    /// Stack size per worker thread, in bytes.
    pub thread_stack_size: usize,
    /// Worker thread name prefix; threads are named `{prefix}-{id}`.
    pub thread_name_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            max_queue_depth: 1024,
            thread_stack_size: 2 * 1024 * 1024,
            thread_name_prefix: "fs-worker".into(),
        }
    }
}

impl WorkerPoolConfig {
    /// Default configuration: one worker per logical CPU.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the queue bound.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, max_queue_depth: usize) -> Self {
        self.max_queue_depth = max_queue_depth;
        self
    }

    /// Set the per-thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate worker pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.thread_stack_size < MIN_STACK_SIZE {
            return Err(format!("thread_stack_size must be at least {MIN_STACK_SIZE} bytes"));
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Defaults overridden by `FUTURE_SCHEDULER_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] if a variable does not parse or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self, SchedulerError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SchedulerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |key: &str, fallback: usize| -> Result<usize, SchedulerError> {
            lookup(key).map_or(Ok(fallback), |raw| {
                raw.trim()
                    .parse::<usize>()
                    .map_err(|e| SchedulerError::InvalidConfig(format!("{key}={raw:?}: {e}")))
            })
        };

        let defaults = Self::default();
        let cfg = Self {
            worker_count: parse(ENV_WORKERS, defaults.worker_count)?,
            max_queue_depth: parse(ENV_QUEUE_DEPTH, defaults.max_queue_depth)?,
            thread_stack_size: parse(ENV_STACK_SIZE, defaults.thread_stack_size)?,
            thread_name_prefix: defaults.thread_name_prefix,
        };
        cfg.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(cfg)
    }
}

/// Root configuration: one worker pool per named scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Map of scheduler name to its worker pool configuration.
    pub schedulers: HashMap<String, WorkerPoolConfig>,
}

impl SchedulerConfig {
    /// Validate all pools and ensure at least one scheduler exists.
    pub fn validate(&self) -> Result<(), String> {
        if self.schedulers.is_empty() {
            return Err("at least one scheduler must be defined".into());
        }
        for (name, pool) in &self.schedulers {
            pool.validate()
                .map_err(|e| format!("scheduler `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
