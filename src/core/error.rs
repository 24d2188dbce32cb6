//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// A result callback was supplied that cannot be invoked.
    #[error("result callback must be callable")]
    InvalidCallback,
    /// The executor queue is full; the job was not enqueued.
    #[error("executor queue is full")]
    QueueFull,
    /// The executor has been shut down and accepts no more jobs.
    #[error("executor has been shut down")]
    PoolShutdown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The task was dropped before producing a result.
    #[error("task was abandoned before completion")]
    Abandoned,
    /// A bounded wait elapsed.
    #[error("operation timed out")]
    Timeout,
    /// Internal failure (thread spawn, runtime construction, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Application-facing result using anyhow for user work functions.
pub type AppResult<T> = Result<T, anyhow::Error>;
