//! Configuration models for worker pools and schedulers.

pub mod pool;

pub use pool::{SchedulerConfig, WorkerPoolConfig};
