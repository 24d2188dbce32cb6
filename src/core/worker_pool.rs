//! Fixed-size worker pool backed by dedicated OS threads.
//!
//! Jobs travel over a bounded `crossbeam-channel`; each worker blocks on
//! `recv` until work arrives or every sender is gone.
//!
//! # Design Principles
//!
//! - **No polling**: workers sleep in `recv`, never spin
//! - **Non-blocking dispatch**: `try_send` refuses work when the queue is full
//! - **Panic containment**: a panicking job is logged and the worker keeps going
//! - **Clean shutdown**: dropping the sender lets workers finish queued jobs and exit

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;
use crate::core::{Executor, Job, SchedulerError};
use crate::util::panic_message;

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Jobs waiting in the queue.
    pub queued_jobs: u64,
    /// Jobs currently executing.
    pub active_jobs: u64,
    /// Jobs that ran to completion.
    pub completed_jobs: u64,
    /// Jobs that panicked.
    pub panicked_jobs: u64,
    /// Jobs accepted by `dispatch`.
    pub dispatched_jobs: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
struct PoolCounters {
    queued_jobs: AtomicU64,
    active_jobs: AtomicU64,
    completed_jobs: AtomicU64,
    panicked_jobs: AtomicU64,
    dispatched_jobs: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            queued_jobs: self.queued_jobs.load(Ordering::Relaxed),
            active_jobs: self.active_jobs.load(Ordering::Relaxed),
            completed_jobs: self.completed_jobs.load(Ordering::Relaxed),
            panicked_jobs: self.panicked_jobs.load(Ordering::Relaxed),
            dispatched_jobs: self.dispatched_jobs.load(Ordering::Relaxed),
        }
    }
}

/// Worker pool with a fixed number of dedicated OS threads.
pub struct WorkerPool {
    /// Pool configuration.
    config: WorkerPoolConfig,
    /// Job sender. `None` once shut down.
    job_tx: Mutex<Option<Sender<Job>>>,
    /// Pool statistics counters (lock-free atomics).
    counters: Arc<PoolCounters>,
    /// Shutdown flag.
    shutdown: AtomicBool,
    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a new worker pool and spawn `config.worker_count` threads.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidConfig`] if the configuration is invalid
    /// - [`SchedulerError::Internal`] if a worker thread cannot be spawned
    pub fn new(config: WorkerPoolConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let (job_tx, job_rx) = bounded::<Job>(config.max_queue_depth);
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            // On failure the already-spawned workers exit once `job_tx` drops.
            let worker = spawn_worker(worker_id, &config, job_rx.clone(), Arc::clone(&counters))?;
            workers.push(worker);
        }

        info!(
            worker_count = config.worker_count,
            max_queue_depth = config.max_queue_depth,
            "WorkerPool initialized with dedicated OS threads"
        );

        Ok(Self {
            config,
            job_tx: Mutex::new(Some(job_tx)),
            counters,
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(workers),
        })
    }

    /// Configuration the pool was built with.
    #[must_use]
    pub const fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.config.worker_count)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting jobs, let workers drain the queue, and join them.
    ///
    /// Idempotent. Must not be called from one of this pool's own workers.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Shutting down worker pool");

        // Dropping the sender unblocks every worker once the queue is empty.
        self.job_tx.lock().take();

        let mut workers = self.workers.lock();
        let worker_count = workers.len();
        for (idx, worker) in workers.drain(..).enumerate() {
            if worker.join().is_ok() {
                debug!(worker_id = idx, "Worker joined successfully");
            } else {
                warn!(worker_id = idx, "Worker thread panicked outside a job");
            }
        }

        info!(worker_count = worker_count, "Worker pool shut down complete");
    }
}

impl Executor for WorkerPool {
    fn dispatch(&self, job: Job) -> Result<(), SchedulerError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(SchedulerError::PoolShutdown);
        }

        // Clone the sender so the lock is not held while the job is handed off
        // or, on rejection, dropped.
        let Some(job_tx) = self.job_tx.lock().clone() else {
            return Err(SchedulerError::PoolShutdown);
        };

        // Count before sending so a fast worker never decrements first.
        self.counters.queued_jobs.fetch_add(1, Ordering::Relaxed);
        match job_tx.try_send(job) {
            Ok(()) => {
                self.counters.dispatched_jobs.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
                warn!(
                    max_queue_depth = self.config.max_queue_depth,
                    "Worker pool queue is full"
                );
                Err(SchedulerError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
                Err(SchedulerError::PoolShutdown)
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Close the channel but don't join: queued jobs still run to completion
        // on the detached workers. Explicit shutdown() is required to join.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.job_tx.lock().take();
            debug!("WorkerPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

/// Spawn a worker thread.
fn spawn_worker(
    worker_id: usize,
    config: &WorkerPoolConfig,
    job_rx: Receiver<Job>,
    counters: Arc<PoolCounters>,
) -> Result<JoinHandle<()>, SchedulerError> {
    thread::Builder::new()
        .name(format!("{}-{worker_id}", config.thread_name_prefix))
        .stack_size(config.thread_stack_size)
        .spawn(move || {
            debug!(worker_id = worker_id, "Worker thread started");

            // Blocking recv; returns Err once the queue is empty and every
            // sender has been dropped.
            while let Ok(job) = job_rx.recv() {
                counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
                counters.active_jobs.fetch_add(1, Ordering::Relaxed);

                let outcome = panic::catch_unwind(AssertUnwindSafe(job));

                counters.active_jobs.fetch_sub(1, Ordering::Relaxed);
                match outcome {
                    Ok(()) => {
                        counters.completed_jobs.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(payload) => {
                        counters.panicked_jobs.fetch_add(1, Ordering::Relaxed);
                        error!(
                            worker_id = worker_id,
                            panic = %panic_message(payload.as_ref()),
                            "Job panicked on worker thread"
                        );
                    }
                }
            }

            debug!(worker_id = worker_id, "Worker channel closed, exiting");
        })
        .map_err(|e| SchedulerError::Internal(format!("failed to spawn worker thread: {e}")))
}
