//! Drain-on-shutdown task scheduler.
//!
//! [`FutureScheduler`] admits work onto an [`Executor`], counts every accepted
//! task as an in-flight slot, and on [`shutdown`](FutureScheduler::shutdown)
//! refuses new work and blocks until every accepted task has finished.
//!
//! # Task lifecycle
//!
//! ```text
//! submit ──► try_acquire ──► rejected (stopping)              accepted = false
//!                 │
//!                 ▼
//!              wrap job ──► dispatch ──► failed: job dropped,  accepted = false
//!                                │       slot released
//!                                ▼
//!                             running ──► work Ok / Err / panic
//!                                              │
//!                                              ▼
//!                              slot released ──► future resolved ──► callback
//!                                                                 (callback thread)
//! ```
//!
//! Work that returns `Err` or panics is logged and replaced by `T::default()`;
//! nothing raised inside a task reaches the submitting thread.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::core::callback_thread::CallbackThread;
use crate::core::completion::{promise, Observer, TaskFuture};
use crate::core::slots::SlotTracker;
use crate::core::{AppResult, Executor, GlobalPool, Job, ResultCallback, ResultList, SchedulerError};
use crate::util::panic_message;

/// Identifier assigned to each accepted task, unique per scheduler.
pub type TaskId = u64;

/// Outcome of a submission.
#[derive(Debug)]
#[must_use = "a submission reports whether the task was accepted"]
pub struct Submission<T> {
    /// Whether the task was accepted and will run.
    pub accepted: bool,
    /// Identifier of the accepted task.
    pub task_id: Option<TaskId>,
    /// Future resolving with the task's result. `None` when rejected.
    pub future: Option<TaskFuture<T>>,
}

impl<T> Submission<T> {
    const fn rejected() -> Self {
        Self {
            accepted: false,
            task_id: None,
            future: None,
        }
    }

    const fn accepted(task_id: TaskId, future: TaskFuture<T>) -> Self {
        Self {
            accepted: true,
            task_id: Some(task_id),
            future: Some(future),
        }
    }

    /// Whether the task was accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Split into `(accepted, future)`.
    #[must_use]
    pub fn into_parts(self) -> (bool, Option<TaskFuture<T>>) {
        (self.accepted, self.future)
    }
}

/// Snapshot of scheduler activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Accepted tasks that have not finished.
    pub in_flight: usize,
    /// Tasks handed to the executor.
    pub accepted: u64,
    /// Submissions refused (stopping or dispatch failure).
    pub rejected: u64,
    /// Tasks whose work returned `Ok`.
    pub completed: u64,
    /// Tasks whose work returned `Err` or panicked.
    pub failed: u64,
    /// Whether shutdown has begun.
    pub stopping: bool,
}

/// Lock-free activity counters shared with running tasks.
#[derive(Debug, Default)]
struct SchedulerCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Scheduler that drains accepted work before shutting down.
///
/// # Example
///
/// ```rust
/// use prometheus_future_scheduler::config::WorkerPoolConfig;
/// use prometheus_future_scheduler::core::{FutureScheduler, WorkerPool};
///
/// let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(2)).unwrap();
/// let scheduler = FutureScheduler::with_executor("thumbnails", pool);
///
/// let submission = scheduler.submit(|| {
///     // render a thumbnail...
///     Ok(())
/// });
/// assert!(submission.accepted);
///
/// scheduler.shutdown();
/// assert!(!scheduler.submit(|| Ok(())).accepted);
/// ```
///
/// Dropping the scheduler performs the same drain. Neither `shutdown` nor
/// the drop may happen on a thread running one of this scheduler's tasks:
/// the task's own slot would never be released.
pub struct FutureScheduler<E: Executor = GlobalPool> {
    name: Arc<str>,
    slots: Arc<SlotTracker>,
    counters: Arc<SchedulerCounters>,
    next_task_id: AtomicU64,
    callbacks: OnceLock<CallbackThread>,
    executor: E,
}

impl FutureScheduler<GlobalPool> {
    /// Create a scheduler on the process-wide worker pool.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_executor(name, GlobalPool)
    }
}

impl<E: Executor> FutureScheduler<E> {
    /// Create a scheduler dispatching onto `executor`.
    pub fn with_executor(name: impl Into<String>, executor: E) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        debug!(scheduler = %name, "FutureScheduler created");
        Self {
            name,
            slots: Arc::new(SlotTracker::new()),
            counters: Arc::new(SchedulerCounters::default()),
            next_task_id: AtomicU64::new(0),
            callbacks: OnceLock::new(),
            executor,
        }
    }

    /// Scheduler name used in log events.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The executor tasks are dispatched to.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Whether shutdown has begun. Once `true`, every submission is rejected.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.slots.is_stopping()
    }

    /// Accepted tasks that have not finished yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.slots.in_flight()
    }

    /// Current activity snapshot.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            in_flight: self.slots.in_flight(),
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            stopping: self.slots.is_stopping(),
        }
    }

    /// Submit fire-and-forget work.
    ///
    /// Never blocks. Returns `accepted == false` if the scheduler is stopping
    /// or the executor refused the job; `work` is then never invoked.
    pub fn submit<F>(&self, work: F) -> Submission<()>
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.execute(work, None)
    }

    /// Submit work producing a value.
    ///
    /// The future resolves with `T::default()` if `work` fails or panics.
    pub fn submit_with_result<T, F>(&self, work: F) -> Submission<T>
    where
        T: Default + Clone + Send + 'static,
        F: FnOnce() -> AppResult<T> + Send + 'static,
    {
        self.execute(work, None)
    }

    /// Submit work whose result list is delivered to `callback`.
    ///
    /// The callback is invoked exactly once per accepted task, after the
    /// task's slot is released, with an empty list if `work` failed. It runs
    /// on this scheduler's callback thread, never on an executor worker, so it
    /// may submit to, shut down, or drop the scheduler. It is never invoked
    /// for a rejected submission.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidCallback`] if `callback` is not callable. No
    ///   capacity is reserved and `work` is dropped unrun.
    /// - [`SchedulerError::Internal`] if the callback thread cannot be started.
    pub fn submit_with_callback<F, C>(
        &self,
        work: F,
        callback: C,
    ) -> Result<Submission<ResultList>, SchedulerError>
    where
        F: FnOnce() -> AppResult<ResultList> + Send + 'static,
        C: ResultCallback,
    {
        if !callback.is_callable() {
            warn!(scheduler = %self.name, "Refusing submission with non-callable callback");
            return Err(SchedulerError::InvalidCallback);
        }

        let callbacks = self.callback_thread()?;
        let observer: Observer<ResultList> = Box::new(move |results: &ResultList| {
            let results = results.clone();
            callbacks.post(Box::new(move || callback.call(results)));
        });
        Ok(self.execute(work, Some(observer)))
    }

    /// The callback thread, started on first use.
    fn callback_thread(&self) -> Result<CallbackThread, SchedulerError> {
        if let Some(callbacks) = self.callbacks.get() {
            return Ok(callbacks.clone());
        }

        let spawned = CallbackThread::spawn(&self.name)?;
        // A racing submitter may win; the losing thread exits once `spawned` drops.
        let _ = self.callbacks.set(spawned);
        self.callbacks
            .get()
            .cloned()
            .ok_or_else(|| SchedulerError::Internal("callback thread unavailable".into()))
    }

    /// Reserve a slot, wrap `work`, and hand it to the executor.
    fn execute<T, F>(&self, work: F, observer: Option<Observer<T>>) -> Submission<T>
    where
        T: Default + Clone + Send + 'static,
        F: FnOnce() -> AppResult<T> + Send + 'static,
    {
        let Some(slot) = self.slots.try_acquire() else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(scheduler = %self.name, "Submission rejected: scheduler is stopping");
            return Submission::rejected();
        };

        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let (promise, future) = promise::<T>();
        if let Some(observer) = observer {
            future.on_complete(observer);
        }

        let name = Arc::clone(&self.name);
        let counters = Arc::clone(&self.counters);
        let job: Job = Box::new(move || {
            let value = run_work(&name, task_id, &counters, work);
            slot.release();
            promise.resolve(value);
        });

        // A refused job is dropped by the executor, which releases its slot
        // and abandons its promise without running any observer.
        match self.executor.dispatch(job) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                debug!(scheduler = %self.name, task_id = task_id, "Task accepted");
                Submission::accepted(task_id, future)
            }
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                error!(
                    scheduler = %self.name,
                    task_id = task_id,
                    error = %e,
                    "Failed to schedule task"
                );
                Submission::rejected()
            }
        }
    }

    /// Refuse new work and block until every accepted task has finished.
    ///
    /// Idempotent and safe to call concurrently; every caller returns once
    /// the scheduler has drained. There is no timeout, see
    /// [`shutdown_timeout`](Self::shutdown_timeout).
    pub fn shutdown(&self) {
        info!(
            scheduler = %self.name,
            in_flight = self.slots.in_flight(),
            "Scheduler shutdown started"
        );
        self.slots.close_and_drain();
        info!(scheduler = %self.name, "Scheduler drained");
    }

    /// Refuse new work and wait at most `timeout` for accepted tasks.
    ///
    /// Returns `true` if the scheduler drained in time. The scheduler stays
    /// stopped either way.
    pub fn shutdown_timeout(&self, timeout: Duration) -> bool {
        let drained = self.slots.close_and_drain_timeout(timeout);
        if drained {
            info!(scheduler = %self.name, "Scheduler drained");
        } else {
            warn!(
                scheduler = %self.name,
                in_flight = self.slots.in_flight(),
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "Scheduler shutdown timed out with tasks still running"
            );
        }
        drained
    }
}

impl<E: Executor> fmt::Debug for FutureScheduler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureScheduler")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<E: Executor> Drop for FutureScheduler<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run user work on the worker thread, turning errors and panics into
/// `T::default()`.
fn run_work<T, F>(name: &str, task_id: TaskId, counters: &SchedulerCounters, work: F) -> T
where
    T: Default,
    F: FnOnce() -> AppResult<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
            debug!(scheduler = name, task_id = task_id, "Task completed");
            value
        }
        Ok(Err(e)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                scheduler = name,
                task_id = task_id,
                error = %e,
                "Task failed; delivering default result"
            );
            T::default()
        }
        Err(payload) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                scheduler = name,
                task_id = task_id,
                panic = %panic_message(payload.as_ref()),
                "Task panicked; delivering default result"
            );
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::callback;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    /// Runs each job on its own thread; records nothing.
    struct ThreadPerJob;

    impl Executor for ThreadPerJob {
        fn dispatch(&self, job: Job) -> Result<(), SchedulerError> {
            thread::spawn(job);
            Ok(())
        }
    }

    /// Refuses every job.
    struct Refusing;

    impl Executor for Refusing {
        fn dispatch(&self, job: Job) -> Result<(), SchedulerError> {
            drop(job);
            Err(SchedulerError::QueueFull)
        }
    }

    /// Holds jobs until told to run them.
    #[derive(Default)]
    struct Parked {
        jobs: Mutex<Vec<Job>>,
    }

    impl Parked {
        fn run_all(&self) {
            let jobs: Vec<Job> = std::mem::take(&mut *self.jobs.lock());
            for job in jobs {
                job();
            }
        }
    }

    impl Executor for Parked {
        fn dispatch(&self, job: Job) -> Result<(), SchedulerError> {
            self.jobs.lock().push(job);
            Ok(())
        }
    }

    #[test]
    fn test_submit_runs_work() {
        let scheduler = FutureScheduler::with_executor("unit", ThreadPerJob);
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);

        let submission = scheduler.submit(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(submission.is_accepted());
        assert_eq!(submission.task_id, Some(0));
        submission.future.unwrap().wait().unwrap();

        scheduler.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().completed, 1);
    }

    #[test]
    fn test_slot_held_until_job_runs() {
        let parked = Arc::new(Parked::default());
        let scheduler = FutureScheduler::with_executor("parked", Arc::clone(&parked));

        let first = scheduler.submit(|| Ok(()));
        let second = scheduler.submit_with_result(|| Ok(5_u32));
        assert!(first.accepted && second.accepted);
        assert_eq!(scheduler.in_flight(), 2);

        parked.run_all();
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(second.future.unwrap().try_result(), Some(5));
    }

    #[test]
    fn test_dispatch_failure_releases_slot() {
        let scheduler = FutureScheduler::with_executor("refusing", Refusing);
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);

        let submission = scheduler.submit(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(!submission.accepted);
        assert!(submission.future.is_none());
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.stats().rejected, 1);
    }

    #[test]
    fn test_dispatch_failure_skips_callback() {
        let scheduler = FutureScheduler::with_executor("refusing", Refusing);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let submission = scheduler
            .submit_with_callback(
                || Ok(vec![json!(1)]),
                callback(move |_| {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert!(!submission.accepted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropped_job_releases_slot() {
        let parked = Arc::new(Parked::default());
        let scheduler = FutureScheduler::with_executor("parked", Arc::clone(&parked));

        let submission = scheduler.submit(|| Ok(()));
        let future = submission.future.unwrap();
        assert_eq!(scheduler.in_flight(), 1);

        // Executor discards the job without running it.
        parked.jobs.lock().clear();
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(future.wait(), Err(SchedulerError::Abandoned));
    }

    #[test]
    fn test_failed_work_yields_default() {
        let parked = Arc::new(Parked::default());
        let scheduler = FutureScheduler::with_executor("parked", Arc::clone(&parked));

        let failed = scheduler.submit_with_result::<u32, _>(|| Err(anyhow::anyhow!("nope")));
        let panicked = scheduler.submit_with_result::<String, _>(|| panic!("worse"));
        parked.run_all();

        assert_eq!(failed.future.unwrap().wait(), Ok(0));
        assert_eq!(panicked.future.unwrap().wait(), Ok(String::new()));
        let stats = scheduler.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.in_flight, 0);
    }

    #[test]
    fn test_callback_sees_result_after_release() {
        let parked = Arc::new(Parked::default());
        let scheduler = Arc::new(FutureScheduler::with_executor("parked", Arc::clone(&parked)));
        let (seen_tx, seen_rx) = crossbeam_channel::bounded(1);

        let scheduler_clone = Arc::clone(&scheduler);
        let submission = scheduler
            .submit_with_callback(
                || Ok(vec![json!("a"), json!(2)]),
                callback(move |results| {
                    // Callback may re-enter the scheduler without deadlocking.
                    seen_tx.send((results, scheduler_clone.in_flight())).unwrap();
                }),
            )
            .unwrap();
        assert!(submission.accepted);

        parked.run_all();
        assert_eq!(
            seen_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            (vec![json!("a"), json!(2)], 0)
        );
    }

    #[test]
    fn test_invalid_callback_has_no_side_effects() {
        let scheduler = FutureScheduler::with_executor("unit", ThreadPerJob);
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);

        let err = scheduler
            .submit_with_callback(
                move || {
                    ran_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                },
                crate::core::NullCallback,
            )
            .unwrap_err();

        assert_eq!(err, SchedulerError::InvalidCallback);
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(scheduler.stats(), SchedulerStats::default());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejects_after_shutdown() {
        let scheduler = FutureScheduler::with_executor("unit", ThreadPerJob);
        scheduler.shutdown();
        assert!(scheduler.is_stopping());

        let (accepted, future) = scheduler.submit(|| Ok(())).into_parts();
        assert!(!accepted);
        assert!(future.is_none());
        assert_eq!(scheduler.stats().rejected, 1);
    }

    #[test]
    fn test_shutdown_timeout_reports_stragglers() {
        let parked = Arc::new(Parked::default());
        let scheduler = FutureScheduler::with_executor("parked", Arc::clone(&parked));
        assert!(scheduler.submit(|| Ok(())).accepted);

        assert!(!scheduler.shutdown_timeout(Duration::from_millis(20)));
        assert!(scheduler.is_stopping());

        parked.run_all();
        assert!(scheduler.shutdown_timeout(Duration::from_millis(20)));
    }
}
