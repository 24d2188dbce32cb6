//! One-shot completion sink: a [`Promise`] written by the worker and a
//! [`TaskFuture`] read by the submitter.
//!
//! # Design
//!
//! - **No polling**: blocking readers sleep on a `parking_lot::Condvar`;
//!   async readers register a `Waker`
//! - **Observers**: `on_complete` continuations run once, on the resolving
//!   thread, after the internal lock is released
//! - **Abandonment**: dropping an unresolved promise wakes readers with
//!   [`SchedulerError::Abandoned`] and discards observers without calling them

use std::future::Future;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::core::SchedulerError;
use crate::util::panic_message;

/// Continuation run once the value is available.
pub type Observer<T> = Box<dyn FnOnce(&T) + Send + 'static>;

/// Resolution state of a task.
enum Outcome<T> {
    /// Still running.
    Pending,
    /// Value is available.
    Ready(T),
    /// Promise dropped before resolving.
    Abandoned,
}

struct Inner<T> {
    outcome: Outcome<T>,
    observers: Vec<Observer<T>>,
    wakers: Vec<Waker>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

/// Create a connected promise/future pair.
#[must_use]
pub fn promise<T>() -> (Promise<T>, TaskFuture<T>) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            outcome: Outcome::Pending,
            observers: Vec::new(),
            wakers: Vec::new(),
        }),
        ready: Condvar::new(),
    });
    (
        Promise {
            shared: Some(Arc::clone(&shared)),
        },
        TaskFuture { shared },
    )
}

/// Write half. Resolved at most once; dropping it unresolved abandons the task.
pub struct Promise<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T: Clone> Promise<T> {
    /// Publish the value, wake every reader, then run observers.
    pub fn resolve(mut self, value: T) {
        let Some(shared) = self.shared.take() else {
            return;
        };

        let (observers, wakers) = {
            let mut inner = shared.inner.lock();
            inner.outcome = Outcome::Ready(value.clone());
            (mem::take(&mut inner.observers), mem::take(&mut inner.wakers))
        };

        shared.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
        for observer in observers {
            run_observer(observer, &value);
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };

        let (observers, wakers) = {
            let mut inner = shared.inner.lock();
            inner.outcome = Outcome::Abandoned;
            (mem::take(&mut inner.observers), mem::take(&mut inner.wakers))
        };
        // Observers of an abandoned task are dropped, never called.
        drop(observers);

        shared.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
    }
}

/// Run one observer, containing any panic it raises.
fn run_observer<T>(observer: Observer<T>, value: &T) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| observer(value))) {
        error!(
            panic = %panic_message(payload.as_ref()),
            "Completion observer panicked"
        );
    }
}

/// Read half of a task's result.
///
/// Cheap to clone; every clone observes the same outcome. Implements
/// [`std::future::Future`] so results can be awaited from async code.
pub struct TaskFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFuture")
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<T> TaskFuture<T> {
    /// Whether the task resolved or was abandoned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self.shared.inner.lock().outcome, Outcome::Pending)
    }
}

impl<T: Clone> TaskFuture<T> {
    /// Non-blocking read. `None` while pending or if abandoned.
    #[must_use]
    pub fn try_result(&self) -> Option<T> {
        match &self.shared.inner.lock().outcome {
            Outcome::Ready(value) => Some(value.clone()),
            Outcome::Pending | Outcome::Abandoned => None,
        }
    }

    /// Block until the task resolves.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Abandoned`] if the task was dropped without running.
    pub fn wait(&self) -> Result<T, SchedulerError> {
        let mut inner = self.shared.inner.lock();
        while matches!(inner.outcome, Outcome::Pending) {
            self.shared.ready.wait(&mut inner);
        }
        Self::read(&inner.outcome)
    }

    /// Block until the task resolves or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::Timeout`] if still pending at the deadline
    /// - [`SchedulerError::Abandoned`] if the task was dropped without running
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, SchedulerError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        while matches!(inner.outcome, Outcome::Pending) {
            if self.shared.ready.wait_until(&mut inner, deadline).timed_out()
                && matches!(inner.outcome, Outcome::Pending)
            {
                return Err(SchedulerError::Timeout);
            }
        }
        Self::read(&inner.outcome)
    }

    /// Convert a settled outcome into the reader-facing result.
    fn read(outcome: &Outcome<T>) -> Result<T, SchedulerError> {
        match outcome {
            Outcome::Ready(value) => Ok(value.clone()),
            Outcome::Pending | Outcome::Abandoned => Err(SchedulerError::Abandoned),
        }
    }

    /// Register a continuation that runs once with the resolved value.
    ///
    /// Runs on the resolving thread, or immediately on the caller's thread if
    /// the value is already available. Never runs for an abandoned task.
    pub fn on_complete<F>(&self, observer: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let mut inner = self.shared.inner.lock();
        if matches!(inner.outcome, Outcome::Pending) {
            inner.observers.push(Box::new(observer));
            return;
        }
        let Outcome::Ready(value) = &inner.outcome else {
            return;
        };
        let ready = value.clone();
        drop(inner);
        run_observer(Box::new(observer), &ready);
    }
}

impl<T: Clone> Future for TaskFuture<T> {
    type Output = Result<T, SchedulerError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.shared.inner.lock();
        if matches!(inner.outcome, Outcome::Pending) {
            if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                inner.wakers.push(cx.waker().clone());
            }
            return Poll::Pending;
        }
        Poll::Ready(Self::read(&inner.outcome))
    }
}
