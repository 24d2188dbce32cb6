//! Dedicated thread that runs result callbacks off the executor's workers.
//!
//! A callback may call back into its scheduler, including `shutdown`, which
//! blocks until queued tasks finish. Running it on a pool worker would park
//! that worker while the tasks it is waiting for sit in the queue behind it.
//! Callbacks are therefore posted to a per-scheduler thread over an unbounded
//! `crossbeam-channel` and run there in completion order.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, error};

use crate::core::{Job, SchedulerError};
use crate::util::panic_message;

/// Sending half of a callback thread.
///
/// The thread exits once every clone of the sender is gone and the queue is
/// empty. Dropping the last handle does not join it.
#[derive(Debug, Clone)]
pub struct CallbackThread {
    tx: Sender<Job>,
}

impl CallbackThread {
    /// Spawn a thread named `{scheduler}-callbacks`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Internal`] if the thread cannot be spawned.
    pub fn spawn(scheduler: &str) -> Result<Self, SchedulerError> {
        let (tx, rx) = unbounded::<Job>();
        let name = format!("{scheduler}-callbacks");

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                debug!(thread = %name, "Callback thread started");
                while let Ok(job) = rx.recv() {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                        error!(
                            thread = %name,
                            panic = %panic_message(payload.as_ref()),
                            "Result callback panicked"
                        );
                    }
                }
                debug!(thread = %name, "Callback thread exiting");
            })
            .map_err(|e| SchedulerError::Internal(format!("failed to spawn callback thread: {e}")))?;

        Ok(Self { tx })
    }

    /// Queue a callback invocation. Never blocks.
    pub fn post(&self, job: Job) {
        // The receiver lives as long as any sender, so this only fails if the
        // thread itself died, in which case the job is dropped unrun.
        if self.tx.send(job).is_err() {
            error!("Callback thread is gone; dropping callback");
        }
    }
}
