//! Slot accounting for accepted tasks.
//!
//! [`SlotTracker`] is a wait-group: a counter of in-flight tasks plus a
//! monotonic `stopping` flag, both guarded by one `parking_lot::Mutex`, and a
//! `Condvar` that lets a shutdown caller sleep until the counter reaches zero.
//!
//! Acquisition and the stopping flag share the same lock, so a slot is either
//! handed out before `close` flips the flag (and is then waited for) or
//! refused. Slots are RAII guards: dropping a [`Slot`] releases it, which
//! covers normal completion, errors, panics, and jobs that were dropped by an
//! executor without ever running.
//!
//! Every [`Slot`] holds an `Arc` to its tracker, so the mutex and condvar
//! outlive any task that can still release into them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::error;

/// State guarded by the tracker lock.
#[derive(Debug, Default)]
struct SlotState {
    /// Accepted tasks that have not released their slot yet.
    in_flight: usize,
    /// Set once when shutdown begins; never reset.
    stopping: bool,
}

/// Counter of in-flight tasks with a blocking drain.
#[derive(Debug, Default)]
pub struct SlotTracker {
    state: Mutex<SlotState>,
    drained: Condvar,
}

impl SlotTracker {
    /// Create a tracker with no slots held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot unless the tracker is stopping.
    ///
    /// Returns `None` without touching the counter once [`close`](Self::close)
    /// has run.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<Slot> {
        let mut state = self.state.lock();
        if state.stopping {
            return None;
        }
        state.in_flight += 1;
        drop(state);

        Some(Slot {
            tracker: Some(Arc::clone(self)),
        })
    }

    /// Give back one slot and wake every drain waiter.
    fn release(&self) {
        {
            let mut state = self.state.lock();
            debug_assert!(state.in_flight > 0, "slot released more often than acquired");
            match state.in_flight.checked_sub(1) {
                Some(remaining) => state.in_flight = remaining,
                None => error!("slot released with no slots in flight; count left at zero"),
            }
        }
        // Notify outside the lock; waiters re-check the count under it.
        self.drained.notify_all();
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.state.lock().stopping
    }

    /// Number of slots currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Refuse every future acquisition.
    ///
    /// Returns `true` if this call flipped the flag, `false` if the tracker was
    /// already stopping.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        let first = !state.stopping;
        state.stopping = true;
        first
    }

    /// Close the tracker and block until every held slot is released.
    ///
    /// Idempotent; concurrent callers all return once the count is zero.
    pub fn close_and_drain(&self) {
        let mut state = self.state.lock();
        state.stopping = true;
        while state.in_flight > 0 {
            self.drained.wait(&mut state);
        }
    }

    /// Like [`close_and_drain`](Self::close_and_drain) but gives up after
    /// `timeout`.
    ///
    /// Returns `true` if the tracker drained. The tracker stays closed either
    /// way.
    pub fn close_and_drain_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        state.stopping = true;
        while state.in_flight > 0 {
            if self.drained.wait_until(&mut state, deadline).timed_out() {
                return state.in_flight == 0;
            }
        }
        true
    }
}

/// One reserved unit of in-flight accounting.
///
/// Released exactly once: explicitly through [`Slot::release`] or implicitly
/// on drop.
#[derive(Debug)]
#[must_use = "dropping a slot releases it immediately"]
pub struct Slot {
    tracker: Option<Arc<SlotTracker>>,
}

impl Slot {
    /// Release the slot now.
    pub fn release(mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.release();
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_acquire_and_release_counts() {
        let tracker = Arc::new(SlotTracker::new());
        let a = tracker.try_acquire().unwrap();
        let b = tracker.try_acquire().unwrap();
        assert_eq!(tracker.in_flight(), 2);

        a.release();
        assert_eq!(tracker.in_flight(), 1);

        drop(b);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_closed_tracker_rejects() {
        let tracker = Arc::new(SlotTracker::new());
        assert!(tracker.close());
        assert!(!tracker.close());
        assert!(tracker.is_stopping());
        assert!(tracker.try_acquire().is_none());
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_drain_returns_immediately_when_idle() {
        let tracker = Arc::new(SlotTracker::new());
        tracker.close_and_drain();
        tracker.close_and_drain();
        assert!(tracker.is_stopping());
    }

    #[test]
    fn test_drain_waits_for_held_slot() {
        let tracker = Arc::new(SlotTracker::new());
        let slot = tracker.try_acquire().unwrap();
        let released = Arc::new(AtomicBool::new(false));

        let released_clone = Arc::clone(&released);
        let holder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            released_clone.store(true, Ordering::SeqCst);
            drop(slot);
        });

        tracker.close_and_drain();
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(tracker.in_flight(), 0);
        holder.join().unwrap();
    }

    #[test]
    fn test_drain_timeout_elapses() {
        let tracker = Arc::new(SlotTracker::new());
        let slot = tracker.try_acquire().unwrap();

        assert!(!tracker.close_and_drain_timeout(Duration::from_millis(20)));
        assert!(tracker.is_stopping());
        assert_eq!(tracker.in_flight(), 1);

        drop(slot);
        assert!(tracker.close_and_drain_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_slot_keeps_tracker_alive() {
        let tracker = Arc::new(SlotTracker::new());
        let slot = tracker.try_acquire().unwrap();
        let weak = Arc::downgrade(&tracker);
        drop(tracker);

        assert!(weak.upgrade().is_some());
        drop(slot);
        assert!(weak.upgrade().is_none());
    }
}
