//! Integration test for the process-wide worker pool.
//!
//! Lives in its own test binary: the global pool size can be fixed only once
//! per process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use prometheus_future_scheduler::core::global_pool::DEFAULT_GLOBAL_WORKERS;
use prometheus_future_scheduler::core::{
    configure_global_pool, global_pool, global_worker_count, FutureScheduler,
};

#[test]
fn test_global_pool_configured_once() {
    // Querying the count before configuration must not fix it.
    assert_eq!(global_worker_count(), DEFAULT_GLOBAL_WORKERS);
    assert_eq!(global_worker_count(), DEFAULT_GLOBAL_WORKERS);
    assert!(configure_global_pool(3));
    assert!(!configure_global_pool(8));
    assert_eq!(global_worker_count(), 3);

    let scheduler = FutureScheduler::new("global");
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        assert!(scheduler
            .submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .accepted);
    }
    scheduler.shutdown();
    assert_eq!(counter.load(Ordering::SeqCst), 10);

    // A second scheduler shares the same pool.
    let other = FutureScheduler::new("global-2");
    let value = other.submit_with_result(|| Ok(7_i32)).future.unwrap().wait();
    assert_eq!(value, Ok(7));

    let pool = global_pool().unwrap();
    assert_eq!(pool.stats().worker_count, 3);
    assert!(!configure_global_pool(1));
}
