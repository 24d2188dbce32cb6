//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: scheduler lifecycle events only.
pub const DEFAULT_FILTER: &str = "prometheus_future_scheduler=info";

/// Install an `fmt` subscriber unless one is already set.
///
/// The filter comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
/// `RUST_LOG=prometheus_future_scheduler=debug` traces every accept, reject,
/// and completion, each tagged with a `scheduler` field.
///
/// Thread names are printed, so events can be attributed to pool workers
/// (`fs-worker-N` by default, `fs-global-N` for the global pool), a
/// scheduler's `{name}-callbacks` thread, or `fs-tokio` blocking threads.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_repeatable() {
        init_tracing();
        init_tracing();
        tracing::info!("telemetry initialized twice without panicking");
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }
}
