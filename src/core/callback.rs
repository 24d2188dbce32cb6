//! Result callbacks invoked when a task's future resolves.

use std::fmt;
use std::sync::Arc;

/// List of values produced by a result-returning task.
///
/// Values are JSON so results can cross into scripting or IPC layers without a
/// bespoke value type.
pub type ResultList = Vec<serde_json::Value>;

/// External callable that receives a task's result list.
///
/// `is_callable` mirrors the contract of host-language callbacks, where a
/// value handed over as a callback may turn out not to be a function. The
/// scheduler refuses non-callable callbacks before reserving any capacity.
pub trait ResultCallback: Send + Sync + 'static {
    /// Whether this callback can be invoked.
    fn is_callable(&self) -> bool {
        true
    }

    /// Invoke the callback with the task result.
    fn call(&self, results: ResultList);
}

/// Adapter turning a closure into a [`ResultCallback`].
#[derive(Clone)]
pub struct FnCallback<F> {
    func: F,
}

impl<F> FnCallback<F>
where
    F: Fn(ResultList) + Send + Sync + 'static,
{
    /// Wrap a closure.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnCallback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCallback").finish_non_exhaustive()
    }
}

impl<F> ResultCallback for FnCallback<F>
where
    F: Fn(ResultList) + Send + Sync + 'static,
{
    fn call(&self, results: ResultList) {
        (self.func)(results);
    }
}

/// Shorthand for [`FnCallback::new`].
pub const fn callback<F>(func: F) -> FnCallback<F>
where
    F: Fn(ResultList) + Send + Sync + 'static,
{
    FnCallback::new(func)
}

/// A callback slot that holds nothing; never callable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCallback;

impl ResultCallback for NullCallback {
    fn is_callable(&self) -> bool {
        false
    }

    fn call(&self, _results: ResultList) {}
}

impl<C: ResultCallback> ResultCallback for Option<C> {
    fn is_callable(&self) -> bool {
        self.as_ref().is_some_and(ResultCallback::is_callable)
    }

    fn call(&self, results: ResultList) {
        if let Some(cb) = self {
            cb.call(results);
        }
    }
}

impl<C: ResultCallback + ?Sized> ResultCallback for Arc<C> {
    fn is_callable(&self) -> bool {
        (**self).is_callable()
    }

    fn call(&self, results: ResultList) {
        (**self).call(results);
    }
}

impl ResultCallback for Box<dyn ResultCallback> {
    fn is_callable(&self) -> bool {
        (**self).is_callable()
    }

    fn call(&self, results: ResultList) {
        (**self).call(results);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_fn_callback_invokes_closure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let cb = callback(move |results| seen_clone.lock().push(results));

        assert!(cb.is_callable());
        cb.call(vec![json!(1), json!("two")]);
        assert_eq!(*seen.lock(), vec![vec![json!(1), json!("two")]]);
    }

    #[test]
    fn test_null_and_none_are_not_callable() {
        assert!(!NullCallback.is_callable());
        let none: Option<FnCallback<fn(ResultList)>> = None;
        assert!(!none.is_callable());
        assert!(Some(callback(|_| {})).is_callable());
        assert!(!Some(NullCallback).is_callable());
    }

    #[test]
    fn test_shared_callbacks_forward() {
        let boxed: Box<dyn ResultCallback> = Box::new(NullCallback);
        assert!(!boxed.is_callable());

        let shared: Arc<dyn ResultCallback> = Arc::new(callback(|_| {}));
        assert!(shared.is_callable());
    }
}
