//! Script-side futures.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::runtime::Dynamic;

type Continuation = Box<dyn FnOnce(&Dynamic) + Send>;

/// A future living on the script heap.
///
/// Scripts return one from long-running callbacks (startup, shutdown,
/// loaders). It resolves at most once; continuations registered with
/// [`ScriptPromise::when`] run exactly once, immediately if the promise is
/// already resolved.
#[derive(Clone, Default)]
pub struct ScriptPromise {
    shared: Arc<Mutex<PromiseState>>,
}

#[derive(Default)]
struct PromiseState {
    value: Option<Arc<Dynamic>>,
    continuations: Vec<Continuation>,
}

impl ScriptPromise {
    /// A pending promise.
    pub fn new() -> Self {
        Self::default()
    }

    /// A promise that is already resolved with `value`.
    pub fn resolved(value: Dynamic) -> Self {
        let promise = Self::new();
        promise.resolve(value);
        promise
    }

    fn state(&self) -> MutexGuard<'_, PromiseState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_pending(&self) -> bool {
        self.state().value.is_none()
    }

    /// Resolve the promise and run its continuations.
    ///
    /// Returns false if it was already resolved; the value is then dropped.
    pub fn resolve(&self, value: Dynamic) -> bool {
        let (value, continuations) = {
            let mut state = self.state();
            if state.value.is_some() {
                return false;
            }
            let value = Arc::new(value);
            state.value = Some(Arc::clone(&value));
            (value, std::mem::take(&mut state.continuations))
        };
        for continuation in continuations {
            continuation(&value);
        }
        true
    }

    /// Run `f` once the promise resolves.
    pub fn when<F>(&self, f: F)
    where
        F: FnOnce(&Dynamic) + Send + 'static,
    {
        let value = {
            let mut state = self.state();
            match state.value.clone() {
                Some(value) => value,
                None => {
                    state.continuations.push(Box::new(f));
                    return;
                }
            }
        };
        f(&value);
    }

    /// Inspect the resolved value, if any.
    pub fn with_value<R>(&self, f: impl FnOnce(&Dynamic) -> R) -> Option<R> {
        let value = self.state().value.clone()?;
        Some(f(&value))
    }

    /// Check whether two promises share the same state.
    pub fn ptr_eq(&self, other: &ScriptPromise) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for ScriptPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ScriptPromise")
            .field("pending", &state.value.is_none())
            .field("continuations", &state.continuations.len())
            .finish()
    }
}
