//! Native futures handed back to engine code.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

type Continuation<T> = Box<dyn FnOnce(&T) + Send>;

/// A single-assignment future.
///
/// Clones share state. Awaiting yields a clone of the value, so any number
/// of clones can be awaited. Continuations registered with
/// [`Promise::when`] run exactly once on the thread that resolves it, or
/// immediately if it already is resolved.
pub struct Promise<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

struct Shared<T> {
    value: Option<Arc<T>>,
    wakers: Vec<Waker>,
    continuations: Vec<Continuation<T>>,
}

impl<T> Promise<T> {
    /// A promise that resolves later through [`Promise::resolve`].
    pub fn pending() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                value: None,
                wakers: Vec::new(),
                continuations: Vec::new(),
            })),
        }
    }

    /// An already completed promise.
    pub fn ready(value: T) -> Self {
        let promise = Self::pending();
        promise.resolve(value);
        promise
    }

    fn shared(&self) -> MutexGuard<'_, Shared<T>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.shared().value.is_some()
    }

    /// Complete the promise. Returns false, dropping `value`, if it already was.
    pub fn resolve(&self, value: T) -> bool {
        let (value, wakers, continuations) = {
            let mut shared = self.shared();
            if shared.value.is_some() {
                return false;
            }
            let value = Arc::new(value);
            shared.value = Some(Arc::clone(&value));
            (
                value,
                std::mem::take(&mut shared.wakers),
                std::mem::take(&mut shared.continuations),
            )
        };
        for continuation in continuations {
            continuation(&value);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Run `f` with the value once the promise resolves.
    pub fn when<F>(&self, f: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let value = {
            let mut shared = self.shared();
            match shared.value.clone() {
                Some(value) => value,
                None => {
                    shared.continuations.push(Box::new(f));
                    return;
                }
            }
        };
        f(&value);
    }

    /// Check whether two promises share the same state.
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Clone> Promise<T> {
    /// The value, if resolved.
    pub fn try_get(&self) -> Option<T> {
        self.shared().value.as_deref().cloned()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Future for Promise<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut shared = self.shared();
        match &shared.value {
            Some(value) => Poll::Ready(T::clone(value)),
            None => {
                if !shared.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    shared.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared();
        f.debug_struct("Promise")
            .field("ready", &shared.value.is_some())
            .field("continuations", &shared.continuations.len())
            .finish()
    }
}
