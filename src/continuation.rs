//! Continuations between native futures and script code.
//!
//! Two directions are covered:
//!
//! - script to native: [`AsyncContinuation::from_script`] turns a pending
//!   [`ScriptPromise`] into a native [`Promise`]
//! - native to script: [`AsyncContinuation::attach`] fires a
//!   [`FunctionDelegate`] when a native [`Promise`] resolves
//!
//! Either way the continuation fires at most once, fires immediately when
//! attached to something already resolved, and never fires for something
//! that never resolves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hostbridge_core::{ArgWriter, ScriptContext, ScriptPromise};
use tracing::{debug, trace};

use crate::delegate::FunctionDelegate;
use crate::promise::Promise;

/// How a native-to-script continuation reaches the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Call the delegate on the resolving thread.
    #[default]
    Immediate,
    /// Queue the call on the delegate's VM; it runs when the VM's event
    /// queue is next dispatched.
    Queued,
}

/// Handle to an attached continuation.
#[derive(Debug, Clone)]
pub struct AsyncContinuation {
    fired: Arc<AtomicBool>,
}

impl AsyncContinuation {
    /// A native promise resolving when `promise` does. The script payload is
    /// discarded.
    pub fn from_script(promise: &ScriptPromise) -> Promise<()> {
        if !promise.is_pending() {
            return Promise::ready(());
        }
        let native = Promise::pending();
        let resolver = native.clone();
        promise.when(move |_| {
            resolver.resolve(());
        });
        native
    }

    /// Fire `delegate` with arguments written by `marshal` once `future`
    /// resolves.
    pub fn attach<T, M>(future: &Promise<T>, delegate: FunctionDelegate, marshal: M) -> Self
    where
        T: Send + Sync + 'static,
        M: FnOnce(&T, &mut ArgWriter) + Send + 'static,
    {
        let continuation = Self {
            fired: Arc::new(AtomicBool::new(false)),
        };
        let fired = Arc::clone(&continuation.fired);
        future.when(move |value| {
            if fired.swap(true, Ordering::AcqRel) {
                return;
            }
            fire(&delegate, |writer| marshal(value, writer));
        });
        continuation
    }

    /// Like [`AsyncContinuation::attach`], choosing how the call is delivered.
    ///
    /// Queued delivery clones the value into the VM's event queue.
    pub fn attach_with<T, M>(
        future: &Promise<T>,
        delegate: FunctionDelegate,
        delivery: Delivery,
        marshal: M,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
        M: FnOnce(&T, &mut ArgWriter) + Send + 'static,
    {
        match delivery {
            Delivery::Immediate => Self::attach(future, delegate, marshal),
            Delivery::Queued => {
                let continuation = Self {
                    fired: Arc::new(AtomicBool::new(false)),
                };
                let fired = Arc::clone(&continuation.fired);
                future.when(move |value| {
                    let Some(vm) = delegate.callable().and_then(|c| c.vm()) else {
                        debug!("continuation target is gone; dropping queued call");
                        return;
                    };
                    let value = value.clone();
                    vm.enqueue_event(move || {
                        if fired.swap(true, Ordering::AcqRel) {
                            return;
                        }
                        fire(&delegate, |writer| marshal(&value, writer));
                    });
                });
                continuation
            }
        }
    }

    /// Whether the continuation has run.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Invoke `delegate`, borrowing a temporary context from its VM when the
/// thread has none.
fn fire(delegate: &FunctionDelegate, write: impl FnOnce(&mut ArgWriter)) {
    if !delegate.is_valid() {
        trace!("continuation target is invalid; skipping");
        return;
    }
    if ScriptContext::current().is_some() {
        delegate.invoke_void(write);
        return;
    }
    let Some(vm) = delegate.callable().and_then(|c| c.vm()) else {
        return;
    };
    let context = vm.request_context();
    let _guard = context.enter();
    delegate.invoke_void(write);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::ScriptCallable;
    use futures::executor::block_on;
    use hostbridge_core::ScriptVm;
    use std::sync::Mutex;

    fn recording_delegate(vm: &Arc<ScriptVm>) -> (FunctionDelegate, Arc<Mutex<Vec<i64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let function = vm.create_function("on_done", move |ctx| {
            sink.lock().unwrap().push(ctx.arg::<i64>(0)?);
            Ok(())
        });
        (FunctionDelegate::from(ScriptCallable::new(function).unwrap()), seen)
    }

    #[test]
    fn from_resolved_script_promise_is_ready() {
        let promise = ScriptPromise::resolved(hostbridge_core::Dynamic::Void);
        assert!(AsyncContinuation::from_script(&promise).is_ready());
    }

    #[test]
    fn from_pending_script_promise_waits() {
        let promise = ScriptPromise::new();
        let native = AsyncContinuation::from_script(&promise);
        assert!(!native.is_ready());
        promise.resolve(hostbridge_core::Dynamic::Int(3));
        assert!(native.is_ready());
        block_on(native);
    }

    #[test]
    fn attach_fires_once_without_a_context() {
        let vm = ScriptVm::new();
        let (delegate, seen) = recording_delegate(&vm);
        let future = Promise::pending();
        let continuation =
            AsyncContinuation::attach(&future, delegate, |value: &i64, w| {
                w.push(*value);
            });
        assert!(!continuation.has_fired());

        future.resolve(9);
        future.resolve(10);
        assert!(continuation.has_fired());
        assert_eq!(*seen.lock().unwrap(), vec![9]);
    }

    #[test]
    fn attach_to_ready_fires_immediately() {
        let vm = ScriptVm::new();
        let (delegate, seen) = recording_delegate(&vm);
        let continuation = AsyncContinuation::attach(&Promise::ready(4i64), delegate, |v, w| {
            w.push(*v);
        });
        assert!(continuation.has_fired());
        assert_eq!(*seen.lock().unwrap(), vec![4]);
    }

    #[test]
    fn never_resolved_never_fires() {
        let vm = ScriptVm::new();
        let (delegate, seen) = recording_delegate(&vm);
        let future = Promise::<i64>::pending();
        let continuation = AsyncContinuation::attach(&future, delegate, |v, w| {
            w.push(*v);
        });
        drop(future);
        assert!(!continuation.has_fired());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn queued_delivery_waits_for_dispatch() {
        let vm = ScriptVm::new();
        let (delegate, seen) = recording_delegate(&vm);
        let future = Promise::pending();
        let continuation =
            AsyncContinuation::attach_with(&future, delegate, Delivery::Queued, |v: &i64, w| {
                w.push(*v);
            });

        future.resolve(1);
        assert!(!continuation.has_fired());
        assert_eq!(vm.pending_events(), 1);

        let context = vm.request_context();
        let _guard = context.enter();
        vm.dispatch_events();
        assert!(continuation.has_fired());
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }
}
