//! Execution contexts and per-thread context lookup.
//!
//! A context is entered on a thread with [`ScriptContext::enter`] and stays
//! current until the returned guard is dropped. Entering nests: the most
//! recently entered context is the one [`ScriptContext::current`] returns.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use tracing::warn;

use crate::convert::IntoDynamic;
use crate::error::RuntimeError;
use crate::runtime::{Dynamic, ObjectHandle};
use crate::vm::ScriptVm;

thread_local! {
    static ACTIVE_CONTEXTS: RefCell<Vec<ScriptContext>> = const { RefCell::new(Vec::new()) };
}

/// Execution state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No call has been made yet
    Uninitialized,
    /// Arguments are being written for a call
    Preparing,
    /// A call is running
    Executing,
    /// The last call returned normally
    Finished,
    /// The last call raised an exception
    Exception,
}

/// Positional argument stack for one pending call.
#[derive(Debug, Default)]
pub struct ArgWriter {
    args: Vec<Dynamic>,
}

impl ArgWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            args: Vec::with_capacity(capacity),
        }
    }

    /// Push the next positional argument.
    pub fn push<T: IntoDynamic>(&mut self, value: T) -> &mut Self {
        self.args.push(value.into_dynamic());
        self
    }

    /// Push an inline native value.
    pub fn push_native<T: std::any::Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.args.push(Dynamic::native(value));
        self
    }

    /// Push an object handle argument.
    pub fn push_object(&mut self, handle: ObjectHandle) -> &mut Self {
        self.args.push(Dynamic::Object(handle));
        self
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn into_args(self) -> Vec<Dynamic> {
        self.args
    }
}

struct ContextInner {
    vm: Arc<ScriptVm>,
    state: Cell<ContextState>,
    depth: Cell<usize>,
    writing: Cell<bool>,
    exception: RefCell<Option<String>>,
}

/// A script execution context.
///
/// Cheap to clone; clones refer to the same context. Contexts are bound to
/// the thread that created them.
#[derive(Clone)]
pub struct ScriptContext {
    inner: Rc<ContextInner>,
}

impl ScriptContext {
    pub(crate) fn new(vm: Arc<ScriptVm>) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                vm,
                state: Cell::new(ContextState::Uninitialized),
                depth: Cell::new(0),
                writing: Cell::new(false),
                exception: RefCell::new(None),
            }),
        }
    }

    /// The context currently active on this thread.
    pub fn current() -> Option<ScriptContext> {
        ACTIVE_CONTEXTS.with(|active| active.borrow().last().cloned())
    }

    /// Make this context current on this thread until the guard drops.
    pub fn enter(&self) -> ContextGuard {
        ACTIVE_CONTEXTS.with(|active| active.borrow_mut().push(self.clone()));
        ContextGuard {
            context: self.clone(),
            _not_send: PhantomData,
        }
    }

    pub fn vm(&self) -> &Arc<ScriptVm> {
        &self.inner.vm
    }

    pub fn state(&self) -> ContextState {
        self.inner.state.get()
    }

    /// Number of calls currently running on this context.
    pub fn depth(&self) -> usize {
        self.inner.depth.get()
    }

    /// Message of the last exception raised on this context.
    pub fn exception(&self) -> Option<String> {
        self.inner.exception.borrow().clone()
    }

    /// Record an exception on this context.
    pub fn set_exception(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(exception = %message, "script exception");
        *self.inner.exception.borrow_mut() = Some(message);
        self.inner.state.set(ContextState::Exception);
    }

    pub fn clear_exception(&self) {
        self.inner.exception.borrow_mut().take();
    }

    pub fn ptr_eq(&self, other: &ScriptContext) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Write arguments with `write`, call `function`, and return its result.
    ///
    /// Calls nest: a function may cause another call on the same context.
    /// Starting a call while this context's argument stack is still being
    /// written is a usage bug and panics.
    pub fn execute(
        &self,
        function: ObjectHandle,
        write: impl FnOnce(&mut ArgWriter),
    ) -> Result<Dynamic, RuntimeError> {
        assert!(
            !self.inner.writing.get(),
            "script context argument stack is already being written by another call"
        );
        let vm = &self.inner.vm;
        let limit = vm.properties().max_call_depth;
        if self.depth() >= limit {
            let err = RuntimeError::CallDepthExceeded { limit };
            self.set_exception(err.to_string());
            return Err(err);
        }

        self.inner.state.set(ContextState::Preparing);
        let mut writer = ArgWriter::with_capacity(vm.properties().initial_arg_capacity);
        {
            let _writing = WritingGuard::set(&self.inner.writing);
            write(&mut writer);
        }

        self.inner.depth.set(self.depth() + 1);
        self.inner.state.set(ContextState::Executing);
        let result = vm.call_function(function, writer.into_args());
        self.inner.depth.set(self.depth() - 1);

        match &result {
            Ok(_) if self.depth() == 0 => self.inner.state.set(ContextState::Finished),
            Ok(_) => self.inner.state.set(ContextState::Executing),
            Err(err) => self.set_exception(err.to_string()),
        }
        result
    }
}

/// Marks a context's argument stack as in use, even if the writer unwinds.
struct WritingGuard<'a>(&'a Cell<bool>);

impl<'a> WritingGuard<'a> {
    fn set(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for WritingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("state", &self.state())
            .field("depth", &self.depth())
            .field("exception", &self.exception())
            .finish()
    }
}

/// Keeps a context current on this thread; dropping it restores the previous one.
#[must_use = "the context stops being current when the guard is dropped"]
pub struct ContextGuard {
    context: ScriptContext,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        ACTIVE_CONTEXTS.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(position) = active.iter().rposition(|c| c.ptr_eq(&self.context)) {
                active.remove(position);
            }
        });
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NativeError;
    use crate::vm::VmProperties;

    #[test]
    fn no_context_by_default() {
        assert!(ScriptContext::current().is_none());
    }

    #[test]
    fn enter_nests_and_restores() {
        let vm = ScriptVm::new();
        let outer = vm.request_context();
        let inner = vm.request_context();

        let outer_guard = outer.enter();
        assert!(ScriptContext::current().unwrap().ptr_eq(&outer));
        {
            let _inner_guard = inner.enter();
            assert!(ScriptContext::current().unwrap().ptr_eq(&inner));
        }
        assert!(ScriptContext::current().unwrap().ptr_eq(&outer));
        drop(outer_guard);
        assert!(ScriptContext::current().is_none());
    }

    #[test]
    fn contexts_are_thread_local() {
        let vm = ScriptVm::new();
        let ctx = vm.request_context();
        let _guard = ctx.enter();
        let seen = std::thread::spawn(|| ScriptContext::current().is_some())
            .join()
            .unwrap();
        assert!(!seen);
    }

    #[test]
    fn execute_writes_arguments_in_order() {
        let vm = ScriptVm::new();
        let concat = vm.create_function("concat", |ctx| {
            let a: String = ctx.arg(0)?;
            let b: i32 = ctx.arg(1)?;
            ctx.set_return(format!("{a}{b}"));
            Ok(())
        });
        let ctx = vm.request_context();
        let result = ctx
            .execute(concat.handle(), |args| {
                args.push("key").push(65i32);
            })
            .unwrap();
        assert_eq!(result, Dynamic::String("key65".into()));
        assert_eq!(ctx.state(), ContextState::Finished);
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn exception_is_recorded() {
        let vm = ScriptVm::new();
        let fail = vm.create_function("fail", |_| Err(NativeError::exception("bad input")));
        let ctx = vm.request_context();
        assert!(ctx.execute(fail.handle(), |_| {}).is_err());
        assert_eq!(ctx.state(), ContextState::Exception);
        assert!(ctx.exception().unwrap().contains("bad input"));
        ctx.clear_exception();
        assert!(ctx.exception().is_none());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let vm = ScriptVm::with_properties(VmProperties {
            max_call_depth: 0,
            ..VmProperties::default()
        });
        let noop = vm.create_function("noop", |_| Ok(()));
        let ctx = vm.request_context();
        assert!(matches!(
            ctx.execute(noop.handle(), |_| {}),
            Err(RuntimeError::CallDepthExceeded { limit: 0 })
        ));
    }

    #[test]
    fn panicking_writer_frees_the_argument_stack() {
        let vm = ScriptVm::new();
        let echo = vm.create_function("echo", |ctx| {
            let n: i32 = ctx.arg(0)?;
            ctx.set_return(n);
            Ok(())
        });
        let ctx = vm.request_context();
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ctx.execute(echo.handle(), |_| panic!("writer failed"))
        }));
        assert!(unwound.is_err());

        let result = ctx.execute(echo.handle(), |args| {
            args.push(7i32);
        });
        assert_eq!(result.unwrap(), Dynamic::Int(7));
    }

    #[test]
    #[should_panic(expected = "already being written")]
    fn reentrant_argument_writing_panics() {
        let vm = ScriptVm::new();
        let noop = vm.create_function("noop", |_| Ok(()));
        let ctx = vm.request_context();
        let handle = noop.handle();
        let nested = ctx.clone();
        let _ = ctx.execute(handle, move |_| {
            let _ = nested.execute(handle, |_| {});
        });
    }
}
