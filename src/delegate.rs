//! Script callables and the delegates native code invokes them through.

use std::fmt;
use std::sync::Arc;

use hostbridge_core::{
    ArgWriter, FUNCTION_TYPE, FromDynamic, GcParticipant, GcVisitor, ObjectHandle, ObjectRef,
    RuntimeError, ScriptContext, ScriptVm, TypeHash,
};
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::marshal::{IntoArgs, ReturnReader};

/// A strong reference to a script function.
///
/// Equality is identity of the function object.
#[derive(Clone, PartialEq, Eq)]
pub struct ScriptCallable {
    function: ObjectRef,
}

impl ScriptCallable {
    /// Wrap a reference to a function object.
    pub fn new(function: ObjectRef) -> BridgeResult<Self> {
        let type_hash = function.type_hash();
        if type_hash != TypeHash::from_name(FUNCTION_TYPE) {
            return Err(BridgeError::NotCallable { type_hash });
        }
        Ok(Self { function })
    }

    /// Take a new reference to the function behind `handle`.
    pub fn from_handle(vm: &Arc<ScriptVm>, handle: ObjectHandle) -> BridgeResult<Self> {
        let function = ObjectRef::acquire(vm, handle).ok_or(RuntimeError::StaleHandle {
            index: handle.index,
        })?;
        Self::new(function)
    }

    pub fn handle(&self) -> ObjectHandle {
        self.function.handle()
    }

    pub fn vm(&self) -> Option<Arc<ScriptVm>> {
        self.function.vm()
    }

    /// Check whether the function object still exists.
    pub fn is_alive(&self) -> bool {
        self.function.is_alive()
    }

    pub fn as_object(&self) -> &ObjectRef {
        &self.function
    }
}

impl fmt::Debug for ScriptCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScriptCallable")
            .field(&self.function.handle())
            .finish()
    }
}

/// A callback native code can fire without knowing anything about scripts.
///
/// An empty or dead delegate is invalid, and firing it does nothing. Once a
/// delegate becomes invalid it never becomes valid again.
///
/// Firing a valid delegate requires a current [`ScriptContext`] on the
/// calling thread; firing one without it is a programming error and panics.
/// Script exceptions never escape: the call yields `None` or `false` and the
/// exception is left on the context.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FunctionDelegate {
    callable: Option<ScriptCallable>,
}

impl FunctionDelegate {
    pub fn new(callable: Option<ScriptCallable>) -> Self {
        Self { callable }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// True iff a function is set and still alive.
    pub fn is_valid(&self) -> bool {
        self.callable.as_ref().is_some_and(ScriptCallable::is_alive)
    }

    pub fn callable(&self) -> Option<&ScriptCallable> {
        self.callable.as_ref()
    }

    /// Drop the function reference. The delegate is invalid afterwards.
    pub fn release(&mut self) {
        self.callable = None;
    }

    /// Call the function with arguments written by `write` and read its
    /// result with `read`.
    ///
    /// Returns `None` without touching `write` or `read` if the delegate is
    /// invalid; also `None` if the script raised an exception or `read`
    /// rejected the result.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn invoke<R>(
        &self,
        write: impl FnOnce(&mut ArgWriter),
        read: impl FnOnce(&ReturnReader) -> Option<R>,
    ) -> Option<R> {
        let callable = self.callable.as_ref()?;
        let vm = callable.vm()?;
        if !vm.is_alive(callable.handle()) {
            return None;
        }

        let Some(context) = ScriptContext::current() else {
            panic!(
                "script callback {:?} fired with no script context on this thread",
                callable.handle()
            );
        };

        let result = if Arc::ptr_eq(context.vm(), &vm) {
            context.execute(callable.handle(), write)
        } else {
            debug!("current context belongs to another VM; using a temporary context");
            let temporary = vm.request_context();
            let _guard = temporary.enter();
            temporary.execute(callable.handle(), write)
        };

        match result {
            Ok(value) => read(&ReturnReader::new(&vm, value)),
            Err(err) => {
                warn!(error = %err, "script callback raised an exception");
                None
            }
        }
    }

    /// Call the function for its side effects.
    ///
    /// Returns true if the function ran to completion.
    pub fn invoke_void(&self, write: impl FnOnce(&mut ArgWriter)) -> bool {
        self.invoke(write, |_| Some(())).is_some()
    }

    /// Call with a fixed argument list, ignoring the result.
    pub fn call<A: IntoArgs>(&self, args: A) -> bool {
        self.invoke_void(|writer| args.write_args(writer))
    }

    /// Call a predicate. Anything but a boolean `true` result is false.
    pub fn call_bool<A: IntoArgs>(&self, args: A) -> bool {
        self.call_returning::<A, bool>(args).unwrap_or(false)
    }

    /// Call with a fixed argument list and convert the result.
    pub fn call_returning<A: IntoArgs, R: FromDynamic>(&self, args: A) -> Option<R> {
        self.invoke(|writer| args.write_args(writer), ReturnReader::get::<R>)
    }
}

impl From<ScriptCallable> for FunctionDelegate {
    fn from(callable: ScriptCallable) -> Self {
        Self::new(Some(callable))
    }
}

impl GcParticipant for FunctionDelegate {
    fn enum_references(&self, visitor: &mut GcVisitor) {
        if let Some(callable) = &self.callable {
            callable.function.enum_references(visitor);
        }
    }

    fn release_references(&mut self) {
        self.release();
    }
}

impl fmt::Debug for FunctionDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDelegate")
            .field("callable", &self.callable)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_core::{Dynamic, NativeError, TypeInfo};
    use std::sync::Mutex;

    fn callable(vm: &Arc<ScriptVm>, name: &str) -> ScriptCallable {
        ScriptCallable::new(vm.create_function(name, |_| Ok(()))).unwrap()
    }

    #[test]
    fn empty_delegate_is_invalid_and_needs_no_context() {
        let delegate = FunctionDelegate::empty();
        assert!(!delegate.is_valid());
        let mut wrote = false;
        assert!(delegate.invoke(|_| wrote = true, |_| Some(())).is_none());
        assert!(!wrote);
        assert!(!delegate.call((1i32,)));
    }

    #[test]
    fn non_function_is_rejected() {
        let vm = ScriptVm::new();
        let hash = vm.register_type(TypeInfo::reference("Scene")).unwrap();
        let scene = vm.allocate(0u8, hash).unwrap();
        assert!(matches!(
            ScriptCallable::new(scene),
            Err(BridgeError::NotCallable { .. })
        ));
    }

    #[test]
    fn validity_is_monotonic() {
        let vm = ScriptVm::new();
        let callable = callable(&vm, "on_key");
        let handle = callable.handle();
        let delegate = FunctionDelegate::from(callable);
        let copy = delegate.clone();
        assert!(delegate.is_valid());

        vm.discard_function(handle);
        assert!(!delegate.is_valid());
        assert!(!copy.is_valid());

        // Reusing the freed slot does not revive the delegate.
        let _other = vm.create_function("other", |_| Ok(()));
        assert!(!delegate.is_valid());
    }

    #[test]
    fn delegate_holds_one_reference_per_copy() {
        let vm = ScriptVm::new();
        let callable = callable(&vm, "f");
        let handle = callable.handle();
        let delegate = FunctionDelegate::from(callable);
        assert_eq!(vm.ref_count(handle), Some(1));
        let copy = delegate.clone();
        assert_eq!(vm.ref_count(handle), Some(2));
        drop(copy);
        drop(delegate);
        assert!(!vm.is_alive(handle));
    }

    #[test]
    fn call_marshals_arguments_and_result() {
        let vm = ScriptVm::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let function = vm.create_function("overlaps", move |ctx| {
            let x: i32 = ctx.arg(0)?;
            sink.lock().unwrap().push(x);
            ctx.set_return(x > 10);
            Ok(())
        });
        let delegate = FunctionDelegate::from(ScriptCallable::new(function).unwrap());

        let context = vm.request_context();
        let _guard = context.enter();
        assert!(delegate.call_bool((20i32,)));
        assert!(!delegate.call_bool((5i32,)));
        assert_eq!(*seen.lock().unwrap(), vec![20, 5]);
    }

    #[test]
    fn exception_yields_none() {
        let vm = ScriptVm::new();
        let function = vm.create_function("broken", |_| Err(NativeError::exception("boom")));
        let delegate = FunctionDelegate::from(ScriptCallable::new(function).unwrap());
        let context = vm.request_context();
        let _guard = context.enter();

        assert_eq!(delegate.call_returning::<_, i32>(()), None);
        assert!(!delegate.call_bool(()));
        assert!(context.exception().unwrap().contains("boom"));
    }

    #[test]
    fn conversion_failure_yields_none() {
        let vm = ScriptVm::new();
        let function = vm.create_function("text", |ctx| {
            ctx.set_return("not a number");
            Ok(())
        });
        let delegate = FunctionDelegate::from(ScriptCallable::new(function).unwrap());
        let context = vm.request_context();
        let _guard = context.enter();
        assert_eq!(delegate.call_returning::<_, i32>(()), None);
        assert_eq!(
            delegate.invoke(|_| {}, |reader| Some(reader.raw().clone_if_possible())),
            Some(Some(Dynamic::String("not a number".into())))
        );
    }

    #[test]
    #[should_panic(expected = "no script context")]
    fn valid_delegate_without_context_panics() {
        let vm = ScriptVm::new();
        let delegate = FunctionDelegate::from(callable(&vm, "f"));
        delegate.call(());
    }

    #[test]
    fn gc_reports_and_severs() {
        let vm = ScriptVm::new();
        let mut delegate = FunctionDelegate::from(callable(&vm, "f"));
        let mut visitor = GcVisitor::new();
        delegate.enum_references(&mut visitor);
        assert_eq!(visitor.len(), 1);

        delegate.release_references();
        delegate.release_references();
        let mut visitor = GcVisitor::new();
        delegate.enum_references(&mut visitor);
        assert!(visitor.is_empty());
        assert!(!delegate.is_valid());
    }
}
