//! Argument and result marshaling between native calls and script calls.
//!
//! Two forms are supported. Closure writers push arguments one at a time
//! onto an [`ArgWriter`]; typed entry points take a tuple implementing
//! [`IntoArgs`] so the shape of a call is fixed at the call site:
//!
//! ```ignore
//! delegate.call((key_code, key_mod, virtual_key, repeat, pressed));
//! let hit = predicate.call_bool((Native(bounds),));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use hostbridge_core::{ArgWriter, Dynamic, FromDynamic, IntoDynamic, ObjectRef, ScriptPromise, ScriptVm};
use tracing::warn;

/// Wraps a native value so it travels inline instead of by handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Native<T>(pub T);

impl<T: Any + Send + Sync> IntoDynamic for Native<T> {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::native(self.0)
    }
}

/// A fixed argument list.
pub trait IntoArgs {
    fn write_args(self, writer: &mut ArgWriter);
}

impl IntoArgs for () {
    fn write_args(self, _writer: &mut ArgWriter) {}
}

macro_rules! impl_into_args {
    ($($name:ident),+) => {
        impl<$($name: IntoDynamic),+> IntoArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn write_args(self, writer: &mut ArgWriter) {
                let ($($name,)+) = self;
                $(writer.push($name);)+
            }
        }
    };
}

impl_into_args!(A);
impl_into_args!(A, B);
impl_into_args!(A, B, C);
impl_into_args!(A, B, C, D);
impl_into_args!(A, B, C, D, E);
impl_into_args!(A, B, C, D, E, F);
impl_into_args!(A, B, C, D, E, F, G);
impl_into_args!(A, B, C, D, E, F, G, H);

/// Read access to the value a script call returned.
///
/// An object in the return slot carries a reference owned by the reader;
/// it is given back when the reader is dropped unless [`ReturnReader::object`]
/// took another one.
pub struct ReturnReader {
    value: Dynamic,
    object: Option<ObjectRef>,
}

impl ReturnReader {
    pub(crate) fn new(vm: &Arc<ScriptVm>, value: Dynamic) -> Self {
        let object = value.as_object().map(|handle| ObjectRef::from_raw(vm, handle));
        Self { value, object }
    }

    /// The raw returned slot.
    pub fn raw(&self) -> &Dynamic {
        &self.value
    }

    pub fn is_void(&self) -> bool {
        self.value.is_void()
    }

    /// Convert the result, logging a failed conversion.
    pub fn get<T: FromDynamic>(&self) -> Option<T> {
        match T::from_dynamic(&self.value) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "script result conversion failed");
                None
            }
        }
    }

    /// Borrow an inline native result.
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.value.as_native::<T>()
    }

    /// A new strong reference to a returned object.
    pub fn object(&self) -> Option<ObjectRef> {
        self.object.clone()
    }

    /// The script promise behind a returned promise object.
    pub fn promise(&self) -> Option<ScriptPromise> {
        let object = self.object.as_ref()?;
        object.vm()?.promise(object.handle())
    }
}

impl fmt::Debug for ReturnReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnReader")
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuples_write_in_order() {
        let mut writer = ArgWriter::default();
        (65i32, 0i32, "a", true).write_args(&mut writer);
        assert_eq!(
            writer.into_args(),
            vec![
                Dynamic::Int(65),
                Dynamic::Int(0),
                Dynamic::String("a".into()),
                Dynamic::Bool(true)
            ]
        );
    }

    #[test]
    fn native_values_travel_inline() {
        let mut writer = ArgWriter::default();
        (Native([1.0f32, 2.0, 3.0]),).write_args(&mut writer);
        let args = writer.into_args();
        assert_eq!(args[0].as_native::<[f32; 3]>(), Some(&[1.0, 2.0, 3.0]));
    }

    #[test]
    fn reader_releases_returned_object() {
        let vm = ScriptVm::new();
        let hash = vm
            .register_type(hostbridge_core::TypeInfo::reference("Scene"))
            .unwrap();
        let scene = vm.allocate(0u8, hash).unwrap();
        let handle = scene.handle();
        // Simulate a function handing its reference to the caller.
        let raw = scene.into_raw();

        let reader = ReturnReader::new(&vm, Dynamic::Object(raw));
        let kept = reader.object().unwrap();
        assert_eq!(vm.ref_count(handle), Some(2));
        drop(reader);
        assert_eq!(vm.ref_count(handle), Some(1));
        drop(kept);
        assert!(!vm.is_alive(handle));
    }

    #[test]
    fn failed_conversion_is_none() {
        let vm = ScriptVm::new();
        let reader = ReturnReader::new(&vm, Dynamic::String("yes".into()));
        assert_eq!(reader.get::<bool>(), None);
        assert_eq!(reader.get::<String>().as_deref(), Some("yes"));
    }
}
