//! Scoped strong references into the script heap.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::TypeHash;
use crate::convert::IntoDynamic;
use crate::runtime::{Dynamic, GcParticipant, GcVisitor, ObjectHandle};
use crate::vm::ScriptVm;

/// One strong reference to a heap object.
///
/// Cloning takes another reference through the VM; dropping gives it back.
/// The VM is held weakly, so a reference stored inside a heap object does
/// not keep its own VM alive. Once the VM is gone there is nothing left to
/// release.
pub struct ObjectRef {
    vm: Option<Weak<ScriptVm>>,
    handle: ObjectHandle,
}

impl ObjectRef {
    /// Adopt a reference the caller already owns.
    pub(crate) fn adopt(vm: &Arc<ScriptVm>, handle: ObjectHandle) -> Self {
        Self {
            vm: Some(Arc::downgrade(vm)),
            handle,
        }
    }

    /// Take ownership of a reference that was handed over as a raw handle,
    /// for example an object returned from a script function.
    pub fn from_raw(vm: &Arc<ScriptVm>, handle: ObjectHandle) -> Self {
        Self::adopt(vm, handle)
    }

    /// Give up the reference without releasing it. The caller now owns it.
    pub fn into_raw(mut self) -> ObjectHandle {
        self.vm = None;
        self.handle
    }

    /// Take a new strong reference to `handle`.
    ///
    /// Returns None if the handle is stale.
    pub fn acquire(vm: &Arc<ScriptVm>, handle: ObjectHandle) -> Option<Self> {
        vm.add_ref(handle).then(|| Self::adopt(vm, handle))
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn type_hash(&self) -> TypeHash {
        self.handle.type_hash
    }

    /// The owning VM, if it is still alive and the reference is held.
    pub fn vm(&self) -> Option<Arc<ScriptVm>> {
        self.vm.as_ref()?.upgrade()
    }

    /// Check whether the reference is still held and the object is alive.
    pub fn is_alive(&self) -> bool {
        self.vm().is_some_and(|vm| vm.is_alive(self.handle))
    }

    /// Give the reference back now. Later calls and the eventual drop are no-ops.
    pub fn release(&mut self) {
        if let Some(vm) = self.vm.take().and_then(|vm| vm.upgrade()) {
            vm.release(self.handle);
        }
    }

    pub fn is_released(&self) -> bool {
        self.vm.is_none()
    }
}

impl Clone for ObjectRef {
    fn clone(&self) -> Self {
        match self.vm() {
            Some(vm) if vm.add_ref(self.handle) => Self::adopt(&vm, self.handle),
            _ => Self {
                vm: None,
                handle: self.handle,
            },
        }
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        self.release();
    }
}

/// Returning an `ObjectRef` from a function body hands its reference to the caller.
impl IntoDynamic for ObjectRef {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Object(self.into_raw())
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("handle", &self.handle)
            .field("released", &self.is_released())
            .finish()
    }
}

impl GcParticipant for ObjectRef {
    fn enum_references(&self, visitor: &mut GcVisitor) {
        if !self.is_released() {
            visitor.visit(self.handle);
        }
    }

    fn release_references(&mut self) {
        self.release();
    }
}
