//! Binding between a native object and the script object that created it.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use hostbridge_core::{
    Dynamic, GcParticipant, GcVisitor, ObjectRef, ScriptContext, ScriptVm, TypeHash, TypeInfo,
};
use tracing::trace;

use crate::error::{BridgeError, BridgeResult};

/// What [`InitiatorBinding::retrieve`] should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveTarget {
    /// A handle of this type or any base type of the bound object.
    Handle(TypeHash),
    /// The bound object itself, only if it is exactly this type.
    Value(TypeHash),
}

/// The script object (and its type) that owns a native object.
///
/// Holds exactly one strong reference while bound. An empty binding holds
/// nothing: the object and type are present together or not at all.
pub struct InitiatorBinding {
    object: Option<ObjectRef>,
    type_info: Option<TypeInfo>,
    vm: Option<Weak<ScriptVm>>,
}

impl InitiatorBinding {
    /// A binding with no initiator.
    pub fn empty() -> Self {
        Self {
            object: None,
            type_info: None,
            vm: None,
        }
    }

    /// Bind to the object in `initiator`.
    ///
    /// An object handle takes a strong reference; void or a null handle
    /// gives an empty binding. Any other value, or a stale handle, is
    /// rejected. Without an explicit VM the current context's VM is used.
    pub fn new(vm: Option<&Arc<ScriptVm>>, initiator: &Dynamic) -> BridgeResult<Self> {
        let handle = match initiator {
            Dynamic::Object(handle) => *handle,
            Dynamic::Void | Dynamic::NullHandle => return Ok(Self::empty()),
            other => {
                return Err(BridgeError::InvalidInitiator {
                    actual: other.type_name(),
                });
            }
        };

        let vm = match vm {
            Some(vm) => Arc::clone(vm),
            None => ScriptContext::current()
                .map(|ctx| Arc::clone(ctx.vm()))
                .ok_or(BridgeError::NoVm)?,
        };
        let stale = BridgeError::InvalidInitiator {
            actual: "stale object",
        };
        let type_info = vm.type_info(handle.type_hash).ok_or(stale.clone())?;
        let object = ObjectRef::acquire(&vm, handle).ok_or(stale)?;
        trace!(initiator = %type_info.name, "bound initiator");

        Ok(Self {
            object: Some(object),
            type_info: Some(type_info),
            vm: Some(Arc::downgrade(&vm)),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.object.is_none()
    }

    pub fn object(&self) -> Option<&ObjectRef> {
        self.object.as_ref()
    }

    pub fn type_info(&self) -> Option<&TypeInfo> {
        self.type_info.as_ref()
    }

    /// A new strong reference to the initiator, converted to `target`.
    ///
    /// `None` when the binding is empty, the VM is gone, or the cast fails.
    pub fn retrieve(&self, target: RetrieveTarget) -> Option<ObjectRef> {
        let object = self.object.as_ref()?;
        let vm = self.vm.as_ref()?.upgrade()?;
        match target {
            RetrieveTarget::Handle(type_hash) => vm.ref_cast(object.handle(), type_hash),
            RetrieveTarget::Value(type_hash) => {
                let exact = self.type_info.as_ref()?.hash == type_hash;
                if exact {
                    ObjectRef::acquire(&vm, object.handle())
                } else {
                    None
                }
            }
        }
    }

    /// Borrow the initiator's native value when it is a `T`.
    pub fn retrieve_with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let object = self.object.as_ref()?;
        object.vm()?.with_object(object.handle(), f)
    }

    /// Give the reference back. Safe to call more than once.
    pub fn release(&mut self) {
        self.type_info = None;
        self.vm = None;
        if let Some(mut object) = self.object.take() {
            object.release();
        }
    }
}

impl Default for InitiatorBinding {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for InitiatorBinding {
    fn drop(&mut self) {
        self.release();
    }
}

impl GcParticipant for InitiatorBinding {
    fn enum_references(&self, visitor: &mut GcVisitor) {
        self.object.enum_references(visitor);
    }

    fn release_references(&mut self) {
        self.release();
    }
}

impl fmt::Debug for InitiatorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitiatorBinding")
            .field("object", &self.object.as_ref().map(ObjectRef::handle))
            .field("type", &self.type_info.as_ref().map(|t| t.name.as_str()))
            .finish()
    }
}
