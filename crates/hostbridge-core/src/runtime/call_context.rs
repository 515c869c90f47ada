//! Call context handed to function bodies.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::convert::{FromDynamic, IntoDynamic};
use crate::error::{ConversionError, NativeError};
use crate::vm::ScriptVm;

use super::Dynamic;

/// Context for a running function body.
///
/// Gives the body positional access to the arguments the caller wrote,
/// a return slot, and the VM it runs on. The heap is not locked while the
/// body runs, so a body may call back into script.
///
/// ```ignore
/// let key: i32 = ctx.arg(0)?;
/// let pressed: bool = ctx.arg(4)?;
/// ctx.set_return(pressed);
/// ```
pub struct CallContext<'vm> {
    /// Argument slots in positional order
    slots: &'vm mut [Dynamic],
    /// Return value slot
    return_slot: &'vm mut Dynamic,
    /// VM the function runs on
    vm: &'vm Arc<ScriptVm>,
}

impl<'vm> CallContext<'vm> {
    pub fn new(
        slots: &'vm mut [Dynamic],
        return_slot: &'vm mut Dynamic,
        vm: &'vm Arc<ScriptVm>,
    ) -> Self {
        Self {
            slots,
            return_slot,
            vm,
        }
    }

    /// Get the number of arguments.
    pub fn arg_count(&self) -> usize {
        self.slots.len()
    }

    /// Get a raw reference to an argument slot.
    pub fn arg_slot(&self, index: usize) -> Result<&Dynamic, NativeError> {
        self.slots
            .get(index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds {
                index,
                count: self.arg_count(),
            })
    }

    /// Get a typed argument value.
    pub fn arg<T: FromDynamic>(&self, index: usize) -> Result<T, NativeError> {
        let slot = self.arg_slot(index)?;
        T::from_dynamic(slot).map_err(NativeError::Conversion)
    }

    /// Borrow an inline native argument of type `T`.
    pub fn arg_native<T: Any>(&self, index: usize) -> Result<&T, NativeError> {
        let slot = self.arg_slot(index)?;
        slot.as_native::<T>().ok_or_else(|| {
            NativeError::Conversion(ConversionError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                actual: slot.type_name(),
            })
        })
    }

    /// Set the return value from a raw slot.
    pub fn set_return_slot(&mut self, slot: Dynamic) {
        *self.return_slot = slot;
    }

    /// Set a typed return value.
    ///
    /// An object handle in the return slot carries one reference for the
    /// caller; return an [`ObjectRef`](crate::ObjectRef) to hand one over.
    /// Arguments are only borrowed.
    pub fn set_return<T: IntoDynamic>(&mut self, value: T) {
        *self.return_slot = value.into_dynamic();
    }

    /// The VM running this call.
    pub fn vm(&self) -> &Arc<ScriptVm> {
        self.vm
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("arg_count", &self.arg_count())
            .finish()
    }
}
