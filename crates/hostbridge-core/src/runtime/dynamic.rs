//! The value carried by argument and return slots.

use std::any::Any;
use std::fmt;

use super::ObjectHandle;

/// One argument or return slot.
///
/// Heap objects (functions, promises, script types) travel as handles.
/// Everything else the engine hands to script, such as frame timers or
/// bounding volumes, rides along as an inline `Native` box.
#[derive(Default)]
pub enum Dynamic {
    /// Nothing was written
    #[default]
    Void,
    /// Any integer, widened to i64
    Int(i64),
    Bool(bool),
    String(String),
    Object(ObjectHandle),
    /// Engine value passed through script untouched
    Native(Box<dyn Any + Send + Sync>),
    NullHandle,
}

impl Dynamic {
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Void => "void",
            Dynamic::Int(_) => "int",
            Dynamic::Bool(_) => "bool",
            Dynamic::String(_) => "string",
            Dynamic::Object(_) => "object",
            Dynamic::Native(_) => "native",
            Dynamic::NullHandle => "null",
        }
    }

    pub fn native<T: Any + Send + Sync>(value: T) -> Self {
        Dynamic::Native(Box::new(value))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Dynamic::Void)
    }

    pub fn as_object(&self) -> Option<ObjectHandle> {
        if let Dynamic::Object(handle) = self {
            Some(*handle)
        } else {
            None
        }
    }

    pub fn as_native<T: Any>(&self) -> Option<&T> {
        if let Dynamic::Native(value) = self {
            value.downcast_ref::<T>()
        } else {
            None
        }
    }

    /// Copy the slot. Native boxes cannot be copied and give None.
    pub fn clone_if_possible(&self) -> Option<Self> {
        Some(match self {
            Dynamic::Native(_) => return None,
            Dynamic::Void => Dynamic::Void,
            Dynamic::NullHandle => Dynamic::NullHandle,
            Dynamic::Int(v) => Dynamic::Int(*v),
            Dynamic::Bool(v) => Dynamic::Bool(*v),
            Dynamic::String(v) => Dynamic::String(v.clone()),
            Dynamic::Object(handle) => Dynamic::Object(*handle),
        })
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Dynamic::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Dynamic::String(v) => f.debug_tuple("String").field(v).finish(),
            Dynamic::Object(handle) => f.debug_tuple("Object").field(handle).finish(),
            other => f.write_str(other.type_name()),
        }
    }
}

/// Native slots never compare equal, not even to themselves.
impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Dynamic::Native(_), _) | (_, Dynamic::Native(_)) => false,
            (Dynamic::Int(a), Dynamic::Int(b)) => a == b,
            (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
            (Dynamic::String(a), Dynamic::String(b)) => a == b,
            (Dynamic::Object(a), Dynamic::Object(b)) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}
