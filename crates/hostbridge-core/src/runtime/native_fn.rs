//! Function bodies and the script function object.

use std::fmt;
use std::sync::Arc;

use crate::TypeHash;
use crate::error::NativeError;

use super::CallContext;

/// Type-erased function body.
///
/// The inner callable is shared through an `Arc`, so the VM can clone the
/// body out of the heap and run it without keeping the function slot
/// borrowed.
pub struct NativeFn {
    /// Identity of the function (name + parameter hashes)
    pub id: TypeHash,
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    pub fn new<F>(id: TypeHash, f: F) -> Self
    where
        F: NativeCallable + Send + Sync + 'static,
    {
        Self {
            id,
            inner: Arc::new(f),
        }
    }

    /// Call this function body with the given context.
    pub fn call(&self, ctx: &mut CallContext) -> Result<(), NativeError> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Clone for NativeFn {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Trait for callable function bodies.
pub trait NativeCallable {
    fn call(&self, ctx: &mut CallContext) -> Result<(), NativeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext) -> Result<(), NativeError>,
{
    fn call(&self, ctx: &mut CallContext) -> Result<(), NativeError> {
        (self)(ctx)
    }
}

/// A script function object as stored on the heap.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    name: String,
    body: NativeFn,
}

impl ScriptFunction {
    pub fn new(name: impl Into<String>, body: NativeFn) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> TypeHash {
        self.body.id
    }

    pub fn body(&self) -> &NativeFn {
        &self.body
    }
}
