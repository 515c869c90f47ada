//! Script runtime model for hostbridge.
//!
//! This crate models the script side of the bridge: a VM with a
//! reference-counted object heap, a type registry, function objects,
//! execution contexts with per-thread lookup, script promises and a
//! cycle collector. The `hostbridge` crate builds native objects on top of
//! it that hold script references safely.
//!
//! ```ignore
//! let vm = ScriptVm::new();
//! let on_key = vm.create_function("on_key", |ctx| {
//!     let code: i32 = ctx.arg(0)?;
//!     ctx.set_return(code == 65);
//!     Ok(())
//! });
//! let ctx = vm.request_context();
//! let _guard = ctx.enter();
//! let handled = ctx.execute(on_key.handle(), |args| {
//!     args.push(65i32);
//! })?;
//! ```

pub mod context;
pub mod convert;
pub mod error;
pub mod object_ref;
pub mod promise;
pub mod runtime;
pub mod type_hash;
pub mod types;
pub mod vm;

pub use context::{ArgWriter, ContextGuard, ContextState, ScriptContext};
pub use convert::{FromDynamic, IntoDynamic};
pub use error::{ConversionError, NativeError, RuntimeError};
pub use object_ref::ObjectRef;
pub use promise::ScriptPromise;
pub use runtime::{
    CallContext, Dynamic, GcParticipant, GcStatistics, GcVisitor, ObjectCell, ObjectHandle, ObjectHeap,
};
pub use type_hash::TypeHash;
pub use types::{FUNCTION_TYPE, PROMISE_TYPE, TypeFlags, TypeInfo, TypeRegistry};
pub use vm::{ScriptVm, VmProperties};
