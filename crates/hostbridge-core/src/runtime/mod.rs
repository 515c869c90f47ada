//! Runtime pieces shared by the VM and the bridge.
//!
//! - [`ObjectHeap`]: generational arena of reference-counted objects
//! - [`Dynamic`]: the value carried by argument and return slots
//! - [`CallContext`]: what a function body sees while it runs
//! - [`GcParticipant`]: how native objects expose script references to the collector

mod call_context;
mod dynamic;
mod gc;
mod native_fn;
mod object_heap;

pub use call_context::CallContext;
pub use dynamic::Dynamic;
pub use gc::{GcBehaviour, GcParticipant, GcStatistics, GcVisitor};
pub(crate) use gc::detect_garbage;
pub use native_fn::{NativeCallable, NativeFn, ScriptFunction};
pub use object_heap::{BoxedObject, FreedObject, ObjectCell, ObjectHandle, ObjectHeap};
