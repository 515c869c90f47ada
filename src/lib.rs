//! Native/script object bridge.
//!
//! Lets engine code hold script callbacks and script objects safely and
//! call into script without depending on script runtime types:
//!
//! - [`FunctionDelegate`]: a script callback native code can fire
//! - [`InitiatorBinding`]: the script object that owns a native object
//! - [`Promise`] and [`AsyncContinuation`]: futures crossing the boundary
//! - [`GcParticipant`]: how native objects expose script references to the
//!   cycle collector
//! - [`ApplicationBridge`]: the application object tying these together
//!
//! # Example
//!
//! ```ignore
//! use hostbridge::prelude::*;
//!
//! let vm = ScriptVm::new();
//! let mut app = ApplicationBridge::new(ApplicationDesc::new().with_scripting(&vm));
//! let on_key = vm.create_function("on_key", |ctx| {
//!     let key: i32 = ctx.arg(0)?;
//!     println!("key {key}");
//!     Ok(())
//! });
//! app.set_on_key_event(Some(ScriptCallable::new(on_key)?));
//!
//! let context = vm.request_context();
//! let _guard = context.enter();
//! app.key_event(65, 0, 65, 0, true);
//! ```

pub mod application;
pub mod content;
pub mod continuation;
pub mod delegate;
pub mod error;
pub mod initiator;
pub mod listeners;
pub mod marshal;
pub mod promise;
pub mod spatial;

pub use application::{
    ApplicationBridge, ApplicationDesc, ApplicationSlot, Capabilities, FrameTimer,
};
pub use content::{Content, ContentDescriptor, ContentManager, Processor, ProcessorKind};
pub use continuation::{AsyncContinuation, Delivery};
pub use delegate::{FunctionDelegate, ScriptCallable};
pub use error::{BridgeError, BridgeResult, ContentError};
pub use initiator::{InitiatorBinding, RetrieveTarget};
pub use listeners::CallbackList;
pub use marshal::{IntoArgs, Native, ReturnReader};
pub use promise::Promise;
pub use spatial::{BoundingBox, SpatialIndex, query_index};

pub use hostbridge_core::{GcParticipant, GcVisitor};

pub mod prelude {
    pub use crate::application::*;
    pub use crate::content::{ContentManager, Processor, ProcessorKind};
    pub use crate::continuation::{AsyncContinuation, Delivery};
    pub use crate::delegate::{FunctionDelegate, ScriptCallable};
    pub use crate::error::{BridgeError, BridgeResult, ContentError};
    pub use crate::initiator::{InitiatorBinding, RetrieveTarget};
    pub use crate::listeners::CallbackList;
    pub use crate::marshal::{IntoArgs, Native};
    pub use crate::promise::Promise;
    pub use crate::spatial::{BoundingBox, SpatialIndex, query_index};
    pub use hostbridge_core::{
        Dynamic, GcParticipant, GcVisitor, ObjectRef, ScriptContext, ScriptVm, TypeHash, TypeInfo,
    };
}
