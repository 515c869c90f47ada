//! Application construction parameters.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use hostbridge_core::{Dynamic, ScriptVm};

bitflags! {
    /// Subsystems an application brings up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        /// Bind a script VM and drain its event queue on dispatch
        const SCRIPTING = 1 << 0;
        /// Create a content manager with the standard processors
        const PROCESSING = 1 << 1;
    }
}

/// Everything an [`ApplicationBridge`](super::ApplicationBridge) is built from.
#[derive(Default)]
pub struct ApplicationDesc {
    pub capabilities: Capabilities,
    pub vm: Option<Arc<ScriptVm>>,
    /// The script object that created the application, or void
    pub initiator: Dynamic,
}

impl ApplicationDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable scripting on `vm`.
    pub fn with_scripting(mut self, vm: &Arc<ScriptVm>) -> Self {
        self.capabilities |= Capabilities::SCRIPTING;
        self.vm = Some(Arc::clone(vm));
        self
    }

    pub fn with_processing(mut self) -> Self {
        self.capabilities |= Capabilities::PROCESSING;
        self
    }

    pub fn with_initiator(mut self, initiator: Dynamic) -> Self {
        self.initiator = initiator;
        self
    }
}

impl fmt::Debug for ApplicationDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationDesc")
            .field("capabilities", &self.capabilities)
            .field("vm", &self.vm.is_some())
            .field("initiator", &self.initiator)
            .finish()
    }
}
