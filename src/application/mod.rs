//! The application object scripts configure and the engine drives.
//!
//! The engine feeds input and frame events into an [`ApplicationBridge`];
//! the bridge forwards each to the script callback installed in the
//! matching [`ApplicationSlot`], if any. An empty slot swallows the event
//! without needing a script context.

mod desc;
mod slot;
mod timer;

pub use desc::{ApplicationDesc, Capabilities};
pub use slot::{ApplicationSlot, SLOT_COUNT};
pub use timer::FrameTimer;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use hostbridge_core::{GcParticipant, GcVisitor, ScriptContext, ScriptVm};
use tracing::{debug, trace, warn};

use crate::content::ContentManager;
use crate::continuation::AsyncContinuation;
use crate::delegate::{FunctionDelegate, ScriptCallable};
use crate::error::BridgeError;
use crate::initiator::{InitiatorBinding, RetrieveTarget};
use crate::marshal::Native;
use crate::promise::Promise;

macro_rules! slot_setters {
    ($($(#[$doc:meta])* $setter:ident => $slot:ident;)+) => {
        $(
            $(#[$doc])*
            pub fn $setter(&mut self, callable: Option<ScriptCallable>) {
                self.set_callback(ApplicationSlot::$slot, callable);
            }
        )+
    };
}

/// Native application state shared with scripts.
pub struct ApplicationBridge {
    capabilities: Capabilities,
    vm: Option<Weak<ScriptVm>>,
    content: Option<ContentManager>,
    initiator: InitiatorBinding,
    initiator_error: Option<BridgeError>,
    slots: [FunctionDelegate; SLOT_COUNT],
    processed_events: AtomicUsize,
    released: bool,
}

impl ApplicationBridge {
    /// Build the application described by `desc`.
    ///
    /// An invalid initiator does not stop construction: it is logged,
    /// recorded on the current context if there is one, and available from
    /// [`ApplicationBridge::initiator_error`].
    pub fn new(desc: ApplicationDesc) -> Self {
        let ApplicationDesc {
            capabilities,
            vm,
            initiator,
        } = desc;

        let bound_vm = vm
            .as_ref()
            .filter(|_| capabilities.contains(Capabilities::SCRIPTING))
            .map(Arc::downgrade);
        let content = capabilities
            .contains(Capabilities::PROCESSING)
            .then(ContentManager::with_standard_processors);

        let (initiator, initiator_error) = match InitiatorBinding::new(vm.as_ref(), &initiator) {
            Ok(binding) => (binding, None),
            Err(err) => {
                warn!(error = %err, "application initiator rejected");
                if let Some(context) = ScriptContext::current() {
                    context.set_exception(err.to_string());
                }
                (InitiatorBinding::empty(), Some(err))
            }
        };

        debug!(?capabilities, initiator = !initiator.is_empty(), "application created");
        Self {
            capabilities,
            vm: bound_vm,
            content,
            initiator,
            initiator_error,
            slots: Default::default(),
            processed_events: AtomicUsize::new(0),
            released: false,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The scripting VM, if scripting is enabled and the VM is alive.
    pub fn vm(&self) -> Option<Arc<ScriptVm>> {
        self.vm.as_ref()?.upgrade()
    }

    pub fn content(&self) -> Option<&ContentManager> {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> Option<&mut ContentManager> {
        self.content.as_mut()
    }

    pub fn initiator(&self) -> &InitiatorBinding {
        &self.initiator
    }

    /// Why the initiator was rejected, if it was.
    pub fn initiator_error(&self) -> Option<&BridgeError> {
        self.initiator_error.as_ref()
    }

    /// Shorthand for [`InitiatorBinding::retrieve`].
    pub fn retrieve(&self, target: RetrieveTarget) -> Option<hostbridge_core::ObjectRef> {
        self.initiator.retrieve(target)
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    pub fn callback(&self, slot: ApplicationSlot) -> &FunctionDelegate {
        &self.slots[slot.index()]
    }

    /// Replace the callback in `slot`; `None` clears it.
    pub fn set_callback(&mut self, slot: ApplicationSlot, callable: Option<ScriptCallable>) {
        trace!(slot = slot.property_name(), set = callable.is_some(), "application callback replaced");
        self.slots[slot.index()] = FunctionDelegate::new(callable);
    }

    slot_setters! {
        set_on_key_event => Key;
        set_on_input_event => Input;
        set_on_wheel_event => Wheel;
        set_on_window_event => Window;
        /// Called once per frame after the native event queue is drained.
        set_on_dispatch => Dispatch;
        set_on_publish => Publish;
        set_on_composition => Composition;
        /// Polled by the engine; an empty slot counts as finished.
        set_on_script_hook => ScriptHook;
        set_on_initialize => Initialize;
        /// Returns a promise the engine waits on before running.
        set_on_startup => Startup;
        set_on_shutdown => Shutdown;
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn key_event(&self, key_code: i32, key_mod: i32, virtual_key: i32, repeat: i32, pressed: bool) {
        self.callback(ApplicationSlot::Key)
            .call((key_code, key_mod, virtual_key, repeat, pressed));
    }

    pub fn input_event(&self, text: &str) {
        self.callback(ApplicationSlot::Input).call((text,));
    }

    pub fn wheel_event(&self, x: i32, y: i32, normal: bool) {
        self.callback(ApplicationSlot::Wheel).call((x, y, normal));
    }

    pub fn window_event(&self, state: i32, x: i32, y: i32) {
        self.callback(ApplicationSlot::Window).call((state, x, y));
    }

    pub fn composition(&self, text: &str, cursor: i32, selection_length: i32) {
        self.callback(ApplicationSlot::Composition)
            .call((text, cursor, selection_length));
    }

    /// Ask the script whether it is done. True when no hook is installed.
    pub fn script_hook(&self) -> bool {
        let hook = self.callback(ApplicationSlot::ScriptHook);
        if !hook.is_valid() {
            return true;
        }
        hook.call_bool(())
    }

    pub fn initialize(&self) {
        self.callback(ApplicationSlot::Initialize).call(());
    }

    /// Drain the VM's native event queue, then run the dispatch callback.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn dispatch(&self, timer: &FrameTimer) {
        let processed = self.vm().map_or(0, |vm| vm.dispatch_events());
        self.processed_events.store(processed, Ordering::Relaxed);
        if processed > 0 {
            trace!(processed, frame = timer.frame(), "dispatched queued events");
        }
        self.callback(ApplicationSlot::Dispatch)
            .call((Native(*timer),));
    }

    pub fn publish(&self, timer: &FrameTimer) {
        self.callback(ApplicationSlot::Publish)
            .call((Native(*timer),));
    }

    /// Events drained by the last [`ApplicationBridge::dispatch`].
    pub fn get_processed_events(&self) -> usize {
        self.processed_events.load(Ordering::Relaxed)
    }

    pub fn has_processed_events(&self) -> bool {
        self.get_processed_events() > 0
    }

    /// Run the startup callback. Resolves when the script's promise does.
    pub fn startup(&self) -> Promise<()> {
        self.run_async(ApplicationSlot::Startup)
    }

    /// Run the shutdown callback. Resolves when the script's promise does.
    pub fn shutdown(&self) -> Promise<()> {
        self.run_async(ApplicationSlot::Shutdown)
    }

    fn run_async(&self, slot: ApplicationSlot) -> Promise<()> {
        let delegate = self.callback(slot);
        if !delegate.is_valid() {
            return Promise::ready(());
        }
        let script_promise = delegate.invoke(|_| {}, |result| result.promise());
        match script_promise {
            Some(promise) if promise.is_pending() => AsyncContinuation::from_script(&promise),
            _ => Promise::ready(()),
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Release the initiator, then every callback, and detach from the VM
    /// and content. Later calls do nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.initiator.release();
        for slot in &mut self.slots {
            slot.release();
        }
        self.vm = None;
        self.content = None;
        trace!("application released");
    }
}

impl Drop for ApplicationBridge {
    fn drop(&mut self) {
        self.release();
    }
}

impl GcParticipant for ApplicationBridge {
    fn enum_references(&self, visitor: &mut GcVisitor) {
        self.initiator.enum_references(visitor);
        for slot in &self.slots {
            slot.enum_references(visitor);
        }
    }

    fn release_references(&mut self) {
        self.initiator.release_references();
        for slot in &mut self.slots {
            slot.release_references();
        }
    }
}

impl fmt::Debug for ApplicationBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed: Vec<&str> = ApplicationSlot::ALL
            .into_iter()
            .filter(|slot| self.callback(*slot).callable().is_some())
            .map(ApplicationSlot::property_name)
            .collect();
        f.debug_struct("ApplicationBridge")
            .field("capabilities", &self.capabilities)
            .field("initiator", &self.initiator)
            .field("callbacks", &installed)
            .field("processed_events", &self.get_processed_events())
            .finish()
    }
}
