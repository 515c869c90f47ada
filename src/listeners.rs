//! Lists of script event listeners.

use hostbridge_core::{ArgWriter, GcParticipant, GcVisitor};

use crate::delegate::{FunctionDelegate, ScriptCallable};
use crate::marshal::IntoArgs;

/// Script listeners for one native event, fired in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CallbackList {
    listeners: Vec<FunctionDelegate>,
}

impl CallbackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, callable: ScriptCallable) {
        self.listeners.push(FunctionDelegate::from(callable));
    }

    /// Remove the first listener calling `callable`.
    pub fn remove(&mut self, callable: &ScriptCallable) -> bool {
        let position = self
            .listeners
            .iter()
            .position(|listener| listener.callable() == Some(callable));
        match position {
            Some(index) => {
                self.listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, callable: &ScriptCallable) -> bool {
        self.listeners
            .iter()
            .any(|listener| listener.callable() == Some(callable))
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Drop listeners whose function no longer exists.
    pub fn retain_valid(&mut self) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(FunctionDelegate::is_valid);
        before - self.listeners.len()
    }

    /// Fire every listener with a copy of `args`. Returns how many ran to completion.
    pub fn fire<A: IntoArgs + Clone>(&self, args: A) -> usize {
        self.listeners
            .iter()
            .filter(|listener| listener.call(args.clone()))
            .count()
    }

    /// Fire every listener, writing arguments with `write` for each call.
    pub fn fire_with(&self, write: impl Fn(&mut ArgWriter)) -> usize {
        self.listeners
            .iter()
            .filter(|listener| listener.invoke_void(&write))
            .count()
    }
}

impl GcParticipant for CallbackList {
    fn enum_references(&self, visitor: &mut GcVisitor) {
        self.listeners.enum_references(visitor);
    }

    fn release_references(&mut self) {
        self.listeners.release_references();
        self.listeners.clear();
    }
}
