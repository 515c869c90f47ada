//! Generational arena for reference-counted script objects.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock, TryLockError};

use crate::TypeHash;

use super::gc::{GcBehaviour, GcParticipant, GcVisitor};

/// Boxed object as stored in a heap slot.
pub type BoxedObject = Box<dyn Any + Send + Sync>;

/// Shared cell holding one heap object.
///
/// Cloned out of the heap so an object can be borrowed after the heap itself
/// has been let go.
pub type ObjectCell = Arc<RwLock<BoxedObject>>;

/// Handle to a heap-allocated object.
///
/// Copyable; equality is identity. The generation prevents a handle from
/// resolving again once its slot has been freed and reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Index into ObjectHeap.slots
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
    /// Script type of the object
    pub type_hash: TypeHash,
}

impl ObjectHandle {
    /// Create a new object handle.
    pub fn new(index: u32, generation: u32, type_hash: TypeHash) -> Self {
        Self {
            index,
            generation,
            type_hash,
        }
    }
}

/// Heap storage for reference types with generational indices.
///
/// Objects start with a reference count of one, owned by whoever called
/// `allocate`. When the count reaches zero the value is handed back to the
/// caller so it can be dropped outside any lock guarding the heap.
///
/// The heap never hands out borrows of an object. Callers take its
/// [`ObjectCell`] and lock that instead.
pub struct ObjectHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
}

struct HeapSlot {
    generation: u32,
    value: Option<ObjectCell>,
    ref_count: u32,
    type_hash: TypeHash,
    gc: Option<GcBehaviour>,
}

/// An object removed from the heap, together with its GC behaviour.
pub struct FreedObject {
    pub value: ObjectCell,
    pub gc: Option<GcBehaviour>,
}

impl FreedObject {
    /// Sever the object's script references, if it participates in GC.
    ///
    /// An object still borrowed elsewhere is left alone; its handles are
    /// released when the last borrow drops it.
    pub fn release_references(&mut self) {
        let Some(gc) = self.gc else {
            return;
        };
        let mut value = match self.value.try_write() {
            Ok(value) => value,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        (gc.release_references)(&mut **value);
    }
}

impl fmt::Debug for FreedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreedObject")
            .field("gc", &self.gc.is_some())
            .finish_non_exhaustive()
    }
}

impl ObjectHeap {
    /// Create a new empty object heap.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate a new object on the heap with a reference count of one.
    pub fn allocate<T: Any + Send + Sync>(&mut self, value: T, type_hash: TypeHash) -> ObjectHandle {
        self.insert(Box::new(value), type_hash, None)
    }

    /// Allocate an object whose script references are visible to the collector.
    pub fn allocate_gc<T>(&mut self, value: T, type_hash: TypeHash) -> ObjectHandle
    where
        T: GcParticipant + Any + Send + Sync,
    {
        self.insert(Box::new(value), type_hash, Some(GcBehaviour::of::<T>()))
    }

    fn insert(
        &mut self,
        boxed: BoxedObject,
        type_hash: TypeHash,
        gc: Option<GcBehaviour>,
    ) -> ObjectHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(Arc::new(RwLock::new(boxed)));
            slot.ref_count = 1;
            slot.type_hash = type_hash;
            slot.gc = gc;
            ObjectHandle::new(index, slot.generation, type_hash)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                value: Some(Arc::new(RwLock::new(boxed))),
                ref_count: 1,
                type_hash,
                gc,
            });
            ObjectHandle::new(index, 0, type_hash)
        }
    }

    fn live_slot(&self, handle: ObjectHandle) -> Option<&HeapSlot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    fn live_slot_mut(&mut self, handle: ObjectHandle) -> Option<&mut HeapSlot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    /// Check whether the handle still refers to a live object.
    pub fn is_alive(&self, handle: ObjectHandle) -> bool {
        self.live_slot(handle).is_some()
    }

    /// Cell of a live object. Returns None if the handle is stale.
    pub fn cell(&self, handle: ObjectHandle) -> Option<ObjectCell> {
        self.live_slot(handle)?.value.clone()
    }

    /// Script type recorded for a live object.
    pub fn type_of(&self, handle: ObjectHandle) -> Option<TypeHash> {
        self.live_slot(handle).map(|slot| slot.type_hash)
    }

    /// Increment reference count.
    pub fn add_ref(&mut self, handle: ObjectHandle) -> bool {
        match self.live_slot_mut(handle) {
            Some(slot) => {
                slot.ref_count = slot.ref_count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Decrement reference count, freeing the slot if it reaches zero.
    ///
    /// Returns the freed object so the caller can drop it; releasing a stale
    /// handle is a no-op.
    pub fn release(&mut self, handle: ObjectHandle) -> Option<FreedObject> {
        let slot = self.live_slot_mut(handle)?;
        slot.ref_count = slot.ref_count.saturating_sub(1);
        if slot.ref_count == 0 {
            self.take(handle)
        } else {
            None
        }
    }

    /// Remove an object immediately regardless of its reference count.
    ///
    /// Every outstanding handle to the object becomes stale.
    pub fn take(&mut self, handle: ObjectHandle) -> Option<FreedObject> {
        let slot = self.live_slot_mut(handle)?;
        let value = slot.value.take()?;
        let gc = slot.gc.take();
        slot.ref_count = 0;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        Some(FreedObject { value, gc })
    }

    /// Get the reference count for an object.
    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        self.live_slot(handle).map(|slot| slot.ref_count)
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Handles of every live object registered with GC behaviour.
    pub fn gc_handles(&self) -> Vec<ObjectHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.value.is_some() && slot.gc.is_some())
            .map(|(index, slot)| ObjectHandle::new(index as u32, slot.generation, slot.type_hash))
            .collect()
    }

    /// Report the script references held by a GC-tracked object.
    ///
    /// Never waits on the object. Returns false when it is borrowed for
    /// writing, in which case nothing was reported.
    pub fn enum_references(&self, handle: ObjectHandle, visitor: &mut GcVisitor) -> bool {
        let Some(slot) = self.live_slot(handle) else {
            return true;
        };
        let (Some(gc), Some(cell)) = (slot.gc, slot.value.as_ref()) else {
            return true;
        };
        let value = match cell.try_read() {
            Ok(value) => value,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        (gc.enum_references)(&**value, visitor);
        true
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .finish()
    }
}
