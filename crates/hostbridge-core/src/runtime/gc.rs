//! Cycle collection for native objects that hold script references.
//!
//! Reference counting is the primary mechanism; the collector is the
//! backup for cycles. It only needs two things from an object, expressed by
//! [`GcParticipant`]:
//!
//! - `enum_references`: report every script handle the object holds
//! - `release_references`: drop all of them
//!
//! ## Algorithm
//!
//! 1. Count references between tracked objects (via `enum_references`)
//! 2. Objects whose refcount exceeds that count are referenced from outside
//!    the tracked set: they are live roots. So is any object borrowed for
//!    writing while the pass runs, since its references cannot be read
//! 3. Everything reachable from a root is live
//! 4. The rest is garbage: removed from the heap, then severed with
//!    `release_references` once the heap is no longer borrowed

use std::any::Any;
use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use super::object_heap::{FreedObject, ObjectHandle, ObjectHeap};

/// Receives the script handles reported by [`GcParticipant::enum_references`].
///
/// Reporting a handle never transfers ownership.
#[derive(Debug, Default)]
pub struct GcVisitor {
    handles: Vec<ObjectHandle>,
}

impl GcVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report one reachable handle.
    pub fn visit(&mut self, handle: ObjectHandle) {
        self.handles.push(handle);
    }

    /// Every handle reported so far, in report order.
    pub fn handles(&self) -> &[ObjectHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn into_handles(self) -> Vec<ObjectHandle> {
        self.handles
    }
}

/// Capability of a native object that holds script handles.
///
/// `enum_references` must report every handle the object keeps alive:
/// an omitted handle is undercounted and its target can be collected while
/// still in use. `release_references` must not panic, must be idempotent, and
/// must leave the object safe to drop.
pub trait GcParticipant {
    /// Report every script handle reachable from this object.
    fn enum_references(&self, visitor: &mut GcVisitor);

    /// Drop every script handle owned by this object.
    fn release_references(&mut self);
}

impl<T: GcParticipant> GcParticipant for Option<T> {
    fn enum_references(&self, visitor: &mut GcVisitor) {
        if let Some(inner) = self {
            inner.enum_references(visitor);
        }
    }

    fn release_references(&mut self) {
        if let Some(inner) = self {
            inner.release_references();
        }
    }
}

impl<T: GcParticipant> GcParticipant for Vec<T> {
    fn enum_references(&self, visitor: &mut GcVisitor) {
        for item in self {
            item.enum_references(visitor);
        }
    }

    fn release_references(&mut self) {
        for item in self.iter_mut() {
            item.release_references();
        }
    }
}

/// Type-erased dispatch table for a [`GcParticipant`] stored on the heap.
#[derive(Clone, Copy)]
pub struct GcBehaviour {
    pub enum_references: fn(&dyn Any, &mut GcVisitor),
    pub release_references: fn(&mut dyn Any),
}

impl GcBehaviour {
    pub fn of<T: GcParticipant + Any>() -> Self {
        Self {
            enum_references: enum_references_thunk::<T>,
            release_references: release_references_thunk::<T>,
        }
    }
}

fn enum_references_thunk<T: GcParticipant + Any>(object: &dyn Any, visitor: &mut GcVisitor) {
    if let Some(object) = object.downcast_ref::<T>() {
        object.enum_references(visitor);
    }
}

fn release_references_thunk<T: GcParticipant + Any>(object: &mut dyn Any) {
    if let Some(object) = object.downcast_mut::<T>() {
        object.release_references();
    }
}

/// Statistics from a collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStatistics {
    /// Objects tracked by the collector when the pass started
    pub tracked: usize,
    /// Tracked objects found to be referenced from outside the tracked set
    pub roots: usize,
    /// Objects destroyed as cyclic garbage in this pass
    pub destroyed: usize,
}

/// Detect cyclic garbage and remove it from the heap.
///
/// The returned objects are no longer reachable through any handle; the
/// caller severs and drops them after releasing its borrow of the heap, since
/// severing can release further objects.
pub(crate) fn detect_garbage(heap: &mut ObjectHeap) -> (GcStatistics, Vec<FreedObject>) {
    let tracked = heap.gc_handles();
    let tracked_set: FxHashSet<ObjectHandle> = tracked.iter().copied().collect();

    let mut internal_refs: FxHashMap<ObjectHandle, u32> = FxHashMap::default();
    let mut edges: FxHashMap<ObjectHandle, Vec<ObjectHandle>> = FxHashMap::default();
    let mut busy: FxHashSet<ObjectHandle> = FxHashSet::default();

    for &handle in &tracked {
        let mut visitor = GcVisitor::new();
        if !heap.enum_references(handle, &mut visitor) {
            busy.insert(handle);
            continue;
        }
        let targets: Vec<ObjectHandle> = visitor
            .into_handles()
            .into_iter()
            .filter(|target| tracked_set.contains(target))
            .collect();
        for target in &targets {
            *internal_refs.entry(*target).or_default() += 1;
        }
        edges.insert(handle, targets);
    }

    let mut live: FxHashSet<ObjectHandle> = FxHashSet::default();
    let mut queue: VecDeque<ObjectHandle> = tracked
        .iter()
        .copied()
        .filter(|handle| {
            let internal = internal_refs.get(handle).copied().unwrap_or(0);
            busy.contains(handle) || heap.ref_count(*handle).unwrap_or(0) > internal
        })
        .collect();
    let roots = queue.len();

    while let Some(handle) = queue.pop_front() {
        if !live.insert(handle) {
            continue;
        }
        if let Some(targets) = edges.get(&handle) {
            queue.extend(targets.iter().copied().filter(|t| !live.contains(t)));
        }
    }

    let garbage: Vec<FreedObject> = tracked
        .iter()
        .filter(|handle| !live.contains(handle))
        .filter_map(|handle| heap.take(*handle))
        .collect();

    let stats = GcStatistics {
        tracked: tracked.len(),
        roots,
        destroyed: garbage.len(),
    };
    (stats, garbage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeHash;

    /// Test node holding raw handles; the heap refcount is managed by hand.
    struct Node {
        links: Vec<ObjectHandle>,
    }

    impl GcParticipant for Node {
        fn enum_references(&self, visitor: &mut GcVisitor) {
            for link in &self.links {
                visitor.visit(*link);
            }
        }

        fn release_references(&mut self) {
            self.links.clear();
        }
    }

    fn node_type() -> TypeHash {
        TypeHash::from_name("Node")
    }

    fn link(heap: &ObjectHeap, from: ObjectHandle, to: ObjectHandle) {
        let cell = heap.cell(from).unwrap();
        let mut value = cell.write().unwrap();
        value.downcast_mut::<Node>().unwrap().links.push(to);
    }

    #[test]
    fn visitor_collects_in_order() {
        let mut heap = ObjectHeap::new();
        let a = heap.allocate(1i32, TypeHash::from_name("int"));
        let b = heap.allocate(2i32, TypeHash::from_name("int"));
        let mut visitor = GcVisitor::new();
        visitor.visit(a);
        visitor.visit(b);
        assert_eq!(visitor.handles(), &[a, b]);
        assert_eq!(visitor.len(), 2);
    }

    #[test]
    fn externally_referenced_object_is_live() {
        let mut heap = ObjectHeap::new();
        let a = heap.allocate_gc(Node { links: vec![] }, node_type());

        let (stats, garbage) = detect_garbage(&mut heap);
        assert_eq!(stats.tracked, 1);
        assert_eq!(stats.roots, 1);
        assert!(garbage.is_empty());
        assert!(heap.is_alive(a));
    }

    #[test]
    fn unreachable_cycle_is_collected() {
        let mut heap = ObjectHeap::new();
        let a = heap.allocate_gc(Node { links: vec![] }, node_type());
        let b = heap.allocate_gc(Node { links: vec![a] }, node_type());
        link(&heap, a, b);
        // Each node holds the only reference to the other.

        let (stats, mut garbage) = detect_garbage(&mut heap);
        assert_eq!(stats.destroyed, 2);
        assert_eq!(stats.roots, 0);
        assert!(!heap.is_alive(a));
        assert!(!heap.is_alive(b));

        for object in &mut garbage {
            object.release_references();
            let value = object.value.read().unwrap();
            assert!(value.downcast_ref::<Node>().unwrap().links.is_empty());
        }
    }

    #[test]
    fn cycle_reachable_from_root_survives() {
        let mut heap = ObjectHeap::new();
        let a = heap.allocate_gc(Node { links: vec![] }, node_type());
        let b = heap.allocate_gc(Node { links: vec![a] }, node_type());
        link(&heap, a, b);
        // An extra reference from outside the tracked set.
        heap.add_ref(a);

        let (stats, garbage) = detect_garbage(&mut heap);
        assert_eq!(stats.roots, 1);
        assert!(garbage.is_empty());
        assert!(heap.is_alive(a));
        assert!(heap.is_alive(b));
    }

    #[test]
    fn object_borrowed_for_writing_is_kept() {
        let mut heap = ObjectHeap::new();
        let a = heap.allocate_gc(Node { links: vec![] }, node_type());
        let b = heap.allocate_gc(Node { links: vec![a] }, node_type());
        link(&heap, a, b);

        let cell = heap.cell(a).unwrap();
        let borrowed = cell.write().unwrap();
        // `a` cannot be read, so `b` looks externally held as well.
        let (stats, garbage) = detect_garbage(&mut heap);
        assert_eq!(stats.roots, 2);
        assert!(garbage.is_empty());
        drop(borrowed);

        let (stats, garbage) = detect_garbage(&mut heap);
        assert_eq!(stats.destroyed, 2);
        assert_eq!(garbage.len(), 2);
    }

    #[test]
    fn option_and_vec_forward_to_items() {
        let mut heap = ObjectHeap::new();
        let a = heap.allocate(1i32, TypeHash::from_name("int"));
        let mut nodes = vec![Node { links: vec![a] }, Node { links: vec![a, a] }];
        let mut visitor = GcVisitor::new();
        nodes.enum_references(&mut visitor);
        assert_eq!(visitor.len(), 3);

        nodes.release_references();
        let mut visitor = GcVisitor::new();
        nodes.enum_references(&mut visitor);
        assert!(visitor.is_empty());

        let mut maybe: Option<Node> = None;
        maybe.release_references();
        let mut visitor = GcVisitor::new();
        maybe.enum_references(&mut visitor);
        assert!(visitor.is_empty());
    }
}
