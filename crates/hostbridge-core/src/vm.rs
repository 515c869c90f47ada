//! The script virtual machine: heap, types, native event queue, collector.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, trace};

use crate::TypeHash;
use crate::context::ScriptContext;
use crate::error::{NativeError, RuntimeError};
use crate::object_ref::ObjectRef;
use crate::promise::ScriptPromise;
use crate::runtime::{
    CallContext, Dynamic, GcParticipant, GcStatistics, NativeFn, ObjectCell, ObjectHandle,
    ObjectHeap, ScriptFunction, detect_garbage,
};
use crate::types::{FUNCTION_TYPE, PROMISE_TYPE, TypeInfo, TypeRegistry};

/// Work queued for the thread that drains the VM's event queue.
pub type QueuedEvent = Box<dyn FnOnce() + Send>;

/// Tunables fixed at VM creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmProperties {
    /// Maximum nesting of calls on one context
    pub max_call_depth: usize,
    /// GC-tracked allocations between automatic collections (0 disables)
    pub auto_gc_threshold: usize,
    /// Initial capacity of a call's argument stack
    pub initial_arg_capacity: usize,
}

impl Default for VmProperties {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            auto_gc_threshold: 1024,
            initial_arg_capacity: 8,
        }
    }
}

/// The script VM.
///
/// Shared as `Arc<ScriptVm>`. Heap bookkeeping is serialized by a mutex that
/// is never held while caller code runs: function bodies and object borrows
/// work on a cell cloned out of the heap, so they may call back into the VM.
/// Freed objects are dropped after the heap has been let go.
pub struct ScriptVm {
    properties: VmProperties,
    heap: Mutex<ObjectHeap>,
    types: RwLock<TypeRegistry>,
    events: Mutex<VecDeque<QueuedEvent>>,
    gc_allocations: AtomicUsize,
    total_collected: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptVm {
    pub fn new() -> Arc<Self> {
        Self::with_properties(VmProperties::default())
    }

    pub fn with_properties(properties: VmProperties) -> Arc<Self> {
        Arc::new(Self {
            properties,
            heap: Mutex::new(ObjectHeap::new()),
            types: RwLock::new(TypeRegistry::new()),
            events: Mutex::new(VecDeque::new()),
            gc_allocations: AtomicUsize::new(0),
            total_collected: AtomicU64::new(0),
        })
    }

    pub fn properties(&self) -> &VmProperties {
        &self.properties
    }

    /// Create a new execution context bound to this VM.
    ///
    /// The context becomes current for a thread once entered.
    pub fn request_context(self: &Arc<Self>) -> ScriptContext {
        ScriptContext::new(Arc::clone(self))
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    pub fn register_type(&self, info: TypeInfo) -> Result<TypeHash, RuntimeError> {
        let hash = self
            .types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(info)?;
        Ok(hash)
    }

    pub fn type_info(&self, hash: TypeHash) -> Option<TypeInfo> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .cloned()
    }

    /// Check whether `hash` is `target` or derives from it.
    pub fn is_derived_from(&self, hash: TypeHash, target: TypeHash) -> bool {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_derived_from(hash, target)
    }

    fn ensure_registered(&self, hash: TypeHash) -> Result<(), RuntimeError> {
        match self.type_info(hash) {
            Some(_) => Ok(()),
            None => Err(RuntimeError::UnknownType { type_hash: hash }),
        }
    }

    // ------------------------------------------------------------------
    // Heap
    // ------------------------------------------------------------------

    /// Run `f` with the heap locked. `f` must not call back into the VM.
    fn with_heap<R>(&self, f: impl FnOnce(&mut ObjectHeap) -> R) -> R {
        f(&mut lock(&self.heap))
    }

    fn object_cell(&self, handle: ObjectHandle) -> Option<ObjectCell> {
        self.with_heap(|heap| heap.cell(handle))
    }

    /// Allocate a reference-type object. The returned reference is the only one.
    pub fn allocate<T: Any + Send + Sync>(
        self: &Arc<Self>,
        value: T,
        type_hash: TypeHash,
    ) -> Result<ObjectRef, RuntimeError> {
        self.ensure_registered(type_hash)?;
        let handle = self.with_heap(|heap| heap.allocate(value, type_hash));
        Ok(ObjectRef::adopt(self, handle))
    }

    /// Allocate an object tracked by the cycle collector.
    pub fn allocate_gc<T>(
        self: &Arc<Self>,
        value: T,
        type_hash: TypeHash,
    ) -> Result<ObjectRef, RuntimeError>
    where
        T: GcParticipant + Any + Send + Sync,
    {
        self.ensure_registered(type_hash)?;
        let handle = self.with_heap(|heap| heap.allocate_gc(value, type_hash));
        let threshold = self.properties.auto_gc_threshold;
        if threshold > 0 && self.gc_allocations.fetch_add(1, Ordering::Relaxed) + 1 >= threshold {
            self.gc_allocations.store(0, Ordering::Relaxed);
            self.collect_garbage();
        }
        Ok(ObjectRef::adopt(self, handle))
    }

    pub fn add_ref(&self, handle: ObjectHandle) -> bool {
        self.with_heap(|heap| heap.add_ref(handle))
    }

    /// Give back one reference. Releasing a stale handle is a no-op.
    pub fn release(&self, handle: ObjectHandle) {
        // Dropping the freed object may release more references.
        let freed = self.with_heap(|heap| heap.release(handle));
        drop(freed);
    }

    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        self.with_heap(|heap| heap.ref_count(handle))
    }

    pub fn is_alive(&self, handle: ObjectHandle) -> bool {
        self.with_heap(|heap| heap.is_alive(handle))
    }

    /// Number of live heap objects.
    pub fn live_objects(&self) -> usize {
        self.with_heap(|heap| heap.live_count())
    }

    /// Borrow a live object as `T`.
    ///
    /// The heap is not locked while `f` runs, so `f` may clone references,
    /// fire callbacks held by the object, or call into script. Borrowing the
    /// same object mutably from inside `f` blocks.
    pub fn with_object<T: Any, R>(&self, handle: ObjectHandle, f: impl FnOnce(&T) -> R) -> Option<R> {
        let cell = self.object_cell(handle)?;
        let object = cell.read().unwrap_or_else(PoisonError::into_inner);
        object.downcast_ref::<T>().map(f)
    }

    /// Mutably borrow a live object as `T`.
    ///
    /// Like [`with_object`](Self::with_object), the heap is free while `f`
    /// runs. Any other borrow of the same object waits for `f` to return.
    pub fn with_object_mut<T: Any, R>(
        &self,
        handle: ObjectHandle,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let cell = self.object_cell(handle)?;
        let mut object = cell.write().unwrap_or_else(PoisonError::into_inner);
        object.downcast_mut::<T>().map(f)
    }

    /// Polymorphic reference cast.
    ///
    /// Succeeds when the object's type is `target` or derives from it, and
    /// returns a new strong reference. A stale handle casts to None.
    pub fn ref_cast(self: &Arc<Self>, handle: ObjectHandle, target: TypeHash) -> Option<ObjectRef> {
        let actual = self.with_heap(|heap| heap.type_of(handle))?;
        if !self.is_derived_from(actual, target) {
            return None;
        }
        ObjectRef::acquire(self, handle)
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    /// Create a script function object.
    pub fn create_function<F>(self: &Arc<Self>, name: &str, body: F) -> ObjectRef
    where
        F: Fn(&mut CallContext) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        let function = ScriptFunction::new(name, NativeFn::new(TypeHash::from_function(name, &[]), body));
        let handle = self.with_heap(|heap| heap.allocate(function, TypeHash::from_name(FUNCTION_TYPE)));
        ObjectRef::adopt(self, handle)
    }

    /// Forcibly destroy a function, as when its module is discarded.
    ///
    /// Every handle to it becomes permanently stale.
    pub fn discard_function(&self, handle: ObjectHandle) -> bool {
        let function_type = TypeHash::from_name(FUNCTION_TYPE);
        let freed = self.with_heap(|heap| {
            if heap.type_of(handle) == Some(function_type) {
                heap.take(handle)
            } else {
                None
            }
        });
        freed.is_some()
    }

    pub fn function_name(&self, handle: ObjectHandle) -> Option<String> {
        self.with_object::<ScriptFunction, _>(handle, |f| f.name().to_owned())
    }

    /// Run a function with the given arguments and return its result.
    ///
    /// The body runs on a clone of the function, with the heap unlocked.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call_function(
        self: &Arc<Self>,
        handle: ObjectHandle,
        mut args: Vec<Dynamic>,
    ) -> Result<Dynamic, RuntimeError> {
        let function = self
            .with_object::<ScriptFunction, _>(handle, ScriptFunction::clone)
            .ok_or_else(|| match self.with_heap(|heap| heap.type_of(handle)) {
                Some(type_hash) => RuntimeError::NotCallable { type_hash },
                None => RuntimeError::StaleHandle {
                    index: handle.index,
                },
            })?;
        trace!(function = function.name(), args = args.len(), "calling script function");
        let mut ret = Dynamic::Void;
        let mut ctx = CallContext::new(&mut args, &mut ret, self);
        function
            .body()
            .call(&mut ctx)
            .map_err(|source| RuntimeError::Exception {
                function: function.name().to_owned(),
                source,
            })?;
        Ok(ret)
    }

    // ------------------------------------------------------------------
    // Promises
    // ------------------------------------------------------------------

    /// Create a pending script promise on the heap.
    pub fn create_promise(self: &Arc<Self>) -> (ObjectRef, ScriptPromise) {
        let promise = ScriptPromise::new();
        let stored = promise.clone();
        let handle = self.with_heap(|heap| heap.allocate(stored, TypeHash::from_name(PROMISE_TYPE)));
        (ObjectRef::adopt(self, handle), promise)
    }

    /// Look up the promise behind a handle.
    pub fn promise(&self, handle: ObjectHandle) -> Option<ScriptPromise> {
        self.with_object::<ScriptPromise, _>(handle, ScriptPromise::clone)
    }

    // ------------------------------------------------------------------
    // Native event queue
    // ------------------------------------------------------------------

    /// Queue work for the thread that next drains the event queue.
    pub fn enqueue_event<F>(&self, event: F)
    where
        F: FnOnce() + Send + 'static,
    {
        lock(&self.events).push_back(Box::new(event));
    }

    pub fn pending_events(&self) -> usize {
        lock(&self.events).len()
    }

    /// Run every event queued before this call. Returns how many ran.
    ///
    /// Events queued while draining wait for the next call.
    pub fn dispatch_events(&self) -> usize {
        let batch = std::mem::take(&mut *lock(&self.events));
        let count = batch.len();
        for event in batch {
            event();
        }
        if count > 0 {
            trace!(count, "dispatched native events");
        }
        count
    }

    // ------------------------------------------------------------------
    // Collector
    // ------------------------------------------------------------------

    /// Run a full cycle-collection pass.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn collect_garbage(&self) -> GcStatistics {
        let (stats, mut garbage) = {
            let mut heap = lock(&self.heap);
            detect_garbage(&mut heap)
        };
        for object in &mut garbage {
            object.release_references();
        }
        drop(garbage);

        self.total_collected
            .fetch_add(stats.destroyed as u64, Ordering::Relaxed);
        debug!(
            tracked = stats.tracked,
            roots = stats.roots,
            destroyed = stats.destroyed,
            "garbage collection pass"
        );
        stats
    }

    /// Objects destroyed as cyclic garbage over the VM's lifetime.
    pub fn total_collected(&self) -> u64 {
        self.total_collected.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ScriptVm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptVm")
            .field("properties", &self.properties)
            .field("heap", &*lock(&self.heap))
            .field("pending_events", &self.pending_events())
            .finish()
    }
}
