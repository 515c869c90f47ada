//! Integration tests for spatial queries driven by script callbacks.

use hostbridge::prelude::*;
use std::sync::{Arc, Mutex};

/// Linear index over a handful of boxes.
struct FlatIndex {
    items: Vec<(u64, BoundingBox)>,
}

impl SpatialIndex for FlatIndex {
    fn query(
        &self,
        overlaps: &mut dyn FnMut(&BoundingBox) -> bool,
        on_match: &mut dyn FnMut(u64),
    ) {
        for (id, bounds) in &self.items {
            if overlaps(bounds) {
                on_match(*id);
            }
        }
    }
}

fn index() -> FlatIndex {
    FlatIndex {
        items: vec![
            (1, BoundingBox::new([0.0; 3], [1.0; 3])),
            (2, BoundingBox::new([5.0; 3], [6.0; 3])),
            (3, BoundingBox::from_center([0.5; 3], [2.0; 3])),
        ],
    }
}

#[test]
fn test_query_uses_script_predicate_and_callback() {
    let vm = ScriptVm::new();
    let region = BoundingBox::new([-1.0; 3], [2.0; 3]);
    let overlap = vm.create_function("overlaps", move |ctx| {
        let bounds = ctx.arg_native::<BoundingBox>(0)?;
        let hit = bounds.intersects(&region);
        ctx.set_return(hit);
        Ok(())
    });
    let found = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&found);
    let on_match = vm.create_function("on_match", move |ctx| {
        sink.lock().unwrap().push(ctx.arg::<u64>(0)?);
        Ok(())
    });
    let overlap = FunctionDelegate::from(ScriptCallable::new(overlap).unwrap());
    let on_match = FunctionDelegate::from(ScriptCallable::new(on_match).unwrap());

    let context = vm.request_context();
    let _guard = context.enter();
    let matches = query_index(&index(), &overlap, &on_match);

    assert_eq!(matches, 2);
    assert_eq!(*found.lock().unwrap(), vec![1, 3]);
}

#[test]
fn test_predicate_failure_counts_as_no_overlap() {
    let vm = ScriptVm::new();
    let overlap = vm.create_function("overlaps", |ctx| {
        ctx.set_return("yes");
        Ok(())
    });
    let overlap = FunctionDelegate::from(ScriptCallable::new(overlap).unwrap());

    let context = vm.request_context();
    let _guard = context.enter();
    assert_eq!(query_index(&index(), &overlap, &FunctionDelegate::empty()), 0);
}
