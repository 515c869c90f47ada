//! Integration tests for initiator bindings: casts and the exactly-once
//! release guarantee.

use hostbridge::prelude::*;
use std::sync::Arc;

struct Types {
    component: TypeHash,
    camera: TypeHash,
    light: TypeHash,
}

fn register(vm: &Arc<ScriptVm>) -> Types {
    let component = vm.register_type(TypeInfo::reference("Component")).unwrap();
    let camera = vm
        .register_type(TypeInfo::reference("Camera").with_base(component))
        .unwrap();
    let light = vm
        .register_type(TypeInfo::reference("Light").with_base(component))
        .unwrap();
    Types {
        component,
        camera,
        light,
    }
}

// =============================================================================
// Retrieval
// =============================================================================

#[test]
fn test_retrieve_handle_round_trip() {
    let vm = ScriptVm::new();
    let types = register(&vm);
    let camera = vm.allocate(String::from("main"), types.camera).unwrap();
    let binding = InitiatorBinding::new(Some(&vm), &Dynamic::Object(camera.handle())).unwrap();

    let exact = binding.retrieve(RetrieveTarget::Handle(types.camera)).unwrap();
    assert_eq!(exact, camera);
    let base = binding.retrieve(RetrieveTarget::Handle(types.component)).unwrap();
    assert_eq!(base.handle(), camera.handle());
    assert!(binding.retrieve(RetrieveTarget::Handle(types.light)).is_none());
    assert_eq!(binding.type_info().map(|t| t.name.as_str()), Some("Camera"));
}

#[test]
fn test_retrieve_value_requires_exact_type() {
    let vm = ScriptVm::new();
    let types = register(&vm);
    let camera = vm.allocate(0u32, types.camera).unwrap();
    let binding = InitiatorBinding::new(Some(&vm), &Dynamic::Object(camera.handle())).unwrap();

    assert!(binding.retrieve(RetrieveTarget::Value(types.camera)).is_some());
    assert!(binding.retrieve(RetrieveTarget::Value(types.component)).is_none());
}

#[test]
fn test_retrieved_references_are_counted() {
    let vm = ScriptVm::new();
    let types = register(&vm);
    let camera = vm.allocate(0u32, types.camera).unwrap();
    let handle = camera.handle();
    let binding = InitiatorBinding::new(Some(&vm), &Dynamic::Object(handle)).unwrap();
    assert_eq!(vm.ref_count(handle), Some(2));

    let retrieved = binding.retrieve(RetrieveTarget::Handle(types.camera)).unwrap();
    assert_eq!(vm.ref_count(handle), Some(3));
    drop(retrieved);
    assert_eq!(vm.ref_count(handle), Some(2));
}

#[test]
fn test_retrieve_after_vm_teardown_is_none() {
    let vm = ScriptVm::new();
    let types = register(&vm);
    let camera = vm.allocate(0u32, types.camera).unwrap();
    let binding = InitiatorBinding::new(Some(&vm), &Dynamic::Object(camera.handle())).unwrap();
    drop(camera);
    drop(vm);
    assert!(binding.retrieve(RetrieveTarget::Handle(types.camera)).is_none());
    drop(binding);
}

#[test]
fn test_application_exposes_initiator() {
    let vm = ScriptVm::new();
    let types = register(&vm);
    let camera = vm.allocate(0u32, types.camera).unwrap();
    let app = ApplicationBridge::new(
        ApplicationDesc::new()
            .with_scripting(&vm)
            .with_initiator(Dynamic::Object(camera.handle())),
    );
    assert!(app.initiator_error().is_none());
    assert_eq!(app.retrieve(RetrieveTarget::Handle(types.component)), Some(camera));
}

// =============================================================================
// Exactly-once release
// =============================================================================

#[test]
fn test_n_bindings_release_exactly_n_references() {
    let vm = ScriptVm::new();
    let types = register(&vm);
    let camera = vm.allocate(0u32, types.camera).unwrap();
    let handle = camera.handle();

    const N: u32 = 16;
    let mut bindings: Vec<InitiatorBinding> = (0..N)
        .map(|_| InitiatorBinding::new(Some(&vm), &Dynamic::Object(handle)).unwrap())
        .collect();
    assert_eq!(vm.ref_count(handle), Some(N + 1));

    // Release half explicitly; every binding is dropped afterwards.
    for binding in bindings.iter_mut().step_by(2) {
        binding.release();
    }
    assert_eq!(vm.ref_count(handle), Some(N / 2 + 1));
    drop(bindings);
    assert_eq!(vm.ref_count(handle), Some(1));

    drop(camera);
    assert!(!vm.is_alive(handle));
}

#[test]
fn test_application_releases_initiator_once() {
    let vm = ScriptVm::new();
    let types = register(&vm);
    let light = vm.allocate(0u32, types.light).unwrap();
    let handle = light.handle();

    let mut app = ApplicationBridge::new(
        ApplicationDesc::new()
            .with_scripting(&vm)
            .with_initiator(Dynamic::Object(handle)),
    );
    assert_eq!(vm.ref_count(handle), Some(2));
    app.release();
    app.release();
    drop(app);
    assert_eq!(vm.ref_count(handle), Some(1));
}

#[test]
fn test_empty_initiator_touches_nothing() {
    let vm = ScriptVm::new();
    let app = ApplicationBridge::new(
        ApplicationDesc::new()
            .with_scripting(&vm)
            .with_initiator(Dynamic::NullHandle),
    );
    assert!(app.initiator().is_empty());
    assert!(app.initiator_error().is_none());
    assert_eq!(vm.live_objects(), 0);
}
