//! Script-visible type descriptors.

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::TypeHash;
use crate::error::RuntimeError;

bitflags! {
    /// Behaviour flags of a registered type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u32 {
        /// Reference type: lives on the heap, passed by handle
        const REF = 1 << 0;
        /// Instances may hold script handles and are tracked by the collector
        const GC = 1 << 1;
        /// Script function objects
        const FUNCTION = 1 << 2;
        /// Script-side futures
        const PROMISE = 1 << 3;
    }
}

/// Descriptor of a script-visible type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub hash: TypeHash,
    pub name: String,
    pub flags: TypeFlags,
    /// Base type for polymorphic reference casts
    pub base: Option<TypeHash>,
}

impl TypeInfo {
    /// A reference type with the given name.
    pub fn reference(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_name(&name),
            name,
            flags: TypeFlags::REF,
            base: None,
        }
    }

    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_base(mut self, base: TypeHash) -> Self {
        self.base = Some(base);
        self
    }
}

/// Name of the built-in function type.
pub const FUNCTION_TYPE: &str = "function";

/// Name of the built-in script future type.
pub const PROMISE_TYPE: &str = "promise";

/// Registry of script-visible types keyed by hash.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: FxHashMap<TypeHash, TypeInfo>,
}

impl TypeRegistry {
    /// A registry with the built-in function and promise types.
    pub fn new() -> Self {
        let mut registry = Self::default();
        for info in [
            TypeInfo::reference(FUNCTION_TYPE).with_flags(TypeFlags::FUNCTION),
            TypeInfo::reference(PROMISE_TYPE).with_flags(TypeFlags::PROMISE),
        ] {
            registry.types.insert(info.hash, info);
        }
        registry
    }

    pub fn register(&mut self, info: TypeInfo) -> Result<TypeHash, RuntimeError> {
        if self.types.contains_key(&info.hash) {
            return Err(RuntimeError::DuplicateType { name: info.name });
        }
        if let Some(base) = info.base
            && !self.types.contains_key(&base)
        {
            return Err(RuntimeError::UnknownType { type_hash: base });
        }
        let hash = info.hash;
        self.types.insert(hash, info);
        Ok(hash)
    }

    pub fn get(&self, hash: TypeHash) -> Option<&TypeInfo> {
        self.types.get(&hash)
    }

    /// Check whether `hash` is `target` or derives from it.
    pub fn is_derived_from(&self, hash: TypeHash, target: TypeHash) -> bool {
        let mut current = Some(hash);
        while let Some(candidate) = current {
            if candidate == target {
                return true;
            }
            current = self.types.get(&candidate).and_then(|info| info.base);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = TypeRegistry::new();
        let function = registry.get(TypeHash::from_name(FUNCTION_TYPE)).unwrap();
        assert!(function.flags.contains(TypeFlags::FUNCTION));
        assert!(function.flags.contains(TypeFlags::REF));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = TypeRegistry::new();
        registry.register(TypeInfo::reference("Scene")).unwrap();
        assert!(matches!(
            registry.register(TypeInfo::reference("Scene")),
            Err(RuntimeError::DuplicateType { .. })
        ));
    }

    #[test]
    fn unknown_base_is_rejected() {
        let mut registry = TypeRegistry::new();
        let result =
            registry.register(TypeInfo::reference("Texture2D").with_base(TypeHash::from_name("Texture")));
        assert!(matches!(result, Err(RuntimeError::UnknownType { .. })));
    }

    #[test]
    fn derivation_walks_base_chain() {
        let mut registry = TypeRegistry::new();
        let component = registry.register(TypeInfo::reference("Component")).unwrap();
        let renderer = registry
            .register(TypeInfo::reference("Renderer").with_base(component))
            .unwrap();
        let model = registry
            .register(TypeInfo::reference("ModelRenderer").with_base(renderer))
            .unwrap();
        let unrelated = registry.register(TypeInfo::reference("Scene")).unwrap();

        assert!(registry.is_derived_from(model, component));
        assert!(registry.is_derived_from(model, model));
        assert!(!registry.is_derived_from(component, model));
        assert!(!registry.is_derived_from(model, unrelated));
    }
}
