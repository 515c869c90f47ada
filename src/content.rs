//! Content processors and the manager that routes loads to them.

use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use hostbridge_core::TypeHash;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::continuation::{AsyncContinuation, Delivery};
use crate::delegate::FunctionDelegate;
use crate::error::ContentError;
use crate::promise::Promise;

/// Loaded content, shared between the manager's callers.
pub type Content = Arc<dyn Any + Send + Sync>;

/// Turns a content path into a loaded resource of one type.
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn load(&self, path: &str) -> Result<Content, ContentError>;
}

/// The processors every application with content processing starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProcessorKind {
    Asset = 0,
    Material = 1,
    SceneGraph = 2,
    AudioClip = 3,
    Texture = 4,
    Shader = 5,
    Model = 6,
    SkinnedModel = 7,
    SkeletalAnimation = 8,
    Schema = 9,
    NetworkServer = 10,
    PhysicsHull = 11,
}

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 12] = [
        ProcessorKind::Asset,
        ProcessorKind::Material,
        ProcessorKind::SceneGraph,
        ProcessorKind::AudioClip,
        ProcessorKind::Texture,
        ProcessorKind::Shader,
        ProcessorKind::Model,
        ProcessorKind::SkinnedModel,
        ProcessorKind::SkeletalAnimation,
        ProcessorKind::Schema,
        ProcessorKind::NetworkServer,
        ProcessorKind::PhysicsHull,
    ];

    /// Script-visible name of the content type this kind loads.
    pub fn type_name(self) -> &'static str {
        match self {
            ProcessorKind::Asset => "Asset",
            ProcessorKind::Material => "Material",
            ProcessorKind::SceneGraph => "Scene",
            ProcessorKind::AudioClip => "AudioClip",
            ProcessorKind::Texture => "Texture",
            ProcessorKind::Shader => "Shader",
            ProcessorKind::Model => "Model",
            ProcessorKind::SkinnedModel => "SkinnedModel",
            ProcessorKind::SkeletalAnimation => "Animation",
            ProcessorKind::Schema => "Schema",
            ProcessorKind::NetworkServer => "NetworkServer",
            ProcessorKind::PhysicsHull => "PhysicsHull",
        }
    }

    pub fn type_hash(self) -> TypeHash {
        TypeHash::from_name(self.type_name())
    }
}

/// Record of a resource loaded by a [`StandardProcessor`].
///
/// Decoding the format is the engine subsystem's job; the record carries
/// only what is needed to hand the resource to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    pub kind: ProcessorKind,
    pub path: String,
}

/// A processor for one of the standard content kinds.
#[derive(Debug, Clone, Copy)]
pub struct StandardProcessor {
    kind: ProcessorKind,
}

impl StandardProcessor {
    pub fn new(kind: ProcessorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ProcessorKind {
        self.kind
    }
}

impl Processor for StandardProcessor {
    fn name(&self) -> &str {
        self.kind.type_name()
    }

    fn load(&self, path: &str) -> Result<Content, ContentError> {
        if path.ends_with(['/', '\\']) || Path::new(path).file_stem().is_none() {
            return Err(ContentError::Load {
                path: path.to_owned(),
                message: format!("{} content must name a file", self.kind.type_name()),
            });
        }
        Ok(Arc::new(ContentDescriptor {
            kind: self.kind,
            path: path.to_owned(),
        }))
    }
}

/// Routes content loads to the processor registered for each type.
#[derive(Default)]
pub struct ContentManager {
    processors: FxHashMap<TypeHash, Box<dyn Processor>>,
}

impl ContentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager with every [`ProcessorKind`] registered.
    pub fn with_standard_processors() -> Self {
        let mut manager = Self::new();
        for kind in ProcessorKind::ALL {
            manager.add_processor(StandardProcessor::new(kind), kind.type_hash());
        }
        manager
    }

    /// Register `processor` for `type_hash`, returning the one it replaces.
    pub fn add_processor<P>(&mut self, processor: P, type_hash: TypeHash) -> Option<Box<dyn Processor>>
    where
        P: Processor + 'static,
    {
        debug!(processor = processor.name(), %type_hash, "registered content processor");
        self.processors.insert(type_hash, Box::new(processor))
    }

    pub fn processor(&self, type_hash: TypeHash) -> Option<&dyn Processor> {
        self.processors.get(&type_hash).map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Load `path` with the processor for `type_hash`.
    pub fn load(&self, type_hash: TypeHash, path: &str) -> Result<Content, ContentError> {
        if path.is_empty() {
            return Err(ContentError::EmptyPath);
        }
        let processor = self
            .processor(type_hash)
            .ok_or(ContentError::NoProcessor { type_hash })?;
        processor.load(path)
    }

    /// Load `path` and tell the script through `on_loaded` once done.
    ///
    /// `on_loaded(path, success)` is queued on the delegate's VM and runs
    /// at the next event dispatch. The returned promise carries the result.
    pub fn load_deferred(
        &self,
        type_hash: TypeHash,
        path: &str,
        on_loaded: FunctionDelegate,
    ) -> Promise<Result<Content, ContentError>> {
        let promise = Promise::pending();
        let owned_path = path.to_owned();
        AsyncContinuation::attach_with(
            &promise,
            on_loaded,
            Delivery::Queued,
            move |result: &Result<Content, ContentError>, writer| {
                writer.push(owned_path).push(result.is_ok());
            },
        );
        let result = self.load(type_hash, path);
        if let Err(err) = &result {
            warn!(path, error = %err, "deferred content load failed");
        }
        promise.resolve(result);
        promise
    }
}

impl fmt::Debug for ContentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.processors.values().map(|p| p.name()).collect();
        names.sort_unstable();
        f.debug_struct("ContentManager")
            .field("processors", &names)
            .finish()
    }
}
