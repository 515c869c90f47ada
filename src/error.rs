//! Bridge error types.

use hostbridge_core::{RuntimeError, TypeHash};
use thiserror::Error;

/// Errors raised by the bridge layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// The initiator was neither an object handle nor the null sentinel
    #[error("invalid initiator: expected an object handle or null, got {actual}")]
    InvalidInitiator { actual: &'static str },

    /// The object behind a callable is not a script function
    #[error("object of type {type_hash} is not a script function")]
    NotCallable { type_hash: TypeHash },

    /// No script VM is bound and no context is current
    #[error("no script VM available")]
    NoVm,

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Errors raised while loading content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// No processor is registered for the requested type
    #[error("no content processor registered for type {type_hash}")]
    NoProcessor { type_hash: TypeHash },

    #[error("content path is empty")]
    EmptyPath,

    /// A processor rejected the content
    #[error("failed to load '{path}': {message}")]
    Load { path: String, message: String },
}

pub type BridgeResult<T> = Result<T, BridgeError>;
