//! Error types for the script runtime.
//!
//! ```text
//! RuntimeError (VM-level failures)
//! └── NativeError   - raised by a function body
//!     └── ConversionError - Dynamic <-> Rust value conversion
//! ```

use thiserror::Error;

use crate::TypeHash;

/// Errors that can occur when converting between Rust and script values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Type mismatch during conversion
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Attempted to convert a null handle to a non-nullable type
    #[error("null handle cannot be converted to {target_type}")]
    NullHandle { target_type: &'static str },

    /// Integer overflow during conversion
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow { value: i64, target_type: &'static str },
}

/// Errors raised by a function body while it runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Error converting arguments or return values
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Argument index out of bounds
    #[error("argument index {index} out of bounds (function has {count} arguments)")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    /// Stale object handle (object was freed)
    #[error("stale object handle: object at index {index} has been freed")]
    StaleHandle { index: u32 },

    /// Script-level exception raised by the body
    #[error("{message}")]
    Exception { message: String },
}

impl NativeError {
    /// Create a script exception with a message.
    pub fn exception(message: impl Into<String>) -> Self {
        NativeError::Exception {
            message: message.into(),
        }
    }
}

/// Errors reported by the VM itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// The handle does not refer to a live object
    #[error("stale object handle at index {index}")]
    StaleHandle { index: u32 },

    /// The handle refers to a live object that is not a function
    #[error("object of type {type_hash} is not callable")]
    NotCallable { type_hash: TypeHash },

    /// A type hash was used that was never registered
    #[error("unknown type {type_hash}")]
    UnknownType { type_hash: TypeHash },

    /// A type was registered twice
    #[error("type '{name}' is already registered")]
    DuplicateType { name: String },

    /// Nested calls exceeded the configured depth
    #[error("call depth limit of {limit} exceeded")]
    CallDepthExceeded { limit: usize },

    /// The function body raised an error
    #[error("exception in '{function}': {source}")]
    Exception {
        function: String,
        #[source]
        source: NativeError,
    },
}
