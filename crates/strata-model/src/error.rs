//! Code model errors

use crate::node::NodeId;
use thiserror::Error;

/// Errors that can occur while reading, editing, copying, or merging the code model.
///
/// Lookup misses (unknown names, absent property links) are never errors; they are
/// reported as `None` by the respective accessors.
#[derive(Debug, Error)]
pub enum CodeError {
    /// A mutator was invoked on a node that has been frozen
    #[error("Cannot modify immutable node {path}")]
    ImmutableState {
        /// Path of the frozen node
        path: String,
    },

    /// A reflective descriptor does not belong to its expected logical parent
    #[error("Identity mismatch: expected {expected}, found {actual}")]
    IdentityMismatch {
        /// The container the node was attached to
        expected: String,
        /// The container declared by the descriptor
        actual: String,
    },

    /// Two collections cannot be combined because their shapes differ
    #[error("Unsupported merge: {reason}")]
    UnsupportedMerge {
        /// Why the collections are incompatible
        reason: String,
    },

    /// An operation was applied to a node of the wrong kind
    #[error("Node {id} is not a {expected}")]
    KindMismatch {
        /// The offending node
        id: NodeId,
        /// The kind the operation requires
        expected: &'static str,
    },

    /// A member with the same name or signature already exists in the destination
    #[error("Duplicate member: {name}")]
    DuplicateMember {
        /// Name or signature of the duplicate
        name: String,
    },

    /// The source origin of a type could not be read
    #[error("Failed to load source of {name}: {message}")]
    Source {
        /// Qualified name of the requested type
        name: String,
        /// Underlying failure
        message: String,
    },

    /// Reflective descriptors could not be decoded
    #[error("Invalid descriptor data: {0}")]
    Descriptor(#[from] serde_json::Error),

    /// Configuration could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration was parsed but is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Character source or text sink failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the code model.
pub type CodeResult<T> = Result<T, CodeError>;

impl CodeError {
    /// Create a kind mismatch error.
    pub fn kind_mismatch(id: NodeId, expected: &'static str) -> Self {
        CodeError::KindMismatch { id, expected }
    }

    /// Check whether this error signals a write to a frozen node.
    pub fn is_immutable_state(&self) -> bool {
        matches!(self, CodeError::ImmutableState { .. })
    }
}
