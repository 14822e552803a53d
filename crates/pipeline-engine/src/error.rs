//! Error types for the pipeline engine

use thiserror::Error;

/// Result type alias using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or executing a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An attribute array with the same name and association already exists
    #[error("Duplicate array name '{name}' in {association} data")]
    DuplicateName { name: String, association: String },

    /// A required input is missing, has an incompatible type, or lacks a named array
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Connecting the edge would create a cycle
    #[error("Connecting '{producer}' to '{consumer}' would create a cycle")]
    Cycle { producer: String, consumer: String },

    /// Numerically undefined operation (distinct from an empty result)
    #[error("Computation failed: {0}")]
    Computation(String),

    /// Attempt to mutate array storage published by the pipeline
    #[error("Array '{0}' is read-only")]
    ReadOnly(String),

    /// Node not present in the pipeline
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A node with this id is already present in the pipeline
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    /// Node type not present in the registry
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Port or slot index out of range
    #[error("Invalid port {index} on node '{node_id}'")]
    InvalidPort { node_id: String, index: usize },

    /// Pipeline description failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create an invalid input error with a message
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a computation error with a message
    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }

    /// Whether this error came from an `execute` step rather than graph wiring
    pub fn is_execution_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::Computation(_) | Self::ReadOnly(_)
        )
    }
}
