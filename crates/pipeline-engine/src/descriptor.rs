//! Algorithm descriptor trait and metadata types
//!
//! Node implementations describe their ports and category through
//! [`AlgorithmMetadata`]. The metadata is the single source of truth for slot
//! counts, required inputs, accepted input kinds and output counts; the
//! executive and the description validator both read it.

use serde::{Deserialize, Serialize};

use crate::data::DataKind;

/// Category of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Zero-input producers (readers, procedural sources)
    Source,
    /// Transforms from inputs to outputs
    Filter,
    /// Terminal consumers
    Sink,
}

/// Trait for algorithms with static metadata
///
/// Implementing this allows the registry to list a node type without
/// constructing it.
pub trait AlgorithmDescriptor {
    /// Get the static metadata for this node type
    fn descriptor() -> AlgorithmMetadata
    where
        Self: Sized;
}

/// Complete metadata for a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmMetadata {
    /// Unique type identifier (e.g., "threshold")
    pub node_type: String,
    /// Category for grouping
    pub category: NodeCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the node does
    pub description: String,
    /// Input slot definitions, in slot order
    pub inputs: Vec<PortMetadata>,
    /// Output port definitions, in port order
    pub outputs: Vec<PortMetadata>,
}

impl AlgorithmMetadata {
    /// Metadata with no ports
    pub fn new(
        node_type: impl Into<String>,
        category: NodeCategory,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            category,
            label: label.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Append an input slot
    pub fn input(mut self, port: PortMetadata) -> Self {
        self.inputs.push(port);
        self
    }

    /// Append an output port
    pub fn output(mut self, port: PortMetadata) -> Self {
        self.outputs.push(port);
        self
    }
}

/// Metadata for an input slot or output port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMetadata {
    /// Port identifier
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Data kinds accepted (inputs) or produced (outputs); empty means any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<DataKind>,
    /// Whether this input must be connected
    pub required: bool,
    /// Whether this input accepts repeatable connections
    pub multiple: bool,
}

impl PortMetadata {
    /// Create a new port metadata
    pub fn new(id: impl Into<String>, label: impl Into<String>, required: bool, multiple: bool) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kinds: Vec::new(),
            required,
            multiple,
        }
    }

    /// Create a required port
    pub fn required(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, true, false)
    }

    /// Create an optional port
    pub fn optional(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, false, false)
    }

    /// Set this port to accept multiple connections
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Restrict the data kinds this port accepts or produces
    pub fn accepting(mut self, kinds: &[DataKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    /// Whether a data kind is acceptable on this port
    pub fn accepts(&self, kind: DataKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}
