//! Pipeline description validation
//!
//! Validates edge references, port indices, required connections and node
//! types, and detects cycles. All problems are collected, not just the first.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::description::PipelineDescription;
use crate::error::{PipelineError, Result};
use crate::registry::NodeRegistry;

/// One problem found in a pipeline description
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Some nodes feed back into themselves
    CycleDetected,
    /// Two nodes share an id
    DuplicateNodeId { node_id: String },
    /// The registry does not know the node's type
    UnknownNodeType { node_id: String, node_type: String },
    /// A required input slot has no connection
    UnconnectedRequiredInput { node_id: String, port_id: String },
    /// An edge names a node the description lacks
    UnknownNode { edge: String, node_id: String },
    /// An edge references a port or slot the node does not declare
    InvalidPort { edge: String, node_id: String, index: usize },
    /// A single-connection slot has more than one incoming edge
    MultipleConnections { node_id: String, port_id: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected => write!(f, "Pipeline contains a cycle"),
            Self::DuplicateNodeId { node_id } => write!(f, "Duplicate node id '{}'", node_id),
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "Unknown node type '{}' for node '{}'", node_type, node_id)
            }
            Self::UnconnectedRequiredInput { node_id, port_id } => {
                write!(
                    f,
                    "Node '{}' needs a connection on required input '{}'",
                    node_id, port_id
                )
            }
            Self::UnknownNode { edge, node_id } => {
                write!(f, "Edge '{}' references unknown node '{}'", edge, node_id)
            }
            Self::InvalidPort {
                edge,
                node_id,
                index,
            } => {
                write!(
                    f,
                    "Edge '{}' references port {} which node '{}' does not have",
                    edge, index, node_id
                )
            }
            Self::MultipleConnections { node_id, port_id } => {
                write!(
                    f,
                    "Input '{}' on node '{}' accepts a single connection",
                    port_id, node_id
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a pipeline description
///
/// Pass a registry to enable node type and port checks.
pub fn validate_description(
    description: &PipelineDescription,
    registry: Option<&NodeRegistry>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_node_ids(description, &mut errors);
    validate_edge_references(description, &mut errors);
    detect_cycles(description, &mut errors);

    if let Some(reg) = registry {
        validate_node_types(description, reg, &mut errors);
        validate_ports(description, reg, &mut errors);
        validate_required_inputs(description, reg, &mut errors);
    }

    errors
}

/// Validate and fold every problem into a single `Validation` error
pub fn ensure_valid(description: &PipelineDescription, registry: &NodeRegistry) -> Result<()> {
    let errors = validate_description(description, Some(registry));
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(PipelineError::Validation(message))
}

fn validate_node_ids(description: &PipelineDescription, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for node in &description.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }
}

fn validate_edge_references(description: &PipelineDescription, errors: &mut Vec<ValidationError>) {
    let node_ids: HashSet<&str> = description.nodes.iter().map(|n| n.id.as_str()).collect();

    for edge in &description.edges {
        for node_id in [&edge.source, &edge.target] {
            if !node_ids.contains(node_id.as_str()) {
                errors.push(ValidationError::UnknownNode {
                    edge: edge.to_string(),
                    node_id: node_id.clone(),
                });
            }
        }
    }
}

/// Kahn's algorithm: nodes never reaching in-degree zero lie on a cycle
fn detect_cycles(description: &PipelineDescription, errors: &mut Vec<ValidationError>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in &description.nodes {
        in_degree.insert(&node.id, 0);
    }
    for edge in &description.edges {
        if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node_id) = queue.pop_front() {
        visited += 1;
        for edge in description.outgoing_edges(node_id) {
            if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(&edge.target);
                }
            }
        }
    }

    if visited < in_degree.len() {
        errors.push(ValidationError::CycleDetected);
    }
}

fn validate_node_types(
    description: &PipelineDescription,
    registry: &NodeRegistry,
    errors: &mut Vec<ValidationError>,
) {
    for node in &description.nodes {
        if !registry.has_node_type(&node.node_type) {
            errors.push(ValidationError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }
}

/// Check port indices and single-connection slots
fn validate_ports(
    description: &PipelineDescription,
    registry: &NodeRegistry,
    errors: &mut Vec<ValidationError>,
) {
    let metadata_of = |id: &str| {
        description
            .find_node(id)
            .and_then(|n| registry.get_metadata(&n.node_type))
    };

    let mut connections: HashMap<(&str, usize), usize> = HashMap::new();
    for edge in &description.edges {
        if let Some(meta) = metadata_of(&edge.source) {
            if edge.source_port >= meta.outputs.len() {
                errors.push(ValidationError::InvalidPort {
                    edge: edge.to_string(),
                    node_id: edge.source.clone(),
                    index: edge.source_port,
                });
            }
        }
        if let Some(meta) = metadata_of(&edge.target) {
            if edge.target_slot >= meta.inputs.len() {
                errors.push(ValidationError::InvalidPort {
                    edge: edge.to_string(),
                    node_id: edge.target.clone(),
                    index: edge.target_slot,
                });
            } else {
                *connections
                    .entry((edge.target.as_str(), edge.target_slot))
                    .or_insert(0) += 1;
            }
        }
    }

    for ((node_id, slot), count) in connections {
        let Some(port) = metadata_of(node_id).and_then(|m| m.inputs.get(slot)) else {
            continue;
        };
        if count > 1 && !port.multiple {
            errors.push(ValidationError::MultipleConnections {
                node_id: node_id.to_string(),
                port_id: port.id.clone(),
            });
        }
    }
}

fn validate_required_inputs(
    description: &PipelineDescription,
    registry: &NodeRegistry,
    errors: &mut Vec<ValidationError>,
) {
    let connected: HashSet<(&str, usize)> = description
        .edges
        .iter()
        .map(|e| (e.target.as_str(), e.target_slot))
        .collect();

    for node in &description.nodes {
        let Some(metadata) = registry.get_metadata(&node.node_type) else {
            continue;
        };
        for (slot, port) in metadata.inputs.iter().enumerate() {
            if port.required && !connected.contains(&(node.id.as_str(), slot)) {
                errors.push(ValidationError::UnconnectedRequiredInput {
                    node_id: node.id.clone(),
                    port_id: port.id.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;
    use crate::description::PipelineBuilder;
    use crate::test_support::{GridSource, ScaleFilter, SplitFilter};

    fn metadata_registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register_metadata(GridSource.metadata());
        registry.register_metadata(ScaleFilter.metadata());
        registry.register_metadata(SplitFilter.metadata());
        registry
    }

    #[test]
    fn test_linear_pipeline_is_valid() {
        let description = PipelineBuilder::new("p", "Test")
            .add_node("a", "test-grid")
            .add_node("b", "test-scale")
            .connect("a", 0, "b", 0)
            .build();

        let registry = metadata_registry();
        let errors = validate_description(&description, Some(&registry));
        assert_eq!(errors, vec![]);
        assert!(ensure_valid(&description, &registry).is_ok());
    }

    #[test]
    fn test_detect_cycle() {
        let description = PipelineBuilder::new("p", "Cyclic")
            .add_node("a", "test-scale")
            .add_node("b", "test-scale")
            .connect("a", 0, "b", 0)
            .connect("b", 0, "a", 0)
            .build();

        let errors = validate_description(&description, None);
        assert!(errors.contains(&ValidationError::CycleDetected));
    }

    #[test]
    fn test_no_cycle_diamond() {
        let description = PipelineBuilder::new("p", "Diamond")
            .add_node("a", "test-grid")
            .add_node("b", "test-scale")
            .add_node("c", "test-scale")
            .add_node("d", "test-split")
            .connect("a", 0, "b", 0)
            .connect("a", 0, "c", 0)
            .connect("b", 0, "d", 0)
            .build();

        let errors = validate_description(&description, None);
        assert!(!errors.contains(&ValidationError::CycleDetected));
    }

    #[test]
    fn test_unknown_node_type() {
        let description = PipelineBuilder::new("p", "Test")
            .add_node("a", "unknown-type")
            .build();

        let errors = validate_description(&description, Some(&metadata_registry()));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownNodeType { .. })));
    }

    #[test]
    fn test_unconnected_required_input() {
        let description = PipelineBuilder::new("p", "Test")
            .add_node("b", "test-scale")
            .build();

        let errors = validate_description(&description, Some(&metadata_registry()));
        assert_eq!(
            errors,
            vec![ValidationError::UnconnectedRequiredInput {
                node_id: "b".to_string(),
                port_id: "input".to_string(),
            }]
        );
    }

    #[test]
    fn test_edge_references_missing_node() {
        let description = PipelineBuilder::new("p", "Test")
            .add_node("a", "test-grid")
            .connect("a", 0, "missing", 0)
            .build();

        let errors = validate_description(&description, None);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownNode { node_id, .. } if node_id == "missing")));
    }

    #[test]
    fn test_bad_port_indices() {
        let description = PipelineBuilder::new("p", "Test")
            .add_node("a", "test-grid")
            .add_node("b", "test-scale")
            .connect("a", 1, "b", 0)
            .connect("a", 0, "b", 3)
            .build();

        let errors = validate_description(&description, Some(&metadata_registry()));
        let bad_ports = errors
            .iter()
            .filter(|e| matches!(e, ValidationError::InvalidPort { .. }))
            .count();
        assert_eq!(bad_ports, 2);
    }

    #[test]
    fn test_multiple_connections_on_single_slot() {
        let description = PipelineBuilder::new("p", "Test")
            .add_node("a", "test-grid")
            .add_node("c", "test-grid")
            .add_node("b", "test-scale")
            .connect("a", 0, "b", 0)
            .connect("c", 0, "b", 0)
            .build();

        let errors = validate_description(&description, Some(&metadata_registry()));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::MultipleConnections { .. })));
    }

    #[test]
    fn test_duplicate_node_id() {
        let description = PipelineBuilder::new("p", "Test")
            .add_node("a", "test-grid")
            .add_node("a", "test-grid")
            .build();

        let errors = validate_description(&description, None);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateNodeId { .. })));
    }

    #[test]
    fn test_collects_multiple_errors() {
        let description = PipelineBuilder::new("p", "Test")
            .add_node("a", "unknown-type-1")
            .add_node("b", "unknown-type-2")
            .connect("a", 0, "b", 0)
            .connect("b", 0, "a", 0)
            .build();

        let registry = metadata_registry();
        let errors = validate_description(&description, Some(&registry));
        assert!(errors.len() >= 3);

        let err = ensure_valid(&description, &registry).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(msg) if msg.contains("Cycle")));
    }
}
