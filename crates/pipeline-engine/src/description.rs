//! Serializable pipeline descriptions
//!
//! A description is the configuration form of a pipeline: node types, their
//! JSON parameters and the edges between ports. [`crate::Pipeline::describe`]
//! produces one from a live pipeline and
//! [`crate::Pipeline::from_description`] rebuilds a live pipeline from it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::algorithm::ArraySelection;
use crate::error::Result;
use crate::node::NodeId;

/// A node in a pipeline description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescription {
    /// Unique identifier for this node
    pub id: NodeId,
    /// Registered node type
    pub node_type: String,
    /// Algorithm parameters; `null` selects the defaults
    #[serde(default)]
    pub params: serde_json::Value,
    /// Array selections by index
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub array_selections: Vec<Option<ArraySelection>>,
    /// Time value requested from this node's outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<f64>,
}

/// A connection from an output port to an input slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDescription {
    /// Producing node
    pub source: NodeId,
    /// Output port index on the producer
    #[serde(default)]
    pub source_port: usize,
    /// Consuming node
    pub target: NodeId,
    /// Input slot index on the consumer
    #[serde(default)]
    pub target_slot: usize,
}

impl std::fmt::Display for EdgeDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}] -> {}[{}]",
            self.source, self.source_port, self.target, self.target_slot
        )
    }
}

/// A complete pipeline description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDescription {
    /// Unique identifier for this pipeline
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Nodes in the pipeline
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    /// Edges connecting nodes, in connection order
    #[serde(default)]
    pub edges: Vec<EdgeDescription>,
}

impl PipelineDescription {
    /// Create a new empty description
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&NodeDescription> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a EdgeDescription> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a EdgeDescription> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Parse a description from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a description from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading pipeline description from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the description as a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        log::debug!("Saving pipeline description to {}", path.display());
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Fluent builder for pipeline descriptions
///
/// # Example
///
/// ```ignore
/// let description = PipelineBuilder::new("p1", "Threshold demo")
///     .add_node("grid", "point-grid-source")
///     .with_params(serde_json::json!({"dimensions": [3, 3, 1]}))
///     .add_node("threshold", "threshold")
///     .with_params(serde_json::json!({"mode": "above", "lower": 5.0}))
///     .connect("grid", 0, "threshold", 0)
///     .build();
/// ```
pub struct PipelineBuilder {
    description: PipelineDescription,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            description: PipelineDescription::new(id, name),
        }
    }

    /// Add a node with default parameters
    pub fn add_node(mut self, id: impl Into<String>, node_type: impl Into<String>) -> Self {
        self.description.nodes.push(NodeDescription {
            id: id.into(),
            node_type: node_type.into(),
            params: serde_json::Value::Null,
            array_selections: Vec::new(),
            update_time: None,
        });
        self
    }

    /// Set params on the most recently added node
    ///
    /// Must be called immediately after `add_node`.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        if let Some(node) = self.description.nodes.last_mut() {
            node.params = params;
        }
        self
    }

    /// Set an array selection on the most recently added node
    pub fn with_array_selection(mut self, index: usize, selection: ArraySelection) -> Self {
        if let Some(node) = self.description.nodes.last_mut() {
            if node.array_selections.len() <= index {
                node.array_selections.resize(index + 1, None);
            }
            node.array_selections[index] = Some(selection);
        }
        self
    }

    /// Request a time value from the most recently added node
    pub fn with_update_time(mut self, time: f64) -> Self {
        if let Some(node) = self.description.nodes.last_mut() {
            node.update_time = Some(time);
        }
        self
    }

    /// Connect an output port to an input slot
    pub fn connect(
        mut self,
        source: impl Into<String>,
        source_port: usize,
        target: impl Into<String>,
        target_slot: usize,
    ) -> Self {
        self.description.edges.push(EdgeDescription {
            source: source.into(),
            source_port,
            target: target.into(),
            target_slot,
        });
        self
    }

    /// Build the description without validation
    pub fn build(self) -> PipelineDescription {
        self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Association;

    fn sample() -> PipelineDescription {
        PipelineBuilder::new("p", "Sample")
            .add_node("grid", "test-grid")
            .with_params(serde_json::json!({"size": 3}))
            .add_node("scale", "test-scale")
            .with_array_selection(1, ArraySelection::named(Association::Point, "values"))
            .with_update_time(2.0)
            .connect("grid", 0, "scale", 0)
            .build()
    }

    #[test]
    fn test_builder() {
        let description = sample();
        assert_eq!(description.nodes.len(), 2);
        let scale = description.find_node("scale").unwrap();
        assert_eq!(scale.array_selections.len(), 2);
        assert!(scale.array_selections[0].is_none());
        assert_eq!(scale.update_time, Some(2.0));
        assert_eq!(description.incoming_edges("scale").count(), 1);
        assert_eq!(description.outgoing_edges("grid").count(), 1);
        assert_eq!(description.edges[0].to_string(), "grid[0] -> scale[0]");
    }

    #[test]
    fn test_json_format() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["nodes"][0]["nodeType"], "test-grid");
        assert_eq!(value["edges"][0]["targetSlot"], 0);
        assert!(value["nodes"][0].get("updateTime").is_none());
        assert_eq!(PipelineDescription::from_json(&json).unwrap(), sample());
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let description = PipelineDescription::from_json(
            r#"{"id": "p", "name": "n",
                "nodes": [{"id": "a", "nodeType": "t"}],
                "edges": [{"source": "a", "target": "b"}]}"#,
        )
        .unwrap();
        assert!(description.nodes[0].params.is_null());
        assert_eq!(description.edges[0].source_port, 0);
        assert_eq!(description.edges[0].target_slot, 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        sample().save(&path).unwrap();
        assert_eq!(PipelineDescription::load(&path).unwrap(), sample());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PipelineDescription::load(dir.path().join("missing.json")),
            Err(crate::PipelineError::Io(_))
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            PipelineDescription::load(&path),
            Err(crate::PipelineError::Serialization(_))
        ));
    }
}
