//! Node type registry for building pipelines from descriptions
//!
//! The registry maps node type strings to metadata and a factory that builds
//! a live node from JSON parameters. Built-in node crates register their
//! factories at link time with `inventory`:
//!
//! ```ignore
//! inventory::submit!(pipeline_engine::NodeFactoryFn {
//!     metadata: ThresholdFilter::descriptor,
//!     create: pipeline_engine::create_node::<ThresholdFilter>,
//! });
//! ```
//!
//! and hosts collect them with [`NodeRegistry::with_builtins`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::algorithm::Algorithm;
use crate::descriptor::{AlgorithmMetadata, NodeCategory};
use crate::error::{PipelineError, Result};
use crate::node::{DynNode, Node};

/// Builds a node of one type from an id and JSON parameters
pub trait NodeFactory: Send + Sync {
    fn create(&self, id: &str, params: serde_json::Value) -> Result<DynNode>;
}

impl<F> NodeFactory for F
where
    F: Fn(&str, serde_json::Value) -> Result<DynNode> + Send + Sync,
{
    fn create(&self, id: &str, params: serde_json::Value) -> Result<DynNode> {
        self(id, params)
    }
}

/// Link-time registration of a node type
///
/// Both fields are plain function pointers so entries can be built in a
/// `static` by `inventory::submit!`.
pub struct NodeFactoryFn {
    pub metadata: fn() -> AlgorithmMetadata,
    pub create: fn(&str, serde_json::Value) -> Result<DynNode>,
}

inventory::collect!(NodeFactoryFn);

/// Factory for any algorithm with default state
///
/// `null` params select the defaults; anything else must deserialize into
/// the algorithm's `Params`.
pub fn create_node<A>(id: &str, params: serde_json::Value) -> Result<DynNode>
where
    A: Algorithm + Default,
    A::Params: Default,
{
    let params = if params.is_null() {
        A::Params::default()
    } else {
        serde_json::from_value(params)?
    };
    Ok(Node::new(id, A::default(), params).into())
}

struct RegistryEntry {
    metadata: AlgorithmMetadata,
    factory: Option<Arc<dyn NodeFactory>>,
}

/// Registry of node types with their metadata and factories
///
/// Registries compose by merging:
/// ```ignore
/// let mut registry = NodeRegistry::with_builtins();
/// registry.merge(plugin_registry);
/// ```
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry populated with every `NodeFactoryFn` linked into the binary
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in inventory::iter::<NodeFactoryFn> {
            let metadata = (entry.metadata)();
            log::trace!("Registering built-in node type '{}'", metadata.node_type);
            registry.register(metadata, entry.create);
        }
        registry
    }

    /// Add or replace a creatable node type
    pub fn register(&mut self, metadata: AlgorithmMetadata, factory: impl NodeFactory + 'static) {
        self.entries.insert(
            metadata.node_type.clone(),
            RegistryEntry {
                metadata,
                factory: Some(Arc::new(factory)),
            },
        );
    }

    /// Add a type that validates and lists but cannot be created
    ///
    /// Programmable filters need a host closure, so descriptions can name
    /// them only when the host builds the node itself.
    pub fn register_metadata(&mut self, metadata: AlgorithmMetadata) {
        self.entries.insert(
            metadata.node_type.clone(),
            RegistryEntry {
                metadata,
                factory: None,
            },
        );
    }

    pub fn get_metadata(&self, node_type: &str) -> Option<&AlgorithmMetadata> {
        self.entries.get(node_type).map(|e| &e.metadata)
    }

    /// Metadata of every registered type, in no particular order
    pub fn all_metadata(&self) -> Vec<&AlgorithmMetadata> {
        self.entries.values().map(|e| &e.metadata).collect()
    }

    pub fn metadata_by_category(&self) -> HashMap<NodeCategory, Vec<&AlgorithmMetadata>> {
        let mut grouped: HashMap<NodeCategory, Vec<&AlgorithmMetadata>> = HashMap::new();
        for entry in self.entries.values() {
            grouped
                .entry(entry.metadata.category)
                .or_default()
                .push(&entry.metadata);
        }
        grouped
    }

    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    pub fn node_types(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Build a node of `node_type`
    ///
    /// Fails with `UnknownNodeType` if the type is not registered or has no
    /// factory.
    pub fn create(&self, node_type: &str, id: &str, params: serde_json::Value) -> Result<DynNode> {
        let factory = self
            .entries
            .get(node_type)
            .and_then(|e| e.factory.as_ref())
            .ok_or_else(|| PipelineError::UnknownNodeType(node_type.to_string()))?;
        factory.create(id, params)
    }

    /// Add every entry of `other`, replacing same-named types
    pub fn merge(&mut self, other: NodeRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{GridSource, ScaleFilter, SplitFilter};

    fn test_registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register(GridSource.metadata(), create_node::<GridSource>);
        registry.register(ScaleFilter.metadata(), create_node::<ScaleFilter>);
        registry
    }

    #[test]
    fn test_lookup_by_type() {
        let registry = test_registry();
        assert!(registry.has_node_type("test-grid"));
        assert!(!registry.has_node_type("test-split"));
        assert_eq!(
            registry.get_metadata("test-scale").map(|m| m.category),
            Some(NodeCategory::Filter)
        );

        let mut types = registry.node_types();
        types.sort_unstable();
        assert_eq!(types, vec!["test-grid", "test-scale"]);
    }

    #[test]
    fn test_merge_replaces_same_type() {
        let mut registry = test_registry();
        let mut relabeled = GridSource.metadata();
        relabeled.label = "Plugin grid".to_string();

        let mut plugin = NodeRegistry::new();
        plugin.register_metadata(relabeled);
        plugin.register(SplitFilter.metadata(), create_node::<SplitFilter>);
        registry.merge(plugin);

        assert_eq!(registry.all_metadata().len(), 3);
        assert_eq!(registry.get_metadata("test-grid").unwrap().label, "Plugin grid");
        // the metadata-only entry shadows the grid factory
        assert!(registry
            .create("test-grid", "g", serde_json::Value::Null)
            .is_err());
    }

    #[test]
    fn test_grouped_by_category() {
        let registry = test_registry();
        let grouped = registry.metadata_by_category();
        assert_eq!(grouped[&NodeCategory::Source][0].node_type, "test-grid");
        assert_eq!(grouped[&NodeCategory::Filter][0].node_type, "test-scale");
        assert!(!grouped.contains_key(&NodeCategory::Sink));
    }

    #[test]
    fn test_create_with_params() {
        let registry = test_registry();
        let node = registry
            .create("test-grid", "grid", serde_json::json!({"size": 3}))
            .unwrap();
        assert_eq!(node.id(), "grid");
        assert_eq!(node.params_json().unwrap()["size"], 3);

        let defaults = registry
            .create("test-scale", "scale", serde_json::Value::Null)
            .unwrap();
        assert_eq!(defaults.params_json().unwrap()["factor"], 1.0);
    }

    #[test]
    fn test_create_unknown_type() {
        let mut registry = test_registry();
        registry.register_metadata(SplitFilter.metadata());

        assert!(matches!(
            registry.create("missing", "x", serde_json::Value::Null),
            Err(PipelineError::UnknownNodeType(_))
        ));
        assert!(matches!(
            registry.create("test-split", "x", serde_json::Value::Null),
            Err(PipelineError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_create_with_bad_params() {
        let registry = test_registry();
        assert!(matches!(
            registry.create("test-grid", "grid", serde_json::json!({"size": "big"})),
            Err(PipelineError::Serialization(_))
        ));
    }
}
