//! Pipeline graph
//!
//! A [`Pipeline`] owns a named set of nodes with unique ids and offers
//! graph-level operations over their connections: wiring by id, dependency
//! queries, topological order, invalidation and bulk updates. The topology
//! itself lives in the nodes' input bindings, so nodes wired directly through
//! [`crate::Node`] handles and nodes wired through the pipeline see the same
//! graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::data::DataObject;
use crate::description::{EdgeDescription, NodeDescription, PipelineDescription};
use crate::error::{PipelineError, Result};
use crate::events::{EventSink, PipelineEvent};
use crate::executive::ExecutiveState;
use crate::node::{DynNode, NodeId};
use crate::port::OutputPort;
use crate::registry::NodeRegistry;
use crate::validation::ensure_valid;

/// Named collection of connected nodes
pub struct Pipeline {
    id: String,
    name: String,
    nodes: Vec<DynNode>,
    events: Option<Arc<dyn EventSink>>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            events: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach an event sink to the pipeline and every node in it
    pub fn set_event_sink(&mut self, sink: Option<Arc<dyn EventSink>>) {
        for node in &self.nodes {
            node.set_event_sink(sink.clone());
        }
        self.events = sink;
    }

    /// Add a node; fails with `DuplicateNode` if the id is taken
    pub fn add_node(&mut self, node: impl Into<DynNode>) -> Result<DynNode> {
        let node = node.into();
        if self.contains(node.id()) {
            return Err(PipelineError::DuplicateNode(node.id().to_string()));
        }
        if self.events.is_some() {
            node.set_event_sink(self.events.clone());
        }
        log::debug!("Pipeline '{}': added node '{}'", self.id, node.id());
        self.nodes.push(Arc::clone(&node));
        Ok(node)
    }

    /// Look up a node by id
    pub fn node(&self, id: &str) -> Result<&DynNode> {
        self.nodes
            .iter()
            .find(|n| n.id() == id)
            .ok_or_else(|| PipelineError::UnknownNode(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id() == id)
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Output port `output` of node `id`
    pub fn output_port(&self, id: &str, output: usize) -> Result<OutputPort> {
        OutputPort::new(Arc::clone(self.node(id)?), output)
    }

    /// Connect `producer`'s output to `consumer`'s input slot
    ///
    /// Repeatable slots gain a connection; other slots are rebound. Fails
    /// with `Cycle` (graph unchanged) if the edge would close a loop.
    pub fn connect(&self, producer: &str, output: usize, consumer: &str, slot: usize) -> Result<()> {
        let port = self.output_port(producer, output)?;
        let consumer = self.node(consumer)?;
        let repeatable = consumer
            .metadata()
            .inputs
            .get(slot)
            .is_some_and(|p| p.multiple);
        if repeatable {
            consumer.add_input_connection(slot, port)
        } else {
            consumer.set_input_connection(slot, port)
        }
    }

    /// Remove every connection on `consumer`'s input slot
    pub fn disconnect(&self, consumer: &str, slot: usize) -> Result<()> {
        self.node(consumer)?.remove_input_connections(slot)
    }

    /// Ids of nodes feeding `id` directly
    pub fn dependencies(&self, id: &str) -> Result<Vec<NodeId>> {
        let mut seen = HashSet::new();
        Ok(self
            .node(id)?
            .inputs()
            .into_iter()
            .flatten()
            .map(|port| port.node_id().to_string())
            .filter(|dep| seen.insert(dep.clone()))
            .collect())
    }

    /// Ids of pipeline nodes consuming `id` directly
    pub fn dependents(&self, id: &str) -> Result<Vec<NodeId>> {
        let key = self.node(id)?.key();
        Ok(self
            .nodes
            .iter()
            .filter(|n| {
                n.inputs()
                    .iter()
                    .flatten()
                    .any(|port| port.node().key() == key)
            })
            .map(|n| n.id().to_string())
            .collect())
    }

    /// Every pipeline node reachable downstream of `id`, excluding `id`
    pub fn downstream(&self, id: &str) -> Result<Vec<NodeId>> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from(self.dependents(id)?);
        while let Some(next) = queue.pop_front() {
            if !visited.insert(next.clone()) {
                continue;
            }
            queue.extend(self.dependents(&next)?);
            order.push(next);
        }
        Ok(order)
    }

    /// Node ids ordered so every producer precedes its consumers
    ///
    /// Kahn's algorithm over the pipeline's nodes; ties keep insertion order.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let index_of: HashMap<u64, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.key(), i))
            .collect();

        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            let producers: HashSet<usize> = node
                .inputs()
                .iter()
                .flatten()
                .filter_map(|port| index_of.get(&port.node().key()).copied())
                .collect();
            in_degree[i] = producers.len();
            for p in producers {
                consumers[p].push(i);
            }
        }

        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(i) = queue.pop_front() {
            order.push(self.nodes[i].id().to_string());
            for &c in &consumers[i] {
                in_degree[c] -= 1;
                if in_degree[c] == 0 {
                    queue.push_back(c);
                }
            }
        }

        if order.len() < self.nodes.len() {
            let stuck = (0..self.nodes.len())
                .find(|&i| in_degree[i] > 0)
                .map(|i| self.nodes[i].id().to_string())
                .unwrap_or_default();
            return Err(PipelineError::Cycle {
                producer: stuck.clone(),
                consumer: stuck,
            });
        }
        Ok(order)
    }

    /// Mark `id` modified and report the nodes now stale
    ///
    /// Returns `id` followed by its downstream set.
    pub fn invalidate(&self, id: &str) -> Result<Vec<NodeId>> {
        self.node(id)?.mark_modified();
        let mut stale = vec![id.to_string()];
        stale.extend(self.downstream(id)?);
        log::debug!("Pipeline '{}': invalidated {:?}", self.id, stale);
        if let Some(sink) = &self.events {
            let event = PipelineEvent::GraphInvalidated {
                pipeline_id: self.id.clone(),
                stale_nodes: stale.clone(),
            };
            if let Err(e) = sink.send(event) {
                log::warn!("Pipeline '{}': dropped event: {}", self.id, e);
            }
        }
        Ok(stale)
    }

    /// Update node `id` and return its output `output`
    pub fn update(&self, id: &str, output: usize) -> Result<DataObject> {
        self.output_port(id, output)?.data()
    }

    /// Update every sink (node without consumers in this pipeline)
    ///
    /// Sinks are updated in topological order; the first failure stops the
    /// pass and is returned.
    pub fn update_all(&self) -> Result<()> {
        for id in self.topological_order()? {
            if self.dependents(&id)?.is_empty() {
                log::trace!("Pipeline '{}': updating sink '{}'", self.id, id);
                self.node(&id)?.update(&Default::default())?;
            }
        }
        Ok(())
    }

    /// Ids of nodes that are not `Valid`, in insertion order
    pub fn stale_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.state() != ExecutiveState::Valid)
            .map(|n| n.id().to_string())
            .collect()
    }

    /// Serializable description of the current configuration
    ///
    /// Connections to producers outside the pipeline are not described.
    pub fn describe(&self) -> Result<PipelineDescription> {
        let mut description = PipelineDescription::new(self.id.clone(), self.name.clone());
        for node in &self.nodes {
            description.nodes.push(NodeDescription {
                id: node.id().to_string(),
                node_type: node.metadata().node_type.clone(),
                params: node.params_json()?,
                array_selections: node.array_selections(),
                update_time: node.requested_time(),
            });
            for (slot, ports) in node.inputs().iter().enumerate() {
                for port in ports {
                    if !self.contains(port.node_id()) {
                        continue;
                    }
                    description.edges.push(EdgeDescription {
                        source: port.node_id().to_string(),
                        source_port: port.index(),
                        target: node.id().to_string(),
                        target_slot: slot,
                    });
                }
            }
        }
        Ok(description)
    }

    /// Build a live pipeline from a description
    ///
    /// The description is validated first; every problem is reported in one
    /// `Validation` error.
    pub fn from_description(
        description: &PipelineDescription,
        registry: &NodeRegistry,
    ) -> Result<Self> {
        ensure_valid(description, registry)?;

        let mut pipeline = Self::new(description.id.clone(), description.name.clone());
        for entry in &description.nodes {
            let node = registry.create(&entry.node_type, &entry.id, entry.params.clone())?;
            for (index, selection) in entry.array_selections.iter().enumerate() {
                if let Some(selection) = selection {
                    node.set_input_array_to_process(index, selection.clone());
                }
            }
            node.set_requested_time(entry.update_time);
            pipeline.add_node(node)?;
        }
        for edge in &description.edges {
            pipeline.connect(&edge.source, edge.source_port, &edge.target, edge.target_slot)?;
        }
        log::info!(
            "Built pipeline '{}' with {} nodes and {} edges",
            pipeline.id,
            pipeline.nodes.len(),
            description.edges.len()
        );
        Ok(pipeline)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.node_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;
    use crate::data::Association;
    use crate::description::PipelineBuilder;
    use crate::events::VecEventSink;
    use crate::registry::create_node;
    use crate::test_support::{grid_source, scale_filter, GridSource, ScaleFilter, SplitFilter};
    use crate::Node;

    fn test_registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register(GridSource.metadata(), create_node::<GridSource>);
        registry.register(ScaleFilter.metadata(), create_node::<ScaleFilter>);
        registry.register(SplitFilter.metadata(), create_node::<SplitFilter>);
        registry
    }

    /// a -> b -> c, a -> d
    fn chain() -> Pipeline {
        let mut pipeline = Pipeline::new("p", "Chain");
        pipeline.add_node(grid_source("a", 3)).unwrap();
        pipeline.add_node(scale_filter("b", 2.0)).unwrap();
        pipeline.add_node(scale_filter("c", 3.0)).unwrap();
        pipeline.add_node(scale_filter("d", 1.0)).unwrap();
        pipeline.connect("a", 0, "b", 0).unwrap();
        pipeline.connect("b", 0, "c", 0).unwrap();
        pipeline.connect("a", 0, "d", 0).unwrap();
        pipeline
    }

    #[test]
    fn test_duplicate_and_unknown_nodes() {
        let mut pipeline = chain();
        assert!(matches!(
            pipeline.add_node(grid_source("a", 2)),
            Err(PipelineError::DuplicateNode(_))
        ));
        assert!(matches!(
            pipeline.connect("a", 0, "zz", 0),
            Err(PipelineError::UnknownNode(_))
        ));
        assert!(matches!(
            pipeline.connect("a", 5, "b", 0),
            Err(PipelineError::InvalidPort { .. })
        ));
    }

    #[test]
    fn test_dependency_queries() {
        let pipeline = chain();
        assert_eq!(pipeline.dependencies("c").unwrap(), vec!["b"]);
        assert_eq!(pipeline.dependents("a").unwrap(), vec!["b", "d"]);
        let mut downstream = pipeline.downstream("a").unwrap();
        downstream.sort();
        assert_eq!(downstream, vec!["b", "c", "d"]);
        assert!(pipeline.downstream("c").unwrap().is_empty());
    }

    #[test]
    fn test_topological_order() {
        let pipeline = chain();
        let order = pipeline.topological_order().unwrap();
        let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
        assert!(pos("a") < pos("d"));
    }

    #[test]
    fn test_back_edge_rejected() {
        let pipeline = chain();
        let err = pipeline.connect("c", 0, "b", 0).unwrap_err();
        assert!(matches!(err, PipelineError::Cycle { .. }));
        assert_eq!(pipeline.dependencies("b").unwrap(), vec!["a"]);
        assert!(pipeline.topological_order().is_ok());
    }

    #[test]
    fn test_invalidate_reports_downstream() {
        let mut pipeline = chain();
        let sink = Arc::new(VecEventSink::new());
        pipeline.set_event_sink(Some(sink.clone()));
        pipeline.update_all().unwrap();
        assert!(pipeline.stale_nodes().is_empty());

        let stale = pipeline.invalidate("b").unwrap();
        assert_eq!(stale, vec!["b", "c"]);
        let mut now_stale = pipeline.stale_nodes();
        now_stale.sort();
        assert_eq!(now_stale, vec!["b", "c"]);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::GraphInvalidated { stale_nodes, .. } if stale_nodes.len() == 2)));
    }

    #[test]
    fn test_update_all_executes_each_node_once() {
        let mut pipeline = chain();
        let sink = Arc::new(VecEventSink::new());
        pipeline.set_event_sink(Some(sink.clone()));

        pipeline.update_all().unwrap();
        for id in ["a", "b", "c", "d"] {
            assert_eq!(sink.executions_of(id), 1, "node {}", id);
        }
        pipeline.update_all().unwrap();
        assert_eq!(sink.executions_of("a"), 1);
    }

    #[test]
    fn test_disconnect() {
        let pipeline = chain();
        pipeline.update_all().unwrap();
        pipeline.disconnect("c", 0).unwrap();
        assert!(pipeline.dependencies("c").unwrap().is_empty());
        assert!(matches!(
            pipeline.update("c", 0),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_threshold_end_to_end() {
        let mut pipeline = Pipeline::new("p", "Threshold");
        let source = grid_source("grid", 3);
        pipeline.add_node(source.clone()).unwrap();
        pipeline.add_node(Node::new("split", SplitFilter, 5.0)).unwrap();
        pipeline.connect("grid", 0, "split", 0).unwrap();

        let high = pipeline.update("split", 1).unwrap();
        assert_eq!(
            high.geometry().points().unwrap(),
            vec![[2.0, 1.0, 0.0], [0.0, 2.0, 0.0], [1.0, 2.0, 0.0], [2.0, 2.0, 0.0]]
        );

        let split = pipeline.node("split").unwrap();
        assert_eq!(split.executive().execution_count(), 1);
        source.update_params(|p| p.size = 4);
        pipeline.update("split", 1).unwrap();
        pipeline.update("split", 0).unwrap();
        assert_eq!(split.executive().execution_count(), 2);
    }

    #[test]
    fn test_describe_and_rebuild() {
        let pipeline = chain();
        pipeline
            .node("b")
            .unwrap()
            .set_input_array_to_process(0, crate::ArraySelection::named(Association::Point, "values"));
        let description = pipeline.describe().unwrap();
        assert_eq!(description.nodes.len(), 4);
        assert_eq!(description.edges.len(), 3);
        assert_eq!(description.nodes[1].params["factor"], 2.0);

        let rebuilt = Pipeline::from_description(&description, &test_registry()).unwrap();
        assert_eq!(rebuilt.describe().unwrap(), description);
        let data = rebuilt.update("c", 0).unwrap();
        assert_eq!(data.range("values"), Some([6.0, 54.0]));
    }

    #[test]
    fn test_from_invalid_description() {
        let description = PipelineBuilder::new("p", "Bad")
            .add_node("a", "test-scale")
            .add_node("b", "nope")
            .build();
        let err = Pipeline::from_description(&description, &test_registry()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_from_description_with_bad_params() {
        let description = PipelineBuilder::new("p", "Bad")
            .add_node("a", "test-grid")
            .with_params(serde_json::json!({"size": -1}))
            .build();
        assert!(matches!(
            Pipeline::from_description(&description, &test_registry()),
            Err(PipelineError::Serialization(_))
        ));
    }
}
