//! Pipeline nodes
//!
//! [`Node<A>`] is the typed handle users configure: it owns the algorithm's
//! parameters, input bindings and array selections. Behind it sits a shared
//! node cell that composes the algorithm with an [`Executive`]; the cell is
//! also exposed as the object-safe [`PipelineNode`] so ports and the graph
//! can hold heterogeneous nodes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::algorithm::{Algorithm, ArraySelection, ExecuteContext};
use crate::data::DataObject;
use crate::descriptor::AlgorithmMetadata;
use crate::error::{PipelineError, Result};
use crate::events::{EventSink, PipelineEvent};
use crate::executive::{Executive, ExecutiveState};
use crate::information::{PortInformation, UpdateRequest};
use crate::port::OutputPort;
use crate::version::Version;

/// Unique identifier for a node within a pipeline
pub type NodeId = String;

/// Shared, type-erased node
pub type DynNode = Arc<dyn PipelineNode>;

static NEXT_NODE_KEY: AtomicU64 = AtomicU64::new(1);

/// Held across the cycle check and the bind, so two concurrent binds cannot
/// both pass the check and close a loop between them.
static BIND_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Object-safe view of a node used by ports, the graph and the registry
pub trait PipelineNode: Send + Sync {
    /// User-facing id
    fn id(&self) -> &str;

    /// Process-unique identity, independent of the user id
    fn key(&self) -> u64;

    fn metadata(&self) -> &AlgorithmMetadata;

    fn output_count(&self) -> usize {
        self.metadata().outputs.len()
    }

    /// Modification counter (params, selections, bindings)
    fn modified(&self) -> Version;

    /// Force an invalidation, as if a parameter changed
    fn mark_modified(&self);

    /// Cache state, including upstream staleness
    fn state(&self) -> ExecutiveState;

    fn executive(&self) -> &Executive;

    /// Current input bindings, slot by slot
    fn inputs(&self) -> Vec<Vec<OutputPort>>;

    /// Replace a slot's bindings with a single port
    fn set_input_connection(&self, slot: usize, port: OutputPort) -> Result<()>;

    /// Append a repeatable connection to a slot
    fn add_input_connection(&self, slot: usize, port: OutputPort) -> Result<()>;

    /// Unbind every connection on a slot
    fn remove_input_connections(&self, slot: usize) -> Result<()>;

    fn array_selections(&self) -> Vec<Option<ArraySelection>>;

    /// Configure which array an algorithm processes; returns whether it changed
    fn set_input_array_to_process(&self, index: usize, selection: ArraySelection) -> bool;

    fn requested_time(&self) -> Option<f64>;

    fn set_requested_time(&self, time: Option<f64>);

    /// Information for one output, computed from upstream information only
    fn information(&self, output: usize) -> Result<PortInformation>;

    /// Bring every output up to date for `request`
    fn update(&self, request: &UpdateRequest) -> Result<()>;

    fn params_json(&self) -> Result<serde_json::Value>;

    /// Replace params from JSON; returns whether they changed
    fn set_params_json(&self, value: serde_json::Value) -> Result<bool>;

    fn set_event_sink(&self, sink: Option<Arc<dyn EventSink>>);
}

/// Whether `target` is `start` or lies upstream of it
pub(crate) fn reaches(start: &DynNode, target: u64) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![Arc::clone(start)];
    while let Some(node) = stack.pop() {
        if node.key() == target {
            return true;
        }
        if !visited.insert(node.key()) {
            continue;
        }
        for port in node.inputs().into_iter().flatten() {
            stack.push(Arc::clone(port.node()));
        }
    }
    false
}

struct NodeConfig<P> {
    params: P,
    inputs: Vec<Vec<OutputPort>>,
    selections: Vec<Option<ArraySelection>>,
    requested_time: Option<f64>,
    modified: Version,
}

impl<P: Clone> NodeConfig<P> {
    fn snapshot(&self) -> NodeConfig<P> {
        NodeConfig {
            params: self.params.clone(),
            inputs: self.inputs.clone(),
            selections: self.selections.clone(),
            requested_time: self.requested_time,
            modified: self.modified,
        }
    }
}

struct NodeCell<A: Algorithm> {
    id: NodeId,
    key: u64,
    algorithm: A,
    metadata: AlgorithmMetadata,
    config: Mutex<NodeConfig<A::Params>>,
    executive: Executive,
    events: RwLock<Option<Arc<dyn EventSink>>>,
}

impl<A: Algorithm> NodeCell<A> {
    fn emit(&self, event: PipelineEvent) {
        if let Some(sink) = self.events.read().as_ref() {
            if let Err(e) = sink.send(event) {
                log::warn!("Node '{}': dropped event: {}", self.id, e);
            }
        }
    }

    fn touch(&self, config: &mut NodeConfig<A::Params>) {
        config.modified = Version::next();
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.metadata.inputs.len() {
            return Err(PipelineError::InvalidPort {
                node_id: self.id.clone(),
                index: slot,
            });
        }
        Ok(())
    }

    fn check_acyclic(&self, port: &OutputPort) -> Result<()> {
        if reaches(port.node(), self.key) {
            return Err(PipelineError::Cycle {
                producer: port.node_id().to_string(),
                consumer: self.id.clone(),
            });
        }
        Ok(())
    }

    fn input_information(inputs: &[Vec<OutputPort>]) -> Result<Vec<Vec<PortInformation>>> {
        inputs
            .iter()
            .map(|slot| slot.iter().map(OutputPort::information).collect())
            .collect()
    }

    fn all_information(&self, config: &NodeConfig<A::Params>) -> Result<Vec<PortInformation>> {
        let inputs = Self::input_information(&config.inputs)?;
        let infos = self.algorithm.information(&config.params, &inputs)?;
        if infos.len() != self.metadata.outputs.len() {
            return Err(PipelineError::computation(format!(
                "'{}' described {} outputs but declares {}",
                self.id,
                infos.len(),
                self.metadata.outputs.len()
            )));
        }
        Ok(infos)
    }

    /// Snap a requested time to what the outputs advertise
    ///
    /// Nodes whose outputs advertise no time domain serve no time, so
    /// changing the request never invalidates them.
    fn serve_time(
        &self,
        config: &NodeConfig<A::Params>,
        requested: Option<f64>,
    ) -> Result<Option<f64>> {
        let Some(time) = requested else {
            return Ok(None);
        };
        let infos = self.all_information(config)?;
        Ok(infos
            .iter()
            .find_map(|info| info.time.as_ref())
            .and_then(|domain| domain.snap(time)))
    }

    fn check_required(&self, inputs: &[Vec<OutputPort>]) -> Result<()> {
        for (slot, port) in self.metadata.inputs.iter().enumerate() {
            let bound = inputs.get(slot).is_some_and(|c| !c.is_empty());
            if port.required && !bound {
                return Err(PipelineError::invalid_input(format!(
                    "required input '{}' of '{}' is not connected",
                    port.id, self.id
                )));
            }
        }
        Ok(())
    }

    fn check_kinds(&self, inputs: &[Vec<DataObject>]) -> Result<()> {
        for (slot, data) in inputs.iter().enumerate() {
            let Some(port) = self.metadata.inputs.get(slot) else {
                continue;
            };
            if let Some(bad) = data.iter().find(|d| !port.accepts(d.kind())) {
                return Err(PipelineError::invalid_input(format!(
                    "input '{}' of '{}' does not accept a {}",
                    port.id,
                    self.id,
                    bad.kind()
                )));
            }
        }
        Ok(())
    }

    fn fail(&self, error: PipelineError) -> Result<()> {
        self.executive.mark_failed();
        log::warn!("Node '{}' failed: {}", self.id, error);
        self.emit(PipelineEvent::NodeFailed {
            node_id: self.id.clone(),
            error: error.to_string(),
        });
        Err(error)
    }
}

impl<A: Algorithm> PipelineNode for NodeCell<A> {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> u64 {
        self.key
    }

    fn metadata(&self) -> &AlgorithmMetadata {
        &self.metadata
    }

    fn modified(&self) -> Version {
        self.config.lock().modified
    }

    fn mark_modified(&self) {
        let mut config = self.config.lock();
        self.touch(&mut config);
        drop(config);
        self.emit(PipelineEvent::NodeModified {
            node_id: self.id.clone(),
        });
    }

    fn state(&self) -> ExecutiveState {
        let config = self.config.lock().snapshot();
        let local = self.executive.local_state(config.modified);
        if local != ExecutiveState::Valid {
            return local;
        }

        let recorded = self.executive.recorded_input_tokens();
        if recorded.len() != config.inputs.len() {
            return ExecutiveState::Stale;
        }
        for (ports, tokens) in config.inputs.iter().zip(&recorded) {
            if ports.len() != tokens.len() {
                return ExecutiveState::Stale;
            }
            for (port, token) in ports.iter().zip(tokens) {
                if port.state() != ExecutiveState::Valid || port.version() != Some(*token) {
                    return ExecutiveState::Stale;
                }
            }
        }

        // Judged against the last request received from downstream
        let effective = UpdateRequest {
            time: config.requested_time.or(self.executive.inherited().time),
        };
        if !effective.same_as(&self.executive.requested()) {
            let served = match self.serve_time(&config, effective.time) {
                Ok(time) => UpdateRequest { time },
                Err(_) => return ExecutiveState::Stale,
            };
            if !served.same_as(&self.executive.served_request()) {
                return ExecutiveState::Stale;
            }
        }
        ExecutiveState::Valid
    }

    fn executive(&self) -> &Executive {
        &self.executive
    }

    fn inputs(&self) -> Vec<Vec<OutputPort>> {
        self.config.lock().inputs.clone()
    }

    fn set_input_connection(&self, slot: usize, port: OutputPort) -> Result<()> {
        self.check_slot(slot)?;
        let _bind = BIND_LOCK.lock();
        self.check_acyclic(&port)?;
        let mut config = self.config.lock();
        let current = &config.inputs[slot];
        if current.len() == 1 && current[0].same_as(&port) {
            return Ok(());
        }
        log::debug!(
            "Node '{}': slot {} bound to '{}'[{}]",
            self.id,
            slot,
            port.node_id(),
            port.index()
        );
        config.inputs[slot] = vec![port];
        self.touch(&mut config);
        drop(config);
        self.emit(PipelineEvent::ConnectionChanged {
            node_id: self.id.clone(),
            slot,
        });
        Ok(())
    }

    fn add_input_connection(&self, slot: usize, port: OutputPort) -> Result<()> {
        self.check_slot(slot)?;
        let _bind = BIND_LOCK.lock();
        self.check_acyclic(&port)?;
        let mut config = self.config.lock();
        if !self.metadata.inputs[slot].multiple && !config.inputs[slot].is_empty() {
            return Err(PipelineError::invalid_input(format!(
                "input '{}' of '{}' accepts a single connection",
                self.metadata.inputs[slot].id, self.id
            )));
        }
        config.inputs[slot].push(port);
        self.touch(&mut config);
        drop(config);
        self.emit(PipelineEvent::ConnectionChanged {
            node_id: self.id.clone(),
            slot,
        });
        Ok(())
    }

    fn remove_input_connections(&self, slot: usize) -> Result<()> {
        self.check_slot(slot)?;
        let mut config = self.config.lock();
        if config.inputs[slot].is_empty() {
            return Ok(());
        }
        config.inputs[slot].clear();
        self.touch(&mut config);
        drop(config);
        self.emit(PipelineEvent::ConnectionChanged {
            node_id: self.id.clone(),
            slot,
        });
        Ok(())
    }

    fn array_selections(&self) -> Vec<Option<ArraySelection>> {
        self.config.lock().selections.clone()
    }

    fn set_input_array_to_process(&self, index: usize, selection: ArraySelection) -> bool {
        let mut config = self.config.lock();
        if config.selections.len() <= index {
            config.selections.resize(index + 1, None);
        }
        if config.selections[index].as_ref() == Some(&selection) {
            return false;
        }
        config.selections[index] = Some(selection);
        self.touch(&mut config);
        drop(config);
        self.emit(PipelineEvent::NodeModified {
            node_id: self.id.clone(),
        });
        true
    }

    fn requested_time(&self) -> Option<f64> {
        self.config.lock().requested_time
    }

    fn set_requested_time(&self, time: Option<f64>) {
        self.config.lock().requested_time = time;
    }

    fn information(&self, output: usize) -> Result<PortInformation> {
        let config = self.config.lock().snapshot();
        let mut infos = self.all_information(&config)?;
        if output >= infos.len() {
            return Err(PipelineError::InvalidPort {
                node_id: self.id.clone(),
                index: output,
            });
        }
        Ok(infos.swap_remove(output))
    }

    fn update(&self, request: &UpdateRequest) -> Result<()> {
        let _guard = self.executive.lock_update();
        let config = self.config.lock().snapshot();
        let requested = UpdateRequest {
            time: config.requested_time.or(request.time),
        };
        log::trace!("Node '{}': update requested ({:?})", self.id, requested);

        if let Err(e) = self.check_required(&config.inputs) {
            return self.fail(e);
        }

        let mut input_tokens = Vec::with_capacity(config.inputs.len());
        let mut input_data = Vec::with_capacity(config.inputs.len());
        for slot in &config.inputs {
            let mut tokens = Vec::with_capacity(slot.len());
            let mut data = Vec::with_capacity(slot.len());
            for port in slot {
                if let Err(e) = port.node().update(&requested) {
                    self.executive.mark_stale();
                    return Err(e);
                }
                match (port.version(), port.cached_data()) {
                    (Some(token), Some(output)) => {
                        tokens.push(token);
                        data.push(output);
                    }
                    _ => {
                        return self.fail(PipelineError::invalid_input(format!(
                            "'{}' has no output on port {}",
                            port.node_id(),
                            port.index()
                        )))
                    }
                }
            }
            input_tokens.push(tokens);
            input_data.push(data);
        }

        let served = match self.serve_time(&config, requested.time) {
            Ok(time) => UpdateRequest { time },
            Err(e) => return self.fail(e),
        };

        if self
            .executive
            .is_current(config.modified, &input_tokens, &served)
        {
            log::debug!("Node '{}': cache hit", self.id);
            self.executive.record_hit(requested, *request);
            self.emit(PipelineEvent::CacheHit {
                node_id: self.id.clone(),
            });
            return Ok(());
        }

        if let Err(e) = self.check_kinds(&input_data) {
            return self.fail(e);
        }

        let ctx = ExecuteContext::new(&self.id, input_data, &config.selections, served.time);
        let started = Instant::now();
        let mut outputs = match self.algorithm.execute(&config.params, &ctx) {
            Ok(outputs) => outputs,
            Err(e) => return self.fail(e),
        };
        if outputs.len() != self.metadata.outputs.len() {
            return self.fail(PipelineError::computation(format!(
                "'{}' produced {} outputs but declares {}",
                self.id,
                outputs.len(),
                self.metadata.outputs.len()
            )));
        }
        for output in &mut outputs {
            if served.time.is_some() {
                output.set_time(served.time);
            }
            output.freeze();
        }

        let token = self
            .executive
            .store(outputs, config.modified, input_tokens, requested, *request, served);
        let duration_ms = started.elapsed().as_millis() as u64;
        log::debug!(
            "Node '{}': executed in {}ms, token {}",
            self.id,
            duration_ms,
            token
        );
        self.emit(PipelineEvent::NodeExecuted {
            node_id: self.id.clone(),
            version: token.get(),
            duration_ms,
        });
        Ok(())
    }

    fn params_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.config.lock().params)?)
    }

    fn set_params_json(&self, value: serde_json::Value) -> Result<bool> {
        let params: A::Params = serde_json::from_value(value)?;
        Ok(set_params(self, params))
    }

    fn set_event_sink(&self, sink: Option<Arc<dyn EventSink>>) {
        *self.events.write() = sink;
    }
}

fn set_params<A: Algorithm>(cell: &NodeCell<A>, params: A::Params) -> bool {
    let mut config = cell.config.lock();
    if config.params == params {
        return false;
    }
    log::debug!("Node '{}': params changed to {:?}", cell.id, params);
    config.params = params;
    cell.touch(&mut config);
    drop(config);
    cell.emit(PipelineEvent::NodeModified {
        node_id: cell.id.clone(),
    });
    true
}

/// Typed handle on a pipeline node
///
/// Cloning the handle shares the node.
///
/// # Example
///
/// ```ignore
/// let source = Node::new("grid", PointGridSource, GridParams::default());
/// let threshold = Node::new("threshold", ThresholdFilter, ThresholdParams::above(5.0));
/// threshold.set_input_connection(0, &source.output_port(0)?)?;
/// let result = threshold.output_port(0)?.data()?;
/// ```
pub struct Node<A: Algorithm> {
    cell: Arc<NodeCell<A>>,
}

impl<A: Algorithm> Clone for Node<A> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<A: Algorithm> Node<A> {
    /// Create a node from an algorithm and its initial parameters
    pub fn new(id: impl Into<NodeId>, algorithm: A, params: A::Params) -> Self {
        let metadata = algorithm.metadata();
        let config = NodeConfig {
            params,
            inputs: vec![Vec::new(); metadata.inputs.len()],
            selections: Vec::new(),
            requested_time: None,
            modified: Version::next(),
        };
        Self {
            cell: Arc::new(NodeCell {
                id: id.into(),
                key: NEXT_NODE_KEY.fetch_add(1, Ordering::Relaxed),
                algorithm,
                metadata,
                config: Mutex::new(config),
                executive: Executive::new(),
                events: RwLock::new(None),
            }),
        }
    }

    /// Create a node with default algorithm state and parameters
    pub fn with_defaults(id: impl Into<NodeId>) -> Self
    where
        A: Default,
        A::Params: Default,
    {
        Self::new(id, A::default(), A::Params::default())
    }

    pub fn id(&self) -> &str {
        &self.cell.id
    }

    pub fn algorithm(&self) -> &A {
        &self.cell.algorithm
    }

    pub fn metadata(&self) -> &AlgorithmMetadata {
        &self.cell.metadata
    }

    /// Copy of the current parameters
    pub fn params(&self) -> A::Params {
        self.cell.config.lock().params.clone()
    }

    /// Replace the parameters
    ///
    /// Increments the modification counter only if the value differs, so
    /// writing the current value keeps cached output valid. Returns whether
    /// the parameters changed.
    pub fn set_params(&self, params: A::Params) -> bool {
        set_params(&self.cell, params)
    }

    /// Edit the parameters in place; same change detection as `set_params`
    pub fn update_params(&self, edit: impl FnOnce(&mut A::Params)) -> bool {
        let mut params = self.params();
        edit(&mut params);
        self.set_params(params)
    }

    /// Force an invalidation
    pub fn mark_modified(&self) {
        self.cell.mark_modified();
    }

    pub fn modified(&self) -> Version {
        self.cell.modified()
    }

    /// Output port handle
    pub fn output_port(&self, index: usize) -> Result<OutputPort> {
        OutputPort::new(self.as_dyn(), index)
    }

    /// Bind an input slot to an upstream port
    ///
    /// Fails with `Cycle` if `port` is produced downstream of this node; the
    /// graph is left unchanged.
    pub fn set_input_connection(&self, slot: usize, port: &OutputPort) -> Result<()> {
        self.cell.set_input_connection(slot, port.clone())
    }

    /// Append a connection to a repeatable slot
    pub fn add_input_connection(&self, slot: usize, port: &OutputPort) -> Result<()> {
        self.cell.add_input_connection(slot, port.clone())
    }

    pub fn remove_input_connections(&self, slot: usize) -> Result<()> {
        self.cell.remove_input_connections(slot)
    }

    /// Select the array an algorithm processes at `index`
    pub fn set_input_array_to_process(&self, index: usize, selection: ArraySelection) -> bool {
        self.cell.set_input_array_to_process(index, selection)
    }

    /// Update every output
    pub fn update(&self) -> Result<()> {
        self.cell.update(&UpdateRequest::default())
    }

    /// Update if needed and return one output
    pub fn output_data(&self, index: usize) -> Result<DataObject> {
        self.output_port(index)?.data()
    }

    pub fn state(&self) -> ExecutiveState {
        self.cell.state()
    }

    pub fn executive(&self) -> &Executive {
        &self.cell.executive
    }

    /// Number of successful executions
    pub fn execution_count(&self) -> u64 {
        self.cell.executive.execution_count()
    }

    pub fn set_event_sink(&self, sink: Option<Arc<dyn EventSink>>) {
        self.cell.set_event_sink(sink);
    }

    /// Type-erased handle sharing the same node
    pub fn as_dyn(&self) -> DynNode {
        Arc::clone(&self.cell) as DynNode
    }
}

impl<A: Algorithm> From<Node<A>> for DynNode {
    fn from(node: Node<A>) -> Self {
        node.cell
    }
}

impl<A: Algorithm> std::fmt::Debug for Node<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.cell.id)
            .field("node_type", &self.cell.metadata.node_type)
            .finish()
    }
}
