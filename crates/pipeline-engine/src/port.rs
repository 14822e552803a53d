//! Output ports
//!
//! A port is a handle on one output of a producing node. Holding a port keeps
//! the producer (and, through its own connections, everything upstream)
//! alive; a producer is dropped once no consumer or handle references it.

use std::fmt;

use crate::data::DataObject;
use crate::error::{PipelineError, Result};
use crate::executive::ExecutiveState;
use crate::information::{PortInformation, UpdateRequest};
use crate::node::DynNode;
use crate::version::Version;

/// One output of a pipeline node
#[derive(Clone)]
pub struct OutputPort {
    node: DynNode,
    index: usize,
}

impl OutputPort {
    /// Port `index` of `node`
    ///
    /// Fails with `InvalidPort` if the node has no such output.
    pub fn new(node: DynNode, index: usize) -> Result<Self> {
        if index >= node.output_count() {
            return Err(PipelineError::InvalidPort {
                node_id: node.id().to_string(),
                index,
            });
        }
        Ok(Self { node, index })
    }

    /// Producing node
    pub fn node(&self) -> &DynNode {
        &self.node
    }

    pub fn node_id(&self) -> &str {
        self.node.id()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Metadata computed without executing any transform
    pub fn information(&self) -> Result<PortInformation> {
        self.node.information(self.index)
    }

    /// Bring the producing node up to date
    pub fn update(&self) -> Result<()> {
        self.node.update(&UpdateRequest::default())
    }

    /// Update if stale, then return the cached output
    pub fn data(&self) -> Result<DataObject> {
        self.update()?;
        self.cached_data().ok_or_else(|| {
            PipelineError::computation(format!(
                "'{}' produced no data on port {}",
                self.node.id(),
                self.index
            ))
        })
    }

    /// Cached output without triggering an update
    pub fn cached_data(&self) -> Option<DataObject> {
        self.node.executive().output(self.index)
    }

    /// Validity token of this port's current output
    pub fn version(&self) -> Option<Version> {
        self.node.executive().output_version(self.index)
    }

    pub fn state(&self) -> ExecutiveState {
        self.node.state()
    }

    /// Ask the producer for a time value; served after snapping on the next update
    pub fn set_update_time(&self, time: Option<f64>) {
        self.node.set_requested_time(time);
    }

    /// Whether both handles refer to the same output of the same node
    pub fn same_as(&self, other: &OutputPort) -> bool {
        self.node.key() == other.node.key() && self.index == other.index
    }
}

impl fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputPort")
            .field("node", &self.node.id())
            .field("index", &self.index)
            .finish()
    }
}
