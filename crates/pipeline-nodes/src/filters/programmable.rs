//! Programmable Filter
//!
//! A filter whose transform is a host-supplied closure. It is built in code
//! and is not part of the builtin registry.

use std::fmt;
use std::sync::Arc;

use pipeline_engine::{
    Algorithm, AlgorithmMetadata, DataObject, ExecuteContext, NodeCategory, PortMetadata, Result,
};
use serde_json::Value;

type Transform = dyn Fn(&Value, &ExecuteContext<'_>) -> Result<Vec<DataObject>> + Send + Sync;

/// Programmable Filter
///
/// Parameters are free-form JSON handed to the closure, so changing them
/// through the node invalidates it like any other parameter.
#[derive(Clone)]
pub struct ProgrammableFilter {
    metadata: AlgorithmMetadata,
    transform: Arc<Transform>,
}

impl ProgrammableFilter {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_OUTPUT: &'static str = "output";

    /// One required input and one output
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(&Value, &ExecuteContext<'_>) -> Result<Vec<DataObject>> + Send + Sync + 'static,
    {
        Self {
            metadata: AlgorithmMetadata::new(
                "programmable",
                NodeCategory::Filter,
                "Programmable Filter",
                "Runs a host-supplied transform",
            )
            .input(PortMetadata::required(Self::PORT_INPUT, "Input"))
            .output(PortMetadata::optional(Self::PORT_OUTPUT, "Output")),
            transform: Arc::new(transform),
        }
    }

    /// Replace the output ports with `count` generic outputs
    pub fn with_outputs(mut self, count: usize) -> Self {
        self.metadata.outputs.clear();
        for i in 0..count {
            self.metadata = self
                .metadata
                .output(PortMetadata::optional(format!("output{i}"), format!("Output {i}")));
        }
        self
    }

    /// Make this a source by dropping its input port
    pub fn without_inputs(mut self) -> Self {
        self.metadata.inputs.clear();
        self.metadata.category = NodeCategory::Source;
        self
    }
}

impl fmt::Debug for ProgrammableFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgrammableFilter")
            .field("outputs", &self.metadata.outputs.len())
            .finish_non_exhaustive()
    }
}

impl Algorithm for ProgrammableFilter {
    type Params = Value;

    fn metadata(&self) -> AlgorithmMetadata {
        self.metadata.clone()
    }

    fn execute(&self, params: &Value, ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>> {
        (self.transform)(params, ctx)
    }
}
