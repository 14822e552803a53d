//! Pipeline Engine - demand-driven visualization pipelines
//!
//! This crate provides a pull-based dataflow engine for visualization
//! pipelines: sources and filters connected through output ports, executed
//! lazily on request and cached until something upstream changes. It
//! supports:
//!
//! - Version-tracked caching (only recompute what's stale)
//! - Information passes that describe outputs without executing
//! - Time-step requests snapped to what sources can serve
//! - Named-array selection for filters
//! - Serializable pipeline descriptions with validation
//!
//! # Architecture
//!
//! - [`Algorithm`]: per-node transform, implemented by node crates
//! - [`Node`]: typed handle composing an algorithm with an [`Executive`]
//! - [`OutputPort`]: shared handle on one output; `data()` pulls updates
//! - [`Pipeline`]: named node set with graph queries and bulk updates
//! - [`NodeRegistry`]: node types by name, populated at link time
//!
//! # Example
//!
//! ```ignore
//! use pipeline_engine::Node;
//! use pipeline_nodes::{PointGridSource, ThresholdFilter, ThresholdParams};
//!
//! let grid = Node::<PointGridSource>::with_defaults("grid");
//! let threshold = Node::new("threshold", ThresholdFilter, ThresholdParams::above(5.0));
//! threshold.set_input_connection(0, &grid.output_port(0)?)?;
//! let kept = threshold.output_data(0)?;
//! ```

pub mod algorithm;
pub mod data;
pub mod description;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod executive;
pub mod graph;
pub mod information;
pub mod node;
pub mod port;
pub mod registry;
pub mod validation;
pub mod version;

#[cfg(test)]
mod test_support;

// Re-export key types
pub use algorithm::{Algorithm, ArraySelection, ExecuteContext, Params};
pub use data::{
    Association, AttributeArray, Bounds, Cell, CellKind, DataKind, DataObject, Geometry,
    ImageGeometry,
};
pub use description::{EdgeDescription, NodeDescription, PipelineBuilder, PipelineDescription};
pub use descriptor::{AlgorithmDescriptor, AlgorithmMetadata, NodeCategory, PortMetadata};
pub use error::{PipelineError, Result};
pub use events::{EventError, EventSink, NullEventSink, PipelineEvent, VecEventSink};
pub use executive::{Executive, ExecutiveState, ExecutiveStats};
pub use graph::Pipeline;
pub use information::{ArrayInfo, PortInformation, TimeDomain, UpdateRequest};
pub use node::{DynNode, Node, NodeId, PipelineNode};
pub use port::OutputPort;
pub use registry::{create_node, NodeFactory, NodeFactoryFn, NodeRegistry};
pub use validation::{ensure_valid, validate_description, ValidationError};
pub use version::Version;
