//! The algorithm capability and its execution context
//!
//! An [`Algorithm`] supplies the per-node transform. Pipeline plumbing
//! (caching, upstream traversal, invalidation) lives in the executive that
//! wraps it, so node variants only implement `execute` and, optionally,
//! `information`.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::data::{Association, AttributeArray, DataObject};
use crate::descriptor::AlgorithmMetadata;
use crate::error::{PipelineError, Result};
use crate::information::PortInformation;

/// Bound for algorithm parameters
///
/// Parameters are plain values: setters compare old and new values so that
/// writing an unchanged value does not invalidate the node.
pub trait Params:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> Params for T where
    T: Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Per-node transform from input data objects to output data objects
pub trait Algorithm: Send + Sync + 'static {
    /// Parameter value object owned by the node
    type Params: Params;

    /// Ports, category and labels
    fn metadata(&self) -> AlgorithmMetadata;

    /// Describe the outputs without executing
    ///
    /// `inputs[slot]` holds the information of every connection on that
    /// slot. The default forwards the first input's information to every
    /// output (or empty information for sources).
    fn information(
        &self,
        _params: &Self::Params,
        inputs: &[Vec<PortInformation>],
    ) -> Result<Vec<PortInformation>> {
        let forwarded = inputs
            .first()
            .and_then(|slot| slot.first())
            .cloned()
            .unwrap_or_default();
        Ok(vec![forwarded; self.metadata().outputs.len()])
    }

    /// Compute every output from the inputs and current parameters
    ///
    /// Must be a pure function of `params` and `ctx`. Returns one data object
    /// per output port, in port order. Empty outputs are a valid result.
    fn execute(&self, params: &Self::Params, ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>>;
}

/// Which input array an algorithm should process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArraySelection {
    /// Input slot
    #[serde(default)]
    pub port: usize,
    /// Connection index within the slot
    #[serde(default)]
    pub connection: usize,
    /// Association to search
    pub association: Association,
    /// Array name; `None` selects the active scalars
    #[serde(default)]
    pub name: Option<String>,
}

impl ArraySelection {
    /// Named array on the first connection of slot 0
    pub fn named(association: Association, name: impl Into<String>) -> Self {
        Self {
            port: 0,
            connection: 0,
            association,
            name: Some(name.into()),
        }
    }

    /// Active scalars of the first connection of slot 0
    pub fn active(association: Association) -> Self {
        Self {
            port: 0,
            connection: 0,
            association,
            name: None,
        }
    }
}

impl Default for ArraySelection {
    fn default() -> Self {
        Self::active(Association::Point)
    }
}

/// Everything an algorithm may read while executing
pub struct ExecuteContext<'a> {
    node_id: &'a str,
    inputs: Vec<Vec<DataObject>>,
    selections: &'a [Option<ArraySelection>],
    update_time: Option<f64>,
}

impl<'a> ExecuteContext<'a> {
    pub fn new(
        node_id: &'a str,
        inputs: Vec<Vec<DataObject>>,
        selections: &'a [Option<ArraySelection>],
        update_time: Option<f64>,
    ) -> Self {
        Self {
            node_id,
            inputs,
            selections,
            update_time,
        }
    }

    /// Id of the executing node
    pub fn node_id(&self) -> &str {
        self.node_id
    }

    /// Number of input slots
    pub fn slot_count(&self) -> usize {
        self.inputs.len()
    }

    /// First connection of a slot
    ///
    /// Fails with `InvalidInput` when the slot is unbound.
    pub fn input(&self, slot: usize) -> Result<&DataObject> {
        self.connections(slot).first().ok_or_else(|| {
            PipelineError::invalid_input(format!(
                "input slot {} of '{}' is not connected",
                slot, self.node_id
            ))
        })
    }

    /// All connections of a slot, possibly empty
    pub fn connections(&self, slot: usize) -> &[DataObject] {
        self.inputs.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Time the executive is serving, after snapping
    pub fn update_time(&self) -> Option<f64> {
        self.update_time
    }

    /// Configured selection for an array index, defaulting to active point scalars
    pub fn selection(&self, index: usize) -> ArraySelection {
        self.selections
            .get(index)
            .cloned()
            .flatten()
            .unwrap_or_default()
    }

    /// Resolve an input array selection
    ///
    /// Fails with `InvalidInput` if the selected connection is unbound or
    /// the array is absent.
    pub fn input_array(&self, index: usize) -> Result<(AttributeArray, Association)> {
        let selection = self.selection(index);
        let data = self
            .connections(selection.port)
            .get(selection.connection)
            .ok_or_else(|| {
                PipelineError::invalid_input(format!(
                    "'{}' has no connection {} on slot {}",
                    self.node_id, selection.connection, selection.port
                ))
            })?;
        let array = match &selection.name {
            Some(name) => data.array(name, selection.association),
            None => data.active_scalars(selection.association),
        };
        let array = array.ok_or_else(|| {
            PipelineError::invalid_input(format!(
                "'{}' requires {} array {} which is absent from its input",
                self.node_id,
                selection.association,
                selection
                    .name
                    .as_deref()
                    .map(|n| format!("'{}'", n))
                    .unwrap_or_else(|| "(active scalars)".to_string())
            ))
        })?;
        Ok((array.clone(), selection.association))
    }
}
