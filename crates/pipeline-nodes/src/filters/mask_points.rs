//! Mask Points
//!
//! Keeps a regular subsample of the input points.

use pipeline_engine::{
    Algorithm, AlgorithmDescriptor, AlgorithmMetadata, DataObject, ExecuteContext, NodeCategory,
    PipelineError, PortInformation, PortMetadata, Result,
};
use serde::{Deserialize, Serialize};

use super::{subset_information, subset_points, POINT_KINDS};

/// Configuration for point masking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaskParams {
    /// Keep every `on_ratio`-th point
    pub on_ratio: usize,
    /// Index of the first kept point
    pub offset: usize,
    /// Upper bound on kept points
    pub max_points: Option<usize>,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            on_ratio: 2,
            offset: 0,
            max_points: None,
        }
    }
}

/// Mask Points
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskPoints;

impl MaskPoints {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_OUTPUT: &'static str = "output";
}

impl AlgorithmDescriptor for MaskPoints {
    fn descriptor() -> AlgorithmMetadata {
        AlgorithmMetadata::new(
            "mask-points",
            NodeCategory::Filter,
            "Mask Points",
            "Keeps every n-th point",
        )
        .input(PortMetadata::required(Self::PORT_INPUT, "Input").accepting(POINT_KINDS))
        .output(PortMetadata::optional(Self::PORT_OUTPUT, "Output"))
    }
}

inventory::submit!(pipeline_engine::NodeFactoryFn {
    metadata: MaskPoints::descriptor,
    create: pipeline_engine::create_node::<MaskPoints>,
});

impl Algorithm for MaskPoints {
    type Params = MaskParams;

    fn metadata(&self) -> AlgorithmMetadata {
        Self::descriptor()
    }

    fn information(
        &self,
        _params: &MaskParams,
        inputs: &[Vec<PortInformation>],
    ) -> Result<Vec<PortInformation>> {
        Ok(vec![subset_information(
            inputs.first().and_then(|slot| slot.first()),
        )])
    }

    fn execute(&self, params: &MaskParams, ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>> {
        if params.on_ratio == 0 {
            return Err(PipelineError::invalid_input(format!(
                "mask '{}' needs an on ratio of at least 1",
                ctx.node_id()
            )));
        }
        let input = ctx.input(0)?;
        let kept: Vec<usize> = (params.offset..input.point_count())
            .step_by(params.on_ratio)
            .take(params.max_points.unwrap_or(usize::MAX))
            .collect();
        Ok(vec![subset_points(input, &kept)?])
    }
}
