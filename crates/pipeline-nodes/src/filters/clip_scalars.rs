//! Clip by Scalar
//!
//! Splits the input points at a scalar value into two outputs.

use pipeline_engine::{
    Algorithm, AlgorithmDescriptor, AlgorithmMetadata, Association, DataObject, ExecuteContext,
    NodeCategory, PipelineError, PortInformation, PortMetadata, Result,
};
use serde::{Deserialize, Serialize};

use super::{subset_information, subset_points, POINT_KINDS};

/// Configuration for clipping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipParams {
    /// Points with scalar `>= value` are kept
    pub value: f64,
}

/// Clip by Scalar
///
/// Output 0 holds the kept points, output 1 the clipped-away rest (including
/// points whose scalar is NaN). Both come from one execution and share its
/// validity token.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipScalars;

impl ClipScalars {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_KEPT: &'static str = "kept";
    pub const PORT_CLIPPED: &'static str = "clipped";
}

impl AlgorithmDescriptor for ClipScalars {
    fn descriptor() -> AlgorithmMetadata {
        AlgorithmMetadata::new(
            "clip-scalars",
            NodeCategory::Filter,
            "Clip by Scalar",
            "Splits points at a scalar value",
        )
        .input(PortMetadata::required(Self::PORT_INPUT, "Input").accepting(POINT_KINDS))
        .output(PortMetadata::optional(Self::PORT_KEPT, "Kept"))
        .output(PortMetadata::optional(Self::PORT_CLIPPED, "Clipped"))
    }
}

inventory::submit!(pipeline_engine::NodeFactoryFn {
    metadata: ClipScalars::descriptor,
    create: pipeline_engine::create_node::<ClipScalars>,
});

impl Algorithm for ClipScalars {
    type Params = ClipParams;

    fn metadata(&self) -> AlgorithmMetadata {
        Self::descriptor()
    }

    fn information(
        &self,
        _params: &ClipParams,
        inputs: &[Vec<PortInformation>],
    ) -> Result<Vec<PortInformation>> {
        let info = subset_information(inputs.first().and_then(|slot| slot.first()));
        Ok(vec![info.clone(), info])
    }

    fn execute(&self, params: &ClipParams, ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>> {
        let input = ctx.input(0)?;
        let (scalars, association) = ctx.input_array(0)?;
        if association != Association::Point {
            return Err(PipelineError::invalid_input(format!(
                "clip '{}' needs point scalars, got {} data",
                ctx.node_id(),
                association
            )));
        }

        let (kept, clipped): (Vec<usize>, Vec<usize>) = (0..scalars.tuple_count())
            .partition(|&i| scalars.value(i, 0).is_some_and(|v| v >= params.value));
        Ok(vec![
            subset_points(input, &kept)?,
            subset_points(input, &clipped)?,
        ])
    }
}
