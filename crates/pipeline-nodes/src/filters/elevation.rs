//! Elevation Filter
//!
//! Writes a point scalar measuring each point's position along a line.

use pipeline_engine::{
    Algorithm, AlgorithmDescriptor, AlgorithmMetadata, ArrayInfo, Association, AttributeArray,
    DataObject, ExecuteContext, NodeCategory, PipelineError, PortInformation, PortMetadata,
    Result,
};
use serde::{Deserialize, Serialize};

use super::POINT_KINDS;

/// Configuration for the elevation filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElevationParams {
    pub low_point: [f64; 3],
    pub high_point: [f64; 3],
    /// Values written at the low and high points
    pub scalar_range: [f64; 2],
    pub array_name: String,
}

impl Default for ElevationParams {
    fn default() -> Self {
        Self {
            low_point: [0.0; 3],
            high_point: [0.0, 0.0, 1.0],
            scalar_range: [0.0, 1.0],
            array_name: "Elevation".to_string(),
        }
    }
}

/// Elevation Filter
///
/// Each point is projected onto the low->high line; the normalized position
/// is clamped to `[0, 1]` and mapped into `scalar_range`. The new array
/// becomes the active point scalars. A zero-length line is a computation
/// error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElevationFilter;

impl ElevationFilter {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_OUTPUT: &'static str = "output";
}

impl AlgorithmDescriptor for ElevationFilter {
    fn descriptor() -> AlgorithmMetadata {
        AlgorithmMetadata::new(
            "elevation",
            NodeCategory::Filter,
            "Elevation",
            "Scalar from each point's position along a line",
        )
        .input(PortMetadata::required(Self::PORT_INPUT, "Input").accepting(POINT_KINDS))
        .output(PortMetadata::optional(Self::PORT_OUTPUT, "Output"))
    }
}

inventory::submit!(pipeline_engine::NodeFactoryFn {
    metadata: ElevationFilter::descriptor,
    create: pipeline_engine::create_node::<ElevationFilter>,
});

impl Algorithm for ElevationFilter {
    type Params = ElevationParams;

    fn metadata(&self) -> AlgorithmMetadata {
        Self::descriptor()
    }

    fn information(
        &self,
        params: &ElevationParams,
        inputs: &[Vec<PortInformation>],
    ) -> Result<Vec<PortInformation>> {
        let mut info = inputs
            .first()
            .and_then(|slot| slot.first())
            .cloned()
            .unwrap_or_default();
        info.arrays
            .retain(|a| !(a.name == params.array_name && a.association == Association::Point));
        info.arrays.push(ArrayInfo {
            name: params.array_name.clone(),
            association: Association::Point,
            components: 1,
        });
        Ok(vec![info])
    }

    fn execute(
        &self,
        params: &ElevationParams,
        ctx: &ExecuteContext<'_>,
    ) -> Result<Vec<DataObject>> {
        let input = ctx.input(0)?;
        let direction: Vec<f64> = (0..3)
            .map(|i| params.high_point[i] - params.low_point[i])
            .collect();
        let length_sq: f64 = direction.iter().map(|d| d * d).sum();
        if !length_sq.is_normal() {
            return Err(PipelineError::computation(format!(
                "elevation '{}' has a degenerate line",
                ctx.node_id()
            )));
        }

        let [low, high] = params.scalar_range;
        let values = (0..input.point_count())
            .filter_map(|i| input.point(i))
            .map(|p| {
                let t: f64 = (0..3)
                    .map(|k| (p[k] - params.low_point[k]) * direction[k])
                    .sum::<f64>()
                    / length_sq;
                low + t.clamp(0.0, 1.0) * (high - low)
            })
            .collect();

        let mut output = input.shallow_copy();
        output.remove_array(&params.array_name, Association::Point);
        output.add_scalars(
            Association::Point,
            AttributeArray::scalars(params.array_name.clone(), values),
        )?;
        Ok(vec![output])
    }
}
