//! Shift/Scale Filter
//!
//! Rewrites a selected array as `(v + shift) * scale`.

use pipeline_engine::{
    Algorithm, AlgorithmDescriptor, AlgorithmMetadata, AttributeArray, DataObject, ExecuteContext,
    NodeCategory, PipelineError, PortMetadata, Result,
};
use serde::{Deserialize, Serialize};

/// Configuration for the shift/scale filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShiftScaleParams {
    pub shift: f64,
    pub scale: f64,
    /// Name of the result; `None` replaces the selected array
    pub output_name: Option<String>,
}

impl Default for ShiftScaleParams {
    fn default() -> Self {
        Self {
            shift: 0.0,
            scale: 1.0,
            output_name: None,
        }
    }
}

/// Shift/Scale Filter
///
/// Works on array selection 0 in any association. The input array is never
/// written: the result is a new array, flagged active if it replaces the
/// active scalars or is added under a new name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftScale;

impl ShiftScale {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_OUTPUT: &'static str = "output";
}

impl AlgorithmDescriptor for ShiftScale {
    fn descriptor() -> AlgorithmMetadata {
        AlgorithmMetadata::new(
            "shift-scale",
            NodeCategory::Filter,
            "Shift/Scale",
            "Rewrites an array as (v + shift) * scale",
        )
        .input(PortMetadata::required(Self::PORT_INPUT, "Input"))
        .output(PortMetadata::optional(Self::PORT_OUTPUT, "Output"))
    }
}

inventory::submit!(pipeline_engine::NodeFactoryFn {
    metadata: ShiftScale::descriptor,
    create: pipeline_engine::create_node::<ShiftScale>,
});

impl Algorithm for ShiftScale {
    type Params = ShiftScaleParams;

    fn metadata(&self) -> AlgorithmMetadata {
        Self::descriptor()
    }

    fn execute(
        &self,
        params: &ShiftScaleParams,
        ctx: &ExecuteContext<'_>,
    ) -> Result<Vec<DataObject>> {
        if !params.shift.is_finite() || !params.scale.is_finite() {
            return Err(PipelineError::computation(format!(
                "shift-scale '{}' needs finite shift and scale",
                ctx.node_id()
            )));
        }
        let (array, association) = ctx.input_array(0)?;
        let source_name = array.name().unwrap_or("scalars").to_string();
        let name = params
            .output_name
            .clone()
            .unwrap_or_else(|| source_name.clone());

        let values = array.with_values(|values| {
            values
                .iter()
                .map(|v| (v + params.shift) * params.scale)
                .collect()
        });
        let result = AttributeArray::new(name.clone(), array.components(), values)?;

        let mut output = ctx.input(0)?.shallow_copy();
        let was_active = output.active_scalars_name(association) == Some(source_name.as_str());
        output.remove_array(&name, association);
        if was_active || name != source_name {
            output.add_scalars(association, result)?;
        } else {
            output.add_array(association, result)?;
        }
        Ok(vec![output])
    }
}
