//! Threshold Filter
//!
//! Keeps the points whose selected scalar satisfies a criterion.

use pipeline_engine::{
    Algorithm, AlgorithmDescriptor, AlgorithmMetadata, Association, DataObject, ExecuteContext,
    NodeCategory, PipelineError, PortInformation, PortMetadata, Result,
};
use serde::{Deserialize, Serialize};

use super::{subset_information, subset_points, POINT_KINDS};

/// Comparison applied to each scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// `value > lower`
    Above,
    /// `value < upper`
    Below,
    /// `lower <= value <= upper`
    Between,
}

/// Configuration for the threshold filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    pub mode: ThresholdMode,
    pub lower: f64,
    pub upper: f64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            mode: ThresholdMode::Between,
            lower: 0.0,
            upper: 1.0,
        }
    }
}

impl ThresholdParams {
    /// Keep values strictly greater than `lower`
    pub fn above(lower: f64) -> Self {
        Self {
            mode: ThresholdMode::Above,
            lower,
            upper: f64::INFINITY,
        }
    }

    /// Keep values strictly less than `upper`
    pub fn below(upper: f64) -> Self {
        Self {
            mode: ThresholdMode::Below,
            lower: f64::NEG_INFINITY,
            upper,
        }
    }

    /// Keep values in `[lower, upper]`
    pub fn between(lower: f64, upper: f64) -> Self {
        Self {
            mode: ThresholdMode::Between,
            lower,
            upper,
        }
    }

    /// Whether `value` passes; NaN never does
    pub fn accepts(&self, value: f64) -> bool {
        match self.mode {
            ThresholdMode::Above => value > self.lower,
            ThresholdMode::Below => value < self.upper,
            ThresholdMode::Between => value >= self.lower && value <= self.upper,
        }
    }
}

/// Threshold Filter
///
/// Output is a point set holding the passing points and every point array
/// subset to them. The scalar comes from array selection 0 (active point
/// scalars by default) and must be point data.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdFilter;

impl ThresholdFilter {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_OUTPUT: &'static str = "output";
}

impl AlgorithmDescriptor for ThresholdFilter {
    fn descriptor() -> AlgorithmMetadata {
        AlgorithmMetadata::new(
            "threshold",
            NodeCategory::Filter,
            "Threshold",
            "Keeps points whose scalar satisfies a criterion",
        )
        .input(PortMetadata::required(Self::PORT_INPUT, "Input").accepting(POINT_KINDS))
        .output(PortMetadata::optional(Self::PORT_OUTPUT, "Output"))
    }
}

inventory::submit!(pipeline_engine::NodeFactoryFn {
    metadata: ThresholdFilter::descriptor,
    create: pipeline_engine::create_node::<ThresholdFilter>,
});

impl Algorithm for ThresholdFilter {
    type Params = ThresholdParams;

    fn metadata(&self) -> AlgorithmMetadata {
        Self::descriptor()
    }

    fn information(
        &self,
        _params: &ThresholdParams,
        inputs: &[Vec<PortInformation>],
    ) -> Result<Vec<PortInformation>> {
        let input = inputs.first().and_then(|slot| slot.first());
        Ok(vec![subset_information(input)])
    }

    fn execute(
        &self,
        params: &ThresholdParams,
        ctx: &ExecuteContext<'_>,
    ) -> Result<Vec<DataObject>> {
        let input = ctx.input(0)?;
        let (scalars, association) = ctx.input_array(0)?;
        if association != Association::Point {
            return Err(PipelineError::invalid_input(format!(
                "threshold '{}' needs point scalars, got {} data",
                ctx.node_id(),
                association
            )));
        }

        let kept: Vec<usize> = (0..scalars.tuple_count())
            .filter(|&i| scalars.value(i, 0).is_some_and(|v| params.accepts(v)))
            .collect();
        log::debug!(
            "Threshold '{}': kept {} of {} points",
            ctx.node_id(),
            kept.len(),
            input.point_count()
        );
        Ok(vec![subset_points(input, &kept)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::testing::grid_3x3;
    use crate::sources::{GridParams, PointGridSource};
    use pipeline_engine::{ArraySelection, AttributeArray, DataKind, ExecutiveState, Node};

    fn run(params: ThresholdParams, input: DataObject) -> Result<DataObject> {
        let ctx = ExecuteContext::new("t", vec![vec![input]], &[], None);
        Ok(ThresholdFilter.execute(&params, &ctx)?.remove(0))
    }

    #[test]
    fn test_descriptor() {
        let meta = ThresholdFilter::descriptor();
        assert_eq!(meta.node_type, "threshold");
        assert_eq!(meta.category, NodeCategory::Filter);
        assert!(meta.inputs[0].required);
        assert!(!meta.inputs[0].accepts(DataKind::Table));
    }

    #[test]
    fn test_above_is_strict() {
        let output = run(ThresholdParams::above(5.0), grid_3x3()).unwrap();
        assert_eq!(
            output.array("scalars", Association::Point).unwrap().to_vec(),
            vec![6.0, 7.0, 8.0, 9.0]
        );
        assert_eq!(output.point(0), Some([2.0, 1.0, 0.0]));
    }

    #[test]
    fn test_below_and_between() {
        let below = run(ThresholdParams::below(3.0), grid_3x3()).unwrap();
        assert_eq!(below.point_count(), 2);

        let between = run(ThresholdParams::between(3.0, 5.0), grid_3x3()).unwrap();
        assert_eq!(
            between.active_scalars(Association::Point).unwrap().to_vec(),
            vec![3.0, 4.0, 5.0]
        );
    }

    #[test]
    fn test_nothing_passes_is_empty_success() {
        let output = run(ThresholdParams::above(100.0), grid_3x3()).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_nan_never_passes() {
        let mut input = DataObject::new(pipeline_engine::Geometry::PointSet {
            points: vec![[0.0; 3]; 3],
        });
        input
            .add_scalars(
                Association::Point,
                AttributeArray::scalars("s", vec![1.0, f64::NAN, 3.0]),
            )
            .unwrap();
        let output = run(ThresholdParams::between(f64::NEG_INFINITY, f64::INFINITY), input).unwrap();
        assert_eq!(output.point_count(), 2);
    }

    #[test]
    fn test_missing_scalars() {
        let input = DataObject::new(pipeline_engine::Geometry::PointSet {
            points: vec![[0.0; 3]],
        });
        assert!(matches!(
            run(ThresholdParams::above(0.0), input),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_table_input() {
        let grid = Node::new("grid", PointGridSource, GridParams::default());
        let table = Node::new(
            "table",
            crate::DataObjectSource::new(DataObject::new(pipeline_engine::Geometry::Table {
                rows: 0,
            })),
            (),
        );
        let threshold = Node::new("t", ThresholdFilter, ThresholdParams::above(0.0));
        threshold
            .set_input_connection(0, &table.output_port(0).unwrap())
            .unwrap();
        assert!(matches!(
            threshold.update(),
            Err(PipelineError::InvalidInput(_))
        ));

        threshold
            .set_input_connection(0, &grid.output_port(0).unwrap())
            .unwrap();
        threshold.update().unwrap();
        assert_eq!(threshold.state(), ExecutiveState::Valid);
    }

    #[test]
    fn test_end_to_end_reexecutes_once() {
        let source = Node::new(
            "grid",
            PointGridSource,
            GridParams {
                dimensions: [3, 3, 1],
                scalars: Some((1..=9).map(f64::from).collect()),
                ..GridParams::default()
            },
        );
        let threshold = Node::new("threshold", ThresholdFilter, ThresholdParams::above(5.0));
        threshold
            .set_input_connection(0, &source.output_port(0).unwrap())
            .unwrap();
        threshold.set_input_array_to_process(
            0,
            ArraySelection::named(Association::Point, GridParams::default().array_name),
        );

        let output = threshold.output_data(0).unwrap();
        assert_eq!(
            output.active_scalars(Association::Point).unwrap().to_vec(),
            vec![6.0, 7.0, 8.0, 9.0]
        );
        assert_eq!(threshold.execution_count(), 1);

        source.update_params(|p| p.scalars = Some((11..=19).map(f64::from).collect()));
        let output = threshold.output_data(0).unwrap();
        assert_eq!(output.point_count(), 9);
        assert_eq!(threshold.execution_count(), 2);
        assert_eq!(source.execution_count(), 2);

        threshold.output_data(0).unwrap();
        assert_eq!(threshold.execution_count(), 2);
    }
}
