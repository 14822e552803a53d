//! Append Points
//!
//! Concatenates the points of every connection on its input slot.

use pipeline_engine::{
    Algorithm, AlgorithmDescriptor, AlgorithmMetadata, Association, AttributeArray, DataKind,
    DataObject, ExecuteContext, Geometry, NodeCategory, PortInformation, PortMetadata, Result,
};

use super::POINT_KINDS;

/// Append Points
///
/// Output is a point set. Point arrays are kept only when every input has an
/// array of that name with the same component count; the first input's
/// active scalars stay active when they survive.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendPoints;

impl AppendPoints {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_OUTPUT: &'static str = "output";
}

impl AlgorithmDescriptor for AppendPoints {
    fn descriptor() -> AlgorithmMetadata {
        AlgorithmMetadata::new(
            "append-points",
            NodeCategory::Filter,
            "Append Points",
            "Concatenates the points of all inputs",
        )
        .input(
            PortMetadata::required(Self::PORT_INPUT, "Inputs")
                .multiple()
                .accepting(POINT_KINDS),
        )
        .output(PortMetadata::optional(Self::PORT_OUTPUT, "Output"))
    }
}

inventory::submit!(pipeline_engine::NodeFactoryFn {
    metadata: AppendPoints::descriptor,
    create: pipeline_engine::create_node::<AppendPoints>,
});

/// Names of point arrays present in every input with matching components
fn common_arrays(inputs: &[DataObject]) -> Vec<(String, usize)> {
    let Some((first, rest)) = inputs.split_first() else {
        return Vec::new();
    };
    first
        .arrays(Association::Point)
        .iter()
        .filter_map(|a| Some((a.name()?.to_string(), a.components())))
        .filter(|(name, components)| {
            rest.iter().all(|other| {
                other
                    .array(name, Association::Point)
                    .is_some_and(|a| a.components() == *components)
            })
        })
        .collect()
}

impl Algorithm for AppendPoints {
    type Params = ();

    fn metadata(&self) -> AlgorithmMetadata {
        Self::descriptor()
    }

    fn information(
        &self,
        _params: &(),
        inputs: &[Vec<PortInformation>],
    ) -> Result<Vec<PortInformation>> {
        let mut info = PortInformation::with_kind(DataKind::PointSet);
        let connections = inputs.first().map(Vec::as_slice).unwrap_or(&[]);
        if let Some((first, rest)) = connections.split_first() {
            info.time = first.time.clone();
            info.arrays = first
                .arrays
                .iter()
                .filter(|a| a.association == Association::Point)
                .filter(|a| rest.iter().all(|other| other.arrays.contains(a)))
                .cloned()
                .collect();
            info.bounds = connections
                .iter()
                .map(|c| c.bounds)
                .reduce(|acc, b| match (acc, b) {
                    (Some(a), Some(b)) => Some(a.union(b)),
                    (a, b) => a.or(b),
                })
                .flatten();
        }
        Ok(vec![info])
    }

    fn execute(&self, _params: &(), ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>> {
        let first = ctx.input(0)?;
        let inputs = ctx.connections(0);

        let points = inputs
            .iter()
            .flat_map(|input| (0..input.point_count()).filter_map(move |i| input.point(i)))
            .collect();
        let mut output = DataObject::new(Geometry::PointSet { points });

        for (name, components) in common_arrays(inputs) {
            let mut values = Vec::new();
            for input in inputs {
                if let Some(array) = input.array(&name, Association::Point) {
                    array.with_values(|v| values.extend_from_slice(v));
                }
            }
            output.add_array(
                Association::Point,
                AttributeArray::new(name, components, values)?,
            )?;
        }
        if let Some(active) = first.active_scalars_name(Association::Point) {
            if output.array(active, Association::Point).is_some() {
                output.set_active_scalars(Association::Point, active)?;
            }
        }
        output.set_time(first.time());
        log::debug!(
            "append '{}' joined {} inputs into {} points",
            ctx.node_id(),
            inputs.len(),
            output.point_count()
        );
        Ok(vec![output])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::testing::grid_3x3;
    use crate::sources::{GridParams, PointGridSource};
    use pipeline_engine::Node;

    fn cloud(points: Vec<[f64; 3]>, scalars: Vec<f64>) -> DataObject {
        let mut data = DataObject::new(Geometry::PointSet { points });
        data.add_scalars(Association::Point, AttributeArray::scalars("scalars", scalars))
            .unwrap();
        data
    }

    #[test]
    fn test_concatenates_points_and_common_arrays() {
        let mut second = cloud(vec![[5.0, 5.0, 5.0]], vec![100.0]);
        second
            .add_array(Association::Point, AttributeArray::scalars("extra", vec![1.0]))
            .unwrap();
        let ctx = ExecuteContext::new("a", vec![vec![grid_3x3(), second]], &[], None);
        let output = AppendPoints.execute(&(), &ctx).unwrap().remove(0);

        assert_eq!(output.kind(), DataKind::PointSet);
        assert_eq!(output.point_count(), 10);
        assert_eq!(output.point(9), Some([5.0, 5.0, 5.0]));
        assert_eq!(output.range("scalars"), Some([1.0, 100.0]));
        assert!(output.array("extra", Association::Point).is_none());
        assert_eq!(output.active_scalars_name(Association::Point), Some("scalars"));
    }

    #[test]
    fn test_mismatched_components_dropped() {
        let mut first = cloud(vec![[0.0; 3]], vec![1.0]);
        first
            .add_array(Association::Point, AttributeArray::vectors("v", &[[1.0, 0.0, 0.0]]))
            .unwrap();
        let mut second = cloud(vec![[1.0; 3]], vec![2.0]);
        second
            .add_array(Association::Point, AttributeArray::scalars("v", vec![3.0]))
            .unwrap();
        let ctx = ExecuteContext::new("a", vec![vec![first, second]], &[], None);
        let output = AppendPoints.execute(&(), &ctx).unwrap().remove(0);
        assert!(output.array("v", Association::Point).is_none());
        assert_eq!(output.point_count(), 2);
    }

    #[test]
    fn test_no_connections() {
        let ctx = ExecuteContext::new("a", vec![vec![]], &[], None);
        assert!(AppendPoints.execute(&(), &ctx).is_err());
    }

    #[test]
    fn test_multiple_upstreams_through_nodes() {
        let small = Node::<PointGridSource>::with_defaults("small");
        let large = Node::new(
            "large",
            PointGridSource,
            GridParams {
                dimensions: [2, 2, 1],
                origin: [10.0, 0.0, 0.0],
                ..GridParams::default()
            },
        );
        let append = Node::new("append", AppendPoints, ());
        append
            .add_input_connection(0, &small.output_port(0).unwrap())
            .unwrap();
        append
            .add_input_connection(0, &large.output_port(0).unwrap())
            .unwrap();

        let output = append.output_data(0).unwrap();
        assert_eq!(output.point_count(), 13);
        assert_eq!(output.point(9), Some([10.0, 0.0, 0.0]));

        let info = append.output_port(0).unwrap().information().unwrap();
        assert_eq!(info.kind, Some(DataKind::PointSet));
        assert!(info.bounds.is_some());
    }
}
