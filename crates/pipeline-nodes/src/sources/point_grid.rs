//! Point Grid Source
//!
//! Produces a uniform grid with one point scalar array.

use pipeline_engine::{
    Algorithm, AlgorithmDescriptor, AlgorithmMetadata, ArrayInfo, Association, AttributeArray,
    DataKind, DataObject, ExecuteContext, Geometry, ImageGeometry, NodeCategory,
    PipelineError, PortInformation, PortMetadata, Result,
};
use serde::{Deserialize, Serialize};

/// Configuration for the grid source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridParams {
    /// Points along x, y and z
    pub dimensions: [usize; 3],
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
    /// Point scalar values, x varying fastest; `None` writes the ramp `1..=n`
    pub scalars: Option<Vec<f64>>,
    /// Name of the scalar array
    pub array_name: String,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            dimensions: [3, 3, 1],
            origin: [0.0; 3],
            spacing: [1.0; 3],
            scalars: None,
            array_name: "scalars".to_string(),
        }
    }
}

impl GridParams {
    fn geometry(&self) -> ImageGeometry {
        ImageGeometry {
            dimensions: self.dimensions,
            origin: self.origin,
            spacing: self.spacing,
        }
    }
}

/// Point Grid Source
///
/// Output is an image grid whose scalar array is flagged as the active point
/// scalars.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointGridSource;

impl PointGridSource {
    pub const PORT_OUTPUT: &'static str = "output";
}

impl AlgorithmDescriptor for PointGridSource {
    fn descriptor() -> AlgorithmMetadata {
        AlgorithmMetadata::new(
            "point-grid-source",
            NodeCategory::Source,
            "Point Grid",
            "Uniform grid with a point scalar array",
        )
        .output(PortMetadata::optional(Self::PORT_OUTPUT, "Output").accepting(&[DataKind::ImageGrid]))
    }
}

inventory::submit!(pipeline_engine::NodeFactoryFn {
    metadata: PointGridSource::descriptor,
    create: pipeline_engine::create_node::<PointGridSource>,
});

impl Algorithm for PointGridSource {
    type Params = GridParams;

    fn metadata(&self) -> AlgorithmMetadata {
        Self::descriptor()
    }

    fn information(
        &self,
        params: &GridParams,
        _inputs: &[Vec<PortInformation>],
    ) -> Result<Vec<PortInformation>> {
        let geometry = params.geometry();
        let mut info = PortInformation::with_kind(DataKind::ImageGrid);
        info.whole_extent = Some(geometry.extent());
        info.bounds = Geometry::ImageGrid(geometry).bounds();
        info.arrays.push(ArrayInfo {
            name: params.array_name.clone(),
            association: Association::Point,
            components: 1,
        });
        Ok(vec![info])
    }

    fn execute(&self, params: &GridParams, ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>> {
        let geometry = params.geometry();
        let count = geometry.point_count();
        let values = match &params.scalars {
            Some(values) if values.len() != count => {
                return Err(PipelineError::invalid_input(format!(
                    "grid '{}' has {} points but {} scalar values",
                    ctx.node_id(),
                    count,
                    values.len()
                )))
            }
            Some(values) => values.clone(),
            None => (1..=count).map(|v| v as f64).collect(),
        };

        let mut data = DataObject::new(Geometry::ImageGrid(geometry));
        data.add_scalars(
            Association::Point,
            AttributeArray::scalars(params.array_name.clone(), values),
        )?;
        log::debug!("Grid source '{}': {} points", ctx.node_id(), count);
        Ok(vec![data])
    }
}
