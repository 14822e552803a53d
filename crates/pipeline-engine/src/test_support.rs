//! Small algorithms shared by the engine's unit tests

use serde::{Deserialize, Serialize};

use crate::algorithm::{Algorithm, ExecuteContext};
use crate::data::{Association, AttributeArray, DataKind, DataObject, Geometry, ImageGeometry};
use crate::descriptor::{AlgorithmMetadata, NodeCategory, PortMetadata};
use crate::error::{PipelineError, Result};
use crate::information::PortInformation;
use crate::node::Node;

/// `size` x `size` grid with point scalars `values` = 1..=n
#[derive(Debug, Default)]
pub struct GridSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    pub size: usize,
}

impl Default for GridParams {
    fn default() -> Self {
        Self { size: 2 }
    }
}

fn image(size: usize) -> ImageGeometry {
    ImageGeometry {
        dimensions: [size, size, 1],
        origin: [0.0; 3],
        spacing: [1.0; 3],
    }
}

impl Algorithm for GridSource {
    type Params = GridParams;

    fn metadata(&self) -> AlgorithmMetadata {
        AlgorithmMetadata::new("test-grid", NodeCategory::Source, "Grid", "test grid")
            .output(PortMetadata::optional("output", "Output"))
    }

    fn information(
        &self,
        params: &GridParams,
        _inputs: &[Vec<PortInformation>],
    ) -> Result<Vec<PortInformation>> {
        let mut info = PortInformation::with_kind(DataKind::ImageGrid);
        info.whole_extent = Some(image(params.size).extent());
        Ok(vec![info])
    }

    fn execute(&self, params: &GridParams, _ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>> {
        let geometry = image(params.size);
        let n = geometry.point_count();
        let mut data = DataObject::new(Geometry::ImageGrid(geometry));
        data.add_scalars(
            Association::Point,
            AttributeArray::scalars("values", (1..=n).map(|v| v as f64).collect()),
        )?;
        Ok(vec![data])
    }
}

/// Multiplies the selected array by `factor`
#[derive(Debug, Default)]
pub struct ScaleFilter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleParams {
    pub factor: f64,
    /// Write through a shallow copy of the input instead of a new array
    pub in_place: bool,
}

impl Default for ScaleParams {
    fn default() -> Self {
        Self {
            factor: 1.0,
            in_place: false,
        }
    }
}

impl Algorithm for ScaleFilter {
    type Params = ScaleParams;

    fn metadata(&self) -> AlgorithmMetadata {
        AlgorithmMetadata::new("test-scale", NodeCategory::Filter, "Scale", "test scale")
            .input(PortMetadata::required("input", "Input"))
            .output(PortMetadata::optional("output", "Output"))
    }

    fn execute(&self, params: &ScaleParams, ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>> {
        if !params.factor.is_finite() {
            return Err(PipelineError::computation("scale factor is not finite"));
        }
        let (array, association) = ctx.input_array(0)?;
        let mut output = ctx.input(0)?.shallow_copy();
        if params.in_place {
            for t in 0..array.tuple_count() {
                let v = array.value(t, 0).unwrap_or_default();
                array.set_value(t, 0, v * params.factor)?;
            }
            return Ok(vec![output]);
        }
        let name = array.name().unwrap_or("values").to_string();
        let scaled = array.with_values(|v| v.iter().map(|x| x * params.factor).collect());
        output.remove_array(&name, association);
        output.add_scalars(association, AttributeArray::new(name, array.components(), scaled)?)?;
        Ok(vec![output])
    }
}

/// Splits points at a threshold: `<=` on output 0, `>` on output 1
#[derive(Debug, Default)]
pub struct SplitFilter;

impl Algorithm for SplitFilter {
    type Params = f64;

    fn metadata(&self) -> AlgorithmMetadata {
        AlgorithmMetadata::new("test-split", NodeCategory::Filter, "Split", "test split")
            .input(PortMetadata::required("input", "Input"))
            .output(PortMetadata::optional("low", "Low"))
            .output(PortMetadata::optional("high", "High"))
    }

    fn execute(&self, threshold: &f64, ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>> {
        let (array, _) = ctx.input_array(0)?;
        let input = ctx.input(0)?;
        let (mut low, mut high) = (Vec::new(), Vec::new());
        for i in 0..input.point_count() {
            let (Some(point), Some(value)) = (input.point(i), array.value(i, 0)) else {
                continue;
            };
            if value > *threshold {
                high.push(point);
            } else {
                low.push(point);
            }
        }
        Ok(vec![
            DataObject::new(Geometry::PointSet { points: low }),
            DataObject::new(Geometry::PointSet { points: high }),
        ])
    }
}

pub fn grid_source(id: &str, size: usize) -> Node<GridSource> {
    Node::new(id, GridSource, GridParams { size })
}

pub fn scale_filter(id: &str, factor: f64) -> Node<ScaleFilter> {
    Node::new(
        id,
        ScaleFilter,
        ScaleParams {
            factor,
            in_place: false,
        },
    )
}
