//! Filter nodes
//!
//! Nodes that transform one or more inputs into new data objects. Filters
//! never write into their inputs: they build new arrays or deep-copy the
//! ones they rewrite.

mod append_points;
mod clip_scalars;
mod elevation;
mod mask_points;
mod pass_through;
mod programmable;
mod shift_scale;
mod threshold;

pub use append_points::AppendPoints;
pub use clip_scalars::{ClipParams, ClipScalars};
pub use elevation::{ElevationFilter, ElevationParams};
pub use mask_points::{MaskParams, MaskPoints};
pub use pass_through::PassThrough;
pub use programmable::ProgrammableFilter;
pub use shift_scale::{ShiftScale, ShiftScaleParams};
pub use threshold::{ThresholdFilter, ThresholdMode, ThresholdParams};

use pipeline_engine::{
    ArrayInfo, Association, DataKind, DataObject, Geometry, PortInformation, Result,
};

/// Kinds with explicit or implicit point coordinates
pub(crate) const POINT_KINDS: &[DataKind] = &[
    DataKind::PointSet,
    DataKind::ImageGrid,
    DataKind::StructuredGrid,
    DataKind::UnstructuredGrid,
];

/// Point set holding the points at `indices` with their point arrays
///
/// Active scalars and field data carry over; cell data does not.
pub(crate) fn subset_points(input: &DataObject, indices: &[usize]) -> Result<DataObject> {
    let points = indices.iter().filter_map(|&i| input.point(i)).collect();
    let mut output = DataObject::new(Geometry::PointSet { points });
    for array in input.arrays(Association::Point) {
        output.add_array(Association::Point, array.extract(indices)?)?;
    }
    if let Some(name) = input.active_scalars_name(Association::Point) {
        output.set_active_scalars(Association::Point, name)?;
    }
    for array in input.arrays(Association::Field) {
        output.add_array(Association::Field, array.clone())?;
    }
    output.set_time(input.time());
    Ok(output)
}

/// Information of a point subset of `input`
pub(crate) fn subset_information(input: Option<&PortInformation>) -> PortInformation {
    let mut info = PortInformation::with_kind(DataKind::PointSet);
    if let Some(input) = input {
        info.time = input.time.clone();
        info.arrays = input
            .arrays
            .iter()
            .filter(|a| a.association != Association::Cell)
            .cloned()
            .collect::<Vec<ArrayInfo>>();
    }
    info
}
