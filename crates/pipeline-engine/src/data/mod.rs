//! Data model: data objects, geometry and attribute arrays

mod array;
mod geometry;
mod object;

pub use array::AttributeArray;
pub use geometry::{Bounds, Cell, CellKind, DataKind, Geometry, ImageGeometry};
pub use object::{Association, DataObject};
