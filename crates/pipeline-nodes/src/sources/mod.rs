//! Source nodes
//!
//! Nodes with no inputs that produce data from parameters or from a
//! host-held data object.

mod data_object;
mod point_grid;
mod time_step;

pub use data_object::{set_source_data, DataObjectSource};
pub use point_grid::{GridParams, PointGridSource};
pub use time_step::{TimeStepParams, TimeStepSource};
