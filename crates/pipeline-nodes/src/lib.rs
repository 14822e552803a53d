//! Pipeline Nodes
//!
//! Built-in sources and filters for the pipeline engine. Every node type
//! except [`ProgrammableFilter`] registers itself through `inventory`, so
//! `NodeRegistry::with_builtins()` sees all of them once this crate is
//! linked.
//!
//! # Categories
//!
//! - **Sources**: point grids, time-varying grids, host-supplied data objects
//! - **Filters**: thresholding, masking, clipping, elevation, shift/scale,
//!   append, pass-through and closure-driven transforms

pub mod filters;
pub mod sources;

pub use filters::*;
pub use sources::*;
