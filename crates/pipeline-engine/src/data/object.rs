//! Data objects: geometry plus point, cell and field attribute arrays

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::array::AttributeArray;
use super::geometry::{Bounds, DataKind, Geometry};
use crate::error::{PipelineError, Result};
use crate::version::Version;

/// What an attribute array is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Association {
    /// One tuple per point (graph/tree vertex, table row)
    Point,
    /// One tuple per cell (graph/tree edge)
    Cell,
    /// A single tuple for the whole object
    Field,
}

impl Association {
    pub const ALL: [Association; 3] = [Association::Point, Association::Cell, Association::Field];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Cell => "cell",
            Self::Field => "field",
        }
    }
}

impl std::fmt::Display for Association {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered arrays for one association plus the active-scalars flag
#[derive(Debug, Clone, Default, PartialEq)]
struct AttributeSet {
    arrays: Vec<AttributeArray>,
    active_scalars: Option<String>,
}

impl AttributeSet {
    fn find(&self, name: &str) -> Option<&AttributeArray> {
        self.arrays.iter().find(|a| a.name() == Some(name))
    }

    fn map_arrays(&self, f: impl Fn(&AttributeArray) -> AttributeArray) -> Self {
        Self {
            arrays: self.arrays.iter().map(f).collect(),
            active_scalars: self.active_scalars.clone(),
        }
    }
}

/// Geometry plus attribute arrays, immutable once published by the pipeline
///
/// Cloning is a shallow copy: geometry and array storage are shared.
#[derive(Debug, Clone)]
pub struct DataObject {
    geometry: Arc<Geometry>,
    point_data: AttributeSet,
    cell_data: AttributeSet,
    field_data: AttributeSet,
    time: Option<f64>,
    modified: Version,
}

impl DataObject {
    /// Wrap a geometry without any arrays
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry: Arc::new(geometry),
            point_data: AttributeSet::default(),
            cell_data: AttributeSet::default(),
            field_data: AttributeSet::default(),
            time: None,
            modified: Version::next(),
        }
    }

    /// Empty point set
    pub fn empty() -> Self {
        Self::new(Geometry::empty())
    }

    pub fn kind(&self) -> DataKind {
        self.geometry.kind()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn point_count(&self) -> usize {
        self.geometry.point_count()
    }

    pub fn cell_count(&self) -> usize {
        self.geometry.cell_count()
    }

    /// Whether the object holds no points
    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Number of tuples arrays of `association` must have
    pub fn element_count(&self, association: Association) -> usize {
        match association {
            Association::Point => self.point_count(),
            Association::Cell => self.cell_count(),
            Association::Field => 1,
        }
    }

    pub fn point(&self, index: usize) -> Option<[f64; 3]> {
        self.geometry.point(index)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.geometry.bounds()
    }

    /// Time value this object was produced for
    pub fn time(&self) -> Option<f64> {
        self.time
    }

    pub fn set_time(&mut self, time: Option<f64>) {
        self.time = time;
        self.modified = Version::next();
    }

    /// Modification timestamp
    pub fn modified(&self) -> Version {
        self.modified
    }

    fn set(&self, association: Association) -> &AttributeSet {
        match association {
            Association::Point => &self.point_data,
            Association::Cell => &self.cell_data,
            Association::Field => &self.field_data,
        }
    }

    fn set_mut(&mut self, association: Association) -> &mut AttributeSet {
        match association {
            Association::Point => &mut self.point_data,
            Association::Cell => &mut self.cell_data,
            Association::Field => &mut self.field_data,
        }
    }

    /// Attach an array
    ///
    /// Fails with `DuplicateName` if a named array with the same name already
    /// exists for `association`, and with `InvalidInput` if the tuple count
    /// does not match the association's element count.
    pub fn add_array(&mut self, association: Association, array: AttributeArray) -> Result<()> {
        let expected = self.element_count(association);
        if array.tuple_count() != expected {
            return Err(PipelineError::invalid_input(format!(
                "array '{}' has {} tuples but {} data needs {}",
                array.name().unwrap_or("<unnamed>"),
                array.tuple_count(),
                association,
                expected
            )));
        }
        let set = self.set_mut(association);
        if let Some(name) = array.name() {
            if set.find(name).is_some() {
                return Err(PipelineError::DuplicateName {
                    name: name.to_string(),
                    association: association.to_string(),
                });
            }
        }
        set.arrays.push(array);
        self.modified = Version::next();
        Ok(())
    }

    /// Attach an array and flag it as the active scalars
    pub fn add_scalars(&mut self, association: Association, array: AttributeArray) -> Result<()> {
        let name = array
            .name()
            .map(str::to_string)
            .ok_or_else(|| PipelineError::invalid_input("active scalars must be named"))?;
        self.add_array(association, array)?;
        self.set_active_scalars(association, &name)
    }

    /// Named array lookup
    pub fn array(&self, name: &str, association: Association) -> Option<&AttributeArray> {
        self.set(association).find(name)
    }

    /// All arrays of an association, in insertion order
    pub fn arrays(&self, association: Association) -> &[AttributeArray] {
        &self.set(association).arrays
    }

    /// Detach a named array
    pub fn remove_array(&mut self, name: &str, association: Association) -> Option<AttributeArray> {
        let set = self.set_mut(association);
        let index = set.arrays.iter().position(|a| a.name() == Some(name))?;
        if set.active_scalars.as_deref() == Some(name) {
            set.active_scalars = None;
        }
        let removed = set.arrays.remove(index);
        self.modified = Version::next();
        Some(removed)
    }

    /// Flag an existing array as the active scalars of its association
    pub fn set_active_scalars(&mut self, association: Association, name: &str) -> Result<()> {
        let set = self.set_mut(association);
        if set.find(name).is_none() {
            return Err(PipelineError::invalid_input(format!(
                "no {} array named '{}'",
                association, name
            )));
        }
        set.active_scalars = Some(name.to_string());
        self.modified = Version::next();
        Ok(())
    }

    /// The explicitly flagged active scalars, if any
    pub fn active_scalars(&self, association: Association) -> Option<&AttributeArray> {
        let set = self.set(association);
        set.active_scalars.as_deref().and_then(|name| set.find(name))
    }

    /// Name of the active scalars, if any
    pub fn active_scalars_name(&self, association: Association) -> Option<&str> {
        self.set(association).active_scalars.as_deref()
    }

    /// Finite min/max of a named array, searching point, cell, then field data
    pub fn range(&self, name: &str) -> Option<[f64; 2]> {
        Association::ALL
            .iter()
            .find_map(|&assoc| self.array(name, assoc))
            .and_then(AttributeArray::range)
    }

    /// New object aliasing this object's geometry and array storage
    pub fn shallow_copy(&self) -> DataObject {
        let mut copy = self.clone();
        copy.modified = Version::next();
        copy
    }

    /// New object with independent geometry and array storage
    pub fn deep_copy(&self) -> DataObject {
        Self {
            geometry: Arc::new(self.geometry.as_ref().clone()),
            point_data: self.point_data.map_arrays(AttributeArray::deep_copy),
            cell_data: self.cell_data.map_arrays(AttributeArray::deep_copy),
            field_data: self.field_data.map_arrays(AttributeArray::deep_copy),
            time: self.time,
            modified: Version::next(),
        }
    }

    /// Whether geometry storage is shared with `other`
    pub fn shares_geometry_with(&self, other: &DataObject) -> bool {
        Arc::ptr_eq(&self.geometry, &other.geometry)
    }

    /// Mark every array as read-only
    pub(crate) fn freeze(&self) {
        for set in [&self.point_data, &self.cell_data, &self.field_data] {
            set.arrays.iter().for_each(AttributeArray::freeze);
        }
    }
}

impl PartialEq for DataObject {
    /// Content equality; modification timestamps are ignored
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.geometry, &other.geometry) || self.geometry == other.geometry)
            && self.point_data == other.point_data
            && self.cell_data == other.cell_data
            && self.field_data == other.field_data
            && self.time.map(f64::to_bits) == other.time.map(f64::to_bits)
    }
}

impl Default for DataObject {
    fn default() -> Self {
        Self::empty()
    }
}
