//! Attribute arrays
//!
//! An [`AttributeArray`] is an ordered sequence of `f64` tuples with a fixed
//! component count. Cloning an array (or calling [`AttributeArray::shallow_copy`])
//! shares the backing storage, so in-place writes are visible through every
//! alias. [`AttributeArray::deep_copy`] detaches the storage.
//!
//! The length of an array is fixed at construction. Storage published by the
//! executive is frozen and rejects writes with [`PipelineError::ReadOnly`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{PipelineError, Result};

struct ArrayStorage {
    values: RwLock<Vec<f64>>,
    read_only: AtomicBool,
}

impl ArrayStorage {
    fn new(values: Vec<f64>) -> Arc<Self> {
        Arc::new(Self {
            values: RwLock::new(values),
            read_only: AtomicBool::new(false),
        })
    }
}

/// Named, fixed-width tuple sequence attached to points, cells or a whole object
#[derive(Clone)]
pub struct AttributeArray {
    name: Option<String>,
    components: usize,
    storage: Arc<ArrayStorage>,
}

impl AttributeArray {
    /// Create a named array from flat tuple values
    ///
    /// Fails if `components` is zero or the value count is not a multiple of it.
    pub fn new(name: impl Into<String>, components: usize, values: Vec<f64>) -> Result<Self> {
        Self::build(Some(name.into()), components, values)
    }

    /// Create an array without a name
    pub fn unnamed(components: usize, values: Vec<f64>) -> Result<Self> {
        Self::build(None, components, values)
    }

    /// Create a single-component array
    pub fn scalars(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: Some(name.into()),
            components: 1,
            storage: ArrayStorage::new(values),
        }
    }

    /// Create a three-component array
    pub fn vectors(name: impl Into<String>, values: &[[f64; 3]]) -> Self {
        Self {
            name: Some(name.into()),
            components: 3,
            storage: ArrayStorage::new(values.iter().flatten().copied().collect()),
        }
    }

    fn build(name: Option<String>, components: usize, values: Vec<f64>) -> Result<Self> {
        if components == 0 {
            return Err(PipelineError::invalid_input(
                "attribute arrays need at least one component",
            ));
        }
        if values.len() % components != 0 {
            return Err(PipelineError::invalid_input(format!(
                "{} values do not form whole {}-component tuples",
                values.len(),
                components
            )));
        }
        Ok(Self {
            name,
            components,
            storage: ArrayStorage::new(values),
        })
    }

    /// Array name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Alias of this array under another name (storage stays shared)
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            components: self.components,
            storage: Arc::clone(&self.storage),
        }
    }

    /// Number of components per tuple
    pub fn components(&self) -> usize {
        self.components
    }

    /// Number of tuples
    pub fn tuple_count(&self) -> usize {
        self.storage.values.read().len() / self.components
    }

    /// Whether the array holds no tuples
    pub fn is_empty(&self) -> bool {
        self.tuple_count() == 0
    }

    /// Single component of a tuple
    pub fn value(&self, tuple: usize, component: usize) -> Option<f64> {
        if component >= self.components {
            return None;
        }
        self.storage
            .values
            .read()
            .get(tuple * self.components + component)
            .copied()
    }

    /// Copy of one tuple
    pub fn tuple(&self, index: usize) -> Option<Vec<f64>> {
        let values = self.storage.values.read();
        let start = index * self.components;
        values.get(start..start + self.components).map(<[f64]>::to_vec)
    }

    /// Copy of all values, tuple-major
    pub fn to_vec(&self) -> Vec<f64> {
        self.storage.values.read().clone()
    }

    /// Run a closure over the flat values without copying them
    pub fn with_values<R>(&self, f: impl FnOnce(&[f64]) -> R) -> R {
        f(&self.storage.values.read())
    }

    /// Write one component in place; visible through every shallow copy
    pub fn set_value(&self, tuple: usize, component: usize, value: f64) -> Result<()> {
        if self.is_read_only() {
            return Err(PipelineError::ReadOnly(self.display_name().to_string()));
        }
        if component >= self.components {
            return Err(PipelineError::invalid_input(format!(
                "component {} out of range for {}-component array",
                component, self.components
            )));
        }
        let mut values = self.storage.values.write();
        let slot = values.get_mut(tuple * self.components + component).ok_or_else(|| {
            PipelineError::invalid_input(format!("tuple {} out of range", tuple))
        })?;
        *slot = value;
        Ok(())
    }

    /// Whether writes are rejected
    pub fn is_read_only(&self) -> bool {
        self.storage.read_only.load(Ordering::Acquire)
    }

    pub(crate) fn freeze(&self) {
        self.storage.read_only.store(true, Ordering::Release);
    }

    /// Alias sharing storage with `self`
    pub fn shallow_copy(&self) -> Self {
        self.clone()
    }

    /// Independent, writable copy
    pub fn deep_copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            components: self.components,
            storage: ArrayStorage::new(self.to_vec()),
        }
    }

    /// Whether both arrays alias the same storage
    pub fn shares_storage_with(&self, other: &AttributeArray) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Min/max of one component over finite values
    ///
    /// NaN and infinite entries are skipped. Returns `None` when no finite
    /// value exists or the component is out of range.
    pub fn component_range(&self, component: usize) -> Option<[f64; 2]> {
        if component >= self.components {
            return None;
        }
        let values = self.storage.values.read();
        finite_range(
            values
                .chunks_exact(self.components)
                .map(|tuple| tuple[component]),
        )
    }

    /// Range of the array: component 0 for scalars, tuple magnitude otherwise
    pub fn range(&self) -> Option<[f64; 2]> {
        if self.components == 1 {
            return self.component_range(0);
        }
        let values = self.storage.values.read();
        finite_range(
            values
                .chunks_exact(self.components)
                .map(|tuple| tuple.iter().map(|v| v * v).sum::<f64>().sqrt()),
        )
    }

    /// Gather the tuples at `indices` into a new array with the same name
    pub fn extract(&self, indices: &[usize]) -> Result<Self> {
        let values = self.storage.values.read();
        let mut out = Vec::with_capacity(indices.len() * self.components);
        for &i in indices {
            let start = i * self.components;
            let tuple = values.get(start..start + self.components).ok_or_else(|| {
                PipelineError::invalid_input(format!(
                    "tuple {} out of range for '{}'",
                    i,
                    self.display_name()
                ))
            })?;
            out.extend_from_slice(tuple);
        }
        Ok(Self {
            name: self.name.clone(),
            components: self.components,
            storage: ArrayStorage::new(out),
        })
    }

    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<[f64; 2]> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some([v, v]),
            Some([lo, hi]) => Some([lo.min(v), hi.max(v)]),
        })
}

impl PartialEq for AttributeArray {
    /// Bitwise comparison of values, so identical NaN payloads compare equal
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name || self.components != other.components {
            return false;
        }
        if self.shares_storage_with(other) {
            return true;
        }
        let a = self.storage.values.read();
        let b = other.storage.values.read();
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
    }
}

impl fmt::Debug for AttributeArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeArray")
            .field("name", &self.name)
            .field("components", &self.components)
            .field("tuples", &self.tuple_count())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_excludes_nan() {
        let array = AttributeArray::scalars("dist_from_origin", vec![0.5, f64::NAN, 1.118]);
        assert_eq!(array.range(), Some([0.5, 1.118]));
    }

    #[test]
    fn test_range_all_non_finite() {
        let array = AttributeArray::scalars("bad", vec![f64::NAN, f64::INFINITY]);
        assert_eq!(array.range(), None);
    }

    #[test]
    fn test_vector_magnitude_range() {
        let array = AttributeArray::vectors("v", &[[3.0, 4.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(array.range(), Some([1.0, 5.0]));
        assert_eq!(array.component_range(0), Some([0.0, 3.0]));
        assert_eq!(array.component_range(3), None);
    }

    #[test]
    fn test_rejects_partial_tuples() {
        assert!(AttributeArray::new("v", 3, vec![1.0, 2.0]).is_err());
        assert!(AttributeArray::new("v", 0, vec![]).is_err());
    }

    #[test]
    fn test_shallow_copy_aliases_storage() {
        let a = AttributeArray::scalars("s", vec![1.0, 2.0]);
        let b = a.shallow_copy();
        a.set_value(1, 0, 9.0).unwrap();
        assert_eq!(b.value(1, 0), Some(9.0));
        assert!(a.shares_storage_with(&b));
    }

    #[test]
    fn test_deep_copy_detaches_storage() {
        let a = AttributeArray::scalars("s", vec![1.0, 2.0]);
        let b = a.deep_copy();
        a.set_value(0, 0, 5.0).unwrap();
        assert_eq!(b.value(0, 0), Some(1.0));
        assert!(!a.shares_storage_with(&b));
    }

    #[test]
    fn test_frozen_storage_rejects_writes() {
        let a = AttributeArray::scalars("s", vec![1.0]);
        let alias = a.shallow_copy();
        a.freeze();
        assert!(matches!(
            alias.set_value(0, 0, 2.0),
            Err(PipelineError::ReadOnly(_))
        ));
        let copy = alias.deep_copy();
        copy.set_value(0, 0, 2.0).unwrap();
    }

    #[test]
    fn test_extract_tuples() {
        let a = AttributeArray::new("v", 2, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let picked = a.extract(&[2, 0]).unwrap();
        assert_eq!(picked.to_vec(), vec![4.0, 5.0, 0.0, 1.0]);
        assert_eq!(picked.name(), Some("v"));
    }

    #[test]
    fn test_extract_out_of_range() {
        let a = AttributeArray::new("v", 2, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(a.extract(&[0, 2]), Err(PipelineError::InvalidInput(_))));
        assert!(a.extract(&[]).unwrap().is_empty());
    }
}
