//! Port information and update requests
//!
//! Information describes what a port will produce (kind, bounds, extent,
//! available time values, arrays) and is computed without executing any
//! transform. Update requests carry what a consumer asks for, currently the
//! time value.

use serde::{Deserialize, Serialize};

use crate::data::{Association, Bounds, DataKind, DataObject};

/// Time values a port can serve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeDomain {
    /// Discrete steps, sorted ascending
    Steps { values: Vec<f64> },
    /// Any value in `[start, end]`
    Continuous { start: f64, end: f64 },
}

impl TimeDomain {
    /// Discrete domain from unsorted values; non-finite values are dropped
    pub fn steps(values: impl IntoIterator<Item = f64>) -> Self {
        let mut values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        TimeDomain::Steps { values }
    }

    /// First and last available time
    pub fn range(&self) -> Option<[f64; 2]> {
        match self {
            Self::Steps { values } => Some([*values.first()?, *values.last()?]),
            Self::Continuous { start, end } => Some([*start, *end]),
        }
    }

    /// Nearest servable time to `requested`
    ///
    /// Discrete domains snap to the closest step (ties go to the earlier
    /// step); continuous domains clamp. Returns `None` for an empty domain or
    /// a non-finite request.
    pub fn snap(&self, requested: f64) -> Option<f64> {
        if !requested.is_finite() {
            return None;
        }
        match self {
            Self::Steps { values } => values.iter().copied().fold(None, |best, v| match best {
                Some(b) if (b - requested).abs() <= (v - requested).abs() => Some(b),
                _ => Some(v),
            }),
            Self::Continuous { start, end } => Some(requested.clamp(*start, *end)),
        }
    }
}

/// Description of an available attribute array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayInfo {
    pub name: String,
    pub association: Association,
    pub components: usize,
}

/// Metadata a port exposes before (and independent of) execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInformation {
    /// Kind of data the port produces, if known
    pub kind: Option<DataKind>,
    /// Spatial bounds, if known
    pub bounds: Option<Bounds>,
    /// Whole structured extent `[imin, imax, jmin, jmax, kmin, kmax]`
    pub whole_extent: Option<[usize; 6]>,
    /// Time values the port can serve
    pub time: Option<TimeDomain>,
    /// Arrays the output will carry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arrays: Vec<ArrayInfo>,
}

impl PortInformation {
    pub fn with_kind(kind: DataKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Information describing an existing data object
    pub fn describe(data: &DataObject) -> Self {
        let arrays = Association::ALL
            .iter()
            .flat_map(|&association| {
                data.arrays(association).iter().filter_map(move |array| {
                    Some(ArrayInfo {
                        name: array.name()?.to_string(),
                        association,
                        components: array.components(),
                    })
                })
            })
            .collect();
        let whole_extent = match data.geometry() {
            crate::data::Geometry::ImageGrid(image) => Some(image.extent()),
            _ => None,
        };
        Self {
            kind: Some(data.kind()),
            bounds: data.bounds(),
            whole_extent,
            time: None,
            arrays,
        }
    }

    /// Whether an array is advertised
    pub fn has_array(&self, name: &str, association: Association) -> bool {
        self.arrays
            .iter()
            .any(|a| a.name == name && a.association == association)
    }
}

/// What a consumer asks a producer to serve
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// Requested time value
    pub time: Option<f64>,
}

impl UpdateRequest {
    pub fn at_time(time: f64) -> Self {
        Self { time: Some(time) }
    }

    /// Bitwise equality, so a repeated NaN request is a cache hit
    pub(crate) fn same_as(&self, other: &UpdateRequest) -> bool {
        self.time.map(f64::to_bits) == other.time.map(f64::to_bits)
    }
}
