//! Geometry descriptors for each data object kind

use serde::{Deserialize, Serialize};

/// Semantic type of a data object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    PointSet,
    ImageGrid,
    StructuredGrid,
    UnstructuredGrid,
    Graph,
    Tree,
    Table,
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PointSet => "point set",
            Self::ImageGrid => "image grid",
            Self::StructuredGrid => "structured grid",
            Self::UnstructuredGrid => "unstructured grid",
            Self::Graph => "graph",
            Self::Tree => "tree",
            Self::Table => "table",
        };
        f.write_str(name)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Bounds {
    /// Smallest box containing all points, `None` for an empty set
    pub fn from_points(points: impl IntoIterator<Item = [f64; 3]>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Bounds { min: p, max: p },
                Some(b) => b.including(p),
            })
        })
    }

    /// Grow the box to include a point
    pub fn including(mut self, p: [f64; 3]) -> Self {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
        self
    }

    /// Union of two boxes
    pub fn union(self, other: Bounds) -> Self {
        self.including(other.min).including(other.max)
    }

    /// Center of the box
    pub fn center(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }
}

/// Cell shape in an unstructured grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Vertex,
    Line,
    PolyLine,
    Triangle,
    Quad,
    Polygon,
    Tetra,
    Hexahedron,
}

/// A cell referencing points by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub kind: CellKind,
    pub point_ids: Vec<usize>,
}

impl Cell {
    pub fn new(kind: CellKind, point_ids: Vec<usize>) -> Self {
        Self { kind, point_ids }
    }
}

/// Uniform grid with implicit point coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub dimensions: [usize; 3],
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
}

impl ImageGeometry {
    pub fn point_count(&self) -> usize {
        self.dimensions.iter().product()
    }

    pub fn cell_count(&self) -> usize {
        cell_count_for(self.dimensions)
    }

    /// Whole extent as `[imin, imax, jmin, jmax, kmin, kmax]`
    pub fn extent(&self) -> [usize; 6] {
        let [nx, ny, nz] = self.dimensions;
        [
            0,
            nx.saturating_sub(1),
            0,
            ny.saturating_sub(1),
            0,
            nz.saturating_sub(1),
        ]
    }

    /// Coordinates of point `index`, x varying fastest
    pub fn point(&self, index: usize) -> [f64; 3] {
        let [nx, ny, _] = self.dimensions;
        let i = index % nx.max(1);
        let j = (index / nx.max(1)) % ny.max(1);
        let k = index / (nx.max(1) * ny.max(1));
        [
            self.origin[0] + i as f64 * self.spacing[0],
            self.origin[1] + j as f64 * self.spacing[1],
            self.origin[2] + k as f64 * self.spacing[2],
        ]
    }
}

fn cell_count_for(dimensions: [usize; 3]) -> usize {
    if dimensions.contains(&0) {
        return 0;
    }
    if dimensions.iter().all(|&d| d == 1) {
        return 1;
    }
    dimensions
        .iter()
        .filter(|&&d| d > 1)
        .map(|&d| d - 1)
        .product()
}

/// Geometry and topology of a data object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    /// Free points; each point is also a vertex cell
    PointSet { points: Vec<[f64; 3]> },
    /// Uniform grid
    ImageGrid(ImageGeometry),
    /// Curvilinear grid with explicit coordinates, x varying fastest
    StructuredGrid {
        dimensions: [usize; 3],
        points: Vec<[f64; 3]>,
    },
    /// Explicit points and cells
    UnstructuredGrid {
        points: Vec<[f64; 3]>,
        cells: Vec<Cell>,
    },
    /// Vertices (optionally positioned) and directed edges
    Graph {
        vertex_count: usize,
        edges: Vec<[usize; 2]>,
        positions: Option<Vec<[f64; 3]>>,
    },
    /// Rooted tree; `parents[i]` is `None` only for the root
    Tree { parents: Vec<Option<usize>> },
    /// Row-oriented table; columns are point-associated arrays
    Table { rows: usize },
}

impl Geometry {
    /// Empty point set
    pub fn empty() -> Self {
        Geometry::PointSet { points: Vec::new() }
    }

    pub fn kind(&self) -> DataKind {
        match self {
            Self::PointSet { .. } => DataKind::PointSet,
            Self::ImageGrid(_) => DataKind::ImageGrid,
            Self::StructuredGrid { .. } => DataKind::StructuredGrid,
            Self::UnstructuredGrid { .. } => DataKind::UnstructuredGrid,
            Self::Graph { .. } => DataKind::Graph,
            Self::Tree { .. } => DataKind::Tree,
            Self::Table { .. } => DataKind::Table,
        }
    }

    /// Number of points (graph/tree vertices, table rows)
    pub fn point_count(&self) -> usize {
        match self {
            Self::PointSet { points }
            | Self::StructuredGrid { points, .. }
            | Self::UnstructuredGrid { points, .. } => points.len(),
            Self::ImageGrid(image) => image.point_count(),
            Self::Graph { vertex_count, .. } => *vertex_count,
            Self::Tree { parents } => parents.len(),
            Self::Table { rows } => *rows,
        }
    }

    /// Number of cells (graph/tree edges, none for tables)
    pub fn cell_count(&self) -> usize {
        match self {
            Self::PointSet { points } => points.len(),
            Self::ImageGrid(image) => image.cell_count(),
            Self::StructuredGrid { dimensions, .. } => cell_count_for(*dimensions),
            Self::UnstructuredGrid { cells, .. } => cells.len(),
            Self::Graph { edges, .. } => edges.len(),
            Self::Tree { parents } => parents.iter().filter(|p| p.is_some()).count(),
            Self::Table { .. } => 0,
        }
    }

    /// Coordinates of a point, if the geometry is spatial
    pub fn point(&self, index: usize) -> Option<[f64; 3]> {
        match self {
            Self::PointSet { points }
            | Self::StructuredGrid { points, .. }
            | Self::UnstructuredGrid { points, .. } => points.get(index).copied(),
            Self::ImageGrid(image) => (index < image.point_count()).then(|| image.point(index)),
            Self::Graph { positions, .. } => positions.as_ref()?.get(index).copied(),
            Self::Tree { .. } | Self::Table { .. } => None,
        }
    }

    /// All point coordinates, if the geometry is spatial
    pub fn points(&self) -> Option<Vec<[f64; 3]>> {
        match self {
            Self::PointSet { points }
            | Self::StructuredGrid { points, .. }
            | Self::UnstructuredGrid { points, .. } => Some(points.clone()),
            Self::ImageGrid(image) => Some((0..image.point_count()).map(|i| image.point(i)).collect()),
            Self::Graph { positions, .. } => positions.clone(),
            Self::Tree { .. } | Self::Table { .. } => None,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            Self::ImageGrid(image) => {
                if image.point_count() == 0 {
                    return None;
                }
                let last = image.point(image.point_count() - 1);
                Bounds::from_points([image.origin, last])
            }
            _ => Bounds::from_points(self.points()?),
        }
    }

    /// Check internal index references
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::StructuredGrid { dimensions, points } => {
                let expected: usize = dimensions.iter().product();
                if expected != points.len() {
                    return Err(format!(
                        "structured grid of dimensions {:?} needs {} points, got {}",
                        dimensions,
                        expected,
                        points.len()
                    ));
                }
            }
            Self::UnstructuredGrid { points, cells } => {
                if let Some(bad) = cells
                    .iter()
                    .flat_map(|c| c.point_ids.iter())
                    .find(|&&id| id >= points.len())
                {
                    return Err(format!("cell references missing point {}", bad));
                }
            }
            Self::Graph {
                vertex_count,
                edges,
                positions,
            } => {
                if edges.iter().flatten().any(|&v| v >= *vertex_count) {
                    return Err("edge references missing vertex".to_string());
                }
                if positions.as_ref().is_some_and(|p| p.len() != *vertex_count) {
                    return Err("graph positions do not match vertex count".to_string());
                }
            }
            Self::Tree { parents } => {
                let roots = parents.iter().filter(|p| p.is_none()).count();
                if !parents.is_empty() && roots != 1 {
                    return Err(format!("tree must have exactly one root, found {}", roots));
                }
                if parents.iter().flatten().any(|&p| p >= parents.len()) {
                    return Err("tree parent index out of range".to_string());
                }
            }
            Self::PointSet { .. } | Self::ImageGrid(_) | Self::Table { .. } => {}
        }
        Ok(())
    }
}
