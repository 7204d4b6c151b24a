//! In-memory mesh representation.
//!
//! This module provides `Mesh`, which represents a mesh as an ordered
//! collection of points, an ordered collection of cells that index into those
//! points, and any number of named attribute arrays aligned with either the
//! points or the cells.
//!
//! `Mesh` is a value type. It can only be constructed from raw buffers and
//! every constructor validates the following invariants:
//!
//! - every index referenced by a cell is less than the number of points,
//! - every cell has an arity compatible with its `CellType`,
//! - every point attribute has exactly one element per point,
//! - every cell attribute has exactly one element per cell,
//! - attribute names are unique within an association.
//!
//! There is no API for editing topology in place.
//!
//! # Examples
//!
//! Constructing a triangle with a per-point scalar:
//!
//! ```rust
//! use tessera::mesh::{Attribute, AttributeData, Cell, Mesh};
//!
//! let mesh = Mesh::from_raw_buffers(
//!     vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
//!     vec![Cell::triangle([0, 1, 2])],
//! )
//! .and_then(|mesh| {
//!     mesh.with_attribute(Attribute::point(
//!         "scalar",
//!         AttributeData::F32(vec![0.0, 0.5, 1.0]),
//!     ))
//! })
//! .unwrap();
//! assert_eq!(3, mesh.point_count());
//! ```

mod attribute;

use approx::{AbsDiffEq, RelativeEq};
use smallvec::SmallVec;
use thiserror::Error;

pub use crate::mesh::attribute::{Association, Attribute, AttributeData, ComponentType};

pub type Point = [f32; 3];

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("cell {cell} references point {index}, but there are {len} points")]
    IndexOutOfBounds { cell: usize, index: u32, len: usize },
    #[error("cell {cell} of type {kind:?} has arity {actual}")]
    ArityConflict {
        cell: usize,
        kind: CellType,
        actual: usize,
    },
    #[error("attribute `{name}` has {actual} elements, but {expected} are required")]
    AttributeLength {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("attribute `{name}` is defined more than once")]
    AttributeConflict { name: String },
}

/// Kind of cell, which constrains its arity.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CellType {
    Vertex,
    Line,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    /// Arbitrary polygon with three or more points.
    Polygon,
}

impl CellType {
    pub fn is_compatible(&self, arity: usize) -> bool {
        match self {
            CellType::Vertex => arity == 1,
            CellType::Line => arity == 2,
            CellType::Triangle => arity == 3,
            CellType::Quadrilateral | CellType::Tetrahedron => arity == 4,
            CellType::Polygon => arity >= 3,
        }
    }
}

/// Ordered point indices tagged with a `CellType`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Cell {
    kind: CellType,
    indices: SmallVec<[u32; 4]>,
}

impl Cell {
    pub fn new<I>(kind: CellType, indices: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        Cell {
            kind,
            indices: indices.into_iter().collect(),
        }
    }

    pub fn triangle(indices: [u32; 3]) -> Self {
        Cell::new(CellType::Triangle, indices)
    }

    pub fn kind(&self) -> CellType {
        self.kind
    }

    pub fn indices(&self) -> &[u32] {
        self.indices.as_slice()
    }

    pub fn arity(&self) -> usize {
        self.indices.len()
    }
}

/// Points, cells, and attributes.
///
/// See the module documentation for the invariants maintained by this type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    points: Vec<Point>,
    cells: Vec<Cell>,
    attributes: Vec<Attribute>,
}

impl Mesh {
    /// Creates a `Mesh` from raw point and cell buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if a cell indexes beyond the point buffer or if the
    /// arity of a cell conflicts with its type.
    pub fn from_raw_buffers<I, J>(points: I, cells: J) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = Point>,
        J: IntoIterator<Item = Cell>,
    {
        let mesh = Mesh {
            points: points.into_iter().collect(),
            cells: cells.into_iter().collect(),
            attributes: Vec::new(),
        };
        mesh.validate().map(|_| mesh)
    }

    /// Adds an attribute array to the mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the length of the array disagrees with the number of
    /// points or cells or if an attribute with the same name and association
    /// already exists.
    pub fn with_attribute(mut self, attribute: Attribute) -> Result<Self, SchemaError> {
        self.attributes.push(attribute);
        self.validate().map(|_| self)
    }

    pub fn with_attributes<I>(self, attributes: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = Attribute>,
    {
        attributes
            .into_iter()
            .try_fold(self, |mesh, attribute| mesh.with_attribute(attribute))
    }

    pub(crate) fn from_raw_parts_unchecked(
        points: Vec<Point>,
        cells: Vec<Cell>,
        attributes: Vec<Attribute>,
    ) -> Self {
        Mesh {
            points,
            cells,
            attributes,
        }
    }

    pub fn into_raw_parts(self) -> (Vec<Point>, Vec<Cell>, Vec<Attribute>) {
        let Mesh {
            points,
            cells,
            attributes,
        } = self;
        (points, cells, attributes)
    }

    /// Checks the invariants of the mesh.
    ///
    /// Meshes constructed through the public API are always valid, but meshes
    /// assembled by decoders are checked with this function before they are
    /// returned.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let len = self.points.len();
        for (n, cell) in self.cells.iter().enumerate() {
            if !cell.kind.is_compatible(cell.arity()) {
                return Err(SchemaError::ArityConflict {
                    cell: n,
                    kind: cell.kind,
                    actual: cell.arity(),
                });
            }
            if let Some(index) = cell.indices().iter().find(|index| **index as usize >= len) {
                return Err(SchemaError::IndexOutOfBounds {
                    cell: n,
                    index: *index,
                    len,
                });
            }
        }
        for (n, attribute) in self.attributes.iter().enumerate() {
            let expected = match attribute.association() {
                Association::Point => self.points.len(),
                Association::Cell => self.cells.len(),
            };
            if attribute.len() != expected {
                return Err(SchemaError::AttributeLength {
                    name: attribute.name().to_owned(),
                    expected,
                    actual: attribute.len(),
                });
            }
            let is_duplicate = self.attributes[..n].iter().any(|other| {
                other.name() == attribute.name() && other.association() == attribute.association()
            });
            if is_duplicate {
                return Err(SchemaError::AttributeConflict {
                    name: attribute.name().to_owned(),
                });
            }
        }
        Ok(())
    }

    pub fn points(&self) -> &[Point] {
        self.points.as_slice()
    }

    pub fn cells(&self) -> &[Cell] {
        self.cells.as_slice()
    }

    pub fn attributes(&self) -> &[Attribute] {
        self.attributes.as_slice()
    }

    /// Gets the attribute with the given name and association, if any.
    pub fn attribute(&self, name: &str, association: Association) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name() == name && attribute.association() == association)
    }

    pub fn point_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|attribute| attribute.association() == Association::Point)
    }

    pub fn cell_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|attribute| attribute.association() == Association::Cell)
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if every cell is a triangle.
    pub fn is_triangular(&self) -> bool {
        self.cells
            .iter()
            .all(|cell| cell.kind() == CellType::Triangle)
    }
}

impl AbsDiffEq for Mesh {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::from(f32::default_epsilon())
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        let points = {
            let epsilon = epsilon as f32;
            self.points.len() == other.points.len()
                && self
                    .points
                    .iter()
                    .zip(&other.points)
                    .all(|(lhs, rhs)| {
                        lhs.iter()
                            .zip(rhs)
                            .all(|(lhs, rhs)| lhs.abs_diff_eq(rhs, epsilon))
                    })
        };
        points
            && self.cells == other.cells
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .zip(&other.attributes)
                .all(|(lhs, rhs)| lhs.abs_diff_eq(rhs, epsilon))
    }
}

impl RelativeEq for Mesh {
    fn default_max_relative() -> Self::Epsilon {
        f64::from(f32::default_max_relative())
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        max_relative: Self::Epsilon,
    ) -> bool {
        let points = {
            let (epsilon, max_relative) = (epsilon as f32, max_relative as f32);
            self.points.len() == other.points.len()
                && self
                    .points
                    .iter()
                    .zip(&other.points)
                    .all(|(lhs, rhs)| {
                        lhs.iter()
                            .zip(rhs)
                            .all(|(lhs, rhs)| lhs.relative_eq(rhs, epsilon, max_relative))
                    })
        };
        points
            && self.cells == other.cells
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .zip(&other.attributes)
                .all(|(lhs, rhs)| lhs.relative_eq(rhs, epsilon, max_relative))
    }
}
