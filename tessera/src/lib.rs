//! **Tessera** reads and writes polygonal and volumetric meshes.
//!
//! Meshes are read and written through codecs that are selected by file
//! extension. Codecs that support it may be wrapped in whole-stream gzip
//! compression, which is detected automatically when reading.
//!
//! Please note that versions in the `0.0.*` series are experimental and
//! unstable! Use exact version constraints when specifying a dependency to
//! avoid spurious breakage.
//!
//! # Examples
//!
//! Writing and reading a compressed triangle:
//!
//! ```rust,no_run
//! use tessera::mesh::{Cell, Mesh};
//!
//! let mesh = Mesh::from_raw_buffers(
//!     vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
//!     vec![Cell::triangle([0, 1, 2])],
//! )
//! .unwrap();
//! tessera::write(&mesh, "triangle.mz3", true).unwrap();
//! assert_eq!(mesh, tessera::read("triangle.mz3").unwrap());
//! ```
#![allow(unknown_lints)] // Allow clippy lints.

pub mod encoding;
pub mod mesh;
pub mod registry;
pub mod stream;
pub mod transact;

use std::path::Path;

use crate::mesh::Mesh;
use crate::registry::WriteOptions;

pub use crate::registry::MeshIoError;

pub mod prelude {
    //! Re-exports commonly used types and traits.

    pub use crate::encoding::Codec as _;
    pub use crate::mesh::{Association, Attribute, AttributeData, Cell, CellType, Mesh};
    pub use crate::registry::WriteOptions;
    pub use crate::stream::Compression;
    pub use crate::transact::Transact as _;
}

/// Reads a mesh from a file using the process-wide registry.
pub fn read(path: impl AsRef<Path>) -> Result<Mesh, MeshIoError> {
    registry::registry().read(path)
}

/// Writes a mesh to a file using the process-wide registry.
///
/// If `compressed` is `true` and the codec supports it, then the file is
/// compressed with gzip.
pub fn write(mesh: &Mesh, path: impl AsRef<Path>, compressed: bool) -> Result<(), MeshIoError> {
    registry::registry().write(mesh, path, compressed)
}

pub fn write_with(
    mesh: &Mesh,
    path: impl AsRef<Path>,
    options: WriteOptions,
) -> Result<(), MeshIoError> {
    registry::registry().write_with(mesh, path, options)
}
