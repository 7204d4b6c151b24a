//! Serialization and encodings.
//!
//! This module provides the `Codec` trait, which pairs a decoder and encoder
//! for a single binary file format. Each supported encoding has a
//! corresponding sub-module. The following table summarizes the encodings
//! supported by Tessera:
//!
//! | Encoding | Extension | Read | Write | Compression |
//! |----------|-----------|------|-------|-------------|
//! | [MZ3]    | `mz3`     | Yes  | Yes   | gzip        |
//!
//! Codecs operate on plain byte streams. Compression is applied by the
//! `stream` module, so codecs never observe compressed bytes. Generally,
//! codecs should not be used directly. Instead, prefer the `read` and `write`
//! functions, which dispatch to a codec by file extension.
//!
//! [MZ3]: https://github.com/neurolabusc/surf-ice/tree/master/mz3

pub mod mz3;

use std::fmt::{self, Display, Formatter};
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::mesh::{CellType, ComponentType, Mesh, SchemaError};
use crate::stream::StreamError;

/// Region of an encoded stream.
///
/// Decoders report the block in which malformed or missing data was found.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Block {
    Header,
    Metadata,
    Cells,
    Points,
    Attribute(ComponentType),
}

impl Display for Block {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Block::Header => write!(formatter, "header"),
            Block::Metadata => write!(formatter, "metadata"),
            Block::Cells => write!(formatter, "cells"),
            Block::Points => write!(formatter, "points"),
            Block::Attribute(component) => write!(formatter, "{:?} attribute", component),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("bad magic number {found:#06X}")]
    BadMagic { found: u16 },
    #[error("unsupported layout flags {flags:#06X}")]
    UnsupportedVersion { flags: u16 },
    #[error("truncated {block} block at offset {offset}")]
    TruncatedBlock { block: Block, offset: u64 },
    #[error("{count} points declared without point coordinates")]
    DetachedPoints { count: u64 },
    #[error("decoded mesh is malformed: {0}")]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl DecodeError {
    /// Interprets an I/O error raised while reading a block.
    ///
    /// Early end-of-stream becomes `TruncatedBlock`. Other errors are
    /// classified by `StreamError`.
    pub fn from_io(error: io::Error, block: Block, offset: u64) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::TruncatedBlock { block, offset }
        }
        else {
            DecodeError::Stream(error.into())
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("mesh is malformed: {0}")]
    Schema(#[from] SchemaError),
    #[error("cell {cell} of type {kind:?} cannot be encoded")]
    UnsupportedCell { cell: usize, kind: CellType },
    #[error("attribute `{name}` cannot be encoded")]
    UnsupportedAttribute { name: String },
    #[error("{count} elements exceed the capacity of the encoding")]
    CountOverflow { count: usize },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Paired decoder and encoder for a binary mesh format.
///
/// Implementations must be stateless with respect to individual calls so that
/// a single codec can be shared between threads.
pub trait Codec: Send + Sync {
    /// Human readable name of the format.
    fn name(&self) -> &'static str;

    /// Returns `true` if the format may be wrapped in whole-stream
    /// compression.
    fn supports_compression(&self) -> bool {
        true
    }

    fn decode(&self, stream: &mut dyn Read) -> Result<Mesh, DecodeError>;

    /// Encodes a mesh.
    ///
    /// The mesh must be validated before any data is written to the stream.
    fn encode(&self, mesh: &Mesh, stream: &mut dyn Write) -> Result<(), EncodeError>;
}
