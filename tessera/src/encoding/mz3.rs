//! [MZ3](https://github.com/neurolabusc/surf-ice/tree/master/mz3) encoding.
//!
//! MZ3 is a compact binary format for triangular meshes. A stream begins with a
//! sixteen byte header followed by an opaque metadata region and then a series
//! of blocks. All fields are little-endian.
//!
//! | Offset | Type  | Field                                  |
//! |--------|-------|----------------------------------------|
//! | 0      | `u16` | magic number (`0x5A4D`, bytes `MZ`)    |
//! | 2      | `u16` | flags describing which blocks follow   |
//! | 4      | `u32` | number of faces                        |
//! | 8      | `u32` | number of vertices                     |
//! | 12     | `u32` | length of the metadata region in bytes |
//!
//! Blocks appear in the following order and only when the corresponding flag
//! is set:
//!
//! | Flag     | Block                                   | Attribute  |
//! |----------|-----------------------------------------|------------|
//! | `FACE`   | three `u32` indices per face            |            |
//! | `VERT`   | three `f32` coordinates per vertex      |            |
//! | `RGBA`   | four `u8` color components per vertex   | `rgba`     |
//! | `SCALAR` | one `f32` per vertex                    | `scalar`   |
//! | `DOUBLE` | one `f64` per vertex                    | `scalar64` |
//!
//! MZ3 does not store attribute names. Decoded attributes are given the names
//! in the table above and only point attributes with these names (and
//! compatible types) can be encoded. Integer scalars of up to sixteen bits
//! are widened to `f32` when encoded.
//!
//! Streams are frequently gzip compressed. Compression is handled by the
//! `stream` module and is not visible to `Mz3`.
//!
//! # Examples
//!
//! Encoding a triangle into memory:
//!
//! ```rust
//! use tessera::encoding::mz3::Mz3;
//! use tessera::encoding::Codec;
//! use tessera::mesh::{Cell, Mesh};
//!
//! let mesh = Mesh::from_raw_buffers(
//!     vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
//!     vec![Cell::triangle([0, 1, 2])],
//! )
//! .unwrap();
//! let mut data = Vec::new();
//! Mz3.encode(&mesh, &mut data).unwrap();
//! assert_eq!(16 + 12 + 36, data.len());
//! assert_eq!(mesh, Mz3.decode(&mut data.as_slice()).unwrap());
//! ```

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use itertools::Itertools;
use std::borrow::Cow;
use std::io::{self, Read, Write};

use crate::encoding::{Block, Codec, DecodeError, EncodeError};
use crate::mesh::{Association, Attribute, AttributeData, Cell, CellType, ComponentType, Mesh};

pub const MAGIC: u16 = 0x5A4D;
pub const HEADER_LEN: usize = 16;

pub const FACE: u16 = 1;
pub const VERT: u16 = 2;
pub const RGBA: u16 = 4;
pub const SCALAR: u16 = 8;
pub const DOUBLE: u16 = 16;

const KNOWN: u16 = FACE | VERT | RGBA | SCALAR | DOUBLE;

/// Name of the decoded `RGBA` attribute.
pub const RGBA_NAME: &str = "rgba";
/// Name of the decoded `SCALAR` attribute.
pub const SCALAR_NAME: &str = "scalar";
/// Name of the decoded `DOUBLE` attribute.
pub const DOUBLE_NAME: &str = "scalar64";

// Number of elements buffered per read or write. This bounds allocations made
// on behalf of counts read from a (possibly malformed) header.
const CHUNK: usize = 1 << 14;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub flags: u16,
    pub faces: u32,
    pub vertices: u32,
    pub skip: u32,
}

impl Header {
    pub fn has(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    fn read<R>(reader: &mut Tally<R>) -> Result<Self, DecodeError>
    where
        R: Read,
    {
        let magic = reader.read_block(Block::Header, |reader| reader.read_u16::<LittleEndian>())?;
        if magic != MAGIC {
            return Err(DecodeError::BadMagic { found: magic });
        }
        reader.read_block(Block::Header, |reader| {
            Ok(Header {
                flags: reader.read_u16::<LittleEndian>()?,
                faces: reader.read_u32::<LittleEndian>()?,
                vertices: reader.read_u32::<LittleEndian>()?,
                skip: reader.read_u32::<LittleEndian>()?,
            })
        })
    }

    fn write<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: Write + ?Sized,
    {
        writer.write_u16::<LittleEndian>(MAGIC)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(self.faces)?;
        writer.write_u32::<LittleEndian>(self.vertices)?;
        writer.write_u32::<LittleEndian>(self.skip)
    }
}

/// MZ3 codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mz3;

impl Codec for Mz3 {
    fn name(&self) -> &'static str {
        "MZ3"
    }

    fn decode(&self, stream: &mut dyn Read) -> Result<Mesh, DecodeError> {
        let mut reader = Tally::new(stream);
        let header = Header::read(&mut reader)?;
        if header.flags & !KNOWN != 0 {
            return Err(DecodeError::UnsupportedVersion {
                flags: header.flags,
            });
        }
        let has_point_data = header.has(RGBA) || header.has(SCALAR) || header.has(DOUBLE);
        let has_faces = header.has(FACE) && header.faces > 0;
        if !header.has(VERT) && header.vertices > 0 && (has_faces || has_point_data) {
            return Err(DecodeError::DetachedPoints {
                count: header.vertices.into(),
            });
        }

        let skip = u64::from(header.skip);
        reader.read_block(Block::Metadata, |reader| {
            let n = io::copy(&mut reader.by_ref().take(skip), &mut io::sink())?;
            if n < skip {
                Err(io::ErrorKind::UnexpectedEof.into())
            }
            else {
                Ok(())
            }
        })?;

        let count = if header.has(VERT) {
            header.vertices as usize
        }
        else {
            0
        };
        let cells = if header.has(FACE) {
            let indices = reader.read_block(Block::Cells, |reader| {
                read_chunked(reader, (header.faces as usize).saturating_mul(3), |reader, chunk| {
                    reader.read_u32_into::<LittleEndian>(chunk)
                })
            })?;
            indices
                .into_iter()
                .tuples()
                .map(|(a, b, c)| Cell::triangle([a, b, c]))
                .collect()
        }
        else {
            Vec::new()
        };
        let points = reader.read_block(Block::Points, |reader| {
            read_chunked(reader, count.saturating_mul(3), |reader, chunk| {
                reader.read_f32_into::<LittleEndian>(chunk)
            })
        })?;
        let points = points.into_iter().tuples().map(|(x, y, z)| [x, y, z]).collect();

        let mut attributes = Vec::new();
        if header.has(RGBA) {
            let components = reader.read_block(Block::Attribute(ComponentType::Rgba8), |reader| {
                read_chunked(reader, count.saturating_mul(4), |reader, chunk| {
                    reader.read_exact(chunk)
                })
            })?;
            let colors = components
                .into_iter()
                .tuples()
                .map(|(r, g, b, a)| [r, g, b, a])
                .collect();
            attributes.push(Attribute::point(RGBA_NAME, AttributeData::Rgba8(colors)));
        }
        if header.has(SCALAR) {
            let scalars = reader.read_block(Block::Attribute(ComponentType::F32), |reader| {
                read_chunked(reader, count, |reader, chunk| {
                    reader.read_f32_into::<LittleEndian>(chunk)
                })
            })?;
            attributes.push(Attribute::point(SCALAR_NAME, AttributeData::F32(scalars)));
        }
        if header.has(DOUBLE) {
            let scalars = reader.read_block(Block::Attribute(ComponentType::F64), |reader| {
                read_chunked(reader, count, |reader, chunk| {
                    reader.read_f64_into::<LittleEndian>(chunk)
                })
            })?;
            attributes.push(Attribute::point(DOUBLE_NAME, AttributeData::F64(scalars)));
        }

        let mesh = Mesh::from_raw_parts_unchecked(points, cells, attributes);
        mesh.validate()?;
        Ok(mesh)
    }

    fn encode(&self, mesh: &Mesh, stream: &mut dyn Write) -> Result<(), EncodeError> {
        mesh.validate()?;
        if let Some((n, cell)) = mesh
            .cells()
            .iter()
            .find_position(|cell| cell.kind() != CellType::Triangle)
        {
            return Err(EncodeError::UnsupportedCell {
                cell: n,
                kind: cell.kind(),
            });
        }
        let layout = Layout::from_mesh(mesh)?;
        let header = Header {
            flags: layout.flags(),
            faces: into_count(mesh.cell_count())?,
            vertices: into_count(mesh.point_count())?,
            skip: 0,
        };

        header.write(stream)?;
        let indices = mesh.cells().iter().flat_map(|cell| cell.indices().iter().copied());
        write_chunked(stream, indices, 4, LittleEndian::write_u32_into)?;
        let components = mesh.points().iter().flat_map(|point| point.iter().copied());
        write_chunked(stream, components, 4, LittleEndian::write_f32_into)?;
        if let Some(colors) = layout.rgba {
            let components = colors.iter().flat_map(|color| color.iter().copied());
            write_chunked(stream, components, 1, |source, target| {
                target.copy_from_slice(source)
            })?;
        }
        if let Some(scalars) = layout.scalar {
            write_chunked(stream, scalars.iter().copied(), 4, LittleEndian::write_f32_into)?;
        }
        if let Some(scalars) = layout.double {
            write_chunked(stream, scalars.iter().copied(), 8, LittleEndian::write_f64_into)?;
        }
        stream.flush()?;
        Ok(())
    }
}

// Point attributes of a mesh mapped onto MZ3 blocks.
#[derive(Default)]
struct Layout<'a> {
    rgba: Option<&'a [[u8; 4]]>,
    scalar: Option<Cow<'a, [f32]>>,
    double: Option<&'a [f64]>,
}

impl<'a> Layout<'a> {
    fn from_mesh(mesh: &'a Mesh) -> Result<Self, EncodeError> {
        let mut layout = Layout::default();
        for attribute in mesh.attributes() {
            let unsupported = || EncodeError::UnsupportedAttribute {
                name: attribute.name().to_owned(),
            };
            if attribute.association() != Association::Point {
                return Err(unsupported());
            }
            match (attribute.name(), attribute.data()) {
                (RGBA_NAME, AttributeData::Rgba8(colors)) => {
                    layout.rgba = Some(colors.as_slice());
                }
                (SCALAR_NAME, AttributeData::F32(scalars)) => {
                    layout.scalar = Some(Cow::Borrowed(scalars.as_slice()));
                }
                (
                    SCALAR_NAME,
                    data @ (AttributeData::U8(_)
                    | AttributeData::I8(_)
                    | AttributeData::U16(_)
                    | AttributeData::I16(_)),
                ) => {
                    let scalars = data.to_f32_lossy().ok_or_else(unsupported)?;
                    layout.scalar = Some(Cow::Owned(scalars));
                }
                (DOUBLE_NAME, AttributeData::F64(scalars)) => {
                    layout.double = Some(scalars.as_slice());
                }
                _ => return Err(unsupported()),
            }
        }
        Ok(layout)
    }

    fn flags(&self) -> u16 {
        let mut flags = FACE | VERT;
        if self.rgba.is_some() {
            flags |= RGBA;
        }
        if self.scalar.is_some() {
            flags |= SCALAR;
        }
        if self.double.is_some() {
            flags |= DOUBLE;
        }
        flags
    }
}

// Counts the bytes read through it so that truncation can be reported with an
// offset into the decoded stream.
struct Tally<R>
where
    R: Read,
{
    inner: R,
    count: u64,
}

impl<R> Tally<R>
where
    R: Read,
{
    fn new(inner: R) -> Self {
        Tally { inner, count: 0 }
    }

    fn read_block<T, F>(&mut self, block: Block, f: F) -> Result<T, DecodeError>
    where
        F: FnOnce(&mut Self) -> io::Result<T>,
    {
        f(self).map_err(|error| DecodeError::from_io(error, block, self.count))
    }
}

impl<R> Read for Tally<R>
where
    R: Read,
{
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buffer)?;
        self.count += n as u64;
        Ok(n)
    }
}

fn read_chunked<R, T, F>(reader: &mut R, count: usize, mut f: F) -> io::Result<Vec<T>>
where
    R: Read,
    T: Copy + Default,
    F: FnMut(&mut R, &mut [T]) -> io::Result<()>,
{
    let mut values = Vec::with_capacity(count.min(CHUNK));
    let mut chunk = vec![T::default(); count.min(CHUNK)];
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(CHUNK);
        f(reader, &mut chunk[..n])?;
        values.extend_from_slice(&chunk[..n]);
        remaining -= n;
    }
    Ok(values)
}

fn write_chunked<W, T, I, F>(writer: &mut W, values: I, width: usize, f: F) -> io::Result<()>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = T>,
    F: Fn(&[T], &mut [u8]),
{
    let mut bytes = Vec::with_capacity(CHUNK * width);
    for chunk in &values.into_iter().chunks(CHUNK) {
        let chunk: Vec<_> = chunk.collect();
        bytes.resize(chunk.len() * width, 0);
        f(&chunk, &mut bytes);
        writer.write_all(&bytes)?;
    }
    Ok(())
}

fn into_count(count: usize) -> Result<u32, EncodeError> {
    u32::try_from(count).map_err(|_| EncodeError::CountOverflow { count })
}
