//! Byte streams with transparent compression.
//!
//! Codecs read and write through `ReadStream` and `WriteStream`. These types
//! layer an optional gzip transform over a file so that every codec supports
//! compression without any format-specific code.
//!
//! Reading sniffs the leading bytes of a stream for the gzip magic number and
//! decompresses when it is found. Concatenated gzip members are decoded as one
//! stream and data following the last member is ignored. Writing compresses
//! only when requested.
//!
//! A `WriteStream` never writes to its destination directly. Data is written
//! to a temporary file beside the destination and that file is renamed over
//! the destination when the stream is committed. A stream that is aborted or
//! dropped before it is committed removes its temporary file and leaves the
//! destination untouched.

use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::transact::Transact;

pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error: {0}")]
    Io(io::Error),
    #[error("corrupt compressed stream: {reason}")]
    Corrupt { reason: String },
}

impl From<io::Error> for StreamError {
    fn from(error: io::Error) -> Self {
        let is_corrupt = error
            .get_ref()
            .map_or(false, |inner| inner.is::<Corruption>());
        if is_corrupt {
            StreamError::Corrupt {
                reason: error.to_string(),
            }
        }
        else {
            StreamError::Io(error)
        }
    }
}

// Marks I/O errors raised by the decompression layer so that they can be told
// apart from errors of the underlying reader once they pass through `Read`.
#[derive(Debug, Error)]
#[error("{0}")]
struct Corruption(io::Error);

fn corruption(error: io::Error) -> io::Error {
    match error.kind() {
        // Truncation is reported by the caller in terms of its own layout.
        io::ErrorKind::UnexpectedEof | io::ErrorKind::Interrupted => error,
        _ => io::Error::new(io::ErrorKind::InvalidData, Corruption(error)),
    }
}

/// Compression transform applied to a `WriteStream`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Compression {
    #[default]
    None,
    /// Whole-stream gzip with the given level in `0..=9`.
    Gzip(u32),
}

impl Compression {
    /// Gzip at the default level.
    pub fn gzip() -> Self {
        Compression::Gzip(flate2::Compression::default().level())
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Compression::Gzip(_))
    }
}

impl From<bool> for Compression {
    fn from(compressed: bool) -> Self {
        if compressed {
            Compression::gzip()
        }
        else {
            Compression::None
        }
    }
}

enum Reader<R>
where
    R: BufRead,
{
    Plain(R),
    /// The current gzip member, if any. This is `None` once the last member
    /// has been read.
    Gzip(Option<GzDecoder<R>>),
}

/// Readable stream that decompresses gzip input transparently.
pub struct ReadStream<R = BufReader<File>>
where
    R: BufRead,
{
    inner: Reader<R>,
}

impl<R> ReadStream<R>
where
    R: BufRead,
{
    /// Wraps a reader, sniffing for compression.
    ///
    /// No data is consumed while sniffing.
    pub fn new(mut reader: R) -> Result<Self, StreamError> {
        let inner = if reader.fill_buf()?.starts_with(&GZIP_MAGIC) {
            Reader::Gzip(Some(GzDecoder::new(reader)))
        }
        else {
            Reader::Plain(reader)
        };
        Ok(ReadStream { inner })
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.inner, Reader::Gzip(_))
    }

    /// Completes reading.
    ///
    /// Compressed streams are read to their end so that the trailer of each
    /// gzip member is verified. Trailing data that does not begin another gzip
    /// member is ignored, as is any trailing data in an uncompressed stream.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Corrupt` if the compressed stream is truncated or
    /// fails its integrity check.
    pub fn finish(mut self) -> Result<(), StreamError> {
        if self.is_compressed() {
            io::copy(&mut self, &mut io::sink()).map_err(|error| match error.kind() {
                io::ErrorKind::UnexpectedEof => StreamError::Corrupt {
                    reason: error.to_string(),
                },
                _ => error.into(),
            })?;
        }
        Ok(())
    }
}

impl ReadStream<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let file = File::open(path)?;
        ReadStream::new(BufReader::new(file))
    }
}

impl<R> Read for ReadStream<R>
where
    R: BufRead,
{
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        match self.inner {
            Reader::Plain(ref mut reader) => reader.read(buffer),
            Reader::Gzip(ref mut member) => read_members(member, buffer),
        }
    }
}

// Reads from a sequence of gzip members. A member is followed by another only
// if the remaining input begins with the gzip magic number.
fn read_members<R>(member: &mut Option<GzDecoder<R>>, buffer: &mut [u8]) -> io::Result<usize>
where
    R: BufRead,
{
    loop {
        let decoder = match member.as_mut() {
            Some(decoder) => decoder,
            None => return Ok(0),
        };
        let n = decoder.read(buffer).map_err(corruption)?;
        if n > 0 || buffer.is_empty() {
            return Ok(n);
        }
        // The member has ended and its trailer has been verified.
        let mut reader = match member.take() {
            Some(decoder) => decoder.into_inner(),
            None => return Ok(0),
        };
        if reader.fill_buf()?.starts_with(&GZIP_MAGIC) {
            *member = Some(GzDecoder::new(reader));
        }
    }
}

enum Writer {
    Plain(BufWriter<NamedTempFile>),
    Gzip(GzEncoder<BufWriter<NamedTempFile>>),
}

/// Writable stream that replaces its destination atomically on commit.
///
/// See the module documentation.
pub struct WriteStream {
    inner: Writer,
    path: PathBuf,
    compression: Compression,
}

impl WriteStream {
    /// Opens a stream that will replace the file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if a temporary file cannot be created in the directory
    /// of the destination.
    pub fn create(path: impl AsRef<Path>, compression: Compression) -> Result<Self, StreamError> {
        let path = path.as_ref().to_path_buf();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = tempfile::Builder::new()
            .prefix(".tessera-")
            .suffix(".tmp")
            .tempfile_in(directory)?;
        let writer = BufWriter::new(file);
        let inner = match compression {
            Compression::None => Writer::Plain(writer),
            Compression::Gzip(level) => Writer::Gzip(GzEncoder::new(
                writer,
                flate2::Compression::new(level.min(9)),
            )),
        };
        Ok(WriteStream {
            inner,
            path,
            compression,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }
}

impl Write for WriteStream {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        match self.inner {
            Writer::Plain(ref mut writer) => writer.write(buffer),
            Writer::Gzip(ref mut writer) => writer.write(buffer),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner {
            Writer::Plain(ref mut writer) => writer.flush(),
            Writer::Gzip(ref mut writer) => writer.flush(),
        }
    }
}

impl Transact for WriteStream {
    type Output = PathBuf;
    type Error = StreamError;

    /// Flushes the stream and moves it into place at its destination.
    fn commit(self) -> Result<Self::Output, Self::Error> {
        let WriteStream { inner, path, .. } = self;
        let writer = match inner {
            Writer::Plain(writer) => writer,
            Writer::Gzip(writer) => writer.finish()?,
        };
        let file = writer.into_inner().map_err(|error| error.into_error())?;
        file.as_file().sync_all()?;
        let permissions = match fs::metadata(&path) {
            Ok(metadata) => Some(metadata.permissions()),
            Err(_) => default_permissions(),
        };
        if let Some(permissions) = permissions {
            file.as_file().set_permissions(permissions)?;
        }
        file.persist(&path).map_err(|error| error.error)?;
        Ok(path)
    }

    fn abort(self) {
        // Dropping the temporary file removes it.
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Opens a file for reading, decompressing it if necessary.
pub fn open_for_read(path: impl AsRef<Path>) -> Result<ReadStream, StreamError> {
    ReadStream::open(path)
}

/// Opens a file for writing, compressing it if requested.
pub fn open_for_write(
    path: impl AsRef<Path>,
    compression: impl Into<Compression>,
) -> Result<WriteStream, StreamError> {
    WriteStream::create(path, compression.into())
}
