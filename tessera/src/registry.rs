//! Codec dispatch by file extension.
//!
//! A `Registry` maps lower-cased file extensions to codecs. Reading and
//! writing through a registry selects a codec from the extension of the path
//! and nothing else: the contents of a file are never inspected to choose a
//! codec.
//!
//! The process-wide registry returned by `registry` is populated once with the
//! codecs provided by this crate and is immutable thereafter. It is used by the
//! `read` and `write` functions at the root of the crate. Applications that
//! provide their own codecs can construct and populate a `Registry` of their
//! own.
//!
//! # Examples
//!
//! Registering a codec under an additional extension:
//!
//! ```rust
//! use tessera::encoding::mz3::Mz3;
//! use tessera::registry::Registry;
//!
//! let mut registry = Registry::default();
//! registry.register("MZ3Z", Mz3);
//! assert!(registry.descriptor("mz3z").is_some());
//! ```

use ahash::AHashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::encoding::mz3::Mz3;
use crate::encoding::{Codec, DecodeError, EncodeError};
use crate::mesh::{Mesh, SchemaError};
use crate::stream::{self, Compression, StreamError};
use crate::transact::Transact;

#[derive(Debug, Error)]
pub enum MeshIoError {
    #[error("no codec registered for extension `{extension}`")]
    UnknownExtension { extension: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("failed to decode: {0}")]
    Decode(DecodeError),
    #[error("failed to encode: {0}")]
    Encode(#[from] EncodeError),
}

impl From<DecodeError> for MeshIoError {
    fn from(error: DecodeError) -> Self {
        // Stream errors are reported the same way whether they are raised
        // while decoding or while finishing the stream.
        match error {
            DecodeError::Stream(error) => MeshIoError::Stream(error),
            error => MeshIoError::Decode(error),
        }
    }
}

impl From<std::io::Error> for MeshIoError {
    fn from(error: std::io::Error) -> Self {
        MeshIoError::Stream(error.into())
    }
}

/// Immutable association between an extension and a codec.
#[derive(Clone)]
pub struct CodecDescriptor {
    extension: String,
    codec: Arc<dyn Codec>,
    compression: bool,
}

impl CodecDescriptor {
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Returns `true` if the codec supports whole-stream compression.
    pub fn supports_compression(&self) -> bool {
        self.compression
    }
}

/// Options for writing a mesh.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WriteOptions {
    pub compression: Compression,
}

impl WriteOptions {
    pub fn with_compression(compression: impl Into<Compression>) -> Self {
        WriteOptions {
            compression: compression.into(),
        }
    }
}

/// Table of codecs keyed by file extension.
#[derive(Clone)]
pub struct Registry {
    descriptors: AHashMap<String, CodecDescriptor>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry {
            descriptors: AHashMap::new(),
        }
    }

    /// Registers a codec for an extension.
    ///
    /// Extensions are case-insensitive and may be given with or without a
    /// leading dot. Registering an extension again replaces its codec.
    pub fn register<C>(&mut self, extension: &str, codec: C) -> &mut Self
    where
        C: Codec + 'static,
    {
        let extension = extension.trim_start_matches('.').to_lowercase();
        let compression = codec.supports_compression();
        self.descriptors.insert(
            extension.clone(),
            CodecDescriptor {
                extension,
                codec: Arc::new(codec),
                compression,
            },
        );
        self
    }

    pub fn descriptor(&self, extension: &str) -> Option<&CodecDescriptor> {
        self.descriptors
            .get(extension.trim_start_matches('.').to_lowercase().as_str())
    }

    /// Gets the registered extensions in lexicographic order.
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<_> = self.descriptors.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }

    /// Selects the codec for a path from its extension.
    ///
    /// This does not access the file system.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<&CodecDescriptor, MeshIoError> {
        let extension = path
            .as_ref()
            .extension()
            .map(|extension| extension.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.descriptors
            .get(extension.as_str())
            .ok_or(MeshIoError::UnknownExtension { extension })
    }

    /// Reads a mesh from a file.
    ///
    /// Compressed files are detected and decompressed automatically.
    ///
    /// # Errors
    ///
    /// Returns `UnknownExtension` without accessing the file system if no codec
    /// is registered for the extension of the path. Otherwise, returns an
    /// error if the file cannot be read or decoded.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Mesh, MeshIoError> {
        let path = path.as_ref();
        let descriptor = self.resolve(path)?;
        let mut stream = stream::open_for_read(path)?;
        let mesh = descriptor.codec().decode(&mut stream)?;
        stream.finish()?;
        Ok(mesh)
    }

    /// Writes a mesh to a file, compressing it if requested.
    ///
    /// See `write_with`.
    pub fn write(
        &self,
        mesh: &Mesh,
        path: impl AsRef<Path>,
        compressed: bool,
    ) -> Result<(), MeshIoError> {
        self.write_with(mesh, path, WriteOptions::with_compression(compressed))
    }

    /// Writes a mesh to a file.
    ///
    /// Compression is ignored if the codec does not support it. The file at
    /// the given path is replaced only if the mesh is encoded successfully.
    ///
    /// # Errors
    ///
    /// Returns `UnknownExtension` if no codec is registered for the extension
    /// of the path and `Schema` if the mesh is malformed. No file is written
    /// in either case. Otherwise, returns an error if the mesh cannot be
    /// encoded or the file cannot be written.
    pub fn write_with(
        &self,
        mesh: &Mesh,
        path: impl AsRef<Path>,
        options: WriteOptions,
    ) -> Result<(), MeshIoError> {
        let path = path.as_ref();
        let descriptor = self.resolve(path)?;
        mesh.validate()?;
        let compression = if descriptor.supports_compression() {
            options.compression
        }
        else {
            Compression::None
        };
        let stream = stream::open_for_write(path, compression)?;
        stream
            .commit_with(|stream| {
                descriptor
                    .codec()
                    .encode(mesh, stream)
                    .map_err(MeshIoError::from)
            })
            .map(|_| ())
    }
}

impl Default for Registry {
    /// Creates a registry populated with the codecs provided by this crate.
    fn default() -> Self {
        let mut registry = Registry::new();
        registry.register("mz3", Mz3);
        registry
    }
}

/// Gets the process-wide registry.
///
/// The registry is initialized with the codecs provided by this crate on first
/// use.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::default)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use crate::encoding::{Codec, DecodeError, EncodeError};
    use crate::mesh::{Attribute, AttributeData, Cell, Mesh, SchemaError};
    use crate::registry::{self, MeshIoError, Registry};
    use crate::stream::StreamError;

    // Writes a fixed payload and fails to decode anything.
    struct Opaque;

    impl Codec for Opaque {
        fn name(&self) -> &'static str {
            "opaque"
        }

        fn supports_compression(&self) -> bool {
            false
        }

        fn decode(&self, _: &mut dyn Read) -> Result<Mesh, DecodeError> {
            Err(DecodeError::BadMagic { found: 0 })
        }

        fn encode(&self, _: &Mesh, stream: &mut dyn Write) -> Result<(), EncodeError> {
            stream.write_all(b"opaque")?;
            Ok(())
        }
    }

    #[test]
    fn resolve_extension_case_insensitively() {
        let registry = registry::registry();
        assert_eq!("mz3", registry.resolve("mesh.MZ3").unwrap().extension());
        assert_eq!("mz3", registry.resolve("a/b.c/mesh.mz3").unwrap().extension());
        assert_eq!(vec!["mz3"], registry.extensions());
    }

    #[test]
    fn reject_unknown_extension() {
        let registry = Registry::default();
        for (path, expected) in [("mesh.unknownext", "unknownext"), ("mesh", ""), ("mz3", "")] {
            match registry.read(path) {
                Err(MeshIoError::UnknownExtension { extension }) => {
                    assert_eq!(expected, extension)
                }
                result => panic!("unexpected result: {:?}", result.map(|_| ())),
            }
        }
    }

    #[test]
    fn ignore_compression_when_unsupported() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("mesh.opaque");
        let mut registry = Registry::new();
        registry.register(".Opaque", Opaque);

        let mesh = Mesh::from_raw_buffers(vec![[0.0; 3]; 3], vec![Cell::triangle([0, 1, 2])])
            .unwrap();
        registry.write(&mesh, &path, true).unwrap();
        assert_eq!(b"opaque", std::fs::read(&path).unwrap().as_slice());
        assert!(matches!(
            registry.read(&path),
            Err(MeshIoError::Decode(DecodeError::BadMagic { .. }))
        ));
    }

    #[test]
    fn reject_malformed_mesh_without_writing() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("mesh.mz3");
        let points = vec![[0.0; 3]; 3];

        let mesh = Mesh::from_raw_parts_unchecked(
            points.clone(),
            vec![Cell::triangle([0, 1, 3])],
            Vec::new(),
        );
        assert!(matches!(
            registry::registry().write(&mesh, &path, false),
            Err(MeshIoError::Schema(SchemaError::IndexOutOfBounds { .. }))
        ));

        let mesh = Mesh::from_raw_parts_unchecked(
            points,
            vec![Cell::triangle([0, 1, 2])],
            vec![Attribute::point("scalar", AttributeData::F32(vec![1.0]))],
        );
        assert!(matches!(
            registry::registry().write(&mesh, &path, true),
            Err(MeshIoError::Schema(SchemaError::AttributeLength { .. }))
        ));
        assert_eq!(0, std::fs::read_dir(directory.path()).unwrap().count());
    }

    #[test]
    fn report_corrupt_gzip_as_stream_error() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("mesh.mz3");
        let mesh = Mesh::from_raw_buffers(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![Cell::triangle([0, 1, 2])],
        )
        .unwrap();
        registry::registry().write(&mesh, &path, true).unwrap();
        let data = std::fs::read(&path).unwrap();

        // Damage the first deflate block header, which fails while decoding.
        let mut damaged = data.clone();
        damaged[10] = 0xFF;
        damaged[11] = 0xFF;
        std::fs::write(&path, &damaged).unwrap();
        assert!(matches!(
            registry::registry().read(&path),
            Err(MeshIoError::Stream(StreamError::Corrupt { .. }))
        ));

        // Damage the CRC-32, which fails once the payload has been read.
        let mut damaged = data;
        let n = damaged.len();
        damaged[n - 8] ^= 0xFF;
        std::fs::write(&path, &damaged).unwrap();
        assert!(matches!(
            registry::registry().read(&path),
            Err(MeshIoError::Stream(StreamError::Corrupt { .. }))
        ));
    }
}
