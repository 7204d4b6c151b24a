use approx::assert_relative_eq;
use std::fs;
use std::path::Path;
use std::thread;
use tessera::encoding::mz3::Mz3;
use tessera::encoding::{Block, DecodeError};
use tessera::mesh::{Attribute, AttributeData, Cell, CellType, Mesh};
use tessera::registry::{Registry, WriteOptions};
use tessera::stream::{Compression, StreamError};
use tessera::MeshIoError;

fn tetrahedron() -> Mesh {
    Mesh::from_raw_buffers(
        vec![
            [1.0, 1.0, 1.0],
            [1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
        ],
        vec![
            Cell::triangle([0, 1, 2]),
            Cell::triangle([0, 3, 1]),
            Cell::triangle([0, 2, 3]),
            Cell::triangle([1, 3, 2]),
        ],
    )
    .and_then(|mesh| {
        mesh.with_attribute(Attribute::point(
            "scalar",
            AttributeData::F32(vec![0.1, 0.2, 0.3, 0.4]),
        ))
    })
    .unwrap()
}

fn is_gzip(path: &Path) -> bool {
    fs::read(path).unwrap().starts_with(&[0x1F, 0x8B])
}

#[test]
fn tetrahedron_round_trip() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("tet.mz3");
    let mesh = tetrahedron();

    tessera::write(&mesh, &path, false).unwrap();
    assert!(!is_gzip(&path));
    assert_relative_eq!(mesh, tessera::read(&path).unwrap());

    tessera::write(&mesh, &path, true).unwrap();
    assert!(is_gzip(&path));
    assert_relative_eq!(mesh, tessera::read(&path).unwrap());
}

#[test]
fn decode_compressed_and_plain_identically() {
    let directory = tempfile::tempdir().unwrap();
    let plain = directory.path().join("plain.mz3");
    let compressed = directory.path().join("compressed.mz3");
    let mesh = tetrahedron()
        .with_attribute(Attribute::point(
            "rgba",
            AttributeData::Rgba8(vec![[255, 0, 0, 255]; 4]),
        ))
        .unwrap();

    tessera::write(&mesh, &plain, false).unwrap();
    tessera::write_with(&mesh, &compressed, WriteOptions::with_compression(Compression::Gzip(9)))
        .unwrap();
    assert_ne!(fs::read(&plain).unwrap(), fs::read(&compressed).unwrap());
    assert_eq!(
        tessera::read(&plain).unwrap(),
        tessera::read(&compressed).unwrap()
    );
}

#[test]
fn write_byte_identical_output() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("tet.mz3");
    let mesh = tetrahedron();
    for compressed in [false, true] {
        tessera::write(&mesh, &path, compressed).unwrap();
        let first = fs::read(&path).unwrap();
        tessera::write(&mesh, &path, compressed).unwrap();
        assert_eq!(first, fs::read(&path).unwrap());
    }
}

#[test]
fn dispatch_uppercase_extension() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("TET.MZ3");
    tessera::write(&tetrahedron(), &path, true).unwrap();
    assert_eq!(tetrahedron(), tessera::read(&path).unwrap());
}

#[test]
fn reject_unknown_extension_without_writing() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("tet.unknownext");
    assert!(matches!(
        tessera::write(&tetrahedron(), &path, false),
        Err(MeshIoError::UnknownExtension { .. })
    ));
    assert!(!path.exists());
    assert!(matches!(
        tessera::read(&path),
        Err(MeshIoError::UnknownExtension { .. })
    ));
    assert_eq!(0, fs::read_dir(directory.path()).unwrap().count());
}

#[test]
fn reject_missing_file() {
    let directory = tempfile::tempdir().unwrap();
    assert!(matches!(
        tessera::read(directory.path().join("missing.mz3")),
        Err(MeshIoError::Stream(_))
    ));
}

#[test]
fn reject_truncated_file() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("tet.mz3");
    tessera::write(&tetrahedron(), &path, false).unwrap();
    let data = fs::read(&path).unwrap();

    // The scalar block is the final four `f32`s.
    for len in [0, 1, 15, 16, 40, 64, 100, data.len() - 16, data.len() - 1] {
        fs::write(&path, &data[..len]).unwrap();
        match tessera::read(&path) {
            Err(MeshIoError::Decode(DecodeError::TruncatedBlock { block, offset })) => {
                assert_eq!(len as u64, offset);
                if len < 16 {
                    assert_eq!(Block::Header, block);
                }
            }
            result => panic!("unexpected result at {}: {:?}", len, result.map(|_| ())),
        }
    }
}

#[test]
fn reject_truncated_compressed_file() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("tet.mz3");
    tessera::write(&tetrahedron(), &path, true).unwrap();
    let data = fs::read(&path).unwrap();

    for len in 0..data.len() {
        fs::write(&path, &data[..len]).unwrap();
        match tessera::read(&path) {
            Err(MeshIoError::Decode(DecodeError::TruncatedBlock { .. }))
            | Err(MeshIoError::Stream(StreamError::Corrupt { .. })) => {}
            result => panic!("unexpected result at {}: {:?}", len, result.map(|_| ())),
        }
    }
}

#[test]
fn ignore_data_after_encoded_mesh() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("tet.mz3");
    for compressed in [false, true] {
        tessera::write(&tetrahedron(), &path, compressed).unwrap();
        let mut data = fs::read(&path).unwrap();
        data.extend_from_slice(b"TRAILER!");
        fs::write(&path, &data).unwrap();
        assert_eq!(tetrahedron(), tessera::read(&path).unwrap());
    }
}

#[test]
fn read_and_write_from_many_threads() {
    let directory = tempfile::tempdir().unwrap();
    thread::scope(|scope| {
        for n in 0..8u32 {
            let path = directory.path().join(format!("tet{}.mz3", n));
            scope.spawn(move || {
                let (mut points, cells, attributes) = tetrahedron().into_raw_parts();
                for point in points.iter_mut() {
                    point[0] += n as f32;
                }
                let mesh = Mesh::from_raw_buffers(points, cells)
                    .and_then(|mesh| mesh.with_attributes(attributes))
                    .unwrap();
                tessera::write(&mesh, &path, n % 2 == 0).unwrap();
                assert_eq!(mesh, tessera::read(&path).unwrap());
            });
        }
    });
    assert_eq!(8, fs::read_dir(directory.path()).unwrap().count());
}

#[test]
fn replace_destination_only_on_success() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("tet.mz3");
    tessera::write(&tetrahedron(), &path, false).unwrap();
    let data = fs::read(&path).unwrap();

    let quad = Mesh::from_raw_buffers(
        vec![[0.0; 3]; 4],
        vec![Cell::new(CellType::Quadrilateral, [0, 1, 2, 3])],
    )
    .unwrap();
    assert!(matches!(
        tessera::write(&quad, &path, true),
        Err(MeshIoError::Encode(_))
    ));
    assert_eq!(data, fs::read(&path).unwrap());
    assert_eq!(1, fs::read_dir(directory.path()).unwrap().count());
}

#[test]
fn register_custom_extension() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("tet.surf");
    let mut registry = Registry::new();
    assert!(matches!(
        registry.write(&tetrahedron(), &path, false),
        Err(MeshIoError::UnknownExtension { .. })
    ));

    registry.register("surf", Mz3);
    registry.write(&tetrahedron(), &path, true).unwrap();
    assert!(is_gzip(&path));
    assert_eq!(tetrahedron(), registry.read(&path).unwrap());
}
