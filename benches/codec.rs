use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::io::Cursor;
use tessera::encoding::mz3::Mz3;
use tessera::encoding::Codec;
use tessera::mesh::{Attribute, AttributeData, Cell, Mesh};

const RESOLUTION: u32 = 256;

// Triangulated grid in the XY plane with a scalar per point.
fn grid() -> Mesh {
    let n = RESOLUTION;
    let points = (0..n)
        .flat_map(|y| (0..n).map(move |x| [x as f32, y as f32, 0.0]))
        .collect::<Vec<_>>();
    let cells = (0..(n - 1))
        .flat_map(|y| (0..(n - 1)).map(move |x| (y * n) + x))
        .flat_map(|a| {
            let (b, c, d) = (a + 1, a + n, a + n + 1);
            [Cell::triangle([a, b, d]), Cell::triangle([a, d, c])]
        })
        .collect::<Vec<_>>();
    let scalars = (0..(n * n)).map(|index| index as f32).collect();
    Mesh::from_raw_buffers(points, cells)
        .and_then(|mesh| {
            mesh.with_attribute(Attribute::point("scalar", AttributeData::F32(scalars)))
        })
        .unwrap()
}

fn encode(mesh: &Mesh) -> Vec<u8> {
    let mut data = Vec::new();
    Mz3.encode(mesh, &mut data).unwrap();
    data
}

fn benchmark(criterion: &mut Criterion) {
    let mesh = grid();
    let data = encode(&mesh);

    let mut group = criterion.benchmark_group("mz3");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("encode", |bencher| bencher.iter(|| encode(&mesh)));
    group.bench_function("decode", |bencher| {
        bencher.iter_batched(
            || Cursor::new(data.as_slice()),
            |mut cursor| Mz3.decode(&mut cursor).unwrap(),
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
