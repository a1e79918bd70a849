use criterion::{criterion_group, criterion_main, Criterion, black_box};

use meadow::core::camera::Camera;
use meadow::grass::{ChunkCuller, clump_voronoi_cpu, partition_chunks};
use meadow::terrain::{Terrain, TerrainGenerator, TerrainParams};

use glam::Vec3;

fn hilly_terrain() -> Terrain {
    let heightmap = TerrainGenerator::new(TerrainParams::default()).generate(256);
    Terrain::new(Vec3::ZERO, Vec3::new(400.0, 20.0, 400.0), Some(heightmap))
}

fn bench_partition_1024(c: &mut Criterion) {
    let terrain = hilly_terrain();
    let bounds = terrain.bounds();

    c.bench_function("partition_1024_chunks", |b| {
        b.iter(|| partition_chunks(black_box(&bounds), 1024, 64, &terrain.heights));
    });
}

fn bench_cull(c: &mut Criterion, name: &str, chunk_count: u32) {
    let terrain = hilly_terrain();
    let chunks = partition_chunks(&terrain.bounds(), chunk_count, 64, &terrain.heights);
    let mut culler = ChunkCuller::new(chunks);

    c.bench_function(name, |b| {
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            // Orbit so the visible set changes every frame
            let angle = frame as f32 * 0.01;
            let position = Vec3::new(angle.sin() * 150.0, 30.0, angle.cos() * 150.0);
            let camera = Camera::look_at(position, Vec3::ZERO, Vec3::Y);
            culler.cull(black_box(&camera), 250.0).len()
        });
    });
}

fn bench_cull_256(c: &mut Criterion) {
    bench_cull(c, "cull_256_chunks", 256);
}

fn bench_cull_4096(c: &mut Criterion) {
    bench_cull(c, "cull_4096_chunks", 4096);
}

fn bench_voronoi_cpu_256(c: &mut Criterion) {
    c.bench_function("clump_voronoi_cpu_256", |b| {
        b.iter(|| clump_voronoi_cpu(black_box(256), 256, 3, 1));
    });
}

criterion_group!(
    benches,
    bench_partition_1024,
    bench_cull_256,
    bench_cull_4096,
    bench_voronoi_cpu_256,
);
criterion_main!(benches);
