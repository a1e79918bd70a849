//! Terrain chunks: the unit of coarse grass visibility culling

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::math::Aabb;
use crate::terrain::TerrainHeightSource;

/// Vertical padding above and below the sampled centre height
pub const CHUNK_VERTICAL_MARGIN: f32 = 10.0;

/// Visibility tier of a chunk for the current frame
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Visibility {
    #[default]
    Culled = 0,
    /// Bounds intersect the view volume
    Partial = 1,
    /// Every corner projects inside the viewport
    Full = 2,
}

impl Visibility {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => Self::Partial,
            2 => Self::Full,
            _ => Self::Culled,
        }
    }
}

/// GPU chunk record (48 bytes). Must match `Chunk` in grass_compute.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuChunk {
    pub chunk_id: u32,
    /// Blades per side generated in this chunk
    pub grass_amount: u32,
    /// `Visibility` as u32
    pub visibility: u32,
    pub _pad0: u32,
    // -- 16 bytes --
    pub min_bounds: [f32; 3],
    pub _pad1: f32,
    // -- 16 bytes --
    pub max_bounds: [f32; 3],
    pub _pad2: f32,
    // -- 16 bytes --
}

impl GpuChunk {
    pub fn new(chunk_id: u32, grass_amount: u32, bounds: Aabb) -> Self {
        Self {
            chunk_id,
            grass_amount,
            visibility: Visibility::Culled as u32,
            _pad0: 0,
            min_bounds: bounds.min.to_array(),
            _pad1: 0.0,
            max_bounds: bounds.max.to_array(),
            _pad2: 0.0,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(Vec3::from_array(self.min_bounds), Vec3::from_array(self.max_bounds))
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::from_u32(self.visibility)
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility as u32;
    }
}

/// Number of chunks per grid side for a requested chunk count
pub fn chunks_per_side(chunk_count: u32) -> u32 {
    (chunk_count as f64).sqrt().ceil() as u32
}

/// Split the horizontal extent of `bounds` into a square grid of square chunks.
///
/// The grid has `ceil(sqrt(chunk_count))` chunks per side, laid out row-major
/// from `bounds.min`. Chunk size is the larger of the per-side width and
/// length, so on non-square terrain the grid overhangs the short edge.
pub fn partition_chunks(
    bounds: &Aabb,
    chunk_count: u32,
    grass_amount: u32,
    heights: &TerrainHeightSource,
) -> Vec<GpuChunk> {
    if chunk_count == 0 {
        return Vec::new();
    }

    let per_side = chunks_per_side(chunk_count);
    let extent = bounds.size();
    let width = extent.x / per_side as f32;
    let length = extent.z / per_side as f32;
    let size = width.max(length);

    let total = per_side * per_side;
    let mut chunks = Vec::with_capacity(total as usize);
    for i in 0..total {
        let x = (i % per_side) as f32;
        let z = (i / per_side) as f32;

        let min_xz = Vec2::new(bounds.min.x + x * size, bounds.min.z + z * size);
        let centre = min_xz + Vec2::splat(size * 0.5);
        let height = bounds.min.y + heights.height_at(centre);

        let chunk_bounds = Aabb::new(
            Vec3::new(min_xz.x, height - CHUNK_VERTICAL_MARGIN, min_xz.y),
            Vec3::new(min_xz.x + size, height + CHUNK_VERTICAL_MARGIN, min_xz.y + size),
        );
        chunks.push(GpuChunk::new(i, grass_amount, chunk_bounds));
    }

    log::info!(
        "Partitioned terrain into {} chunks ({}x{}, size {:.2})",
        total, per_side, per_side, size
    );
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{Heightmap, Terrain};

    fn flat_source() -> TerrainHeightSource {
        TerrainHeightSource::new(None, 90.0, 1.0)
    }

    fn square_bounds(side: f32) -> Aabb {
        Aabb::new(Vec3::ZERO, Vec3::new(side, 0.0, side))
    }

    #[test]
    fn test_gpu_chunk_size() {
        assert_eq!(std::mem::size_of::<GpuChunk>(), 48);
    }

    #[test]
    fn test_nine_chunks_on_90() {
        let chunks = partition_chunks(&square_bounds(90.0), 9, 10, &flat_source());
        assert_eq!(chunks.len(), 9);

        let centre = chunks[4].bounds();
        assert_eq!(centre.min.x, 30.0);
        assert_eq!(centre.max.x, 60.0);
        assert_eq!(centre.min.z, 30.0);
        assert_eq!(centre.max.z, 60.0);
    }

    #[test]
    fn test_slot_count_is_square() {
        for n in [1u32, 2, 5, 10, 16, 17, 50] {
            let chunks = partition_chunks(&square_bounds(100.0), n, 10, &flat_source());
            let side = chunks_per_side(n);
            assert_eq!(chunks.len() as u32, side * side);
            assert!(chunks.len() as u32 >= n);
        }
    }

    #[test]
    fn test_grid_covers_without_gaps() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(100.0, 0.0, 60.0));
        let chunks = partition_chunks(&bounds, 10, 10, &flat_source());
        let side = chunks_per_side(10) as usize;

        // Neighbours share edges exactly
        for (i, chunk) in chunks.iter().enumerate() {
            let b = chunk.bounds();
            if i % side + 1 < side {
                assert_eq!(b.max.x, chunks[i + 1].bounds().min.x);
            }
            if i + side < chunks.len() {
                assert_eq!(b.max.z, chunks[i + side].bounds().min.z);
            }
        }

        // Whole rectangle covered
        let last = chunks[chunks.len() - 1].bounds();
        assert!(last.max.x >= bounds.max.x);
        assert!(last.max.z >= bounds.max.z);
    }

    #[test]
    fn test_zero_chunks() {
        assert!(partition_chunks(&square_bounds(90.0), 0, 10, &flat_source()).is_empty());
    }

    #[test]
    fn test_missing_heightmap_is_zero_height() {
        let chunks = partition_chunks(&square_bounds(90.0), 4, 10, &flat_source());
        for c in &chunks {
            assert_eq!(c.min_bounds[1], -CHUNK_VERTICAL_MARGIN);
            assert_eq!(c.max_bounds[1], CHUNK_VERTICAL_MARGIN);
        }
    }

    #[test]
    fn test_heightmap_sets_vertical_bounds() {
        let terrain = Terrain::new(
            Vec3::new(45.0, 0.0, 45.0),
            Vec3::new(90.0, 20.0, 90.0),
            Some(Heightmap::flat(8, 8, 0.5)),
        );
        let chunks = partition_chunks(&terrain.bounds(), 9, 10, &terrain.heights);
        for c in &chunks {
            assert!((c.min_bounds[1] - 0.0).abs() < 1e-4);
            assert!((c.max_bounds[1] - 20.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_ids_and_amount() {
        let chunks = partition_chunks(&square_bounds(90.0), 4, 32, &flat_source());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_id, i as u32);
            assert_eq!(c.grass_amount, 32);
            assert_eq!(c.visibility(), Visibility::Culled);
        }
    }
}
