//! Terrain the grass grows on: extent, height sampling and layer masks

pub mod generator;
pub mod heightmap;
pub mod layer_mask;

pub use generator::{TerrainGenerator, TerrainParams};
pub use heightmap::Heightmap;
pub use layer_mask::{LayerMask, SplatMap, generate_layer_mask};

use glam::{Vec2, Vec3};

use crate::math::Aabb;

/// Height lookup by world XZ: a heightmap tiled over `tiling` world units
/// centred on `center`, scaled by `multiplier`.
#[derive(Clone, Debug)]
pub struct TerrainHeightSource {
    pub heightmap: Option<Heightmap>,
    /// World units covered by one repeat of the heightmap
    pub tiling: f32,
    /// Height in world units of a fully white texel
    pub multiplier: f32,
    /// World XZ the heightmap is centred on
    pub center: Vec2,
}

impl TerrainHeightSource {
    pub fn new(heightmap: Option<Heightmap>, tiling: f32, multiplier: f32) -> Self {
        Self {
            heightmap,
            tiling,
            multiplier,
            center: Vec2::ZERO,
        }
    }

    /// Map a world XZ position to heightmap UV, clamped to the texture
    pub fn uv_at(&self, xz: Vec2) -> Vec2 {
        if self.tiling.abs() <= f32::EPSILON {
            return Vec2::splat(0.5);
        }
        let uv = (xz - self.center + Vec2::splat(self.tiling * 0.5)) / self.tiling;
        uv.clamp(Vec2::ZERO, Vec2::ONE)
    }

    /// Height above the terrain base at a world XZ. Zero without a heightmap.
    pub fn height_at(&self, xz: Vec2) -> f32 {
        match &self.heightmap {
            Some(map) => {
                let uv = self.uv_at(xz);
                map.sample_bilinear(uv.x, uv.y) * self.multiplier
            }
            None => 0.0,
        }
    }
}

/// A rectangular heightmapped terrain
#[derive(Clone, Debug)]
pub struct Terrain {
    /// Centre of the terrain footprint; `y` is the base elevation
    pub center: Vec3,
    /// Width (x), maximum height (y) and length (z) in world units
    pub size: Vec3,
    pub heights: TerrainHeightSource,
    /// Optional splat map used to restrict grass to some layers
    pub splat: Option<SplatMap>,
}

impl Terrain {
    /// Terrain whose heightmap spans the whole footprint and reaches `size.y`
    pub fn new(center: Vec3, size: Vec3, heightmap: Option<Heightmap>) -> Self {
        let mut heights = TerrainHeightSource::new(heightmap, size.x, size.y);
        heights.center = Vec2::new(center.x, center.z);
        Self {
            center,
            size,
            heights,
            splat: None,
        }
    }

    /// Flat terrain with no heightmap
    pub fn flat(center: Vec3, width: f32, length: f32) -> Self {
        Self::new(center, Vec3::new(width, 0.0, length), None)
    }

    /// Footprint box from the base elevation up to the maximum height
    pub fn bounds(&self) -> Aabb {
        let half = Vec3::new(self.size.x * 0.5, 0.0, self.size.z * 0.5);
        let base = self.center - half;
        Aabb::new(base, self.center + half + Vec3::Y * self.size.y)
    }

    /// World-space surface height at XZ
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.center.y + self.heights.height_at(Vec2::new(x, z))
    }
}
