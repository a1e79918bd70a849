//! Noise-based procedural heightmaps for the demo terrain

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use super::heightmap::Heightmap;

/// Parameters controlling procedural heightmap generation
#[derive(Clone, Debug)]
pub struct TerrainParams {
    pub seed: u32,
    pub scale: f32,       // Feature size in texels (larger = smoother)
    pub octaves: u32,     // FBM octaves (detail levels)
    pub persistence: f32, // FBM persistence (0.5 typical)
    pub lacunarity: f32,  // FBM lacunarity (2.0 typical)
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 96.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Fractal Brownian motion heightmap generator
pub struct TerrainGenerator {
    params: TerrainParams,
    noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    pub fn new(params: TerrainParams) -> Self {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self { params, noise }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Normalized height (0..1) at texel coordinates
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let nx = (x / self.params.scale) as f64;
        let ny = (y / self.params.scale) as f64;
        let value = self.noise.get([nx, ny]);
        (((value + 1.0) * 0.5) as f32).clamp(0.0, 1.0)
    }

    /// Generate a square heightmap with `resolution` texels per side
    pub fn generate(&self, resolution: u32) -> Heightmap {
        let resolution = resolution.max(1);
        let mut data = Vec::with_capacity((resolution * resolution) as usize);
        for y in 0..resolution {
            for x in 0..resolution {
                data.push(self.sample(x as f32, y as f32));
            }
        }
        Heightmap::from_parts(resolution, resolution, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_in_range() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        let map = generator.generate(32);
        assert_eq!(map.width(), 32);
        assert!(map.data().iter().all(|h| (0.0..=1.0).contains(h)));
    }

    #[test]
    fn test_deterministic() {
        let a = TerrainGenerator::new(TerrainParams::default()).generate(16);
        let b = TerrainGenerator::new(TerrainParams::default()).generate(16);
        assert_eq!(a.data(), b.data());
    }
}
