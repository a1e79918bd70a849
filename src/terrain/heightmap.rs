//! Normalized height grid with bilinear sampling

use std::path::Path;

use crate::core::{Error, Result};
use super::generator::{TerrainGenerator, TerrainParams};

/// Row-major grid of heights in 0..1. Row 0 is the `v = 0` edge.
#[derive(Clone, Debug)]
pub struct Heightmap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Heightmap {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Config(format!("heightmap must be non-empty, got {width}x{height}")));
        }
        if data.len() != (width * height) as usize {
            return Err(Error::Config(format!(
                "heightmap {}x{} expects {} samples, got {}",
                width, height, width * height, data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Internal constructor for callers that build `data` to size themselves
    pub(crate) fn from_parts(width: u32, height: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self { width, height, data }
    }

    /// Constant-height map, mostly useful for tests
    pub fn flat(width: u32, height: u32, value: f32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            data: vec![value; (width.max(1) * height.max(1)) as usize],
        }
    }

    /// Load a grayscale image (8 or 16 bit) as a heightmap
    pub fn from_image(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)?.into_luma16();
        let (width, height) = img.dimensions();
        let data = img.pixels().map(|p| p.0[0] as f32 / u16::MAX as f32).collect();
        log::info!("Loaded heightmap {} ({}x{})", path.display(), width, height);
        Self::new(width, height, data)
    }

    /// fBm noise heightmap, `size` texels per side
    pub fn procedural(seed: u32, size: u32, params: TerrainParams) -> Self {
        TerrainGenerator::new(TerrainParams { seed, ..params }).generate(size)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Texel fetch with clamp-to-edge addressing
    pub fn texel(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[y * self.width as usize + x]
    }

    /// Bilinear sample at normalized coordinates. Texel centers sit at
    /// `(i + 0.5) / width`, matching GPU linear filtering.
    pub fn sample_bilinear(&self, u: f32, v: f32) -> f32 {
        let x = u * self.width as f32 - 0.5;
        let y = v * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let tx = x - x0;
        let ty = y - y0;
        let (xi, yi) = (x0 as i64, y0 as i64);

        let a = self.texel(xi, yi);
        let b = self.texel(xi + 1, yi);
        let c = self.texel(xi, yi + 1);
        let d = self.texel(xi + 1, yi + 1);

        let top = a + (b - a) * tx;
        let bottom = c + (d - c) * tx;
        top + (bottom - top) * ty
    }
}
