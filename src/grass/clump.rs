//! Clump styles, the clump colour gradient and the Voronoi clump map.
//!
//! Each blade belongs to the clump whose jittered cell point is nearest in
//! the clump map. The clump id selects a [`ClumpParameters`] entry that
//! shapes the blade, and the distance to the clump centre drives the
//! colour lookup into the gradient map.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Cells per side of the clump Voronoi grid. Must match `CLUMP_GRID` in
/// clump_voronoi.wgsl.
pub const CLUMP_GRID: u32 = 16;

/// Shape parameters for one clump style (40 bytes).
/// Must match `ClumpParameters` in grass_compute.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[serde(default)]
pub struct ClumpParameters {
    /// How strongly blades are pulled towards the clump centre (0..1)
    pub pull_to_centre: f32,
    /// How strongly blades face the clump's shared direction (0..1)
    pub point_in_same_direction: f32,
    pub base_height: f32,
    pub height_random: f32,
    pub base_width: f32,
    pub width_random: f32,
    pub base_tilt: f32,
    pub tilt_random: f32,
    pub base_bend: f32,
    pub bend_random: f32,
}

impl Default for ClumpParameters {
    fn default() -> Self {
        Self {
            pull_to_centre: 0.3,
            point_in_same_direction: 0.4,
            base_height: 0.6,
            height_random: 0.25,
            base_width: 0.05,
            width_random: 0.02,
            base_tilt: 0.9,
            tilt_random: 0.2,
            base_bend: 0.3,
            bend_random: 0.15,
        }
    }
}

impl ClumpParameters {
    /// A handful of contrasting styles used when no settings file is given
    pub fn default_set() -> Vec<Self> {
        vec![
            Self::default(),
            Self {
                base_height: 0.9,
                height_random: 0.35,
                base_width: 0.04,
                base_bend: 0.45,
                ..Self::default()
            },
            Self {
                pull_to_centre: 0.6,
                point_in_same_direction: 0.7,
                base_height: 0.35,
                height_random: 0.1,
                base_width: 0.06,
                base_tilt: 0.7,
                ..Self::default()
            },
        ]
    }
}

/// Linear-RGBA colour stop on the clump gradient
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// 0 = clump centre, 1 = clump edge
    pub position: f32,
    pub color: [f32; 4],
}

/// Piecewise-linear colour gradient baked into the clump gradient map
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClumpGradient {
    stops: Vec<GradientStop>,
}

impl ClumpGradient {
    /// Create from unsorted stops
    pub fn new(mut stops: Vec<GradientStop>) -> Self {
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { stops }
    }

    pub fn stops(&self) -> &[GradientStop] {
        &self.stops
    }

    /// Evaluate at `t` (clamped to the first/last stop)
    pub fn sample(&self, t: f32) -> [f32; 4] {
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return [1.0; 4];
        };
        if t <= first.position {
            return first.color;
        }
        if t >= last.position {
            return last.color;
        }

        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.position {
                let span = b.position - a.position;
                if span < 1e-6 {
                    return b.color;
                }
                let f = (t - a.position) / span;
                return std::array::from_fn(|i| a.color[i] + (b.color[i] - a.color[i]) * f);
            }
        }
        last.color
    }

    /// Bake to an RGBA8 image: colour varies along x, constant along y
    pub fn bake(&self, width: u32, height: u32) -> Vec<[u8; 4]> {
        let width = width.max(1);
        let row: Vec<[u8; 4]> = (0..width)
            .map(|x| {
                let c = self.sample(x as f32 / width as f32);
                c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            })
            .collect();

        let mut pixels = Vec::with_capacity((width * height) as usize);
        for _ in 0..height {
            pixels.extend_from_slice(&row);
        }
        pixels
    }
}

impl Default for ClumpGradient {
    fn default() -> Self {
        Self::new(vec![
            GradientStop { position: 0.0, color: [0.42, 0.55, 0.12, 1.0] },
            GradientStop { position: 0.45, color: [0.22, 0.42, 0.08, 1.0] },
            GradientStop { position: 1.0, color: [0.10, 0.26, 0.05, 1.0] },
        ])
    }
}

/// PCG-style integer hash shared with the WGSL clump shader
pub fn hash_u32(mut v: u32) -> u32 {
    v = v.wrapping_mul(747796405).wrapping_add(2891336453);
    let word = ((v >> ((v >> 28) + 4)) ^ v).wrapping_mul(277803737);
    (word >> 22) ^ word
}

fn hash_cell(x: u32, y: u32, seed: u32, salt: u32) -> f32 {
    let h = hash_u32(x ^ hash_u32(y ^ hash_u32(seed ^ salt)));
    h as f32 / u32::MAX as f32
}

/// CPU reference of the clump Voronoi pass.
///
/// Each output texel holds `(clump_id / num_clumps, centre.u, centre.v, 1)`
/// where `centre` is the nearest jittered cell point of a tiling
/// `CLUMP_GRID`² grid. The result depends only on the arguments.
pub fn clump_voronoi_cpu(width: u32, height: u32, num_clumps: u32, seed: u32) -> Vec<[f32; 4]> {
    let num_clumps = num_clumps.max(1);
    let grid = CLUMP_GRID as i32;
    let mut out = Vec::with_capacity((width * height) as usize);

    for y in 0..height {
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            let px = u * CLUMP_GRID as f32;
            let py = v * CLUMP_GRID as f32;
            let (cx, cy) = (px.floor() as i32, py.floor() as i32);

            let mut best = (f32::MAX, 0u32, 0.0f32, 0.0f32);
            for oy in -1..=1 {
                for ox in -1..=1 {
                    let gx = cx + ox;
                    let gy = cy + oy;
                    // Wrap so the map tiles seamlessly
                    let wx = gx.rem_euclid(grid) as u32;
                    let wy = gy.rem_euclid(grid) as u32;
                    let point_x = gx as f32 + hash_cell(wx, wy, seed, 0x68e3_1da4);
                    let point_y = gy as f32 + hash_cell(wx, wy, seed, 0xb529_7a4d);
                    let d = (point_x - px).powi(2) + (point_y - py).powi(2);
                    if d < best.0 {
                        let id = hash_u32((wx + wy * CLUMP_GRID) ^ seed) % num_clumps;
                        best = (d, id, point_x / CLUMP_GRID as f32, point_y / CLUMP_GRID as f32);
                    }
                }
            }
            out.push([best.1 as f32 / num_clumps as f32, best.2, best.3, 1.0]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clump_parameters_size() {
        assert_eq!(std::mem::size_of::<ClumpParameters>(), 40);
    }

    #[test]
    fn test_gradient_endpoints_and_mid() {
        let g = ClumpGradient::new(vec![
            GradientStop { position: 1.0, color: [1.0, 1.0, 1.0, 1.0] },
            GradientStop { position: 0.0, color: [0.0, 0.0, 0.0, 1.0] },
        ]);
        assert_eq!(g.sample(-1.0), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(g.sample(2.0), [1.0, 1.0, 1.0, 1.0]);
        let mid = g.sample(0.5);
        assert!((mid[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_bake_rows_identical() {
        let pixels = ClumpGradient::default().bake(8, 3);
        assert_eq!(pixels.len(), 24);
        assert_eq!(pixels[0..8], pixels[8..16]);
        assert_eq!(pixels[0..8], pixels[16..24]);
    }

    #[test]
    fn test_voronoi_deterministic() {
        let a = clump_voronoi_cpu(32, 32, 3, 7);
        let b = clump_voronoi_cpu(32, 32, 3, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_voronoi_seed_changes_output() {
        let a = clump_voronoi_cpu(32, 32, 3, 7);
        let b = clump_voronoi_cpu(32, 32, 3, 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_voronoi_ids_in_range() {
        let texels = clump_voronoi_cpu(16, 16, 4, 1);
        for t in texels {
            assert!(t[0] >= 0.0 && t[0] < 1.0);
            assert_eq!(t[3], 1.0);
            // Clump centre ids map to at most 4 distinct values
            let id = (t[0] * 4.0).round() as u32;
            assert!(id < 4);
        }
    }
}
