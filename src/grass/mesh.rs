//! Blade mesh shared by every grass instance

use glam::{Vec2, Vec3};

/// Indexed triangle mesh of a single grass blade.
///
/// Vertex colour channels carry placement data rather than colour:
/// red controls how far along the blade a vertex sits (used for bending),
/// green marks the left/right side.
#[derive(Clone, Debug, Default)]
pub struct GrassMesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub colors: Vec<[f32; 4]>,
    pub uvs: Vec<Vec2>,
}

impl GrassMesh {
    /// Default tapered blade: `segments` quads and a tip triangle, unit height
    pub fn blade() -> Self {
        Self::tapered_blade(4)
    }

    pub fn tapered_blade(segments: u32) -> Self {
        let segments = segments.max(1);
        let mut positions = Vec::new();
        let mut colors = Vec::new();
        let mut uvs = Vec::new();

        for s in 0..segments {
            let t = s as f32 / segments as f32;
            let half_width = 0.5 * (1.0 - t);
            for (side, x) in [(0.0, -half_width), (1.0, half_width)] {
                positions.push(Vec3::new(x, t, 0.0));
                colors.push([t, side, 0.0, 1.0]);
                uvs.push(Vec2::new(side, t));
            }
        }
        let tip = positions.len() as u32;
        positions.push(Vec3::new(0.0, 1.0, 0.0));
        colors.push([1.0, 0.5, 0.0, 1.0]);
        uvs.push(Vec2::new(0.5, 1.0));

        let mut indices = Vec::new();
        for s in 0..segments - 1 {
            let bl = s * 2;
            let (br, tl, tr) = (bl + 1, bl + 2, bl + 3);
            indices.extend_from_slice(&[bl, br, tl, br, tr, tl]);
        }
        let top = (segments - 1) * 2;
        indices.extend_from_slice(&[top, top + 1, tip]);

        Self { positions, indices, colors, uvs }
    }

    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Vertices drawn per blade instance
    pub fn triangle_index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Copy for upload with the red channel remapped by `r.powf(power)`.
    ///
    /// A mesh without vertex colours gets deterministic fallback colours so
    /// the blade shader still has bend and side data.
    pub fn prepare(&self, power: f32) -> Self {
        let mut mesh = self.clone();
        if mesh.colors.len() != mesh.positions.len() {
            mesh.colors = fallback_colors(mesh.positions.len());
        }
        for c in &mut mesh.colors {
            c[0] = c[0].max(0.0).powf(power);
        }
        if mesh.uvs.len() != mesh.positions.len() {
            mesh.uvs = vec![Vec2::ZERO; mesh.positions.len()];
        }
        mesh
    }
}

/// Fallback vertex colours: red in [0.5, 1), green alternating 0/1
fn fallback_colors(count: usize) -> Vec<[f32; 4]> {
    (0..count)
        .map(|i| {
            let r = 0.5 + 0.5 * (crate::grass::clump::hash_u32(i as u32) as f32 / u32::MAX as f32).min(0.999);
            let g = (i % 2) as f32;
            [r, g, 0.0, 1.0]
        })
        .collect()
}
