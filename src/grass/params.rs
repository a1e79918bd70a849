//! GPU-ready grass uniform (192 bytes, 16-byte aligned).
//!
//! Per-clump shape data lives in the clump parameter storage buffer; this
//! struct holds everything else the blade compute and render shaders read.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

bitflags! {
    /// Feature toggles packed into `GrassUniforms::flags`.
    /// Must match the `FLAG_*` constants in grass_compute.wgsl.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct GrassFeatureFlags: u32 {
        const DISTANCE_CULL = 1 << 0;
        const CLUMPING_DISABLED = 1 << 1;
        const WIND_DISABLED = 1 << 2;
        const CLUMP_COLORING = 1 << 3;
    }
}

/// GPU uniform for the grass passes. Must match `GrassUniforms` in
/// grass_compute.wgsl and grass_render.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GrassUniforms {
    pub view_proj: [[f32; 4]; 4],
    // -- 64 bytes --
    pub camera_position: [f32; 3],
    pub time: f32,
    // -- 16 bytes --
    pub terrain_center_x: f32,
    pub terrain_center_z: f32,
    pub terrain_base_y: f32,
    pub height_multiplier: f32,
    // -- 16 bytes --
    pub height_tiling: f32,
    pub jitter_strength: f32,
    /// Blades per chunk side
    pub resolution: u32,
    pub visible_count: u32,
    // -- 16 bytes --
    pub distance_cull_start: f32,
    pub distance_cull_end: f32,
    pub distance_cull_min_amount: f32,
    pub frustum_near_offset: f32,
    // -- 16 bytes --
    pub frustum_edge_offset: f32,
    /// Blade buffer size; the append counter never ends above it
    pub blade_capacity: u32,
    pub clump_count: u32,
    pub flags: u32,
    // -- 16 bytes --
    pub wind_control: f32,
    pub big_wind_speed: f32,
    pub big_wind_scale: f32,
    pub big_wind_rotate_amount: f32,
    // -- 16 bytes --
    pub wind_tex_contrast: f32,
    pub wind_facing_contribution: f32,
    pub wind_facing_angle: f32,
    pub clump_scale: f32,
    // -- 16 bytes --
    pub centre_color_lower: f32,
    pub centre_color_upper: f32,
    pub clump_color_uniformity: f32,
    pub _pad: f32,
    // -- 16 bytes --
    // Total: 192 bytes
}

impl GrassUniforms {
    pub fn feature_flags(&self) -> GrassFeatureFlags {
        GrassFeatureFlags::from_bits_truncate(self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grass_uniforms_size() {
        assert_eq!(std::mem::size_of::<GrassUniforms>(), 192);
        assert_eq!(std::mem::size_of::<GrassUniforms>() % 16, 0);
    }

    #[test]
    fn test_bytemuck_cast() {
        let u = GrassUniforms::zeroed();
        assert_eq!(bytemuck::bytes_of(&u).len(), 192);
    }

    #[test]
    fn test_flags() {
        let mut flags = GrassFeatureFlags::DISTANCE_CULL | GrassFeatureFlags::CLUMP_COLORING;
        assert_eq!(flags.bits(), 0b1001);
        assert!(flags.contains(GrassFeatureFlags::DISTANCE_CULL));
        assert!(!flags.contains(GrassFeatureFlags::WIND_DISABLED));

        flags.set(GrassFeatureFlags::DISTANCE_CULL, false);
        flags.set(GrassFeatureFlags::WIND_DISABLED, true);
        assert_eq!(flags.bits(), 0b1100);
        assert_eq!(GrassFeatureFlags::empty().bits(), 0);
    }

    #[test]
    fn test_feature_flags_drop_unknown_bits() {
        let mut u = GrassUniforms::zeroed();
        u.flags = (GrassFeatureFlags::WIND_DISABLED.bits()) | (1 << 31);
        assert_eq!(u.feature_flags(), GrassFeatureFlags::WIND_DISABLED);
    }
}
