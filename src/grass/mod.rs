//! GPU-driven procedural grass.
//!
//! The terrain is split into square chunks once at startup. Every frame the
//! CPU culls the chunks against the camera and hands the visible list to a
//! compute pass that appends blade instances, which are then drawn with a
//! single indirect draw. This module holds the CPU side; the GPU side lives
//! in `render::pipeline::grass`.

pub mod chunk;
pub mod clump;
pub mod config;
pub mod culling;
pub mod mesh;
pub mod params;

pub use chunk::{CHUNK_VERTICAL_MARGIN, GpuChunk, Visibility, partition_chunks};
pub use clump::{ClumpGradient, ClumpParameters, GradientStop, clump_voronoi_cpu};
pub use config::GrassSettings;
pub use culling::{ChunkCuller, CullStats};
pub use mesh::GrassMesh;
pub use params::{GrassFeatureFlags, GrassUniforms};

use crate::core::camera::Camera;
use crate::terrain::Terrain;

/// CPU state of the grass system: settings, chunk grid and blade mesh
pub struct GrassSystem {
    settings: GrassSettings,
    terrain: Terrain,
    culler: ChunkCuller,
    source_mesh: GrassMesh,
    mesh: GrassMesh,
}

impl GrassSystem {
    pub fn new(mut settings: GrassSettings, terrain: Terrain, mesh: GrassMesh) -> Self {
        settings.validate();
        let chunks = partition_chunks(
            &terrain.bounds(),
            settings.chunk_count,
            settings.resolution,
            &terrain.heights,
        );
        let prepared = mesh.prepare(settings.vertex_placement_power);
        Self {
            culler: ChunkCuller::new(chunks),
            settings,
            terrain,
            source_mesh: mesh,
            mesh: prepared,
        }
    }

    pub fn settings(&self) -> &GrassSettings {
        &self.settings
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn culler(&self) -> &ChunkCuller {
        &self.culler
    }

    /// Blade mesh with the placement power applied
    pub fn mesh(&self) -> &GrassMesh {
        &self.mesh
    }

    pub fn stats(&self) -> CullStats {
        self.culler.stats()
    }

    /// Distance beyond which whole chunks are dropped
    pub fn cull_distance(&self, camera: &Camera) -> f32 {
        if self.settings.distance_cull_enabled {
            self.settings.distance_cull_end_dist
        } else {
            camera.far
        }
    }

    /// Cull chunks for this frame and return the visible list
    pub fn update(&mut self, camera: &Camera) -> &[GpuChunk] {
        let distance = self.cull_distance(camera);
        self.culler.cull(camera, distance)
    }

    /// Replace the settings. Returns true when the chunk grid or mesh was
    /// rebuilt, meaning GPU resources must be recreated too.
    pub fn apply_settings(&mut self, mut settings: GrassSettings) -> bool {
        settings.validate();
        let rebuild = self.settings.requires_rebuild(&settings);
        if rebuild {
            let chunks = partition_chunks(
                &self.terrain.bounds(),
                settings.chunk_count,
                settings.resolution,
                &self.terrain.heights,
            );
            self.culler = ChunkCuller::new(chunks);
            self.mesh = self.source_mesh.prepare(settings.vertex_placement_power);
        }
        self.settings = settings;
        rebuild
    }

    /// Build GPU-ready uniforms for this frame
    pub fn build_uniforms(&self, camera: &Camera, time: f32, visible_count: u32) -> GrassUniforms {
        let s = &self.settings;
        let heights = &self.terrain.heights;

        let mut flags = GrassFeatureFlags::empty();
        flags.set(GrassFeatureFlags::DISTANCE_CULL, s.distance_cull_enabled);
        flags.set(GrassFeatureFlags::CLUMPING_DISABLED, s.clumping_disabled);
        flags.set(GrassFeatureFlags::WIND_DISABLED, s.wind_disabled);
        flags.set(GrassFeatureFlags::CLUMP_COLORING, s.clump_coloring_enabled);

        GrassUniforms {
            view_proj: camera.view_projection().to_cols_array_2d(),
            camera_position: camera.position.to_array(),
            time,
            terrain_center_x: heights.center.x,
            terrain_center_z: heights.center.y,
            terrain_base_y: self.terrain.center.y,
            height_multiplier: if heights.heightmap.is_some() { heights.multiplier } else { 0.0 },
            height_tiling: heights.tiling,
            jitter_strength: s.jitter_strength,
            resolution: s.resolution,
            visible_count,
            distance_cull_start: s.distance_cull_start_dist,
            distance_cull_end: s.distance_cull_end_dist,
            distance_cull_min_amount: s.distance_cull_minimum_grass_amount,
            frustum_near_offset: s.frustum_cull_near_offset,
            frustum_edge_offset: s.frustum_cull_edge_offset,
            blade_capacity: s.blade_capacity(),
            clump_count: s.clump_parameters.len() as u32,
            flags: flags.bits(),
            wind_control: s.wind_control,
            big_wind_speed: s.big_wind_speed,
            big_wind_scale: s.big_wind_scale,
            big_wind_rotate_amount: s.big_wind_rotate_amount,
            wind_tex_contrast: s.wind_tex_contrast,
            wind_facing_contribution: s.global_wind_facing_contribution,
            wind_facing_angle: s.global_wind_facing_angle,
            clump_scale: s.clump_scale,
            centre_color_lower: s.centre_color_smoothstep_lower,
            centre_color_upper: s.centre_color_smoothstep_upper,
            clump_color_uniformity: s.clump_color_uniformity,
            _pad: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn system(settings: GrassSettings) -> GrassSystem {
        let terrain = Terrain::flat(Vec3::new(45.0, 0.0, 45.0), 90.0, 90.0);
        GrassSystem::new(settings, terrain, GrassMesh::blade())
    }

    #[test]
    fn test_new_partitions_terrain() {
        let sys = system(GrassSettings { chunk_count: 9, ..Default::default() });
        assert_eq!(sys.culler().total_chunks(), 9);
        assert_eq!(sys.culler().chunks()[4].min_bounds[0], 30.0);
    }

    #[test]
    fn test_update_culls_by_distance() {
        let mut sys = system(GrassSettings { chunk_count: 9, ..Default::default() });
        let camera = Camera::look_at(Vec3::new(45.0, 5.0, 45.0), Vec3::new(45.0, 0.0, 0.0), Vec3::Y);
        let visible = sys.update(&camera).len();
        assert!(visible > 0);

        // Far away: nothing within the end distance
        let far = Camera::look_at(Vec3::new(1000.0, 5.0, 1000.0), Vec3::new(45.0, 0.0, 45.0), Vec3::Y);
        assert!(sys.update(&far).is_empty());
        assert_eq!(sys.stats().culled, 9);
    }

    #[test]
    fn test_build_uniforms() {
        let sys = system(GrassSettings { wind_disabled: true, ..Default::default() });
        let camera = Camera::default();
        let u = sys.build_uniforms(&camera, 2.5, 3);
        assert_eq!(u.time, 2.5);
        assert_eq!(u.visible_count, 3);
        assert_eq!(u.resolution, 10);
        assert_eq!(u.blade_capacity, 100);
        assert_eq!(u.height_multiplier, 0.0);
        assert_eq!(u.terrain_center_x, 45.0);
        let flags = u.feature_flags();
        assert!(flags.contains(GrassFeatureFlags::WIND_DISABLED));
        assert!(flags.contains(GrassFeatureFlags::DISTANCE_CULL));
        assert!(!flags.contains(GrassFeatureFlags::CLUMPING_DISABLED));
    }

    #[test]
    fn test_apply_settings() {
        let mut sys = system(GrassSettings::default());
        let live = GrassSettings { wind_control: 0.8, ..sys.settings().clone() };
        assert!(!sys.apply_settings(live));
        assert_eq!(sys.settings().wind_control, 0.8);

        let rebuilt = GrassSettings { chunk_count: 4, ..sys.settings().clone() };
        assert!(sys.apply_settings(rebuilt));
        assert_eq!(sys.culler().total_chunks(), 4);
    }

    #[test]
    fn test_mesh_prepared() {
        let sys = system(GrassSettings { vertex_placement_power: 2.0, ..Default::default() });
        assert_eq!(sys.mesh().colors[2][0], 0.0625);
    }
}
