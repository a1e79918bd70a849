//! Grass settings: everything an artist tunes, loadable from JSON.
//!
//! Numbers marked "live" can be pushed to a running renderer with
//! `GrassRenderer::apply_settings`; the rest size GPU buffers or the chunk
//! grid and only take effect on rebuild.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use super::clump::{ClumpGradient, ClumpParameters};

/// Valid range for blades per chunk side
pub const RESOLUTION_RANGE: std::ops::RangeInclusive<u32> = 10..=4000;

/// Full grass configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassSettings {
    // -- Placement (rebuild) ------------------------------------------------

    /// Target number of culling chunks; rounded up to a square grid
    pub chunk_count: u32,
    /// Blades per chunk side; the blade buffer holds `resolution²` blades
    pub resolution: u32,
    /// Random offset applied to each blade's grid position (live)
    pub jitter_strength: f32,
    /// Exponent applied to the mesh's vertex colour red channel
    pub vertex_placement_power: f32,
    /// Terrain splat layers grass may grow on. Empty = everywhere.
    pub include_layers: Vec<String>,

    // -- Wind (live) --------------------------------------------------------

    pub wind_disabled: bool,
    pub global_wind_facing_contribution: f32,
    pub global_wind_facing_angle: f32,
    /// Overall sway strength (0..1)
    pub wind_control: f32,
    pub big_wind_speed: f32,
    pub big_wind_scale: f32,
    pub big_wind_rotate_amount: f32,
    pub wind_tex_contrast: f32,

    // -- Culling (live) -----------------------------------------------------

    pub distance_cull_enabled: bool,
    /// Distance where blade thinning begins
    pub distance_cull_start_dist: f32,
    /// Distance beyond which chunks and blades are culled
    pub distance_cull_end_dist: f32,
    /// Fraction of blades kept right before the end distance
    pub distance_cull_minimum_grass_amount: f32,
    /// Per-blade frustum test slack towards the near plane
    pub frustum_cull_near_offset: f32,
    /// Per-blade frustum test slack at the screen edges
    pub frustum_cull_edge_offset: f32,

    // -- Clumping -----------------------------------------------------------

    pub clumping_disabled: bool,
    pub clump_tex_width: u32,
    pub clump_tex_height: u32,
    /// Seed of the Voronoi clump map
    pub clump_seed: u32,
    /// World-to-clump-map scale (live)
    pub clump_scale: f32,
    pub clump_parameters: Vec<ClumpParameters>,

    // -- Clump colouring (live) ---------------------------------------------

    pub clump_coloring_enabled: bool,
    pub centre_color_smoothstep_lower: f32,
    pub centre_color_smoothstep_upper: f32,
    pub clump_color_uniformity: f32,
    pub gradient_map_width: u32,
    pub gradient_map_height: u32,
    pub clump_gradient: ClumpGradient,
}

impl Default for GrassSettings {
    fn default() -> Self {
        Self {
            chunk_count: 16,
            resolution: 10,
            jitter_strength: 5.0,
            vertex_placement_power: 0.6,
            include_layers: Vec::new(),

            wind_disabled: false,
            global_wind_facing_contribution: 0.0,
            global_wind_facing_angle: 0.0,
            wind_control: 0.2,
            big_wind_speed: 0.01,
            big_wind_scale: 0.005,
            big_wind_rotate_amount: 0.6,
            wind_tex_contrast: 1.0,

            distance_cull_enabled: true,
            distance_cull_start_dist: 30.0,
            distance_cull_end_dist: 86.93,
            distance_cull_minimum_grass_amount: 0.2,
            frustum_cull_near_offset: -5.0,
            frustum_cull_edge_offset: -2.0,

            clumping_disabled: false,
            clump_tex_width: 512,
            clump_tex_height: 512,
            clump_seed: 1,
            clump_scale: 0.1,
            clump_parameters: ClumpParameters::default_set(),

            clump_coloring_enabled: true,
            centre_color_smoothstep_lower: 0.0,
            centre_color_smoothstep_upper: 0.41,
            clump_color_uniformity: 0.5,
            gradient_map_width: 128,
            gradient_map_height: 32,
            clump_gradient: ClumpGradient::default(),
        }
    }
}

impl GrassSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&text)?;
        settings.validate();
        log::info!("Loaded grass settings from {}", path.display());
        Ok(settings)
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Clamp values the GPU side can't cope with
    pub fn validate(&mut self) {
        if !RESOLUTION_RANGE.contains(&self.resolution) {
            let clamped = self.resolution.clamp(*RESOLUTION_RANGE.start(), *RESOLUTION_RANGE.end());
            log::warn!("Grass resolution {} out of range, using {}", self.resolution, clamped);
            self.resolution = clamped;
        }
        if self.clump_parameters.is_empty() {
            log::warn!("No clump parameters configured, using one default clump");
            self.clump_parameters.push(ClumpParameters::default());
        }
        self.clump_tex_width = self.clump_tex_width.max(1);
        self.clump_tex_height = self.clump_tex_height.max(1);
        self.gradient_map_width = self.gradient_map_width.max(1);
        self.gradient_map_height = self.gradient_map_height.max(1);
        if self.distance_cull_start_dist > self.distance_cull_end_dist {
            log::warn!(
                "distance_cull_start_dist {} is beyond end {}, thinning disabled",
                self.distance_cull_start_dist, self.distance_cull_end_dist
            );
            self.distance_cull_start_dist = self.distance_cull_end_dist;
        }
    }

    /// Maximum number of blades the GPU blade buffer can hold
    pub fn blade_capacity(&self) -> u32 {
        self.resolution * self.resolution
    }

    /// True if a change from `self` to `other` needs GPU resources rebuilt
    pub fn requires_rebuild(&self, other: &GrassSettings) -> bool {
        self.chunk_count != other.chunk_count
            || self.resolution != other.resolution
            || self.vertex_placement_power != other.vertex_placement_power
            || self.include_layers != other.include_layers
            || self.clumping_disabled != other.clumping_disabled
            || self.clump_tex_width != other.clump_tex_width
            || self.clump_tex_height != other.clump_tex_height
            || self.clump_seed != other.clump_seed
            || self.clump_parameters.len() != other.clump_parameters.len()
            || self.gradient_map_width != other.gradient_map_width
            || self.gradient_map_height != other.gradient_map_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = GrassSettings::default();
        assert_eq!(s.resolution, 10);
        assert!(s.distance_cull_end_dist > s.distance_cull_start_dist);
        assert!(!s.clump_parameters.is_empty());
        assert_eq!(s.blade_capacity(), 100);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: GrassSettings = serde_json::from_str(r#"{ "resolution": 64, "wind_control": 0.5 }"#).unwrap();
        assert_eq!(s.resolution, 64);
        assert_eq!(s.wind_control, 0.5);
        assert_eq!(s.chunk_count, 16);
    }

    #[test]
    fn test_validate_clamps_resolution() {
        let mut s = GrassSettings { resolution: 5000, ..Default::default() };
        s.validate();
        assert_eq!(s.resolution, 4000);

        let mut s = GrassSettings { resolution: 1, clump_parameters: vec![], ..Default::default() };
        s.validate();
        assert_eq!(s.resolution, 10);
        assert_eq!(s.clump_parameters.len(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grass.json");

        let s = GrassSettings { chunk_count: 25, resolution: 32, ..Default::default() };
        s.save(&path).unwrap();
        let loaded = GrassSettings::load(&path).unwrap();
        assert_eq!(loaded, s);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(GrassSettings::load("/nonexistent/grass.json").is_err());
    }

    #[test]
    fn test_requires_rebuild() {
        let a = GrassSettings::default();
        let live = GrassSettings { wind_control: 0.9, ..a.clone() };
        assert!(!a.requires_rebuild(&live));
        let sized = GrassSettings { resolution: 20, ..a.clone() };
        assert!(a.requires_rebuild(&sized));
    }
}
