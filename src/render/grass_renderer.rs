//! Grass renderer: owns the CPU grass system and every GPU pass it feeds

use crate::core::camera::Camera;
use crate::grass::{CullStats, GrassMesh, GrassSettings, GrassSystem};
use crate::terrain::{LayerMask, Terrain, generate_layer_mask};
use super::GpuContext;
use super::buffer::CameraBuffer;
use super::pipeline::{ChunkDebugPass, ClumpTexture, ClumpVoronoiPass, GrassPipeline, build_clump_map};
use super::texture::GrassTextures;

/// Grass for one terrain.
///
/// Call [`GrassRenderer::frame`] once per frame before the main render
/// pass, then [`GrassRenderer::draw`] inside it.
pub struct GrassRenderer {
    system: GrassSystem,
    textures: GrassTextures,
    pipeline: GrassPipeline,
    clump_map: Option<ClumpTexture>,
    /// `None` when the adapter can't render the clump map
    voronoi_pass: Option<ClumpVoronoiPass>,
    camera_buffer: CameraBuffer,
    debug_pass: ChunkDebugPass,
    debug_draw: bool,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
}

impl GrassRenderer {
    pub fn new(
        gpu: &GpuContext,
        settings: GrassSettings,
        terrain: Terrain,
        mesh: GrassMesh,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let (device, queue) = (&gpu.device, &gpu.queue);
        let system = GrassSystem::new(settings, terrain, mesh);
        let textures = Self::create_textures(device, queue, &system);
        let mut pipeline = GrassPipeline::new(
            device, queue,
            system.settings(), system.mesh(), &textures,
            color_format, depth_format,
        );
        let voronoi_pass = ClumpVoronoiPass::for_adapter(&gpu.adapter, device);
        let clump_map = Self::render_clump_map(device, queue, system.settings(), voronoi_pass.as_ref());
        if let Some(map) = &clump_map {
            pipeline.set_clump_texture(device, &map.view);
        }

        let camera_buffer = CameraBuffer::new(device);
        let debug_pass = ChunkDebugPass::new(device, camera_buffer.bind_group_layout(), color_format, depth_format);

        Self {
            system,
            textures,
            pipeline,
            clump_map,
            voronoi_pass,
            camera_buffer,
            debug_pass,
            debug_draw: false,
            color_format,
            depth_format,
        }
    }

    fn create_textures(device: &wgpu::Device, queue: &wgpu::Queue, system: &GrassSystem) -> GrassTextures {
        let settings = system.settings();
        let terrain = system.terrain();
        let mask = Self::layer_mask(terrain, settings);
        GrassTextures::new(
            device, queue, settings,
            terrain.heights.heightmap.as_ref(),
            mask.as_ref(),
            None,
        )
    }

    /// Placement mask for the configured layers. `None` means grass everywhere.
    fn layer_mask(terrain: &Terrain, settings: &GrassSettings) -> Option<LayerMask> {
        if settings.include_layers.is_empty() {
            return None;
        }
        generate_layer_mask(terrain.splat.as_ref(), &settings.include_layers)
    }

    fn render_clump_map(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &GrassSettings,
        pass: Option<&ClumpVoronoiPass>,
    ) -> Option<ClumpTexture> {
        if settings.clumping_disabled {
            log::info!("Clumping disabled, skipping clump map");
            return None;
        }
        Some(build_clump_map(
            pass, device, queue,
            settings.clump_tex_width, settings.clump_tex_height,
            settings.clump_parameters.len() as u32,
            settings.clump_seed,
        ))
    }

    /// Cull chunks, upload the visible list and encode blade generation
    pub fn frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        camera: &Camera,
        time: f32,
    ) {
        let visible = self.system.update(camera);
        let visible_count = visible.len() as u32;
        self.pipeline.upload_visible_chunks(device, queue, visible);

        let uniforms = self.system.build_uniforms(camera, time, visible_count);
        self.pipeline.encode_compute(encoder, queue, &uniforms, visible_count);

        if self.debug_draw {
            self.camera_buffer.update(queue, camera, self.system.cull_distance(camera));
            self.debug_pass.update(device, queue, self.system.culler().chunks());
        }
    }

    /// Draw the blades (and chunk boxes when enabled) into the current pass
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        self.pipeline.draw(pass);
        if self.debug_draw {
            self.debug_pass.draw(pass, self.camera_buffer.bind_group());
        }
    }

    /// Push new settings. Live values are uploaded in place; grid, buffer or
    /// texture size changes rebuild the GPU side.
    pub fn apply_settings(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, settings: GrassSettings) {
        if self.system.apply_settings(settings) {
            log::info!("Grass settings changed layout, rebuilding GPU resources");
            self.rebuild(device, queue);
            return;
        }
        let settings = self.system.settings();
        self.pipeline.update_clump_parameters(device, queue, &settings.clump_parameters);
        self.textures.update_gradient(queue, settings);
        log::debug!("Applied live grass settings");
    }

    fn rebuild(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.textures = Self::create_textures(device, queue, &self.system);
        self.pipeline = GrassPipeline::new(
            device, queue,
            self.system.settings(), self.system.mesh(), &self.textures,
            self.color_format, self.depth_format,
        );
        self.clump_map = Self::render_clump_map(device, queue, self.system.settings(), self.voronoi_pass.as_ref());
        if let Some(map) = &self.clump_map {
            self.pipeline.set_clump_texture(device, &map.view);
        }
    }

    pub fn debug_draw(&self) -> bool {
        self.debug_draw
    }

    pub fn set_debug_draw(&mut self, enabled: bool) {
        self.debug_draw = enabled;
    }

    /// Flip chunk box drawing, returning the new state
    pub fn toggle_debug_draw(&mut self) -> bool {
        self.debug_draw = !self.debug_draw;
        self.debug_draw
    }

    pub fn system(&self) -> &GrassSystem {
        &self.system
    }

    pub fn settings(&self) -> &GrassSettings {
        self.system.settings()
    }

    pub fn stats(&self) -> CullStats {
        self.system.stats()
    }

    /// The rendered clump map, if clumping is enabled
    pub fn clump_map(&self) -> Option<&ClumpTexture> {
        self.clump_map.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use crate::render::context::test_context;
    use crate::terrain::SplatMap;

    const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Flat 90x90 terrain seen from straight above, every chunk in view
    fn overhead_camera() -> Camera {
        Camera::look_at(Vec3::new(0.0, 120.0, 0.0), Vec3::ZERO, Vec3::NEG_Z)
    }

    /// Looking up into the sky, no chunk in view
    fn sky_camera() -> Camera {
        Camera::look_at(Vec3::new(0.0, 120.0, 0.0), Vec3::new(0.0, 300.0, 0.0), Vec3::NEG_Z)
    }

    fn test_settings(chunk_count: u32, resolution: u32) -> GrassSettings {
        GrassSettings {
            chunk_count,
            resolution,
            clumping_disabled: true,
            distance_cull_enabled: false,
            frustum_cull_near_offset: 0.0,
            frustum_cull_edge_offset: 0.0,
            ..GrassSettings::default()
        }
    }

    fn run_frame(gpu: &GpuContext, renderer: &mut GrassRenderer, camera: &Camera) -> u32 {
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("test_frame_encoder"),
        });
        renderer.frame(&gpu.device, &gpu.queue, &mut encoder, camera, 0.0);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        let args = renderer.pipeline.read_back_args(&gpu.device, &gpu.queue).unwrap();
        assert_eq!(args.vertex_count, renderer.system().mesh().triangle_index_count());
        args.instance_count
    }

    #[test]
    fn test_blade_count_capped_and_reset_on_empty_frame() {
        let Some(gpu) = test_context() else {
            eprintln!("No GPU adapter, skipping");
            return;
        };
        // 16 visible chunks of 100 blades each into a 100 blade buffer
        let terrain = Terrain::flat(Vec3::ZERO, 90.0, 90.0);
        let mut renderer = GrassRenderer::new(
            &gpu, test_settings(16, 10), terrain, GrassMesh::blade(), COLOR_FORMAT, None,
        );
        let capacity = renderer.pipeline.blade_capacity();
        assert_eq!(capacity, 100);

        assert_eq!(run_frame(&gpu, &mut renderer, &overhead_camera()), capacity);
        assert_eq!(renderer.system().culler().visible().len(), 16);

        assert_eq!(run_frame(&gpu, &mut renderer, &sky_camera()), 0);
        assert!(renderer.system().culler().visible().is_empty());

        assert_eq!(run_frame(&gpu, &mut renderer, &overhead_camera()), capacity);
    }

    #[test]
    fn test_layer_mask_does_not_wrap_at_terrain_edge() {
        let Some(gpu) = test_context() else {
            eprintln!("No GPU adapter, skipping");
            return;
        };
        // Grass on the west half only: mask texels [1, 0]
        let mut terrain = Terrain::flat(Vec3::ZERO, 90.0, 90.0);
        terrain.splat = Some(SplatMap::new(2, 1, vec!["grass".to_string()], vec![1.0, 0.0]).unwrap());
        let settings = GrassSettings {
            include_layers: vec!["grass".to_string()],
            ..test_settings(1, 64)
        };
        let mut renderer = GrassRenderer::new(&gpu, settings, terrain, GrassMesh::blade(), COLOR_FORMAT, None);

        let count = run_frame(&gpu, &mut renderer, &overhead_camera());
        assert!(count > 0 && count < renderer.pipeline.blade_capacity());
        let blades = renderer.pipeline.read_back_blades(&gpu.device, &gpu.queue, count).unwrap();

        // East of the last texel centre (x = 22.5) the mask is exactly zero
        let east = blades.iter().filter(|b| b.position[0] > 23.0).count();
        let west = blades.iter().filter(|b| b.position[0] < -23.0).count();
        assert_eq!(east, 0);
        assert!(west > 0);
    }

    #[test]
    fn test_resolution_clamped_to_storage_binding_limit() {
        let Some(gpu) = test_context() else {
            eprintln!("No GPU adapter, skipping");
            return;
        };
        let max = crate::render::pipeline::max_resolution(&gpu.device.limits());
        let requested = (max + 1).min(*crate::grass::config::RESOLUTION_RANGE.end());
        let terrain = Terrain::flat(Vec3::ZERO, 90.0, 90.0);
        let renderer = GrassRenderer::new(
            &gpu, test_settings(4, requested), terrain, GrassMesh::blade(), COLOR_FORMAT, None,
        );
        let expected = requested.min(max);
        assert_eq!(renderer.pipeline.resolution(), expected);
        assert_eq!(renderer.pipeline.blade_capacity(), expected * expected);
        let blade_bytes = expected as u64 * expected as u64 * std::mem::size_of::<crate::render::pipeline::GpuBlade>() as u64;
        assert!(blade_bytes <= gpu.device.limits().max_storage_buffer_binding_size as u64);
    }

    #[test]
    fn test_dispose_then_drop() {
        let Some(gpu) = test_context() else {
            eprintln!("No GPU adapter, skipping");
            return;
        };
        let terrain = Terrain::flat(Vec3::ZERO, 90.0, 90.0);
        let mut renderer = GrassRenderer::new(
            &gpu, test_settings(4, 10), terrain, GrassMesh::blade(), COLOR_FORMAT, None,
        );
        run_frame(&gpu, &mut renderer, &overhead_camera());

        assert!(!renderer.pipeline.is_disposed());
        renderer.pipeline.dispose();
        assert!(renderer.pipeline.is_disposed());
        // Second call is a no-op, and Drop runs it once more
        renderer.pipeline.dispose();
        assert!(renderer.pipeline.is_disposed());
        drop(renderer);
    }

    #[test]
    fn test_clumped_frame_with_either_clump_source() {
        let Some(gpu) = test_context() else {
            eprintln!("No GPU adapter, skipping");
            return;
        };
        let settings = GrassSettings {
            clumping_disabled: false,
            ..test_settings(4, 16)
        };
        let terrain = Terrain::flat(Vec3::ZERO, 90.0, 90.0);
        let mut renderer = GrassRenderer::new(&gpu, settings, terrain, GrassMesh::blade(), COLOR_FORMAT, None);

        let map = renderer.clump_map().unwrap();
        let expected = (renderer.settings().clump_tex_width, renderer.settings().clump_tex_height);
        assert_eq!((map.width, map.height), expected);
        assert!(run_frame(&gpu, &mut renderer, &overhead_camera()) > 0);
    }
}
