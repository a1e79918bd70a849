//! Blade generation compute pass and the indirect blade draw.
//!
//! Each frame the compute shader walks the visible chunks, appends one
//! `GpuBlade` per surviving grid cell to the blade buffer and bumps an atomic
//! counter. The counter is then copied into the instance slot of the
//! indirect args, so the draw never round-trips through the CPU.

use bytemuck::{Pod, Zeroable};

use crate::core::Result;
use crate::grass::{ClumpParameters, GpuChunk, GrassMesh, GrassSettings, GrassUniforms};
use crate::render::buffer::{ChunkListBuffer, MeshBuffers, read_back_buffer};
use crate::render::texture::GrassTextures;

/// Compute workgroup size. Must match `@workgroup_size` in grass_compute.wgsl.
pub const WORKGROUP_SIZE: [u32; 3] = [8, 8, 1];

/// Byte offset of `instance_count` in the indirect args
const INSTANCE_COUNT_OFFSET: u64 = 4;

/// Per-blade instance data (72 bytes). Must match `Blade` in
/// grass_compute.wgsl and grass_render.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GpuBlade {
    pub position: [f32; 3],
    /// Facing direction on the XZ plane
    pub facing: [f32; 2],
    pub height: f32,
    pub width: f32,
    pub tilt: f32,
    pub bend: f32,
    pub wind_strength: f32,
    pub wind_phase: f32,
    pub hash: f32,
    /// Normalized distance to the clump centre
    pub clump_distance: f32,
    pub color: [f32; 3],
    /// Height scale from distance thinning
    pub fade: f32,
    pub clump_id: f32,
}

/// Arguments of a non-indexed indirect draw
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawIndirectArgs {
    /// One blade mesh per instance, instance count filled in by the GPU
    pub fn for_mesh(index_count: u32) -> Self {
        Self {
            vertex_count: index_count,
            instance_count: 0,
            first_vertex: 0,
            first_instance: 0,
        }
    }
}

/// Largest blades-per-side whose blade buffer fits in one storage binding
pub fn max_resolution(limits: &wgpu::Limits) -> u32 {
    let max_bytes = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    let max_blades = max_bytes / std::mem::size_of::<GpuBlade>() as u64;
    let mut res = (max_blades as f64).sqrt() as u64;
    // Float sqrt can land one above on large values
    while res * res > max_blades {
        res -= 1;
    }
    res.min(u32::MAX as u64) as u32
}

/// Workgroup counts for the blade compute dispatch.
///
/// x covers visible chunks, y covers one blade row of a chunk and z walks
/// the rows, so every chunk gets `resolution²` invocations.
pub fn dispatch_size(visible_count: u32, resolution: u32) -> [u32; 3] {
    [
        visible_count.div_ceil(WORKGROUP_SIZE[0]).max(1),
        resolution.div_ceil(WORKGROUP_SIZE[1]).max(1),
        resolution.max(1),
    ]
}

/// Buffers owned by the pipeline
struct GrassBuffers {
    uniforms: wgpu::Buffer,
    blades: wgpu::Buffer,
    counter: wgpu::Buffer,
    args: wgpu::Buffer,
    clump_parameters: wgpu::Buffer,
    mesh: MeshBuffers,
    chunks: ChunkListBuffer,
}

impl GrassBuffers {
    fn destroy(&self) {
        self.uniforms.destroy();
        self.blades.destroy();
        self.counter.destroy();
        self.args.destroy();
        self.clump_parameters.destroy();
        self.mesh.destroy();
        self.chunks.destroy();
    }
}

/// Texture views and samplers the compute bind group is built from
struct ComputeInputs {
    height: wgpu::TextureView,
    layer_mask: wgpu::TextureView,
    wind: wgpu::TextureView,
    clump: wgpu::TextureView,
    gradient: wgpu::TextureView,
    wrap_sampler: wgpu::Sampler,
    clamp_sampler: wgpu::Sampler,
}

/// GPU side of the grass system
pub struct GrassPipeline {
    compute_pipeline: wgpu::ComputePipeline,
    render_pipeline: wgpu::RenderPipeline,
    compute_layout: wgpu::BindGroupLayout,
    compute_bind_group: wgpu::BindGroup,
    render_bind_group: wgpu::BindGroup,
    buffers: GrassBuffers,
    inputs: ComputeInputs,
    resolution: u32,
    blade_capacity: u32,
    clump_count: u32,
    disposed: bool,
}

impl GrassPipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &GrassSettings,
        mesh: &GrassMesh,
        textures: &GrassTextures,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let compute_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_compute_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/grass_compute.wgsl").into()),
        });
        let render_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_render_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/grass_render.wgsl").into()),
        });

        let max_res = max_resolution(&device.limits());
        let resolution = if settings.resolution > max_res {
            log::warn!(
                "Grass resolution {} needs a blade buffer over the device's storage binding limit, using {}",
                settings.resolution, max_res
            );
            max_res
        } else {
            settings.resolution
        };
        let blade_capacity = resolution * resolution;
        let clump_count = settings.clump_parameters.len().max(1) as u32;

        // -- Buffers -----------------------------------------------------------

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_uniforms"),
            size: std::mem::size_of::<GrassUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let blades = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_blades"),
            size: blade_capacity.max(1) as u64 * std::mem::size_of::<GpuBlade>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let counter = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_blade_counter"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mesh_buffers = MeshBuffers::new(device, mesh);

        let args = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_indirect_args"),
            size: std::mem::size_of::<DrawIndirectArgs>() as u64,
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        queue.write_buffer(&args, 0, bytemuck::bytes_of(&DrawIndirectArgs::for_mesh(mesh_buffers.index_count())));

        let clump_parameters = Self::create_clump_buffer(device, clump_count);
        queue.write_buffer(&clump_parameters, 0, bytemuck::cast_slice(&settings.clump_parameters));

        let buffers = GrassBuffers {
            uniforms,
            blades,
            counter,
            args,
            clump_parameters,
            mesh: mesh_buffers,
            chunks: ChunkListBuffer::new(device),
        };

        let inputs = ComputeInputs {
            height: textures.height.view.clone(),
            layer_mask: textures.layer_mask.view.clone(),
            wind: textures.wind.view.clone(),
            clump: textures.clump_placeholder.view.clone(),
            gradient: textures.gradient.view.clone(),
            wrap_sampler: textures.wrap_sampler.clone(),
            clamp_sampler: textures.clamp_sampler.clone(),
        };

        // -- Compute -----------------------------------------------------------

        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_compute_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_entry(1, wgpu::ShaderStages::COMPUTE, true),  // visible chunks
                storage_entry(2, wgpu::ShaderStages::COMPUTE, true),  // clump parameters
                storage_entry(3, wgpu::ShaderStages::COMPUTE, false), // blades
                storage_entry(4, wgpu::ShaderStages::COMPUTE, false), // counter
                texture_entry(5, false), // height
                texture_entry(6, true),  // layer mask
                texture_entry(7, true),  // wind
                texture_entry(8, false), // clump map
                texture_entry(9, true),  // gradient
                sampler_entry(10), // wind
                sampler_entry(11), // mask, gradient
            ],
        });

        let compute_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_compute_pipeline_layout"),
            bind_group_layouts: &[&compute_layout],
            immediate_size: 0,
        });

        let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("grass_compute_pipeline"),
            layout: Some(&compute_pipeline_layout),
            module: &compute_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        // -- Render ------------------------------------------------------------

        let render_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_render_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                storage_entry(1, wgpu::ShaderStages::VERTEX, true), // blades
                storage_entry(2, wgpu::ShaderStages::VERTEX, true), // triangles
                storage_entry(3, wgpu::ShaderStages::VERTEX, true), // positions
                storage_entry(4, wgpu::ShaderStages::VERTEX, true), // colors
                storage_entry(5, wgpu::ShaderStages::VERTEX, true), // uvs
            ],
        });

        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_render_pipeline_layout"),
            bind_group_layouts: &[&render_layout],
            immediate_size: 0,
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("grass_render_pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &render_shader,
                entry_point: Some("vs_main"),
                buffers: &[], // Vertices pulled from storage buffers
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None, // Blades are double sided
                ..Default::default()
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &render_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        let compute_bind_group = Self::create_compute_bind_group(device, &compute_layout, &buffers, &inputs);

        let render_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_render_bind_group"),
            layout: &render_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: buffers.uniforms.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: buffers.blades.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: buffers.mesh.triangles.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: buffers.mesh.positions.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: buffers.mesh.colors.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: buffers.mesh.uvs.as_entire_binding() },
            ],
        });

        log::info!(
            "Grass pipeline: {} blades max ({}x{}), {} clump styles, {} verts per blade",
            blade_capacity, resolution, resolution, clump_count, buffers.mesh.index_count()
        );

        Self {
            compute_pipeline,
            render_pipeline,
            compute_layout,
            compute_bind_group,
            render_bind_group,
            buffers,
            inputs,
            resolution,
            blade_capacity,
            clump_count,
            disposed: false,
        }
    }

    fn create_clump_buffer(device: &wgpu::Device, count: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_clump_parameters"),
            size: count.max(1) as u64 * std::mem::size_of::<ClumpParameters>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_compute_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffers: &GrassBuffers,
        inputs: &ComputeInputs,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_compute_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: buffers.uniforms.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: buffers.chunks.buffer().as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: buffers.clump_parameters.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: buffers.blades.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: buffers.counter.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: wgpu::BindingResource::TextureView(&inputs.height) },
                wgpu::BindGroupEntry { binding: 6, resource: wgpu::BindingResource::TextureView(&inputs.layer_mask) },
                wgpu::BindGroupEntry { binding: 7, resource: wgpu::BindingResource::TextureView(&inputs.wind) },
                wgpu::BindGroupEntry { binding: 8, resource: wgpu::BindingResource::TextureView(&inputs.clump) },
                wgpu::BindGroupEntry { binding: 9, resource: wgpu::BindingResource::TextureView(&inputs.gradient) },
                wgpu::BindGroupEntry { binding: 10, resource: wgpu::BindingResource::Sampler(&inputs.wrap_sampler) },
                wgpu::BindGroupEntry { binding: 11, resource: wgpu::BindingResource::Sampler(&inputs.clamp_sampler) },
            ],
        })
    }

    fn rebuild_compute_bind_group(&mut self, device: &wgpu::Device) {
        self.compute_bind_group =
            Self::create_compute_bind_group(device, &self.compute_layout, &self.buffers, &self.inputs);
    }

    /// Upload clump styles, reallocating when the count changes
    pub fn update_clump_parameters(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, params: &[ClumpParameters]) {
        if params.is_empty() {
            log::warn!("Ignoring empty clump parameter list");
            return;
        }
        let count = params.len() as u32;
        if count != self.clump_count {
            self.buffers.clump_parameters.destroy();
            self.buffers.clump_parameters = Self::create_clump_buffer(device, count);
            self.clump_count = count;
            self.rebuild_compute_bind_group(device);
            log::debug!("Clump parameter buffer resized to {}", count);
        }
        queue.write_buffer(&self.buffers.clump_parameters, 0, bytemuck::cast_slice(params));
    }

    /// Replace the visible-chunk buffer. An empty list keeps the old one.
    pub fn upload_visible_chunks(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, chunks: &[GpuChunk]) {
        if self.buffers.chunks.upload(device, queue, chunks) {
            self.rebuild_compute_bind_group(device);
        }
    }

    /// Bind the clump map produced by the Voronoi pass
    pub fn set_clump_texture(&mut self, device: &wgpu::Device, view: &wgpu::TextureView) {
        self.inputs.clump = view.clone();
        self.rebuild_compute_bind_group(device);
    }

    /// Reset the blade counter, run blade generation and publish the blade
    /// count into the indirect args.
    ///
    /// Resolution and capacity in `uniforms` are replaced by the sizes this
    /// pipeline actually allocated.
    pub fn encode_compute(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        uniforms: &GrassUniforms,
        visible_count: u32,
    ) {
        let uniforms = GrassUniforms {
            resolution: self.resolution,
            blade_capacity: self.blade_capacity,
            ..*uniforms
        };
        encoder.clear_buffer(&self.buffers.counter, 0, None);
        queue.write_buffer(&self.buffers.uniforms, 0, bytemuck::bytes_of(&uniforms));

        if visible_count > 0 {
            let [x, y, z] = dispatch_size(visible_count, self.resolution);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("grass_compute_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.compute_pipeline);
            pass.set_bind_group(0, &self.compute_bind_group, &[]);
            pass.dispatch_workgroups(x, y, z);
        }

        encoder.copy_buffer_to_buffer(
            &self.buffers.counter,
            0,
            &self.buffers.args,
            INSTANCE_COUNT_OFFSET,
            std::mem::size_of::<u32>() as u64,
        );
    }

    /// Draw every generated blade
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.render_pipeline);
        pass.set_bind_group(0, &self.render_bind_group, &[]);
        pass.draw_indirect(&self.buffers.args, 0);
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn blade_capacity(&self) -> u32 {
        self.blade_capacity
    }

    pub fn clump_count(&self) -> u32 {
        self.clump_count
    }

    /// Indirect args as the GPU last wrote them (blocks)
    pub fn read_back_args(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<DrawIndirectArgs> {
        let size = std::mem::size_of::<DrawIndirectArgs>() as u64;
        let bytes = read_back_buffer(device, queue, &self.buffers.args, size)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    /// The first `count` blades of the blade buffer (blocks)
    pub fn read_back_blades(&self, device: &wgpu::Device, queue: &wgpu::Queue, count: u32) -> Result<Vec<GpuBlade>> {
        let size = count.min(self.blade_capacity) as u64 * std::mem::size_of::<GpuBlade>() as u64;
        let bytes = read_back_buffer(device, queue, &self.buffers.blades, size)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release every owned buffer. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.buffers.destroy();
        self.disposed = true;
        log::debug!("Grass pipeline buffers released");
    }
}

impl Drop for GrassPipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blade_size() {
        assert_eq!(std::mem::size_of::<GpuBlade>(), 72);
        assert_eq!(std::mem::size_of::<GpuBlade>(), 18 * 4);
    }

    #[test]
    fn test_indirect_args() {
        let args = DrawIndirectArgs::for_mesh(21);
        assert_eq!(bytemuck::cast::<_, [u32; 4]>(args), [21, 0, 0, 0]);
        assert_eq!(std::mem::size_of::<DrawIndirectArgs>(), 16);
        assert_eq!(INSTANCE_COUNT_OFFSET as usize, std::mem::offset_of!(DrawIndirectArgs, instance_count));
    }

    #[test]
    fn test_dispatch_size() {
        assert_eq!(dispatch_size(1, 10), [1, 2, 10]);
        assert_eq!(dispatch_size(8, 8), [1, 1, 8]);
        assert_eq!(dispatch_size(9, 64), [2, 8, 64]);
        assert_eq!(dispatch_size(17, 4000), [3, 500, 4000]);
    }

    #[test]
    fn test_max_resolution_fits_binding() {
        let limits = wgpu::Limits::default();
        assert_eq!(limits.max_storage_buffer_binding_size, 128 << 20);
        let res = max_resolution(&limits);
        assert_eq!(res, 1365);
        let blade = std::mem::size_of::<GpuBlade>() as u64;
        assert!(res as u64 * res as u64 * blade <= 128 << 20);
        assert!((res as u64 + 1).pow(2) * blade > 128 << 20);

        // A smaller max_buffer_size wins over the binding limit
        let tight = wgpu::Limits {
            max_buffer_size: 72 * 100 * 100,
            ..wgpu::Limits::default()
        };
        assert_eq!(max_resolution(&tight), 100);
    }

    #[test]
    fn test_dispatch_covers_every_blade() {
        for (visible, res) in [(1u32, 10u32), (5, 13), (33, 100)] {
            let [x, y, z] = dispatch_size(visible, res);
            assert!(x * WORKGROUP_SIZE[0] >= visible);
            assert!(y * WORKGROUP_SIZE[1] >= res);
            assert!(z * WORKGROUP_SIZE[2] >= res);
        }
    }
}
