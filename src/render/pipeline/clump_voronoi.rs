//! One-off render of the Voronoi clump map.
//!
//! Renders a fullscreen triangle into an `Rgba32Float` target, then copies
//! the result into a plain sampled texture for the blade compute pass. The
//! shader mirrors `grass::clump::clump_voronoi_cpu`, which stands in on
//! adapters that can't render to `Rgba32Float`.

use bytemuck::{Pod, Zeroable};

use crate::core::{Error, Result};
use crate::grass::clump_voronoi_cpu;
use crate::render::texture::upload_texture_2d;

const CLUMP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const BYTES_PER_TEXEL: u32 = 16;

/// Voronoi pass parameters. Must match `Params` in clump_voronoi.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ClumpVoronoiParams {
    pub width: u32,
    pub height: u32,
    pub num_clumps: u32,
    pub seed: u32,
}

/// Rows padded to wgpu's buffer copy alignment
fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_TEXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// The finished clump map
pub struct ClumpTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl ClumpTexture {
    /// Upload a map built on the CPU, one `[id, u, v, 1]` texel each
    pub fn from_texels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        texels: &[[f32; 4]],
    ) -> Self {
        let uploaded = upload_texture_2d(
            device, queue, "clump_map",
            width, height,
            CLUMP_FORMAT,
            bytemuck::cast_slice(texels),
        );
        Self {
            texture: uploaded.texture,
            view: uploaded.view,
            width,
            height,
        }
    }

    /// Copy the texture back to the CPU (blocks until the GPU is done)
    pub fn read_back(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Vec<[f32; 4]>> {
        let padded = padded_bytes_per_row(self.width);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("clump_readback"),
            size: padded as u64 * self.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("clump_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .map_err(|e| Error::Gpu(e.to_string()))?;
        rx.recv()
            .map_err(|e| Error::Gpu(e.to_string()))?
            .map_err(|e| Error::Gpu(e.to_string()))?;

        let row_bytes = (self.width * BYTES_PER_TEXEL) as usize;
        let mut texels = Vec::with_capacity((self.width * self.height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks_exact(padded as usize) {
                texels.extend(bytemuck::pod_collect_to_vec::<u8, [f32; 4]>(&row[..row_bytes]));
            }
        }
        staging.unmap();
        staging.destroy();
        Ok(texels)
    }
}

/// Render pipeline for the clump map
pub struct ClumpVoronoiPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl ClumpVoronoiPass {
    /// True when the adapter can render into the clump map format
    pub fn is_supported(adapter: &wgpu::Adapter) -> bool {
        adapter
            .get_texture_format_features(CLUMP_FORMAT)
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
    }

    /// The pass, or `None` (with a warning) when the adapter can't run it
    pub fn for_adapter(adapter: &wgpu::Adapter, device: &wgpu::Device) -> Option<Self> {
        if Self::is_supported(adapter) {
            Some(Self::new(device))
        } else {
            log::warn!("{:?} is not renderable on this adapter, clump maps will be built on the CPU", CLUMP_FORMAT);
            None
        }
    }

    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("clump_voronoi_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/clump_voronoi.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("clump_voronoi_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("clump_voronoi_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("clump_voronoi_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[], // Fullscreen triangle
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: CLUMP_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group_layout,
        }
    }

    /// Render a `width x height` clump map for `num_clumps` clump styles
    pub fn run(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        num_clumps: u32,
        seed: u32,
    ) -> ClumpTexture {
        let (width, height) = (width.max(1), height.max(1));
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("clump_voronoi_target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CLUMP_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("clump_map"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CLUMP_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let params = ClumpVoronoiParams {
            width,
            height,
            num_clumps: num_clumps.max(1),
            seed,
        };
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("clump_voronoi_params"),
            size: std::mem::size_of::<ClumpVoronoiParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("clump_voronoi_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("clump_voronoi_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clump_voronoi_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        encoder.copy_texture_to_texture(
            target.as_image_copy(),
            texture.as_image_copy(),
            size,
        );
        queue.submit(std::iter::once(encoder.finish()));

        log::info!("Clump map rendered: {}x{}, {} clumps, seed {}", width, height, params.num_clumps, seed);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        ClumpTexture {
            texture,
            view,
            width,
            height,
        }
    }
}

/// Clump map from `pass`, or from `clump_voronoi_cpu` when there is none
pub fn build_clump_map(
    pass: Option<&ClumpVoronoiPass>,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    num_clumps: u32,
    seed: u32,
) -> ClumpTexture {
    match pass {
        Some(pass) => pass.run(device, queue, width, height, num_clumps, seed),
        None => {
            let (width, height) = (width.max(1), height.max(1));
            let texels = clump_voronoi_cpu(width, height, num_clumps, seed);
            log::info!("Clump map built on the CPU: {}x{}, {} clumps, seed {}", width, height, num_clumps.max(1), seed);
            ClumpTexture::from_texels(device, queue, width, height, &texels)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::context::test_context;

    fn assert_texels_close(a: &[[f32; 4]], b: &[[f32; 4]]) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            for c in 0..4 {
                assert!((x[c] - y[c]).abs() < 1e-4, "texel {} channel {}: {} vs {}", i, c, x[c], y[c]);
            }
        }
    }

    #[test]
    fn test_gpu_map_matches_cpu_reference() {
        let Some(gpu) = test_context() else {
            eprintln!("No GPU adapter, skipping");
            return;
        };
        let Some(pass) = ClumpVoronoiPass::for_adapter(&gpu.adapter, &gpu.device) else {
            eprintln!("Rgba32Float not renderable, skipping");
            return;
        };

        let map = pass.run(&gpu.device, &gpu.queue, 48, 40, 3, 17);
        let texels = map.read_back(&gpu.device, &gpu.queue).unwrap();
        assert_texels_close(&texels, &clump_voronoi_cpu(48, 40, 3, 17));

        // Same inputs, same map
        let again = pass.run(&gpu.device, &gpu.queue, 48, 40, 3, 17);
        assert_eq!(again.read_back(&gpu.device, &gpu.queue).unwrap(), texels);
    }

    #[test]
    fn test_cpu_fallback_uploads_reference() {
        let Some(gpu) = test_context() else {
            eprintln!("No GPU adapter, skipping");
            return;
        };

        let map = build_clump_map(None, &gpu.device, &gpu.queue, 20, 12, 4, 9);
        assert_eq!((map.width, map.height), (20, 12));
        let texels = map.read_back(&gpu.device, &gpu.queue).unwrap();
        assert_eq!(texels, clump_voronoi_cpu(20, 12, 4, 9));
    }

    #[test]
    fn test_params_size() {
        assert_eq!(std::mem::size_of::<ClumpVoronoiParams>(), 16);
    }

    #[test]
    fn test_padded_rows() {
        assert_eq!(padded_bytes_per_row(16), 256);
        assert_eq!(padded_bytes_per_row(17), 512);
        assert_eq!(padded_bytes_per_row(512), 8192);
        assert_eq!(padded_bytes_per_row(1) % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
    }
}
