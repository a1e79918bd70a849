//! Wireframe boxes around every chunk, coloured by visibility tier

use bytemuck::{Pod, Zeroable};

use crate::grass::{GpuChunk, Visibility};

/// Vertices per chunk box (12 edges)
pub const VERTICES_PER_CHUNK: usize = 24;

/// Line vertex. Must match `VertexInput` in chunk_debug.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl LineVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Box colour for a visibility tier
pub fn tier_color(visibility: Visibility) -> [f32; 4] {
    match visibility {
        Visibility::Full => [0.0, 1.0, 0.0, 1.0],
        Visibility::Partial => [1.0, 0.0, 1.0, 1.0],
        Visibility::Culled => [0.5, 0.5, 0.5, 1.0],
    }
}

/// Line-list vertices for every chunk's bounding box
pub fn chunk_wire_lines(chunks: &[GpuChunk]) -> Vec<LineVertex> {
    let mut vertices = Vec::with_capacity(chunks.len() * VERTICES_PER_CHUNK);
    for chunk in chunks {
        let color = tier_color(chunk.visibility());
        let corners = chunk.bounds().corners();
        // Corner index bits are x=4, y=2, z=1; an edge joins corners one bit apart
        for i in 0..8usize {
            for bit in [1usize, 2, 4] {
                if i & bit == 0 {
                    vertices.push(LineVertex { position: corners[i].to_array(), color });
                    vertices.push(LineVertex { position: corners[i | bit].to_array(), color });
                }
            }
        }
    }
    vertices
}

/// Line pass drawing the chunk boxes
pub struct ChunkDebugPass {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    /// Vertices the buffer can hold
    capacity: usize,
    vertex_count: u32,
}

impl ChunkDebugPass {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("chunk_debug_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/chunk_debug.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("chunk_debug_pipeline_layout"),
            bind_group_layouts: &[camera_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("chunk_debug_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[LineVertex::layout()],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
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

        Self {
            pipeline,
            vertex_buffer: Self::allocate(device, VERTICES_PER_CHUNK),
            capacity: VERTICES_PER_CHUNK,
            vertex_count: 0,
        }
    }

    fn allocate(device: &wgpu::Device, vertices: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("chunk_debug_vertices"),
            size: (vertices.max(1) * std::mem::size_of::<LineVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Rebuild the line list from the current chunk tiers
    pub fn update(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, chunks: &[GpuChunk]) {
        let vertices = chunk_wire_lines(chunks);
        if vertices.len() > self.capacity {
            self.vertex_buffer.destroy();
            self.vertex_buffer = Self::allocate(device, vertices.len());
            self.capacity = vertices.len();
        }
        if !vertices.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
        }
        self.vertex_count = vertices.len() as u32;
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, camera_bind_group: &wgpu::BindGroup) {
        if self.vertex_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..self.vertex_count, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aabb;
    use glam::Vec3;

    fn chunk(id: u32, visibility: Visibility) -> GpuChunk {
        let mut c = GpuChunk::new(id, 10, Aabb::new(Vec3::ZERO, Vec3::ONE));
        c.set_visibility(visibility);
        c
    }

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<LineVertex>(), 28);
    }

    #[test]
    fn test_lines_per_chunk() {
        let chunks = [chunk(0, Visibility::Full), chunk(1, Visibility::Culled)];
        let lines = chunk_wire_lines(&chunks);
        assert_eq!(lines.len(), 2 * VERTICES_PER_CHUNK);
        assert!(chunk_wire_lines(&[]).is_empty());
    }

    #[test]
    fn test_edges_are_axis_aligned_unit_length() {
        let lines = chunk_wire_lines(&[chunk(0, Visibility::Partial)]);
        for pair in lines.chunks_exact(2) {
            let a = Vec3::from_array(pair[0].position);
            let b = Vec3::from_array(pair[1].position);
            assert!((a.distance(b) - 1.0).abs() < 1e-6);
            let diff = (a - b).abs();
            let axes = [diff.x, diff.y, diff.z].iter().filter(|&&d| d > 0.0).count();
            assert_eq!(axes, 1);
        }
    }

    #[test]
    fn test_tier_colors() {
        let lines = chunk_wire_lines(&[
            chunk(0, Visibility::Full),
            chunk(1, Visibility::Partial),
            chunk(2, Visibility::Culled),
        ]);
        assert_eq!(lines[0].color, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(lines[VERTICES_PER_CHUNK].color, [1.0, 0.0, 1.0, 1.0]);
        assert_eq!(lines[2 * VERTICES_PER_CHUNK].color, [0.5, 0.5, 0.5, 1.0]);
    }
}
