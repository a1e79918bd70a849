//! Camera uniform for the chunk debug line pass

use bytemuck::{Pod, Zeroable};
use crate::core::camera::Camera;

/// Camera data for the debug pass (must match `Camera` in chunk_debug.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    /// View-projection matrix (64 bytes, offset 0)
    pub view_proj: [[f32; 4]; 4],
    /// Camera position in world space (12 bytes, offset 64)
    pub position: [f32; 3],
    /// Chunks past this distance are drawn dimmed (4 bytes, offset 76)
    pub cull_distance: f32,
}

impl CameraUniform {
    pub fn new(camera: &Camera, cull_distance: f32) -> Self {
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            position: camera.position.to_array(),
            cull_distance,
        }
    }
}

/// Uniform buffer and bind group (group 0) for [`CameraUniform`]
pub struct CameraBuffer {
    buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl CameraBuffer {
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("debug_camera_uniform"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("debug_camera_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("debug_camera_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            buffer,
            bind_group_layout,
            bind_group,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, camera: &Camera, cull_distance: f32) {
        let uniform = CameraUniform::new(camera, cull_distance);
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&uniform));
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}
