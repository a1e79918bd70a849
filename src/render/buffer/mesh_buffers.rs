//! Blade mesh attributes as storage buffers for vertex pulling

use wgpu::util::DeviceExt;

use crate::grass::GrassMesh;

/// Triangle indices and per-vertex attributes of the blade mesh.
///
/// The render shader reads these by `vertex_index`, so positions are padded
/// to `vec4` to match WGSL array stride.
pub struct MeshBuffers {
    pub triangles: wgpu::Buffer,
    pub positions: wgpu::Buffer,
    pub colors: wgpu::Buffer,
    pub uvs: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    pub fn new(device: &wgpu::Device, mesh: &GrassMesh) -> Self {
        let positions: Vec<[f32; 4]> = mesh.positions.iter().map(|p| p.extend(1.0).to_array()).collect();
        let uvs: Vec<[f32; 2]> = mesh.uvs.iter().map(|uv| uv.to_array()).collect();

        Self {
            triangles: storage_buffer(device, "grass_mesh_triangles", bytemuck::cast_slice(&mesh.indices)),
            positions: storage_buffer(device, "grass_mesh_positions", bytemuck::cast_slice(&positions)),
            colors: storage_buffer(device, "grass_mesh_colors", bytemuck::cast_slice(&mesh.colors)),
            uvs: storage_buffer(device, "grass_mesh_uvs", bytemuck::cast_slice(&uvs)),
            index_count: mesh.triangle_index_count(),
        }
    }

    /// Vertices drawn per blade
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Release the GPU memory now
    pub fn destroy(&self) {
        self.triangles.destroy();
        self.positions.destroy();
        self.colors.destroy();
        self.uvs.destroy();
    }
}

fn storage_buffer(device: &wgpu::Device, label: &str, contents: &[u8]) -> wgpu::Buffer {
    // Zero-sized storage bindings are invalid
    let fallback = [0u8; 16];
    let contents = if contents.is_empty() { &fallback[..] } else { contents };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::STORAGE,
    })
}
