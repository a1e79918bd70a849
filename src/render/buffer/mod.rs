//! GPU buffer management

use crate::core::{Error, Result};

pub mod camera_buffer;
pub mod chunk_list;
pub mod mesh_buffers;

pub use camera_buffer::{CameraBuffer, CameraUniform};
pub use chunk_list::ChunkListBuffer;
pub use mesh_buffers::MeshBuffers;

/// Copy `size` bytes of `source` into a staging buffer and map it.
///
/// Blocks until the GPU has finished. `source` needs `COPY_SRC`.
pub fn read_back_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    source: &wgpu::Buffer,
    size: u64,
) -> Result<Vec<u8>> {
    let size = size.min(source.size());
    if size == 0 {
        return Ok(Vec::new());
    }
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("buffer_readback"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("buffer_readback_encoder"),
    });
    encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
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

    let bytes = slice.get_mapped_range().to_vec();
    staging.unmap();
    staging.destroy();
    Ok(bytes)
}
