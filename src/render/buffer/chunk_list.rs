//! GPU storage buffer for the visible-chunk list

use crate::grass::GpuChunk;

/// Storage buffer holding the chunks that survived culling this frame.
///
/// Reallocated to the exact list size on every non-empty upload. An empty
/// list leaves the previous buffer bound.
pub struct ChunkListBuffer {
    buffer: wgpu::Buffer,
    /// Chunks in the current buffer
    len: u32,
}

impl ChunkListBuffer {
    /// Create with a single zeroed chunk so there is always something to bind
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            buffer: Self::allocate(device, 1),
            len: 0,
        }
    }

    fn allocate(device: &wgpu::Device, count: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_visible_chunks"),
            size: (count.max(1) * std::mem::size_of::<GpuChunk>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Replace the buffer with one holding `chunks`.
    ///
    /// Returns true if a new buffer was created (bind groups must be
    /// rebuilt). Returns false for an empty list, leaving the old buffer.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, chunks: &[GpuChunk]) -> bool {
        if chunks.is_empty() {
            return false;
        }

        self.buffer.destroy();
        self.buffer = Self::allocate(device, chunks.len());
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(chunks));
        self.len = chunks.len() as u32;
        true
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Chunks in the last non-empty upload
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free the GPU memory now. The buffer must not be bound afterwards.
    pub fn destroy(&self) {
        self.buffer.destroy();
    }
}

impl Drop for ChunkListBuffer {
    fn drop(&mut self) {
        self.destroy();
    }
}
