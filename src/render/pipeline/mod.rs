//! Render pipelines

pub mod chunk_debug;
pub mod clump_voronoi;
pub mod grass;

pub use chunk_debug::{ChunkDebugPass, LineVertex, chunk_wire_lines};
pub use clump_voronoi::{ClumpTexture, ClumpVoronoiPass, build_clump_map};
pub use grass::{DrawIndirectArgs, GpuBlade, GrassPipeline, dispatch_size, max_resolution};
