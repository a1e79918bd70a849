//! Per-frame chunk visibility: frustum tiers plus distance culling

use glam::Vec3;

use crate::core::camera::Camera;
use crate::math::{Aabb, Frustum};
use super::chunk::{GpuChunk, Visibility};

/// Chunk counts per tier from the last cull
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CullStats {
    pub total: u32,
    pub culled: u32,
    pub partial: u32,
    pub full: u32,
}

impl CullStats {
    pub fn visible(&self) -> u32 {
        self.partial + self.full
    }
}

/// Classify a box against the camera.
///
/// A camera inside the box always counts as partially visible, since its
/// corners straddle the near plane. Otherwise the box must pass the frustum
/// test, and is fully visible only if every corner projects into the unit
/// viewport in front of the camera.
pub fn classify(aabb: &Aabb, camera: &Camera, frustum: &Frustum) -> Visibility {
    if aabb.contains_point(camera.position) {
        return Visibility::Partial;
    }
    if !frustum.intersects_aabb(aabb) {
        return Visibility::Culled;
    }

    let all_inside = aabb.corners().iter().all(|&corner| {
        let p = camera.world_to_viewport(corner);
        (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y) && p.z >= 0.0
    });
    if all_inside {
        Visibility::Full
    } else {
        Visibility::Partial
    }
}

/// Owns the chunk grid and rebuilds the visible list every frame.
///
/// Re-uses the visible list allocation across frames.
pub struct ChunkCuller {
    chunks: Vec<GpuChunk>,
    visible: Vec<GpuChunk>,
    stats: CullStats,
}

impl ChunkCuller {
    pub fn new(chunks: Vec<GpuChunk>) -> Self {
        let cap = chunks.len();
        Self {
            chunks,
            visible: Vec::with_capacity(cap),
            stats: CullStats::default(),
        }
    }

    /// Classify every chunk and collect the visible ones in chunk order.
    ///
    /// Chunks whose centre is `cull_distance` or further from the camera are
    /// culled regardless of their frustum tier.
    pub fn cull(&mut self, camera: &Camera, cull_distance: f32) -> &[GpuChunk] {
        let frustum = Frustum::from_view_projection(&camera.view_projection());
        let mut stats = CullStats {
            total: self.chunks.len() as u32,
            ..Default::default()
        };

        self.visible.clear();
        for chunk in &mut self.chunks {
            let bounds = chunk.bounds();
            let mut tier = classify(&bounds, camera, &frustum);
            if distance_to(&bounds, camera.position) >= cull_distance {
                tier = Visibility::Culled;
            }
            chunk.set_visibility(tier);

            match tier {
                Visibility::Culled => stats.culled += 1,
                Visibility::Partial => stats.partial += 1,
                Visibility::Full => stats.full += 1,
            }
            if tier != Visibility::Culled {
                self.visible.push(*chunk);
            }
        }

        self.stats = stats;
        log::trace!(
            "Chunk cull: {}/{} visible ({} full, {} partial)",
            stats.visible(), stats.total, stats.full, stats.partial
        );
        &self.visible
    }

    /// All chunks with the tiers from the last cull
    pub fn chunks(&self) -> &[GpuChunk] {
        &self.chunks
    }

    /// Visible chunks from the last cull
    pub fn visible(&self) -> &[GpuChunk] {
        &self.visible
    }

    pub fn stats(&self) -> CullStats {
        self.stats
    }

    pub fn total_chunks(&self) -> u32 {
        self.chunks.len() as u32
    }
}

fn distance_to(bounds: &Aabb, point: Vec3) -> f32 {
    bounds.center().distance(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Camera at origin looking down -Z with a square viewport
    fn camera() -> Camera {
        Camera::new(Vec3::ZERO, 60.0, 1.0)
    }

    fn frustum(camera: &Camera) -> Frustum {
        Frustum::from_view_projection(&camera.view_projection())
    }

    fn chunk(id: u32, min: Vec3, max: Vec3) -> GpuChunk {
        GpuChunk::new(id, 10, Aabb::new(min, max))
    }

    #[test]
    fn test_small_box_ahead_is_full() {
        let cam = camera();
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -21.0), Vec3::new(1.0, 1.0, -19.0));
        assert_eq!(classify(&aabb, &cam, &frustum(&cam)), Visibility::Full);
    }

    #[test]
    fn test_box_across_edge_is_partial() {
        let cam = camera();
        let aabb = Aabb::new(Vec3::new(0.0, -1.0, -12.0), Vec3::new(30.0, 1.0, -8.0));
        assert_eq!(classify(&aabb, &cam, &frustum(&cam)), Visibility::Partial);
    }

    #[test]
    fn test_box_behind_is_culled() {
        let cam = camera();
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 10.0));
        assert_eq!(classify(&aabb, &cam, &frustum(&cam)), Visibility::Culled);
    }

    #[test]
    fn test_camera_inside_is_at_least_partial() {
        let mut cam = camera();
        let aabb = Aabb::new(Vec3::splat(-5.0), Vec3::splat(5.0));
        // Whatever the camera looks at
        for yaw in [0.0f32, 1.5, 3.1, -2.0] {
            cam.set_rotation_euler(yaw, -0.3);
            assert!(classify(&aabb, &cam, &frustum(&cam)) >= Visibility::Partial);
        }
    }

    #[test]
    fn test_distance_forces_culled() {
        let cam = camera();
        let mut culler = ChunkCuller::new(vec![
            chunk(0, Vec3::new(-1.0, -1.0, -21.0), Vec3::new(1.0, 1.0, -19.0)),
        ]);

        assert_eq!(culler.cull(&cam, 100.0).len(), 1);
        assert_eq!(culler.chunks()[0].visibility(), Visibility::Full);

        assert!(culler.cull(&cam, 15.0).is_empty());
        assert_eq!(culler.chunks()[0].visibility(), Visibility::Culled);

        // Boundary counts as culled
        assert!(culler.cull(&cam, 20.0).is_empty());
    }

    #[test]
    fn test_distance_culls_camera_inside() {
        let cam = camera();
        let mut culler = ChunkCuller::new(vec![
            chunk(0, Vec3::new(-5.0, -5.0, -105.0), Vec3::new(5.0, 5.0, 5.0)),
        ]);
        // Centre is 50 away even though the camera is inside
        assert!(culler.cull(&cam, 40.0).is_empty());
    }

    #[test]
    fn test_visible_order_preserved() {
        let cam = camera();
        let ahead = |z: f32| (Vec3::new(-1.0, -1.0, z - 1.0), Vec3::new(1.0, 1.0, z + 1.0));
        let behind = (Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 7.0));

        let mut chunks = Vec::new();
        for i in 0..8u32 {
            // Far ones first so a distance sort would reorder them
            let (min, max) = if i % 3 == 1 { behind } else { ahead(-40.0 + i as f32 * 4.0) };
            chunks.push(chunk(i, min, max));
        }
        let mut culler = ChunkCuller::new(chunks);
        let ids: Vec<u32> = culler.cull(&cam, 1000.0).iter().map(|c| c.chunk_id).collect();
        assert_eq!(ids, vec![0, 2, 3, 5, 6]);
    }

    #[test]
    fn test_stats() {
        let cam = camera();
        let mut culler = ChunkCuller::new(vec![
            chunk(0, Vec3::new(-1.0, -1.0, -21.0), Vec3::new(1.0, 1.0, -19.0)),
            chunk(1, Vec3::new(0.0, -1.0, -12.0), Vec3::new(30.0, 1.0, -8.0)),
            chunk(2, Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 10.0)),
        ]);
        culler.cull(&cam, 1000.0);
        let stats = culler.stats();
        assert_eq!(stats, CullStats { total: 3, culled: 1, partial: 1, full: 1 });
        assert_eq!(stats.visible(), 2);
        assert_eq!(culler.visible().len(), 2);
    }

    #[test]
    fn test_empty_culler() {
        let mut culler = ChunkCuller::new(Vec::new());
        assert!(culler.cull(&camera(), 100.0).is_empty());
        assert_eq!(culler.stats().total, 0);
    }
}
