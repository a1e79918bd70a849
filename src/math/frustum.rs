//! View frustum for chunk culling

use crate::core::types::{Vec3, Vec4, Mat4};
use super::aabb::Aabb;

/// A plane in Hessian normal form (positive side = inside)
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    fn from_row(row: Vec4) -> Self {
        let normal = row.truncate();
        let len = normal.length();
        if len <= f32::EPSILON {
            return Self::new(Vec3::ZERO, row.w);
        }
        Self::new(normal / len, row.w / len)
    }
}

/// View frustum with 6 planes (left, right, bottom, top, near, far)
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix (Gribb/Hartmann).
    ///
    /// Assumes wgpu clip space: depth runs 0..1, so the near plane is row2
    /// on its own rather than row3 + row2.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let r0 = vp.row(0);
        let r1 = vp.row(1);
        let r2 = vp.row(2);
        let r3 = vp.row(3);

        Self {
            planes: [
                Plane::from_row(r3 + r0), // left
                Plane::from_row(r3 - r0), // right
                Plane::from_row(r3 + r1), // bottom
                Plane::from_row(r3 - r1), // top
                Plane::from_row(r2),      // near
                Plane::from_row(r3 - r2), // far
            ],
        }
    }

    /// Check if point is inside frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| p.distance_to_point(point) >= 0.0)
    }

    /// Conservative AABB test: false only when the box is fully outside one plane
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            // Corner furthest along the plane normal (p-vertex)
            let p = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_neg_z() -> Frustum {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&proj)
    }

    #[test]
    fn test_plane_distance() {
        let plane = Plane::new(Vec3::Y, 0.0);
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, 5.0, 0.0)), 5.0);
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, -3.0, 0.0)), -3.0);
    }

    #[test]
    fn test_planes_normalized() {
        let frustum = looking_down_neg_z();
        for plane in &frustum.planes {
            assert!((plane.normal.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_contains_point() {
        let frustum = looking_down_neg_z();
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -0.05)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -150.0)));
    }

    #[test]
    fn test_aabb_in_front() {
        let frustum = looking_down_neg_z();
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -10.0), Vec3::new(1.0, 1.0, -5.0));
        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_aabb_behind() {
        let frustum = looking_down_neg_z();
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 10.0));
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_aabb_far_left() {
        let frustum = looking_down_neg_z();
        let aabb = Aabb::new(Vec3::new(-1000.0, -1.0, -10.0), Vec3::new(-999.0, 1.0, -5.0));
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_aabb_beyond_far_plane() {
        let frustum = looking_down_neg_z();
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -200.0), Vec3::new(1.0, 1.0, -150.0));
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_aabb_straddling_edge() {
        let frustum = looking_down_neg_z();
        // Half in, half out on the right side
        let aabb = Aabb::new(Vec3::new(0.0, -1.0, -12.0), Vec3::new(30.0, 1.0, -8.0));
        assert!(frustum.intersects_aabb(&aabb));
    }
}
