//! Camera for 3D rendering and visibility tests

use crate::core::types::{Vec3, Vec4, Mat4, Quat};

/// Camera with position, rotation, and projection parameters
#[derive(Clone, Debug)]
pub struct Camera {
    /// World position
    pub position: Vec3,
    /// Rotation as quaternion
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(position: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Create camera looking at a target
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let mut camera = Self::new(position, 60.0, 16.0 / 9.0);
        camera.point_at(target, up);
        camera
    }

    /// Re-orient the camera towards `target` without moving it
    pub fn point_at(&mut self, target: Vec3, up: Vec3) {
        let forward = (target - self.position).normalize();
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);
        self.rotation = Quat::from_mat3(&glam::Mat3::from_cols(right, up, -forward));
    }

    /// Get view matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        let rotation_matrix = Mat4::from_quat(self.rotation.conjugate());
        let translation_matrix = Mat4::from_translation(-self.position);
        rotation_matrix * translation_matrix
    }

    /// Get projection matrix (camera to clip space, depth 0..1)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Project a world point into normalized viewport space.
    ///
    /// `x`/`y` are 0..1 across the screen (origin bottom-left), `z` is the
    /// distance in front of the camera along its view axis. Points behind the
    /// camera get a negative `z`; their `x`/`y` are meaningless.
    pub fn world_to_viewport(&self, point: Vec3) -> Vec3 {
        let view_pos = self.view_matrix().transform_point3(point);
        let clip = self.projection_matrix() * Vec4::new(view_pos.x, view_pos.y, view_pos.z, 1.0);

        let depth = -view_pos.z;
        if clip.w.abs() <= f32::EPSILON {
            return Vec3::new(0.5, 0.5, depth);
        }

        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        Vec3::new(ndc_x * 0.5 + 0.5, ndc_y * 0.5 + 0.5, depth)
    }

    /// Get forward direction (negative Z in camera space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Get right direction (positive X in camera space)
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Get up direction (positive Y in camera space)
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Set rotation from euler angles (yaw, pitch in radians)
    pub fn set_rotation_euler(&mut self, yaw: f32, pitch: f32) {
        self.rotation = Quat::from_euler(glam::EulerRot::YXZ, yaw, pitch, 0.0);
    }

    /// Get rotation as euler angles (yaw, pitch in radians), inverse of
    /// [`Camera::set_rotation_euler`]
    pub fn euler_angles(&self) -> (f32, f32) {
        let (yaw, pitch, _roll) = self.rotation.to_euler(glam::EulerRot::YXZ);
        (yaw, pitch)
    }

    /// Update aspect ratio (call on window resize)
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.aspect = width / height;
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 5.0), 60.0, 16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directions() {
        let camera = Camera::default();

        // Default camera looks down -Z
        let forward = camera.forward();
        assert!((forward.z - (-1.0)).abs() < 0.001);

        let right = camera.right();
        assert!((right.x - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_viewport_center() {
        let camera = Camera::new(Vec3::ZERO, 60.0, 1.0);
        let p = camera.world_to_viewport(Vec3::new(0.0, 0.0, -10.0));
        assert!((p.x - 0.5).abs() < 1e-4);
        assert!((p.y - 0.5).abs() < 1e-4);
        assert!((p.z - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_viewport_behind_is_negative_depth() {
        let camera = Camera::new(Vec3::ZERO, 60.0, 1.0);
        let p = camera.world_to_viewport(Vec3::new(0.0, 0.0, 10.0));
        assert!(p.z < 0.0);
    }

    #[test]
    fn test_viewport_orientation() {
        let camera = Camera::new(Vec3::ZERO, 90.0, 1.0);
        // Up and to the right of the view axis lands in the upper-right quadrant
        let p = camera.world_to_viewport(Vec3::new(2.0, 2.0, -10.0));
        assert!(p.x > 0.5 && p.x < 1.0);
        assert!(p.y > 0.5 && p.y < 1.0);
        // Far outside the 90° cone on the left
        let outside = camera.world_to_viewport(Vec3::new(-50.0, 0.0, -10.0));
        assert!(outside.x < 0.0);
    }

    #[test]
    fn test_look_at_faces_target() {
        let camera = Camera::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::new(10.0, 10.0, 0.0), Vec3::Y);
        assert!((camera.forward() - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn test_euler_round_trip() {
        let mut camera = Camera::default();
        camera.set_rotation_euler(0.7, -0.3);
        let (yaw, pitch) = camera.euler_angles();
        assert!((yaw - 0.7).abs() < 1e-4);
        assert!((pitch + 0.3).abs() < 1e-4);
    }
}
