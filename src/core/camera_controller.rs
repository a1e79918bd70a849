//! First-person fly camera for walking over the grass field

use crate::core::camera::Camera;
use crate::core::input::InputState;
use winit::keyboard::KeyCode;

/// FPS-style controller with WASD movement, mouse look and an optional
/// ground clamp so the camera never sinks into the terrain
pub struct FpsCameraController {
    /// Movement speed in units per second
    pub speed: f32,
    /// Mouse sensitivity
    pub sensitivity: f32,
    /// Sprint multiplier (left control)
    pub sprint_multiplier: f32,
    /// Minimum height kept above the ground sample
    pub eye_height: f32,
    yaw: f32,
    pitch: f32,
}

impl FpsCameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            speed,
            sensitivity,
            sprint_multiplier: 3.0,
            eye_height: 1.7,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Update camera from input. `ground` returns terrain height at a world XZ.
    pub fn update(
        &mut self,
        camera: &mut Camera,
        input: &InputState,
        dt: f32,
        ground: impl Fn(f32, f32) -> f32,
    ) {
        if input.is_mouse_captured() {
            let (dx, dy) = input.mouse_delta();
            self.yaw -= dx * self.sensitivity * 0.001;
            self.pitch -= dy * self.sensitivity * 0.001;
            self.pitch = self.pitch.clamp(-1.5, 1.5);
            camera.set_rotation_euler(self.yaw, self.pitch);
        }

        let direction = Self::wish_direction(camera, input);
        if direction.length_squared() > 0.0 {
            let mut speed = self.speed;
            if input.is_key_pressed(KeyCode::ControlLeft) {
                speed *= self.sprint_multiplier;
            }
            camera.position += direction.normalize() * speed * dt;
        }

        let floor = ground(camera.position.x, camera.position.z) + self.eye_height;
        if camera.position.y < floor {
            camera.position.y = floor;
        }
    }

    fn wish_direction(camera: &Camera, input: &InputState) -> glam::Vec3 {
        let mut v = glam::Vec3::ZERO;
        let forward = camera.forward();
        let right = camera.right();

        if input.is_key_pressed(KeyCode::KeyW) {
            v += forward;
        }
        if input.is_key_pressed(KeyCode::KeyS) {
            v -= forward;
        }
        if input.is_key_pressed(KeyCode::KeyA) {
            v -= right;
        }
        if input.is_key_pressed(KeyCode::KeyD) {
            v += right;
        }
        if input.is_key_pressed(KeyCode::Space) {
            v.y += 1.0;
        }
        if input.is_key_pressed(KeyCode::ShiftLeft) {
            v.y -= 1.0;
        }
        v
    }

    /// Set initial orientation from angles (in radians)
    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch.clamp(-1.5, 1.5);
    }
}

impl Default for FpsCameraController {
    fn default() -> Self {
        Self::new(10.0, 1.0)
    }
}
