//! Keyboard and mouse state for the demo camera

use std::collections::HashSet;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Tracks held keys, per-frame key presses and raw mouse motion
pub struct InputState {
    held: HashSet<KeyCode>,
    just_pressed: HashSet<KeyCode>,
    /// Mouse delta reported to consumers this frame
    mouse_delta: (f32, f32),
    /// Raw motion accumulated since the last `end_frame`
    pending_motion: (f32, f32),
    mouse_captured: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
            just_pressed: HashSet::new(),
            mouse_delta: (0.0, 0.0),
            pending_motion: (0.0, 0.0),
            mouse_captured: false,
        }
    }

    /// Process a window event
    pub fn process_event(&mut self, event: &WindowEvent) {
        if let WindowEvent::KeyboardInput {
            event: KeyEvent {
                physical_key: PhysicalKey::Code(key_code),
                state,
                ..
            },
            ..
        } = event
        {
            match state {
                ElementState::Pressed => {
                    if self.held.insert(*key_code) {
                        self.just_pressed.insert(*key_code);
                    }
                }
                ElementState::Released => {
                    self.held.remove(key_code);
                }
            }
        }
    }

    /// Raw mouse motion from `DeviceEvent::MouseMotion`
    pub fn process_mouse_motion(&mut self, delta: (f64, f64)) {
        self.pending_motion.0 += delta.0 as f32;
        self.pending_motion.1 += delta.1 as f32;
    }

    /// Call at end of frame to reset per-frame state
    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.mouse_delta = if self.mouse_captured {
            self.pending_motion
        } else {
            (0.0, 0.0)
        };
        self.pending_motion = (0.0, 0.0);
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    pub fn set_mouse_captured(&mut self, captured: bool) {
        self.mouse_captured = captured;
        self.mouse_delta = (0.0, 0.0);
        self.pending_motion = (0.0, 0.0);
    }

    pub fn is_mouse_captured(&self) -> bool {
        self.mouse_captured
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press() {
        let mut input = InputState::new();
        assert!(!input.is_key_pressed(KeyCode::KeyG));

        input.held.insert(KeyCode::KeyG);
        input.just_pressed.insert(KeyCode::KeyG);
        assert!(input.is_key_pressed(KeyCode::KeyG));
        assert!(input.is_key_just_pressed(KeyCode::KeyG));

        input.end_frame();
        assert!(input.is_key_pressed(KeyCode::KeyG));
        assert!(!input.is_key_just_pressed(KeyCode::KeyG));
    }

    #[test]
    fn test_motion_only_when_captured() {
        let mut input = InputState::new();
        input.process_mouse_motion((4.0, 2.0));
        input.end_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));

        input.set_mouse_captured(true);
        input.process_mouse_motion((4.0, 2.0));
        input.end_frame();
        assert_eq!(input.mouse_delta(), (4.0, 2.0));
    }
}
