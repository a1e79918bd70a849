//! Frame timing

use std::time::{Duration, Instant};

/// Tracks frame delta and a once-per-second report tick
pub struct FrameTimer {
    start: Instant,
    last_frame: Instant,
    delta: Duration,
    frame_count: u64,
    report_timer: Instant,
    report_frames: u32,
    fps: f32,
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta: Duration::ZERO,
            frame_count: 0,
            report_timer: now,
            report_frames: 0,
            fps: 0.0,
        }
    }

    /// Call once per frame. Returns true when a new one-second FPS sample
    /// is available.
    pub fn tick(&mut self) -> bool {
        let now = Instant::now();
        self.delta = now - self.last_frame;
        self.last_frame = now;
        self.frame_count += 1;
        self.report_frames += 1;

        let elapsed = now - self.report_timer;
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.report_frames as f32 / elapsed.as_secs_f32();
            self.report_frames = 0;
            self.report_timer = now;
            return true;
        }
        false
    }

    /// Delta time in seconds
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Seconds since the timer was created (drives wind animation)
    pub fn elapsed_secs(&self) -> f32 {
        (self.last_frame - self.start).as_secs_f32()
    }

    /// FPS over the last full second
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
