//! Meadow - grass field demo
//!
//! Usage:
//!   cargo run --release -- [--settings <json>] [--heightmap <png>] [--splat <png>]
//!
//! Controls:
//!   WASD - Move camera (Space/Shift up/down, Ctrl sprint)
//!   Mouse - Look around (click to capture)
//!   G - Toggle chunk debug boxes
//!   R - Reload the settings file
//!   Escape - Release mouse / exit

use std::path::{Path, PathBuf};
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::KeyCode,
    window::{CursorGrabMode, Window, WindowId},
};

use meadow::core::{
    camera::Camera,
    camera_controller::FpsCameraController,
    input::InputState,
    logging,
    time::FrameTimer,
};
use meadow::grass::{GrassMesh, GrassSettings};
use meadow::render::{GpuContext, GrassRenderer};
use meadow::terrain::{Heightmap, SplatMap, Terrain, TerrainParams};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Terrain footprint (world units per side) and peak height
const TERRAIN_SIZE: f32 = 200.0;
const TERRAIN_HEIGHT: f32 = 12.0;
/// Texels per side of the generated heightmap when none is given
const GENERATED_HEIGHTMAP_RES: u32 = 256;
const DEMO_SEED: u32 = 12345;

/// Splat map channel names, in RGBA order
const SPLAT_LAYERS: [&str; 4] = ["grass", "dirt", "rock", "sand"];

const SKY_COLOR: wgpu::Color = wgpu::Color { r: 0.55, g: 0.72, b: 0.92, a: 1.0 };

/// Command line options
#[derive(Clone, Debug, Default)]
struct Args {
    settings: Option<PathBuf>,
    heightmap: Option<PathBuf>,
    splat: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self {
            settings: path_arg(&args, "--settings"),
            heightmap: path_arg(&args, "--heightmap"),
            splat: path_arg(&args, "--splat"),
        }
    }
}

fn path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

/// Settings from the file, or defaults when missing or unreadable
fn load_settings(path: Option<&Path>) -> GrassSettings {
    let Some(path) = path else {
        log::info!("No settings file given, using defaults");
        return GrassSettings::default();
    };
    match GrassSettings::load(path) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load settings {}: {}", path.display(), e);
            GrassSettings::default()
        }
    }
}

fn build_terrain(args: &Args) -> Terrain {
    let heightmap = match &args.heightmap {
        Some(path) => match Heightmap::from_image(path) {
            Ok(map) => map,
            Err(e) => {
                log::error!("Failed to load heightmap {}: {}", path.display(), e);
                Heightmap::procedural(DEMO_SEED, GENERATED_HEIGHTMAP_RES, TerrainParams::default())
            }
        },
        None => {
            log::info!("Generating {}x{} heightmap", GENERATED_HEIGHTMAP_RES, GENERATED_HEIGHTMAP_RES);
            Heightmap::procedural(DEMO_SEED, GENERATED_HEIGHTMAP_RES, TerrainParams::default())
        }
    };

    let mut terrain = Terrain::new(
        glam::Vec3::ZERO,
        glam::Vec3::new(TERRAIN_SIZE, TERRAIN_HEIGHT, TERRAIN_SIZE),
        Some(heightmap),
    );

    if let Some(path) = &args.splat {
        let names: Vec<String> = SPLAT_LAYERS.iter().map(|s| s.to_string()).collect();
        match SplatMap::from_rgba_image(path, &names) {
            Ok(splat) => terrain.splat = Some(splat),
            Err(e) => log::error!("Failed to load splat map {}: {}", path.display(), e),
        }
    }
    terrain
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

struct DemoState {
    camera: Camera,
    camera_controller: FpsCameraController,
    input: InputState,
    timer: FrameTimer,
    grass: GrassRenderer,
    depth_view: wgpu::TextureView,
}

impl DemoState {
    fn new(gpu: &GpuContext, settings: GrassSettings, terrain: Terrain) -> Self {
        let (width, height) = gpu.size();

        let start = glam::Vec3::new(0.0, terrain.height_at(0.0, 0.0) + 3.0, TERRAIN_SIZE * 0.25);
        let mut camera = Camera::new(start, 60.0, width.max(1) as f32 / height.max(1) as f32);
        camera.point_at(glam::Vec3::new(0.0, start.y - 2.0, 0.0), glam::Vec3::Y);

        let mut camera_controller = FpsCameraController::new(8.0, 1.0);
        let (yaw, pitch) = camera.euler_angles();
        camera_controller.set_orientation(yaw, pitch);

        let grass = GrassRenderer::new(
            gpu,
            settings,
            terrain,
            GrassMesh::blade(),
            gpu.format(),
            Some(DEPTH_FORMAT),
        );

        Self {
            camera,
            camera_controller,
            input: InputState::new(),
            timer: FrameTimer::new(),
            grass,
            depth_view: create_depth_view(&gpu.device, width, height),
        }
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.camera.set_aspect(width as f32, height as f32);
        self.depth_view = create_depth_view(device, width, height);
    }

    fn render(&mut self, gpu: &GpuContext) {
        let frame = match gpu.get_current_texture() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to get frame: {}", e);
                return;
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });

        let time = self.timer.elapsed_secs();
        self.grass.frame(&gpu.device, &gpu.queue, &mut encoder, &self.camera, time);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(SKY_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            self.grass.draw(&mut pass);
        }

        gpu.queue.submit([encoder.finish()]);
        frame.present();
    }
}

struct App {
    args: Args,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    state: Option<DemoState>,
    cursor_grabbed: bool,
}

impl App {
    fn new(args: Args) -> Self {
        Self {
            args,
            window: None,
            gpu: None,
            state: None,
            cursor_grabbed: false,
        }
    }

    fn toggle_cursor_grab(&mut self) {
        let Some(window) = &self.window else { return };
        let grab = !self.cursor_grabbed;
        let result = if grab {
            window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        } else {
            window.set_cursor_grab(CursorGrabMode::None)
        };
        match result {
            Ok(()) => {
                self.cursor_grabbed = grab;
                window.set_cursor_visible(!grab);
                if let Some(ref mut state) = self.state {
                    state.input.set_mouse_captured(grab);
                }
            }
            Err(e) => log::warn!("Cursor grab failed: {:?}", e),
        }
    }

    fn reload_settings(&mut self) {
        let Some(path) = self.args.settings.clone() else {
            log::warn!("No --settings file to reload");
            return;
        };
        let (Some(gpu), Some(state)) = (&self.gpu, &mut self.state) else { return };
        match GrassSettings::load(&path) {
            Ok(settings) => {
                log::info!("Reloaded {}", path.display());
                state.grass.apply_settings(&gpu.device, &gpu.queue, settings);
            }
            Err(e) => log::error!("Failed to reload settings {}: {}", path.display(), e),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let settings = load_settings(self.args.settings.as_deref());
        let terrain = build_terrain(&self.args);

        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title("Meadow")
                    .with_inner_size(PhysicalSize::new(1280, 720)),
            )
            .expect("Failed to create window");
        let window = Arc::new(window);
        self.window = Some(window.clone());

        let gpu = pollster::block_on(GpuContext::new(window))
            .expect("Failed to create GPU context");
        let state = DemoState::new(&gpu, settings, terrain);
        log::info!(
            "Grass ready: {} chunks, {} blades per chunk max",
            state.grass.stats().total,
            state.grass.settings().blade_capacity()
        );

        self.gpu = Some(gpu);
        self.state = Some(state);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let Some(ref mut state) = self.state {
            state.input.process_event(&event);
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let (Some(gpu), Some(state)) = (&mut self.gpu, &mut self.state) {
                    gpu.resize(size.width, size.height);
                    state.resize(&gpu.device, size.width, size.height);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if state.is_pressed() && button == winit::event::MouseButton::Left && !self.cursor_grabbed {
                    self.toggle_cursor_grab();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if !event.state.is_pressed() || event.repeat {
                    return;
                }
                let winit::keyboard::PhysicalKey::Code(code) = event.physical_key else { return };
                match code {
                    KeyCode::Escape => {
                        if self.cursor_grabbed {
                            self.toggle_cursor_grab();
                        } else {
                            event_loop.exit();
                        }
                    }
                    KeyCode::KeyG => {
                        if let Some(ref mut state) = self.state {
                            let enabled = state.grass.toggle_debug_draw();
                            log::info!("Chunk debug boxes: {}", if enabled { "on" } else { "off" });
                        }
                    }
                    KeyCode::KeyR => self.reload_settings(),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                let (Some(gpu), Some(state)) = (&self.gpu, &mut self.state) else { return };
                state.render(gpu);
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let Some(ref mut state) = self.state {
            if let DeviceEvent::MouseMotion { delta } = event {
                state.input.process_mouse_motion(delta);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let Some(ref mut state) = self.state else { return };

        if state.timer.tick() {
            let stats = state.grass.stats();
            log::info!(
                "{:.0} fps | chunks: {} total, {} full, {} partial, {} culled",
                state.timer.fps(),
                stats.total,
                stats.full,
                stats.partial,
                stats.culled
            );
        }

        let dt = state.timer.delta_secs().min(0.1);
        let grass = &state.grass;
        state.camera_controller.update(&mut state.camera, &state.input, dt, |x, z| {
            grass.system().terrain().height_at(x, z)
        });
        state.input.end_frame();

        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() {
    logging::init();
    log::info!("Meadow starting...");

    let args = Args::parse();
    let event_loop = EventLoop::new().expect("Failed to create event loop");
    let mut app = App::new(args);
    event_loop.run_app(&mut app).expect("Event loop error");
}
