//! GPU context management using wgpu

use std::sync::Arc;
use winit::window::Window;
use crate::core::error::Error;

/// Storage buffers the grass pipeline binds in one stage (compute group 0)
const REQUIRED_STORAGE_BUFFERS: u32 = 8;

/// Colour format used when there is no surface to ask
const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// GPU rendering context.
///
/// Window-backed contexts own a configured surface; headless ones (tools,
/// offscreen bakes) don't.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: Option<wgpu::Surface<'static>>,
    pub config: Option<wgpu::SurfaceConfiguration>,
}

impl GpuContext {
    /// Create new GPU context from window
    pub async fn new(window: Arc<Window>) -> Result<Self, Error> {
        let instance = wgpu::Instance::new(&instance_descriptor());

        let surface = instance.create_surface(window.clone())
            .map_err(|e| Error::Gpu(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::Gpu(format!("No suitable adapter found: {:?}", e)))?;

        let (device, queue) = request_device(&adapter).await?;

        let size = window.inner_size();
        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or_else(|| Error::Gpu("Surface reports no formats".into()))?;
        let alpha_mode = capabilities
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface: Some(surface),
            config: Some(config),
        })
    }

    /// Create a context with no surface
    pub async fn headless() -> Result<Self, Error> {
        let instance = wgpu::Instance::new(&instance_descriptor());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::Gpu(format!("No suitable adapter found: {:?}", e)))?;

        let (device, queue) = request_device(&adapter).await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface: None,
            config: None,
        })
    }

    /// Resize the surface
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let (Some(surface), Some(config)) = (&self.surface, &mut self.config) {
            config.width = width;
            config.height = height;
            surface.configure(&self.device, config);
        }
    }

    /// Get current surface texture for rendering
    pub fn get_current_texture(&self) -> Result<wgpu::SurfaceTexture, Error> {
        let surface = self
            .surface
            .as_ref()
            .ok_or_else(|| Error::Gpu("Headless context has no surface".into()))?;
        surface
            .get_current_texture()
            .map_err(|e| Error::Gpu(e.to_string()))
    }

    /// Get surface size (0x0 when headless)
    pub fn size(&self) -> (u32, u32) {
        self.config
            .as_ref()
            .map(|c| (c.width, c.height))
            .unwrap_or((0, 0))
    }

    /// Get surface format
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config
            .as_ref()
            .map(|c| c.format)
            .unwrap_or(HEADLESS_FORMAT)
    }
}

fn instance_descriptor() -> wgpu::InstanceDescriptor {
    wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), Error> {
    let adapter_limits = adapter.limits();
    if adapter_limits.max_storage_buffers_per_shader_stage < REQUIRED_STORAGE_BUFFERS {
        return Err(Error::Gpu(format!(
            "Adapter supports {} storage buffers per stage, grass needs {}",
            adapter_limits.max_storage_buffers_per_shader_stage, REQUIRED_STORAGE_BUFFERS
        )));
    }

    let device_desc = wgpu::DeviceDescriptor {
        label: Some("meadow_device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits {
            max_storage_buffers_per_shader_stage: REQUIRED_STORAGE_BUFFERS,
            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..Default::default()
        },
        memory_hints: wgpu::MemoryHints::Performance,
        experimental_features: Default::default(),
        trace: Default::default(),
    };

    let (device, queue) = adapter
        .request_device(&device_desc)
        .await
        .map_err(|e| Error::Gpu(e.to_string()))?;

    let info = adapter.get_info();
    log::info!("GPU: {} ({:?})", info.name, info.backend);
    log::info!("GPU buffer limits: max_buffer_size={}MB, max_storage_binding={}MB",
        adapter_limits.max_buffer_size / 1024 / 1024,
        adapter_limits.max_storage_buffer_binding_size / 1024 / 1024);

    Ok((device, queue))
}

/// Device for GPU tests on any backend. `None` when the machine has no
/// adapter able to run the grass passes, so callers can skip.
#[cfg(test)]
pub(crate) fn test_context() -> Option<GpuContext> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        force_fallback_adapter: false,
        compatible_surface: None,
    }))
    .ok()?;

    let downlevel = adapter.get_downlevel_capabilities().flags;
    if !downlevel.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS | wgpu::DownlevelFlags::VERTEX_STORAGE) {
        return None;
    }

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("test_device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits {
            max_storage_buffers_per_shader_stage: REQUIRED_STORAGE_BUFFERS,
            ..wgpu::Limits::downlevel_defaults()
        },
        memory_hints: wgpu::MemoryHints::default(),
        experimental_features: Default::default(),
        trace: Default::default(),
    }))
    .ok()?;

    Some(GpuContext {
        instance,
        adapter,
        device,
        queue,
        surface: None,
        config: None,
    })
}
