//! Lookup textures read by the blade compute shader

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::grass::GrassSettings;
use crate::terrain::{Heightmap, LayerMask};
use super::{GpuTexture, upload_texture_2d};

/// Side length of the generated wind texture
pub const WIND_TEXTURE_SIZE: u32 = 256;

/// Tileable fBm noise for the wind texture, one byte per texel.
///
/// Sampled on a torus so the texture wraps without seams.
pub fn generate_wind_noise(size: u32, seed: u32) -> Vec<u8> {
    let fbm = Fbm::<Perlin>::new(seed)
        .set_octaves(4)
        .set_frequency(1.5)
        .set_persistence(0.5);

    let tau = std::f64::consts::TAU;
    let mut data = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let a = x as f64 / size as f64 * tau;
            let b = y as f64 / size as f64 * tau;
            let n = fbm.get([a.cos(), a.sin(), b.cos(), b.sin()]);
            let v = (n * 0.5 + 0.5).clamp(0.0, 1.0);
            data.push((v * 255.0).round() as u8);
        }
    }
    data
}

/// Linear sampler with the same address mode on every axis
pub fn linear_sampler_descriptor(label: &str, address_mode: wgpu::AddressMode) -> wgpu::SamplerDescriptor<'_> {
    wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    }
}

/// Every texture bound to the blade compute pass, plus its samplers
pub struct GrassTextures {
    /// Terrain heights, R32Float (read with `textureLoad`)
    pub height: GpuTexture,
    /// Grass placement mask, R8Unorm
    pub layer_mask: GpuTexture,
    /// Wind strength noise, R8Unorm
    pub wind: GpuTexture,
    /// Clump colour gradient, Rgba8Unorm
    pub gradient: GpuTexture,
    /// 1x1 stand-in for the clump map until the Voronoi pass provides one
    pub clump_placeholder: GpuTexture,
    /// Linear, repeating sampler for the tiling wind texture
    pub wrap_sampler: wgpu::Sampler,
    /// Linear, edge-clamped sampler for the layer mask and gradient
    pub clamp_sampler: wgpu::Sampler,
}

impl GrassTextures {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &GrassSettings,
        heightmap: Option<&Heightmap>,
        layer_mask: Option<&LayerMask>,
        wind: Option<&image::GrayImage>,
    ) -> Self {
        let height = match heightmap {
            Some(map) => upload_texture_2d(
                device, queue, "grass_height",
                map.width(), map.height(),
                wgpu::TextureFormat::R32Float,
                bytemuck::cast_slice(map.data()),
            ),
            None => upload_texture_2d(
                device, queue, "grass_height",
                1, 1,
                wgpu::TextureFormat::R32Float,
                bytemuck::bytes_of(&0.0f32),
            ),
        };

        let full = LayerMask::full();
        let mask = layer_mask.unwrap_or(&full);
        let layer_mask = upload_texture_2d(
            device, queue, "grass_layer_mask",
            mask.width, mask.height,
            wgpu::TextureFormat::R8Unorm,
            &mask.data,
        );

        let wind = match wind {
            Some(img) => upload_texture_2d(
                device, queue, "grass_wind",
                img.width(), img.height(),
                wgpu::TextureFormat::R8Unorm,
                img.as_raw(),
            ),
            None => {
                log::info!("No wind texture supplied, generating {}x{} noise", WIND_TEXTURE_SIZE, WIND_TEXTURE_SIZE);
                let data = generate_wind_noise(WIND_TEXTURE_SIZE, settings.clump_seed);
                upload_texture_2d(
                    device, queue, "grass_wind",
                    WIND_TEXTURE_SIZE, WIND_TEXTURE_SIZE,
                    wgpu::TextureFormat::R8Unorm,
                    &data,
                )
            }
        };

        let gradient = Self::upload_gradient(device, queue, settings);

        let clump_placeholder = upload_texture_2d(
            device, queue, "grass_clump_placeholder",
            1, 1,
            wgpu::TextureFormat::Rgba32Float,
            bytemuck::cast_slice(&[0.0f32, 0.5, 0.5, 1.0]),
        );

        let wrap_sampler = device.create_sampler(&linear_sampler_descriptor(
            "grass_wrap_sampler",
            wgpu::AddressMode::Repeat,
        ));
        // The mask covers the terrain once; wrapping would bleed the far edge in
        let clamp_sampler = device.create_sampler(&linear_sampler_descriptor(
            "grass_clamp_sampler",
            wgpu::AddressMode::ClampToEdge,
        ));

        Self {
            height,
            layer_mask,
            wind,
            gradient,
            clump_placeholder,
            wrap_sampler,
            clamp_sampler,
        }
    }

    fn upload_gradient(device: &wgpu::Device, queue: &wgpu::Queue, settings: &GrassSettings) -> GpuTexture {
        let (w, h) = (settings.gradient_map_width, settings.gradient_map_height);
        let pixels = settings.clump_gradient.bake(w, h);
        upload_texture_2d(
            device, queue, "grass_clump_gradient",
            w, h,
            wgpu::TextureFormat::Rgba8Unorm,
            bytemuck::cast_slice(&pixels),
        )
    }

    /// Re-bake the gradient map in place. Size changes need a rebuild.
    pub fn update_gradient(&self, queue: &wgpu::Queue, settings: &GrassSettings) {
        if self.gradient.width != settings.gradient_map_width
            || self.gradient.height != settings.gradient_map_height
        {
            log::warn!("Gradient map size changed, ignoring until rebuild");
            return;
        }
        let pixels = settings
            .clump_gradient
            .bake(settings.gradient_map_width, settings.gradient_map_height);
        self.gradient.write(queue, bytemuck::cast_slice(&pixels));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wind_noise_size_and_range() {
        let data = generate_wind_noise(32, 7);
        assert_eq!(data.len(), 32 * 32);
        // Not constant
        let min = *data.iter().min().unwrap();
        let max = *data.iter().max().unwrap();
        assert!(max > min);
    }

    #[test]
    fn test_sampler_address_modes() {
        let clamp = linear_sampler_descriptor("clamp", wgpu::AddressMode::ClampToEdge);
        assert_eq!(clamp.address_mode_u, wgpu::AddressMode::ClampToEdge);
        assert_eq!(clamp.address_mode_v, wgpu::AddressMode::ClampToEdge);
        assert_eq!(clamp.mag_filter, wgpu::FilterMode::Linear);

        let wrap = linear_sampler_descriptor("wrap", wgpu::AddressMode::Repeat);
        assert_eq!(wrap.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(wrap.address_mode_v, wgpu::AddressMode::Repeat);
    }

    #[test]
    fn test_wind_noise_deterministic() {
        assert_eq!(generate_wind_noise(16, 3), generate_wind_noise(16, 3));
    }
}
