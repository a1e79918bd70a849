//! Bake the clump Voronoi map to a PNG
//!
//! Usage:
//!   cargo run --release --bin bake_clump_map -- [--settings <json>] [--output <png>]
//!
//! Red holds the clump id, green/blue the clump centre UV.

use std::path::PathBuf;

use meadow::core::logging;
use meadow::grass::GrassSettings;
use meadow::render::GpuContext;
use meadow::render::pipeline::{ClumpVoronoiPass, build_clump_map};

fn path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

fn main() -> meadow::core::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let settings = match path_arg(&args, "--settings") {
        Some(path) => GrassSettings::load(path)?,
        None => GrassSettings::default(),
    };
    let output = path_arg(&args, "--output").unwrap_or_else(|| PathBuf::from("clump_map.png"));

    let gpu = pollster::block_on(GpuContext::headless())?;
    let pass = ClumpVoronoiPass::for_adapter(&gpu.adapter, &gpu.device);
    let clump_map = build_clump_map(
        pass.as_ref(),
        &gpu.device,
        &gpu.queue,
        settings.clump_tex_width,
        settings.clump_tex_height,
        settings.clump_parameters.len() as u32,
        settings.clump_seed,
    );
    let texels = clump_map.read_back(&gpu.device, &gpu.queue)?;

    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let image = image::RgbaImage::from_fn(clump_map.width, clump_map.height, |x, y| {
        let t = texels[(y * clump_map.width + x) as usize];
        image::Rgba([to_byte(t[0]), to_byte(t[1]), to_byte(t[2]), to_byte(t[3])])
    });
    image.save(&output)?;

    log::info!(
        "Wrote {}x{} clump map ({} clumps, seed {}) to {}",
        clump_map.width,
        clump_map.height,
        settings.clump_parameters.len(),
        settings.clump_seed,
        output.display()
    );
    Ok(())
}
