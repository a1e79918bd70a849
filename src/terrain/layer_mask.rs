//! Grass placement mask built from terrain splat layers

use std::path::Path;

use rayon::prelude::*;

use crate::core::{Error, Result};

/// Per-texel blend weights for a set of named terrain layers.
///
/// Weights are stored interleaved: `weights[(y * width + x) * layers + l]`.
#[derive(Clone, Debug)]
pub struct SplatMap {
    width: u32,
    height: u32,
    layer_names: Vec<String>,
    weights: Vec<f32>,
}

impl SplatMap {
    pub fn new(width: u32, height: u32, layer_names: Vec<String>, weights: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize * layer_names.len();
        if weights.len() != expected {
            return Err(Error::Config(format!(
                "splat map {}x{} with {} layers expects {} weights, got {}",
                width, height, layer_names.len(), expected, weights.len()
            )));
        }
        Ok(Self { width, height, layer_names, weights })
    }

    /// Load an RGBA image where each channel is one layer's weight.
    /// `names` labels the channels in order; extra channels are ignored.
    pub fn from_rgba_image(path: impl AsRef<Path>, names: &[String]) -> Result<Self> {
        let layers = names.len().min(4);
        if layers == 0 {
            return Err(Error::Config("splat map needs at least one layer name".into()));
        }
        let img = image::open(path.as_ref())?.into_rgba8();
        let (width, height) = img.dimensions();
        let mut weights = Vec::with_capacity(width as usize * height as usize * layers);
        for pixel in img.pixels() {
            for channel in &pixel.0[..layers] {
                weights.push(*channel as f32 / 255.0);
            }
        }
        Self::new(width, height, names[..layers].to_vec(), weights)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layer_names(&self) -> &[String] {
        &self.layer_names
    }

    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layer_names.iter().position(|n| n == name)
    }

    pub fn weight(&self, x: u32, y: u32, layer: usize) -> f32 {
        let texel = y as usize * self.width as usize + x as usize;
        self.weights[texel * self.layer_names.len() + layer]
    }
}

/// Single-channel placement mask, 0 = no grass, 255 = full density
#[derive(Clone, Debug, PartialEq)]
pub struct LayerMask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl LayerMask {
    /// Mask that allows grass everywhere
    pub fn full() -> Self {
        Self { width: 1, height: 1, data: vec![255] }
    }
}

/// Combine the included layers' weights into a placement mask.
///
/// Returns `None` (and logs an error) when there is no splat map or nothing
/// to include. Layer names that don't exist on the terrain are skipped with a
/// warning.
pub fn generate_layer_mask(splat: Option<&SplatMap>, include: &[String]) -> Option<LayerMask> {
    let Some(splat) = splat else {
        log::error!("Layer mask: terrain has no splat map");
        return None;
    };
    if include.is_empty() {
        log::error!("Layer mask: no layers to include");
        return None;
    }

    let indices: Vec<usize> = include
        .iter()
        .filter_map(|name| {
            let index = splat.layer_index(name);
            if index.is_none() {
                log::warn!("Layer {} not found in terrain", name);
            }
            index
        })
        .collect();

    let width = splat.width;
    let mut data = vec![0u8; width as usize * splat.height as usize];
    if width > 0 {
        data.par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let total: f32 = indices
                        .iter()
                        .map(|&l| splat.weight(x as u32, y as u32, l))
                        .sum();
                    *out = (total.clamp(0.0, 1.0) * 255.0) as u8;
                }
            });
    }

    log::info!(
        "Layer mask {}x{} built from {}/{} included layers",
        width, splat.height, indices.len(), include.len()
    );
    Some(LayerMask { width, height: splat.height, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn two_layer_map() -> SplatMap {
        // 2x1 texels, layers [grass, rock]
        SplatMap::new(2, 1, names(&["grass", "rock"]), vec![
            0.5, 0.5, // texel 0
            1.0, 0.0, // texel 1
        ]).unwrap()
    }

    #[test]
    fn test_missing_inputs() {
        assert!(generate_layer_mask(None, &names(&["grass"])).is_none());
        assert!(generate_layer_mask(Some(&two_layer_map()), &[]).is_none());
    }

    #[test]
    fn test_single_layer() {
        let mask = generate_layer_mask(Some(&two_layer_map()), &names(&["grass"])).unwrap();
        assert_eq!(mask.data, vec![127, 255]);
    }

    #[test]
    fn test_sum_is_clamped() {
        let mask = generate_layer_mask(Some(&two_layer_map()), &names(&["grass", "rock"])).unwrap();
        assert_eq!(mask.data, vec![255, 255]);
    }

    #[test]
    fn test_unknown_layer_skipped() {
        let mask = generate_layer_mask(Some(&two_layer_map()), &names(&["sand", "rock"])).unwrap();
        assert_eq!(mask.data, vec![127, 0]);
    }

    #[test]
    fn test_weight_count_validated() {
        assert!(SplatMap::new(2, 2, names(&["a"]), vec![0.0; 3]).is_err());
    }
}
