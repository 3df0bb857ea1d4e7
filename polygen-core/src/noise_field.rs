use serde::{Deserialize, Serialize};

use crate::color::{finite_or, ColorStop, Palette, Rgb};
use crate::noise::{Perlin, DEFAULT_PERSISTENCE};

/// Octave noise sampled over the raster and mapped through a palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoiseFieldParams {
    /// Lattice cells spanned by the raster, 0.1 to 10.
    pub scale: f64,
    pub octaves: u32,
    /// Normalised values at or below this map to the first stop.
    pub threshold: f64,
    pub color_palette: Vec<ColorStop>,
    /// Permutation table seed. `None` uses the fixed table.
    pub seed: Option<u64>,
}

impl Default for NoiseFieldParams {
    fn default() -> Self {
        Self {
            scale: 4.0,
            octaves: 4,
            threshold: 0.0,
            color_palette: vec![
                ColorStop::new(Rgb::new(0x0a, 0x0a, 0x0a), 0.0),
                ColorStop::new(Rgb::new(0xa7, 0x8b, 0xfa), 50.0),
                ColorStop::new(Rgb::new(0xec, 0x48, 0x99), 100.0),
            ],
            seed: None,
        }
    }
}

impl NoiseFieldParams {
    pub fn sanitized(&self) -> Self {
        Self {
            scale: finite_or(self.scale, 4.0).clamp(0.1, 10.0),
            octaves: self.octaves.clamp(1, 8),
            threshold: finite_or(self.threshold, 0.0).clamp(0.0, 1.0),
            color_palette: if self.color_palette.is_empty() {
                Palette::grayscale().stops().to_vec()
            } else {
                self.color_palette.clone()
            },
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoiseFieldShader {
    params: NoiseFieldParams,
    palette: Palette,
    noise: Perlin,
    width: f64,
    height: f64,
}

impl NoiseFieldShader {
    pub fn new(params: &NoiseFieldParams, width: u32, height: u32) -> Self {
        let params = params.sanitized();
        Self {
            palette: Palette::new(&params.color_palette),
            noise: params.seed.map_or_else(Perlin::new, Perlin::with_seed),
            width: width.max(1) as f64,
            height: height.max(1) as f64,
            params,
        }
    }

    /// Palette ratio at `(x, y)`: noise normalised to `[0, 1]`, zeroed at or
    /// below the threshold.
    pub fn ratio(&self, x: u32, y: u32) -> f64 {
        let nx = x as f64 / self.width * self.params.scale;
        let ny = y as f64 / self.height * self.params.scale;
        let value = self
            .noise
            .octave_noise(nx, ny, self.params.octaves, DEFAULT_PERSISTENCE);
        let normalized = (value + 1.0) / 2.0;
        if normalized > self.params.threshold {
            normalized
        } else {
            0.0
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.palette.sample(self.ratio(x, y)).to_rgba(255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_zeroes_low_values() {
        let params = NoiseFieldParams {
            threshold: 0.5,
            ..NoiseFieldParams::default()
        };
        let shader = NoiseFieldShader::new(&params, 64, 64);
        for y in 0..64 {
            for x in 0..64 {
                let r = shader.ratio(x, y);
                assert!(r == 0.0 || r > 0.5);
            }
        }
    }

    #[test]
    fn origin_maps_to_mid_palette() {
        // Noise is zero on lattice points, which normalises to 0.5.
        let shader = NoiseFieldShader::new(&NoiseFieldParams::default(), 32, 32);
        assert_eq!(shader.ratio(0, 0), 0.5);
        assert_eq!(shader.pixel(0, 0), [0xa7, 0x8b, 0xfa, 255]);
    }

    #[test]
    fn seed_changes_output() {
        let a = NoiseFieldShader::new(&NoiseFieldParams::default(), 40, 40);
        let b = NoiseFieldShader::new(
            &NoiseFieldParams {
                seed: Some(99),
                ..NoiseFieldParams::default()
            },
            40,
            40,
        );
        assert!((0..40).any(|i| a.ratio(i, 7) != b.ratio(i, 7)));
    }
}
