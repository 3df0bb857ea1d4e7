use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use crate::color::{finite_or, Rgb};

/// Width of warped-grid lines, as a fraction of a cell.
const GRID_LINE: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpArtPattern {
    #[default]
    SineWave,
    WarpedGrid,
    Checkered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpArtParams {
    pub pattern: OpArtPattern,
    /// Band or cell count across the frame, 5 to 100.
    pub frequency: f64,
    /// Displacement in pixels, 5 to 100.
    pub amplitude: f64,
    pub color1: Rgb,
    pub color2: Rgb,
    pub color3: Rgb,
}

impl Default for OpArtParams {
    fn default() -> Self {
        Self {
            pattern: OpArtPattern::SineWave,
            frequency: 20.0,
            amplitude: 30.0,
            color1: Rgb::BLACK,
            color2: Rgb::WHITE,
            color3: Rgb::new(0xa7, 0x8b, 0xfa),
        }
    }
}

impl OpArtParams {
    pub fn sanitized(&self) -> Self {
        Self {
            frequency: finite_or(self.frequency, 20.0).clamp(5.0, 100.0),
            amplitude: finite_or(self.amplitude, 30.0).clamp(5.0, 100.0),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpArtShader {
    params: OpArtParams,
    width: f64,
    height: f64,
}

impl OpArtShader {
    pub fn new(params: &OpArtParams, width: u32, height: u32) -> Self {
        Self {
            params: params.sanitized(),
            width: width.max(1) as f64,
            height: height.max(1) as f64,
        }
    }

    pub fn color(&self, x: u32, y: u32) -> Rgb {
        let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
        match self.params.pattern {
            OpArtPattern::SineWave => self.sine_wave(px, py),
            OpArtPattern::WarpedGrid => self.warped_grid(px, py),
            OpArtPattern::Checkered => self.checkered(px, py),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.color(x, y).to_rgba(255)
    }

    /// Horizontal bands displaced by a sine of x. Every third band takes
    /// the accent colour.
    fn sine_wave(&self, px: f64, py: f64) -> Rgb {
        let p = &self.params;
        let wave = p.amplitude * (TAU * 3.0 * px / self.width).sin();
        let band = ((py + wave) / self.height * p.frequency).floor() as i64;
        match band.rem_euclid(3) {
            0 => p.color1,
            1 => p.color2,
            _ => p.color3,
        }
    }

    /// A checkerboard in coordinates bent by crossed sine waves, with
    /// accent-coloured grid lines.
    fn warped_grid(&self, px: f64, py: f64) -> Rgb {
        let p = &self.params;
        let u = px + p.amplitude * (TAU * 2.0 * py / self.height).sin();
        let v = py + p.amplitude * (TAU * 2.0 * px / self.width).sin();
        let cell = self.width.max(self.height) / p.frequency;
        let (cu, cv) = (u / cell, v / cell);
        if cu.rem_euclid(1.0) < GRID_LINE || cv.rem_euclid(1.0) < GRID_LINE {
            return p.color3;
        }
        checker(cu, cv, p.color1, p.color2)
    }

    /// A checkerboard pulled towards the centre by a radial bulge of
    /// `amplitude` pixels. Cells inside the bulge use the accent colour in
    /// place of the first colour.
    fn checkered(&self, px: f64, py: f64) -> Rgb {
        let p = &self.params;
        let (cx, cy) = (self.width / 2.0, self.height / 2.0);
        let (dx, dy) = (px - cx, py - cy);
        let r = dx.hypot(dy);
        let r_max = cx.hypot(cy).max(f64::EPSILON);
        let pull = if r > 0.0 {
            (r - p.amplitude * (PI * r / r_max).sin()).max(0.0) / r
        } else {
            1.0
        };
        let cell = self.width.max(self.height) / p.frequency;
        let (u, v) = ((cx + dx * pull) / cell, (cy + dy * pull) / cell);
        let first = if r < p.amplitude { p.color3 } else { p.color1 };
        checker(u, v, first, p.color2)
    }
}

fn checker(u: f64, v: f64, a: Rgb, b: Rgb) -> Rgb {
    if (u.floor() as i64 + v.floor() as i64).rem_euclid(2) == 0 {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shader(pattern: OpArtPattern) -> OpArtShader {
        OpArtShader::new(
            &OpArtParams {
                pattern,
                ..OpArtParams::default()
            },
            200,
            200,
        )
    }

    fn palette_of(s: &OpArtShader) -> Vec<Rgb> {
        let mut seen = Vec::new();
        for y in (0..200).step_by(3) {
            for x in (0..200).step_by(3) {
                let c = s.color(x, y);
                if !seen.contains(&c) {
                    seen.push(c);
                }
            }
        }
        seen
    }

    #[test]
    fn every_pattern_uses_all_three_colours() {
        for pattern in [
            OpArtPattern::SineWave,
            OpArtPattern::WarpedGrid,
            OpArtPattern::Checkered,
        ] {
            assert_eq!(palette_of(&shader(pattern)).len(), 3, "{pattern:?}");
        }
    }

    #[test]
    fn centre_of_checkered_is_accent() {
        let p = OpArtParams::default();
        let s = shader(OpArtPattern::Checkered);
        let c = s.color(100, 100);
        assert!(c == p.color3 || c == p.color2);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let p = OpArtParams {
            frequency: 1000.0,
            amplitude: f64::NAN,
            ..OpArtParams::default()
        }
        .sanitized();
        assert_eq!(p.frequency, 100.0);
        assert_eq!(p.amplitude, 30.0);
    }
}
