use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::color::{finite_or, ColorStop, Palette, Rgb};
use crate::noise::{Perlin, DEFAULT_PERSISTENCE};

/// Radial gradients reach their last stop at this fraction of the longer side.
const RADIAL_EXTENT: f64 = 0.7;

/// Peak per-channel shift applied by full-strength grain.
const NOISE_CHANNEL_SHIFT: f64 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GradientKind {
    #[default]
    Linear,
    Radial,
    Conic,
    RepeatingLinear,
    RepeatingRadial,
    RepeatingConic,
    Mesh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadialShape {
    #[default]
    Circle,
    Ellipse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseKind {
    #[default]
    Smooth,
    Harsh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradientState {
    #[serde(rename = "type")]
    pub kind: GradientKind,
    pub color_stops: Vec<ColorStop>,
    /// Degrees.
    pub angle: f64,
    /// Centre of radial and conic gradients, percent of width/height.
    pub center_x: f64,
    pub center_y: f64,
    pub shape: RadialShape,
    /// Horizontal to vertical radius ratio for elliptical gradients.
    pub shape_ratio: f64,
    pub mesh_grid: [[Rgb; 3]; 3],
    /// 0 blends the mesh fully, 100 gives near-hard cell edges.
    pub mesh_spread: f64,
    /// Period of repeating variants, in pixels (degrees for conic).
    pub repeat_size: f64,
    pub noise_enabled: bool,
    pub noise_amount: f64,
    pub noise_type: NoiseKind,
    pub conic_smooth_transition: bool,
}

impl Default for GradientState {
    fn default() -> Self {
        Self {
            kind: GradientKind::Linear,
            color_stops: vec![
                ColorStop::new(Rgb::new(0xa7, 0x8b, 0xfa), 0.0),
                ColorStop::new(Rgb::new(0xec, 0x48, 0x99), 100.0),
            ],
            angle: 135.0,
            center_x: 50.0,
            center_y: 50.0,
            shape: RadialShape::Circle,
            shape_ratio: 1.0,
            mesh_grid: [
                [Rgb::new(255, 0, 0), Rgb::new(0, 255, 0), Rgb::new(0, 0, 255)],
                [Rgb::new(255, 255, 0), Rgb::new(255, 0, 255), Rgb::new(0, 255, 255)],
                [Rgb::new(255, 136, 0), Rgb::new(0, 255, 136), Rgb::new(136, 0, 255)],
            ],
            mesh_spread: 50.0,
            repeat_size: 100.0,
            noise_enabled: false,
            noise_amount: 0.0,
            noise_type: NoiseKind::Smooth,
            conic_smooth_transition: true,
        }
    }
}

impl GradientState {
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        Self {
            color_stops: if self.color_stops.is_empty() {
                d.color_stops
            } else {
                self.color_stops.iter().map(|s| s.sanitized()).collect()
            },
            angle: finite_or(self.angle, d.angle).rem_euclid(360.0),
            center_x: finite_or(self.center_x, 50.0).clamp(0.0, 100.0),
            center_y: finite_or(self.center_y, 50.0).clamp(0.0, 100.0),
            shape_ratio: finite_or(self.shape_ratio, 1.0).clamp(0.1, 10.0),
            mesh_spread: finite_or(self.mesh_spread, 50.0).clamp(0.0, 100.0),
            repeat_size: finite_or(self.repeat_size, 100.0).clamp(1.0, 1000.0),
            noise_amount: finite_or(self.noise_amount, 0.0).clamp(0.0, 100.0),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// A named two-colour diagonal gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Template {
    pub name: &'static str,
    pub from: Rgb,
    pub to: Rgb,
}

pub const TEMPLATES: [Template; 6] = [
    Template { name: "Ocean", from: Rgb::new(0x0a, 0x1f, 0x2e), to: Rgb::new(0x16, 0xc7, 0x84) },
    Template { name: "Sunset", from: Rgb::new(0xff, 0x6b, 0x6b), to: Rgb::new(0xff, 0xd9, 0x3d) },
    Template { name: "Forest", from: Rgb::new(0x1a, 0x5f, 0x3e), to: Rgb::new(0x90, 0xee, 0x90) },
    Template { name: "Night", from: Rgb::new(0x1a, 0x1a, 0x2e), to: Rgb::new(0x16, 0x21, 0x3e) },
    Template { name: "Fire", from: Rgb::new(0x8b, 0x00, 0x00), to: Rgb::new(0xff, 0x45, 0x00) },
    Template { name: "Sky", from: Rgb::new(0x87, 0xce, 0xeb), to: Rgb::new(0xe0, 0xf6, 0xff) },
];

impl Template {
    /// Template by index, wrapping around.
    pub fn nth(index: usize) -> &'static Template {
        &TEMPLATES[index % TEMPLATES.len()]
    }

    pub fn gradient_state(&self) -> GradientState {
        GradientState {
            kind: GradientKind::Linear,
            color_stops: vec![ColorStop::new(self.from, 0.0), ColorStop::new(self.to, 100.0)],
            angle: 45.0,
            ..GradientState::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Shading
// ---------------------------------------------------------------------------

/// A gradient prepared for one raster size.
///
/// [`pixel`](Self::pixel) depends only on the coordinates, so rows can be
/// shaded in any order or split across threads.
#[derive(Debug, Clone)]
pub struct GradientShader {
    state: GradientState,
    palette: Palette,
    width: f64,
    height: f64,
    center: (f64, f64),
    axis_start: (f64, f64),
    axis: (f64, f64),
    noise: Perlin,
}

impl GradientShader {
    pub fn new(state: &GradientState, width: u32, height: u32) -> Self {
        let state = state.sanitized();
        let (w, h) = (width.max(1) as f64, height.max(1) as f64);
        let theta = state.angle.to_radians();
        let half = (theta.cos() * w / 2.0, theta.sin() * h / 2.0);
        Self {
            palette: Palette::new(&state.color_stops),
            width: w,
            height: h,
            center: (state.center_x / 100.0 * w, state.center_y / 100.0 * h),
            axis_start: (w / 2.0 - half.0, h / 2.0 - half.1),
            axis: (2.0 * half.0, 2.0 * half.1),
            noise: Perlin::new(),
            state,
        }
    }

    /// Opaque RGBA for pixel `(x, y)`: the stop alpha is composited over black.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
        let (rgb, alpha) = match self.state.kind {
            GradientKind::Mesh => (self.mesh(px, py), 1.0),
            _ => {
                let [r, g, b, a] = self.palette.sample_rgba(self.ratio(px, py));
                (Rgb::new(r, g, b), a as f64 / 255.0)
            }
        };
        let shift = self.grain(x, y);
        let channel = |c: u8| (c as f64 * alpha + shift).round().clamp(0.0, 255.0) as u8;
        [channel(rgb.r), channel(rgb.g), channel(rgb.b), 255]
    }

    /// Position along the gradient, in `[0, 1]`.
    pub fn ratio(&self, px: f64, py: f64) -> f64 {
        let s = &self.state;
        let t = match s.kind {
            GradientKind::Linear => self.linear_distance(px, py) / self.axis_length(),
            GradientKind::RepeatingLinear => {
                wrap(self.linear_distance(px, py), s.repeat_size)
            }
            GradientKind::Radial => self.radial_distance(px, py) / self.radial_extent(),
            GradientKind::RepeatingRadial => wrap(self.radial_distance(px, py), s.repeat_size),
            GradientKind::Conic => self.conic(self.conic_fraction(px, py)),
            GradientKind::RepeatingConic => {
                let degrees = self.conic_fraction(px, py) * 360.0;
                self.conic(wrap(degrees, s.repeat_size.min(360.0)))
            }
            GradientKind::Mesh => 0.0,
        };
        t.clamp(0.0, 1.0)
    }

    fn axis_length(&self) -> f64 {
        self.axis.0.hypot(self.axis.1).max(f64::EPSILON)
    }

    /// Signed distance along the axis from its start point, in pixels.
    fn linear_distance(&self, px: f64, py: f64) -> f64 {
        let (dx, dy) = (px - self.axis_start.0, py - self.axis_start.1);
        (dx * self.axis.0 + dy * self.axis.1) / self.axis_length()
    }

    fn radial_extent(&self) -> f64 {
        self.width.max(self.height) * RADIAL_EXTENT
    }

    fn radial_distance(&self, px: f64, py: f64) -> f64 {
        let dx = px - self.center.0;
        let mut dy = py - self.center.1;
        if self.state.shape == RadialShape::Ellipse {
            dy *= self.state.shape_ratio;
        }
        dx.hypot(dy)
    }

    /// Angle around the centre, starting at `angle`, as a fraction of a turn.
    fn conic_fraction(&self, px: f64, py: f64) -> f64 {
        let a = (py - self.center.1).atan2(px - self.center.0) - self.state.angle.to_radians();
        a.rem_euclid(TAU) / TAU
    }

    fn conic(&self, t: f64) -> f64 {
        if self.state.conic_smooth_transition {
            1.0 - (2.0 * t - 1.0).abs()
        } else {
            t
        }
    }

    fn mesh(&self, px: f64, py: f64) -> Rgb {
        let u = (px / self.width * 2.0).clamp(0.0, 2.0);
        let v = (py / self.height * 2.0).clamp(0.0, 2.0);
        let (i, j) = ((u as usize).min(1), (v as usize).min(1));
        let k = self.state.mesh_spread / 50.0;
        let fu = sharpen(u - i as f64, k);
        let fv = sharpen(v - j as f64, k);
        let g = &self.state.mesh_grid;
        let top = g[j][i].lerp(g[j][i + 1], fu);
        let bottom = g[j + 1][i].lerp(g[j + 1][i + 1], fu);
        top.lerp(bottom, fv)
    }

    /// Per-channel offset from the optional grain layer.
    fn grain(&self, x: u32, y: u32) -> f64 {
        if !self.state.noise_enabled || self.state.noise_amount <= 0.0 {
            return 0.0;
        }
        let n = match self.state.noise_type {
            NoiseKind::Smooth => self.noise.octave_noise(
                x as f64 / self.width * 8.0,
                y as f64 / self.height * 8.0,
                4,
                DEFAULT_PERSISTENCE,
            ),
            NoiseKind::Harsh => hash_noise(x, y),
        };
        n * self.state.noise_amount / 100.0 * NOISE_CHANNEL_SHIFT
    }
}

/// `value mod period`, as a fraction of the period.
fn wrap(value: f64, period: f64) -> f64 {
    value.rem_euclid(period) / period
}

/// Symmetric contrast curve: `k = 1` is the identity, `k → 0` flattens to
/// 0.5, large `k` approaches a step.
fn sharpen(t: f64, k: f64) -> f64 {
    if k <= 0.0 {
        return 0.5;
    }
    let a = t.powf(k);
    let b = (1.0 - t).powf(k);
    if a + b == 0.0 {
        t
    } else {
        a / (a + b)
    }
}

/// Per-pixel white noise in `[-1, 1]` from an integer hash.
fn hash_noise(x: u32, y: u32) -> f64 {
    let mut h = x.wrapping_mul(0x27d4_eb2d) ^ y.wrapping_mul(0x1656_67b1);
    h ^= h >> 15;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h as f64 / u32::MAX as f64 * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(px: [u8; 4]) -> Rgb {
        Rgb::new(px[0], px[1], px[2])
    }

    fn black_white(kind: GradientKind) -> GradientState {
        GradientState {
            kind,
            color_stops: vec![
                ColorStop::new(Rgb::BLACK, 0.0),
                ColorStop::new(Rgb::WHITE, 100.0),
            ],
            angle: 0.0,
            ..GradientState::default()
        }
    }

    #[test]
    fn horizontal_linear_runs_left_to_right() {
        let shader = GradientShader::new(&black_white(GradientKind::Linear), 100, 10);
        assert!(shader.ratio(0.0, 5.0) < 1e-12);
        assert!((shader.ratio(100.0, 5.0) - 1.0).abs() < 1e-12);
        assert!((shader.ratio(50.0, 5.0) - 0.5).abs() < 1e-12);
        let left = rgb(shader.pixel(0, 5));
        let right = rgb(shader.pixel(99, 5));
        assert!(left.r < 5 && right.r > 250);
    }

    #[test]
    fn radial_reaches_last_stop_at_extent() {
        let shader = GradientShader::new(&black_white(GradientKind::Radial), 100, 100);
        assert_eq!(shader.ratio(50.0, 50.0), 0.0);
        assert!((shader.ratio(50.0 + 70.0, 50.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ellipse_stretches_vertically() {
        let state = GradientState {
            shape: RadialShape::Ellipse,
            shape_ratio: 2.0,
            ..black_white(GradientKind::Radial)
        };
        let shader = GradientShader::new(&state, 100, 100);
        assert!((shader.ratio(50.0, 60.0) - shader.ratio(70.0, 50.0)).abs() < 1e-12);
    }

    #[test]
    fn smooth_conic_has_no_seam() {
        let shader = GradientShader::new(&black_white(GradientKind::Conic), 100, 100);
        let above = shader.ratio(90.0, 49.9);
        let below = shader.ratio(90.0, 50.1);
        assert!((above - below).abs() < 0.01);

        let hard = GradientState {
            conic_smooth_transition: false,
            ..black_white(GradientKind::Conic)
        };
        let shader = GradientShader::new(&hard, 100, 100);
        assert!((shader.ratio(90.0, 49.9) - shader.ratio(90.0, 50.1)).abs() > 0.9);
    }

    #[test]
    fn repeating_linear_wraps() {
        let state = GradientState {
            repeat_size: 20.0,
            ..black_white(GradientKind::RepeatingLinear)
        };
        let shader = GradientShader::new(&state, 100, 10);
        assert!((shader.ratio(10.0, 5.0) - 0.5).abs() < 1e-9);
        assert!((shader.ratio(30.0, 5.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn mesh_corners_match_grid() {
        let state = GradientState {
            kind: GradientKind::Mesh,
            ..GradientState::default()
        };
        let shader = GradientShader::new(&state, 200, 200);
        assert_eq!(shader.mesh(0.0, 0.0), state.mesh_grid[0][0]);
        assert_eq!(shader.mesh(200.0, 200.0), state.mesh_grid[2][2]);
        assert_eq!(shader.mesh(100.0, 100.0), state.mesh_grid[1][1]);
    }

    #[test]
    fn stop_alpha_darkens_over_black() {
        let state = GradientState {
            color_stops: vec![
                ColorStop::new(Rgb::WHITE, 0.0).with_alpha(0.5),
                ColorStop::new(Rgb::WHITE, 100.0).with_alpha(0.5),
            ],
            ..black_white(GradientKind::Linear)
        };
        let px = GradientShader::new(&state, 10, 10).pixel(3, 3);
        assert_eq!(px[3], 255);
        assert!((127..=129).contains(&px[0]));
    }

    #[test]
    fn grain_is_deterministic_and_bounded() {
        let state = GradientState {
            noise_enabled: true,
            noise_amount: 100.0,
            noise_type: NoiseKind::Harsh,
            ..GradientState::default()
        };
        let a = GradientShader::new(&state, 50, 50);
        let b = GradientShader::new(&state, 50, 50);
        for y in 0..50 {
            for x in 0..50 {
                assert_eq!(a.pixel(x, y), b.pixel(x, y));
                assert!(a.grain(x, y).abs() <= NOISE_CHANNEL_SHIFT);
            }
        }
    }

    #[test]
    fn templates_are_two_stop_linear() {
        assert_eq!(TEMPLATES.len(), 6);
        let night = Template::nth(3).gradient_state();
        assert_eq!(night.kind, GradientKind::Linear);
        assert_eq!(night.color_stops.len(), 2);
        assert_eq!(night.color_stops[0].color.to_hex(), "#1a1a2e");
        assert_eq!(Template::nth(6).name, "Ocean");
    }
}
