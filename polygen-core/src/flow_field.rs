use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::color::{finite_or, Rgb};
use crate::mode::{resolve_seed, Point};
use crate::noise::Perlin;

/// One traced particle trajectory, in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPath {
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowFieldParams {
    /// Particles to trace, 100 to 10,000.
    pub particle_count: u32,
    pub noise_scale: f64,
    /// Maximum one-pixel steps per particle.
    pub step_length: u32,
    pub line_weight: f64,
    pub opacity: f64,
    pub color: Rgb,
    pub background: Rgb,
    pub seed: Option<u64>,
}

impl Default for FlowFieldParams {
    fn default() -> Self {
        Self {
            particle_count: 1000,
            noise_scale: 0.01,
            step_length: 100,
            line_weight: 1.0,
            opacity: 0.5,
            color: Rgb::new(0xa7, 0x8b, 0xfa),
            background: Rgb::new(0x0a, 0x0a, 0x0a),
            seed: None,
        }
    }
}

impl FlowFieldParams {
    pub fn sanitized(&self) -> Self {
        Self {
            particle_count: self.particle_count.clamp(1, 10_000),
            noise_scale: finite_or(self.noise_scale, 0.01).clamp(0.001, 0.1),
            step_length: self.step_length.clamp(1, 1000),
            line_weight: finite_or(self.line_weight, 1.0).clamp(0.5, 5.0),
            opacity: finite_or(self.opacity, 0.5).clamp(0.0, 1.0),
            ..self.clone()
        }
    }
}

/// A direction field over the raster built from three octaves of noise.
#[derive(Debug, Clone)]
pub struct FlowField {
    noise: Perlin,
    scale: f64,
    width: u32,
    height: u32,
}

impl FlowField {
    pub fn new(noise_scale: f64, width: u32, height: u32) -> Self {
        Self {
            noise: Perlin::new(),
            scale: noise_scale,
            width,
            height,
        }
    }

    /// Flow direction (radians) at lattice point `(x, y)`.
    pub fn angle_at(&self, x: u32, y: u32) -> f64 {
        let s = |octave: f64| {
            self.noise
                .noise(x as f64 * self.scale * octave, y as f64 * self.scale * octave)
        };
        let a1 = s(1.0) * PI * 4.0;
        let a2 = s(2.0) * PI * 2.0;
        let a3 = s(4.0) * PI;
        (a1 + a2 * 0.5 + a3 * 0.25) / 1.75
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width as f64 && y < self.height as f64
    }

    /// Follow the field from `start` for at most `max_steps` unit steps.
    ///
    /// The start point itself is not recorded; tracing stops after the
    /// first step that leaves the raster (that point is kept).
    pub fn trace(&self, start: Point, max_steps: u32) -> Vec<Point> {
        let mut path = Vec::new();
        let (mut x, mut y) = (start.x, start.y);
        for _ in 0..max_steps {
            if !self.contains(x.floor(), y.floor()) {
                break;
            }
            let angle = self.angle_at(x.floor() as u32, y.floor() as u32);
            x += angle.cos();
            y += angle.sin();
            path.push(Point::new(x, y));
            if !self.contains(x, y) {
                break;
            }
        }
        path
    }
}

/// Where particle `index` of `count` starts: the first four tenths start on
/// the left, right, top and bottom edges respectively, the rest anywhere.
fn start_point(index: u32, count: u32, width: f64, height: f64, rng: &mut Pcg32) -> Point {
    let band = index as f64 / count as f64;
    let rx = rng.random::<f64>() * width;
    let ry = rng.random::<f64>() * height;
    if band < 0.1 {
        Point::new(0.0, ry)
    } else if band < 0.2 {
        Point::new(width - 1.0, ry)
    } else if band < 0.3 {
        Point::new(rx, 0.0)
    } else if band < 0.4 {
        Point::new(rx, height - 1.0)
    } else {
        Point::new(rx, ry)
    }
}

/// Trace every particle. Paths with fewer than two points are dropped.
pub fn generate_paths(params: &FlowFieldParams, width: u32, height: u32) -> Vec<FlowPath> {
    generate_paths_until(params, width, height, &|| false).unwrap_or_default()
}

/// [`generate_paths`], polling `stop` before each particle. Returns `None`
/// once `stop` reports true.
pub fn generate_paths_until(
    params: &FlowFieldParams,
    width: u32,
    height: u32,
    stop: &dyn Fn() -> bool,
) -> Option<Vec<FlowPath>> {
    let p = params.sanitized();
    if width == 0 || height == 0 {
        return Some(Vec::new());
    }
    let field = FlowField::new(p.noise_scale, width, height);
    let mut rng = Pcg32::seed_from_u64(resolve_seed(p.seed));

    let mut paths = Vec::new();
    for i in 0..p.particle_count {
        if stop() {
            return None;
        }
        let start = start_point(i, p.particle_count, width as f64, height as f64, &mut rng);
        let points = field.trace(start, p.step_length);
        if points.len() > 1 {
            paths.push(FlowPath { points });
        }
    }
    Some(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(count: u32) -> FlowFieldParams {
        FlowFieldParams {
            particle_count: count,
            seed: Some(11),
            ..FlowFieldParams::default()
        }
    }

    #[test]
    fn paths_are_deterministic_with_seed() {
        let a = generate_paths(&seeded(200), 120, 80);
        let b = generate_paths(&seeded(200), 120, 80);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn every_path_has_at_least_two_points() {
        for path in generate_paths(&seeded(300), 64, 64) {
            assert!(path.points.len() >= 2);
        }
    }

    #[test]
    fn steps_are_unit_length_and_bounded_by_step_count() {
        let params = FlowFieldParams {
            step_length: 50,
            ..seeded(100)
        };
        for path in generate_paths(&params, 100, 100) {
            assert!(path.points.len() <= 50);
            for pair in path.points.windows(2) {
                let d = ((pair[1].x - pair[0].x).powi(2) + (pair[1].y - pair[0].y).powi(2)).sqrt();
                assert!((d - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn only_the_last_point_may_leave_the_frame() {
        for path in generate_paths(&seeded(200), 50, 40) {
            let inside = &path.points[..path.points.len() - 1];
            assert!(inside
                .iter()
                .all(|p| p.x >= 0.0 && p.y >= 0.0 && p.x < 50.0 && p.y < 40.0));
        }
    }

    #[test]
    fn edge_particles_start_on_edges() {
        let mut rng = Pcg32::seed_from_u64(1);
        assert_eq!(start_point(0, 100, 50.0, 40.0, &mut rng).x, 0.0);
        assert_eq!(start_point(15, 100, 50.0, 40.0, &mut rng).x, 49.0);
        assert_eq!(start_point(25, 100, 50.0, 40.0, &mut rng).y, 0.0);
        assert_eq!(start_point(35, 100, 50.0, 40.0, &mut rng).y, 39.0);
    }

    #[test]
    fn tracing_stops_between_particles() {
        let traced = std::cell::Cell::new(0u32);
        let stop = || {
            traced.set(traced.get() + 1);
            traced.get() > 5
        };
        assert_eq!(generate_paths_until(&seeded(500), 80, 80, &stop), None);
        assert_eq!(traced.get(), 6);
        assert_eq!(
            generate_paths_until(&seeded(50), 80, 80, &|| false),
            Some(generate_paths(&seeded(50), 80, 80))
        );
    }

    #[test]
    fn empty_raster_yields_no_paths() {
        assert!(generate_paths(&seeded(10), 0, 10).is_empty());
    }
}
