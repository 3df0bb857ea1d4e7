use std::f64::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::color::{finite_or, Rgb};
use crate::mode::{resolve_seed, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChaosGameParams {
    /// Polygon vertex count, 3 to 12.
    pub sides: u32,
    /// Fraction of the distance to the chosen vertex covered per jump.
    pub jump_ratio: f64,
    pub point_density: u32,
    pub point_color: Rgb,
    pub bg_color: Rgb,
    pub seed: Option<u64>,
}

impl Default for ChaosGameParams {
    fn default() -> Self {
        Self {
            sides: 3,
            jump_ratio: 0.5,
            point_density: 100_000,
            point_color: Rgb::new(0xa7, 0x8b, 0xfa),
            bg_color: Rgb::new(0x0a, 0x0a, 0x0a),
            seed: None,
        }
    }
}

impl ChaosGameParams {
    pub fn sanitized(&self) -> Self {
        Self {
            sides: self.sides.clamp(3, 12),
            jump_ratio: finite_or(self.jump_ratio, 0.5).clamp(0.1, 0.9),
            point_density: self.point_density.clamp(1, 100_000),
            ..self.clone()
        }
    }
}

/// Vertices of a regular `sides`-gon inscribed in a circle of radius
/// `min(w, h) / 3` around the raster centre, first vertex at angle 0.
pub fn polygon_vertices(sides: u32, width: u32, height: u32) -> Vec<Point> {
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let radius = width.min(height) as f64 / 3.0;
    (0..sides)
        .map(|i| {
            let angle = TAU * i as f64 / sides as f64;
            Point::new(cx + radius * angle.cos(), cy + radius * angle.sin())
        })
        .collect()
}

/// Play the chaos game from the centre: each step jumps `jump_ratio` of the
/// way towards a uniformly chosen vertex. Every visited point is returned.
pub fn generate_points(params: &ChaosGameParams, width: u32, height: u32) -> Vec<Point> {
    let p = params.sanitized();
    let vertices = polygon_vertices(p.sides, width, height);
    let mut rng = Pcg32::seed_from_u64(resolve_seed(p.seed));

    let mut current = Point::new(width as f64 / 2.0, height as f64 / 2.0);
    (0..p.point_density)
        .map(|_| {
            let v = vertices[rng.random_range(0..vertices.len())];
            current = Point::new(
                current.x + (v.x - current.x) * p.jump_ratio,
                current.y + (v.y - current.y) * p.jump_ratio,
            );
            current
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertices_lie_on_the_circle() {
        let vs = polygon_vertices(6, 300, 240);
        assert_eq!(vs.len(), 6);
        for v in &vs {
            let r = ((v.x - 150.0).powi(2) + (v.y - 120.0).powi(2)).sqrt();
            assert!((r - 80.0).abs() < 1e-9);
        }
        assert!((vs[0].x - 230.0).abs() < 1e-9);
    }

    #[test]
    fn points_stay_inside_the_polygon_hull() {
        let params = ChaosGameParams {
            point_density: 5_000,
            seed: Some(9),
            ..ChaosGameParams::default()
        };
        let points = generate_points(&params, 200, 200);
        assert_eq!(points.len(), 5_000);
        let r = 200.0 / 3.0;
        for p in points {
            let d = ((p.x - 100.0).powi(2) + (p.y - 100.0).powi(2)).sqrt();
            assert!(d <= r + 1e-9);
        }
    }

    #[test]
    fn seeded_runs_match() {
        let params = ChaosGameParams {
            point_density: 1_000,
            sides: 5,
            seed: Some(4),
            ..ChaosGameParams::default()
        };
        assert_eq!(generate_points(&params, 64, 64), generate_points(&params, 64, 64));
    }

    #[test]
    fn out_of_range_sides_are_clamped() {
        let params = ChaosGameParams {
            sides: 1,
            jump_ratio: f64::NAN,
            ..ChaosGameParams::default()
        };
        let s = params.sanitized();
        assert_eq!(s.sides, 3);
        assert_eq!(s.jump_ratio, 0.5);
    }
}
