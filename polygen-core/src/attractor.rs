use serde::{Deserialize, Serialize};

use crate::color::{finite_or, Rgb};

/// Iterations discarded before points are collected.
pub const TRANSIENT_ITERATIONS: u32 = 100;

/// A trajectory is considered diverged once any coordinate exceeds this.
pub const DIVERGENCE_LIMIT: f64 = 1000.0;

/// Fixed Aizawa coefficients that are not exposed to the user.
pub const AIZAWA_E: f64 = 0.25;
pub const AIZAWA_F: f64 = 0.1;

/// A point in ℝ³. The discrete 2D maps leave `z` at zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn is_bounded(self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|v| v.is_finite() && v.abs() <= DIVERGENCE_LIMIT)
    }
}

/// One collected sample of an attractor trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttractorPoint {
    pub position: Vec3,
    pub iteration: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttractorKind {
    #[default]
    Lorenz,
    Aizawa,
    #[serde(rename = "dejong")]
    DeJong,
}

/// The four user-facing coefficients. Their meaning depends on the kind:
/// Lorenz reads `(σ, ρ, β)` from `(a, b, c)`; Aizawa and De Jong use all four.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl AttractorKind {
    /// Starting point of the trajectory.
    pub fn seed(self) -> Vec3 {
        match self {
            Self::Lorenz => Vec3::new(1.0, 1.0, 1.0),
            Self::Aizawa => Vec3::new(0.1, 0.0, 0.0),
            Self::DeJong => Vec3::new(0.0, 0.0, 0.0),
        }
    }

    pub fn default_coefficients(self) -> Coefficients {
        match self {
            Self::Lorenz => Coefficients { a: 10.0, b: 28.0, c: 8.0 / 3.0, d: 0.0 },
            Self::Aizawa => Coefficients { a: 0.95, b: 0.7, c: 0.6, d: 3.5 },
            Self::DeJong => Coefficients { a: 1.4, b: -2.3, c: 2.4, d: -2.1 },
        }
    }

    /// Discrete maps ignore `dt` and are drawn as points rather than a line.
    pub fn is_discrete(self) -> bool {
        matches!(self, Self::DeJong)
    }
}

// ---------------------------------------------------------------------------
// Step functions
// ---------------------------------------------------------------------------

/// One forward-Euler step of the Lorenz flow.
#[inline]
pub fn lorenz_step(p: Vec3, sigma: f64, rho: f64, beta: f64, dt: f64) -> Vec3 {
    let dx = sigma * (p.y - p.x);
    let dy = p.x * (rho - p.z) - p.y;
    let dz = p.x * p.y - beta * p.z;
    Vec3::new(p.x + dx * dt, p.y + dy * dt, p.z + dz * dt)
}

/// One forward-Euler step of the Aizawa flow with `e` and `f` fixed.
#[inline]
pub fn aizawa_step(p: Vec3, a: f64, b: f64, c: f64, d: f64, dt: f64) -> Vec3 {
    let Vec3 { x, y, z } = p;
    let dx = (z - b) * x - d * y;
    let dy = d * x + (z - b) * y;
    let dz = c + a * z - z * z * z / 3.0 - (x * x + y * y) * (1.0 + AIZAWA_E * z)
        + AIZAWA_F * z * x * x * x;
    Vec3::new(x + dx * dt, y + dy * dt, z + dz * dt)
}

/// The Peter de Jong map. The next state replaces the current one outright.
#[inline]
pub fn de_jong_step(p: Vec3, a: f64, b: f64, c: f64, d: f64) -> Vec3 {
    Vec3::new(
        (a * p.y).sin() - (b * p.x).cos(),
        (c * p.x).sin() - (d * p.y).cos(),
        0.0,
    )
}

#[inline]
pub fn step(kind: AttractorKind, p: Vec3, k: &Coefficients, dt: f64) -> Vec3 {
    match kind {
        AttractorKind::Lorenz => lorenz_step(p, k.a, k.b, k.c, dt),
        AttractorKind::Aizawa => aizawa_step(p, k.a, k.b, k.c, k.d, dt),
        AttractorKind::DeJong => de_jong_step(p, k.a, k.b, k.c, k.d),
    }
}

/// Integrate `iterations` steps from the kind's seed point.
///
/// The first [`TRANSIENT_ITERATIONS`] states are discarded. Collection stops
/// at the first state with a non-finite coordinate or one whose magnitude
/// exceeds [`DIVERGENCE_LIMIT`]; that state is not returned, so the result
/// may be shorter than requested but never contains NaN or infinity.
pub fn generate_points(
    kind: AttractorKind,
    coefficients: &Coefficients,
    iterations: u32,
    dt: f64,
) -> Vec<AttractorPoint> {
    let mut points =
        Vec::with_capacity(iterations.saturating_sub(TRANSIENT_ITERATIONS) as usize);
    let mut p = kind.seed();

    for i in 0..iterations {
        p = step(kind, p, coefficients, dt);
        if !p.is_bounded() {
            break;
        }
        if i >= TRANSIENT_ITERATIONS {
            points.push(AttractorPoint {
                position: p,
                iteration: i,
            });
        }
    }

    points
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrangeAttractorParams {
    #[serde(rename = "type")]
    pub kind: AttractorKind,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    /// Number of integration steps, 1,000 to 100,000.
    pub point_density: u32,
    pub dt: f64,
    pub color: Rgb,
    pub line_weight: f64,
}

impl Default for StrangeAttractorParams {
    fn default() -> Self {
        Self::for_kind(AttractorKind::Lorenz)
    }
}

impl StrangeAttractorParams {
    pub const MIN_DENSITY: u32 = 1_000;
    pub const MAX_DENSITY: u32 = 100_000;

    /// Defaults with the preset coefficients of `kind`.
    pub fn for_kind(kind: AttractorKind) -> Self {
        let k = kind.default_coefficients();
        Self {
            kind,
            a: k.a,
            b: k.b,
            c: k.c,
            d: k.d,
            point_density: 20_000,
            dt: 0.01,
            color: Rgb::new(0xa7, 0x8b, 0xfa),
            line_weight: 1.0,
        }
    }

    pub fn coefficients(&self) -> Coefficients {
        Coefficients {
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
        }
    }

    pub fn sanitized(&self) -> Self {
        let k = self.kind.default_coefficients();
        Self {
            kind: self.kind,
            a: finite_or(self.a, k.a),
            b: finite_or(self.b, k.b),
            c: finite_or(self.c, k.c),
            d: finite_or(self.d, k.d),
            point_density: self
                .point_density
                .clamp(Self::MIN_DENSITY, Self::MAX_DENSITY),
            dt: finite_or(self.dt, 0.01).clamp(1e-4, 0.1),
            color: self.color,
            line_weight: finite_or(self.line_weight, 1.0).clamp(0.5, 5.0),
        }
    }

    pub fn points(&self) -> Vec<AttractorPoint> {
        let p = self.sanitized();
        generate_points(p.kind, &p.coefficients(), p.point_density, p.dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lorenz_step_matches_hand_computation() {
        let next = lorenz_step(Vec3::new(1.0, 1.0, 1.0), 10.0, 28.0, 8.0 / 3.0, 0.01);
        assert!((next.x - 1.0).abs() < 1e-12);
        assert!((next.y - 1.26).abs() < 1e-12);
        assert!((next.z - (1.0 + (1.0 - 8.0 / 3.0) * 0.01)).abs() < 1e-12);
    }

    #[test]
    fn de_jong_ignores_dt_and_z() {
        let k = AttractorKind::DeJong.default_coefficients();
        let p = Vec3::new(0.3, -0.2, 5.0);
        let a = step(AttractorKind::DeJong, p, &k, 0.01);
        let b = step(AttractorKind::DeJong, p, &k, 99.0);
        assert_eq!(a, b);
        assert_eq!(a.z, 0.0);
    }

    #[test]
    fn transient_is_discarded() {
        let k = AttractorKind::Lorenz.default_coefficients();
        let points = generate_points(AttractorKind::Lorenz, &k, 1000, 0.01);
        assert_eq!(points.len(), 900);
        assert_eq!(points[0].iteration, TRANSIENT_ITERATIONS);
    }

    #[test]
    fn fewer_iterations_than_transient_yields_nothing() {
        let k = AttractorKind::Aizawa.default_coefficients();
        assert!(generate_points(AttractorKind::Aizawa, &k, 50, 0.01).is_empty());
    }

    #[test]
    fn divergent_lorenz_bails_out() {
        let k = Coefficients { a: 10.0, b: 1e9, c: 8.0 / 3.0, d: 0.0 };
        let points = generate_points(AttractorKind::Lorenz, &k, 10_000, 0.01);
        assert!(points.len() < 10_000 - TRANSIENT_ITERATIONS as usize);
        assert!(points.iter().all(|p| p.position.is_bounded()));
    }

    #[test]
    fn extreme_de_jong_never_returns_non_finite_points() {
        let k = Coefficients {
            a: f64::INFINITY,
            b: f64::MAX,
            c: f64::NEG_INFINITY,
            d: 1e308,
        };
        let points = generate_points(AttractorKind::DeJong, &k, 5_000, 0.01);
        assert!(points.len() < 5_000);
        assert!(points
            .iter()
            .all(|p| p.position.x.is_finite() && p.position.y.is_finite()));
    }

    #[test]
    fn aizawa_stays_bounded_with_defaults() {
        let params = StrangeAttractorParams::for_kind(AttractorKind::Aizawa);
        let points = params.points();
        assert_eq!(
            points.len(),
            (params.point_density - TRANSIENT_ITERATIONS) as usize
        );
    }

    #[test]
    fn sanitized_clamps_density_and_coefficients() {
        let params = StrangeAttractorParams {
            a: f64::NAN,
            point_density: 10,
            ..StrangeAttractorParams::default()
        };
        let s = params.sanitized();
        assert_eq!(s.a, 10.0);
        assert_eq!(s.point_density, StrangeAttractorParams::MIN_DENSITY);
    }
}
