use std::f64::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::color::{finite_or, Rgb};
use crate::mode::{resolve_seed, Point};

/// Smallest radius the random packer draws.
const RANDOM_MIN_RADIUS: f64 = 5.0;
/// Radius of the circle the centre packer starts from.
const SEED_RADIUS: f64 = 10.0;
/// Candidates are rejected below this admissible radius.
const MIN_GROWN_RADIUS: f64 = 3.0;
const CANDIDATE_ANGLES: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackedCircle {
    pub id: u32,
    pub center: Point,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackingMode {
    #[default]
    Random,
    GrowFromCenter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CirclePackingParams {
    pub packing_mode: PackingMode,
    /// 50 to 2,000.
    pub max_circles: u32,
    /// Minimum gap between circles, 0 to 10 px.
    pub padding: f64,
    pub show_fill: bool,
    pub show_stroke: bool,
    pub fill_color: Rgb,
    pub stroke_color: Rgb,
    pub background: Rgb,
    pub seed: Option<u64>,
}

impl Default for CirclePackingParams {
    fn default() -> Self {
        Self {
            packing_mode: PackingMode::Random,
            max_circles: 500,
            padding: 2.0,
            show_fill: true,
            show_stroke: true,
            fill_color: Rgb::new(0xa7, 0x8b, 0xfa),
            stroke_color: Rgb::new(0xec, 0x48, 0x99),
            background: Rgb::new(0x0a, 0x0a, 0x0a),
            seed: None,
        }
    }
}

impl CirclePackingParams {
    pub fn sanitized(&self) -> Self {
        Self {
            max_circles: self.max_circles.clamp(1, 2000),
            padding: finite_or(self.padding, 2.0).clamp(0.0, 10.0),
            ..self.clone()
        }
    }
}

pub fn pack(params: &CirclePackingParams, width: u32, height: u32) -> Vec<PackedCircle> {
    pack_until(params, width, height, &|| false).unwrap_or_default()
}

/// [`pack`], polling `stop` between placement attempts. Returns `None` once
/// `stop` reports true.
pub fn pack_until(
    params: &CirclePackingParams,
    width: u32,
    height: u32,
    stop: &dyn Fn() -> bool,
) -> Option<Vec<PackedCircle>> {
    let p = params.sanitized();
    if width == 0 || height == 0 {
        return Some(Vec::new());
    }
    let mut rng = Pcg32::seed_from_u64(resolve_seed(p.seed));
    let (w, h) = (width as f64, height as f64);
    match p.packing_mode {
        PackingMode::Random => pack_random(w, h, p.max_circles, p.padding, &mut rng, stop),
        PackingMode::GrowFromCenter => {
            pack_from_center(w, h, p.max_circles, p.padding, &mut rng, stop)
        }
    }
}

/// Rejection sampling: up to `max · 10` random circles are tried, each kept
/// if it lies inside the frame and clears every accepted circle by `padding`.
fn pack_random(
    w: f64,
    h: f64,
    max: u32,
    padding: f64,
    rng: &mut Pcg32,
    stop: &dyn Fn() -> bool,
) -> Option<Vec<PackedCircle>> {
    let mut circles: Vec<PackedCircle> = Vec::new();
    let max_radius = w.min(h) / 20.0;

    for attempt in 0..max * 10 {
        if circles.len() >= max as usize {
            break;
        }
        if attempt % 64 == 0 && stop() {
            return None;
        }
        let x = rng.random::<f64>() * w;
        let y = rng.random::<f64>() * h;
        let radius = RANDOM_MIN_RADIUS + rng.random::<f64>() * (max_radius - RANDOM_MIN_RADIUS);

        if x - radius < 0.0 || x + radius > w || y - radius < 0.0 || y + radius > h {
            continue;
        }
        let collides = circles.iter().any(|c| {
            let d = (x - c.center.x).hypot(y - c.center.y);
            d < radius + c.radius + padding
        });
        if !collides {
            circles.push(PackedCircle {
                id: circles.len() as u32,
                center: Point::new(x, y),
                radius,
            });
        }
    }
    Some(circles)
}

/// Greedy growth: starting from a seed circle in the middle, each round
/// proposes points at eight angles around every circle and adds the one
/// that admits the largest radius.
///
/// A round costs O(n²) in the circles placed so far, so `stop` is polled
/// every round and every 256 candidates.
fn pack_from_center(
    w: f64,
    h: f64,
    max: u32,
    padding: f64,
    rng: &mut Pcg32,
    stop: &dyn Fn() -> bool,
) -> Option<Vec<PackedCircle>> {
    let mut circles = vec![PackedCircle {
        id: 0,
        center: Point::new(w / 2.0, h / 2.0),
        radius: SEED_RADIUS,
    }];

    for _ in 0..max * 5 {
        if circles.len() >= max as usize {
            break;
        }
        if stop() {
            return None;
        }
        let candidates = candidate_positions(&circles, w, h, rng);
        if candidates.is_empty() {
            break;
        }

        let mut best: Option<(Point, f64)> = None;
        for (i, center) in candidates.into_iter().enumerate() {
            if i % 256 == 255 && stop() {
                return None;
            }
            let radius = max_radius_at(center, &circles, w, h, padding);
            if radius < MIN_GROWN_RADIUS {
                continue;
            }
            match best {
                Some((_, r)) if r >= radius => {}
                _ => best = Some((center, radius)),
            }
        }

        if let Some((center, radius)) = best {
            circles.push(PackedCircle {
                id: circles.len() as u32,
                center,
                radius,
            });
        }
    }
    Some(circles)
}

fn candidate_positions(circles: &[PackedCircle], w: f64, h: f64, rng: &mut Pcg32) -> Vec<Point> {
    let mut out = Vec::with_capacity(circles.len() * CANDIDATE_ANGLES as usize);
    for circle in circles {
        for i in 0..CANDIDATE_ANGLES {
            let angle = TAU * i as f64 / CANDIDATE_ANGLES as f64;
            let distance = circle.radius + 10.0 + rng.random::<f64>() * 20.0;
            let x = circle.center.x + angle.cos() * distance;
            let y = circle.center.y + angle.sin() * distance;
            if (0.0..=w).contains(&x) && (0.0..=h).contains(&y) {
                out.push(Point::new(x, y));
            }
        }
    }
    out
}

/// Largest radius a circle at `at` can have without crossing the frame or
/// coming closer than `padding` to an existing circle. Never negative.
pub fn max_radius_at(at: Point, circles: &[PackedCircle], w: f64, h: f64, padding: f64) -> f64 {
    let boundary = at.x.min(w - at.x).min(at.y).min(h - at.y);
    circles
        .iter()
        .map(|c| (at.x - c.center.x).hypot(at.y - c.center.y) - c.radius - padding)
        .fold(boundary, f64::min)
        .max(0.0)
}
