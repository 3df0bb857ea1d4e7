use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::color::{finite_or, Rgb};

/// Screen pixels per simulation cell, along each axis.
pub const DEFAULT_SCALE: u32 = 4;

/// Diffusion rate of U.
pub const DIFFUSION_U: f64 = 0.16;
/// Diffusion rate of V.
pub const DIFFUSION_V: f64 = 0.08;

const LAPLACE_DIRECT: f64 = 0.2;
const LAPLACE_DIAGONAL: f64 = 0.05;

const BASE_ITERATIONS: u32 = 60;
const ITERATIONS_PER_SPEED: f64 = 100.0;
const MAX_ITERATIONS_PER_FRAME: u32 = 150;

/// Seed used by the structural presets when no explicit seed is given, so
/// that their output is reproducible across runs.
pub const STRUCTURAL_SEED: u64 = 0x5EED_0000_0000_0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    #[default]
    Spots,
    Stripes,
    Labyrinth,
    Worms,
    SpotsStripes,
    MovingSpots,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Self::Spots,
        Self::Stripes,
        Self::Labyrinth,
        Self::Worms,
        Self::SpotsStripes,
        Self::MovingSpots,
    ];

    /// `(feed, kill)` rates that produce the preset's characteristic pattern.
    pub fn rates(self) -> (f64, f64) {
        match self {
            Self::Spots => (0.055, 0.062),
            Self::Stripes => (0.035, 0.065),
            Self::Labyrinth => (0.039, 0.058),
            Self::Worms => (0.046, 0.063),
            Self::SpotsStripes => (0.014, 0.054),
            Self::MovingSpots => (0.062, 0.061),
        }
    }

    /// Whether the seeding is purely structural (no randomly placed circles).
    pub fn is_structural(self) -> bool {
        matches!(self, Self::Stripes | Self::Labyrinth)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReactionDiffusionParams {
    pub preset: Preset,
    pub feed_rate: f64,
    pub kill_rate: f64,
    /// Iteration multiplier, 0.1 to 2.0.
    pub speed: f64,
    /// Seed for the initial noise and circle placement. `None` makes the
    /// random presets differ from run to run.
    pub seed: Option<u64>,
}

impl Default for ReactionDiffusionParams {
    fn default() -> Self {
        Self::for_preset(Preset::Spots)
    }
}

impl ReactionDiffusionParams {
    pub fn for_preset(preset: Preset) -> Self {
        let (feed_rate, kill_rate) = preset.rates();
        Self {
            preset,
            feed_rate,
            kill_rate,
            speed: 1.0,
            seed: None,
        }
    }

    pub fn sanitized(&self) -> Self {
        let (feed, kill) = self.preset.rates();
        Self {
            preset: self.preset,
            feed_rate: finite_or(self.feed_rate, feed).clamp(0.0, 0.1),
            kill_rate: finite_or(self.kill_rate, kill).clamp(0.0, 0.1),
            speed: finite_or(self.speed, 1.0).clamp(0.1, 2.0),
            seed: self.seed,
        }
    }

    /// Steps run per rendered frame: `min(60 + ⌊speed·100⌋, 150)`.
    pub fn iterations_per_frame(&self) -> u32 {
        let speed = finite_or(self.speed, 1.0).clamp(0.0, 2.0);
        (BASE_ITERATIONS + (speed * ITERATIONS_PER_SPEED).floor() as u32)
            .min(MAX_ITERATIONS_PER_FRAME)
    }

    fn effective_seed(&self) -> u64 {
        match self.seed {
            Some(seed) => seed,
            None if self.preset.is_structural() => STRUCTURAL_SEED,
            None => rand::rng().random(),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation session
// ---------------------------------------------------------------------------

/// A Gray-Scott simulation over a `cols × rows` grid of (U, V) cells.
///
/// The caller owns the session and decides when to [`reset`](Self::reset)
/// it. Each generation is filled through [`advance_with`](Self::advance_with)
/// by [`compute_row`](Self::compute_row), which only reads the current
/// grids, so a caller can fill the rows of the next generation in parallel.
#[derive(Debug, Clone)]
pub struct GrayScott {
    params: ReactionDiffusionParams,
    cols: usize,
    rows: usize,
    u: Vec<f64>,
    v: Vec<f64>,
    scratch_u: Vec<f64>,
    scratch_v: Vec<f64>,
    generation: u64,
}

impl GrayScott {
    pub fn new(params: &ReactionDiffusionParams, cols: usize, rows: usize) -> Self {
        let len = cols * rows;
        let mut sim = Self {
            params: params.sanitized(),
            cols,
            rows,
            u: vec![1.0; len],
            v: vec![0.0; len],
            scratch_u: vec![0.0; len],
            scratch_v: vec![0.0; len],
            generation: 0,
        };
        sim.seed();
        sim
    }

    /// A session sized for a `width × height` raster at `scale` pixels per cell.
    pub fn for_raster(params: &ReactionDiffusionParams, width: u32, height: u32, scale: u32) -> Self {
        let scale = scale.max(1);
        Self::new(params, (width / scale) as usize, (height / scale) as usize)
    }

    /// Discard the current state and reseed with `params`.
    pub fn reset(&mut self, params: &ReactionDiffusionParams) {
        debug!(preset = ?params.preset, cols = self.cols, rows = self.rows, "reaction-diffusion reset");
        self.params = params.sanitized();
        self.u.fill(1.0);
        self.v.fill(0.0);
        self.generation = 0;
        self.seed();
    }

    /// Whether this session was started from `params` at this grid size.
    pub fn matches(&self, params: &ReactionDiffusionParams, cols: usize, rows: usize) -> bool {
        self.cols == cols && self.rows == rows && self.params == params.sanitized()
    }

    pub fn params(&self) -> &ReactionDiffusionParams {
        &self.params
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of steps applied since the last reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn u(&self) -> &[f64] {
        &self.u
    }

    pub fn v(&self) -> &[f64] {
        &self.v
    }

    /// Advance `n` steps sequentially.
    pub fn step(&mut self, n: u32) {
        let cols = self.cols.max(1);
        for _ in 0..n {
            self.advance_with(|current, next_u, next_v| {
                for (y, (row_u, row_v)) in next_u
                    .chunks_mut(cols)
                    .zip(next_v.chunks_mut(cols))
                    .enumerate()
                {
                    current.compute_row(y, row_u, row_v);
                }
            });
        }
    }

    /// Advance one generation, with `fill` writing the next U and V grids.
    ///
    /// `fill` sees the current state and two `cols × rows` buffers; it is
    /// expected to call [`compute_row`](Self::compute_row) once per row, in
    /// any order or in parallel. The filled buffers become the current
    /// grids and the old ones are kept as scratch space.
    pub fn advance_with<F>(&mut self, fill: F)
    where
        F: FnOnce(&Self, &mut [f64], &mut [f64]),
    {
        let len = self.cols * self.rows;
        let mut next_u = std::mem::take(&mut self.scratch_u);
        let mut next_v = std::mem::take(&mut self.scratch_v);
        // Scratch is lost if a previous `fill` unwound.
        next_u.resize(len, 0.0);
        next_v.resize(len, 0.0);
        fill(self, &mut next_u, &mut next_v);
        self.scratch_u = std::mem::replace(&mut self.u, next_u);
        self.scratch_v = std::mem::replace(&mut self.v, next_v);
        self.generation += 1;
    }

    /// Compute row `y` of the next generation into `out_u`/`out_v`.
    ///
    /// Border cells are never updated and are copied through unchanged.
    pub fn compute_row(&self, y: usize, out_u: &mut [f64], out_v: &mut [f64]) {
        let cols = self.cols;
        let start = y * cols;
        let cur_u = &self.u[start..start + cols];
        let cur_v = &self.v[start..start + cols];
        out_u.copy_from_slice(cur_u);
        out_v.copy_from_slice(cur_v);

        if y == 0 || y + 1 >= self.rows || cols < 3 {
            return;
        }

        let feed = self.params.feed_rate;
        let kill = self.params.kill_rate;
        for x in 1..cols - 1 {
            let i = start + x;
            let u = self.u[i];
            let v = self.v[i];
            let lap_u = self.laplacian(&self.u, i);
            let lap_v = self.laplacian(&self.v, i);

            let uvv = u * v * v;
            let du = DIFFUSION_U * lap_u - uvv + feed * (1.0 - u);
            let dv = DIFFUSION_V * lap_v + uvv - (feed + kill) * v;

            out_u[x] = (u + du).clamp(0.0, 1.0);
            out_v[x] = (v + dv).clamp(0.0, 1.0);
        }
    }

    /// Colour of cell `(col, row)`:
    /// `r = (1 − v)·255`, `g = (u − v + 1)·128`, `b = v·255`.
    pub fn color_at(&self, col: usize, row: usize) -> Rgb {
        let i = row * self.cols + col;
        let (u, v) = match (self.u.get(i), self.v.get(i)) {
            (Some(&u), Some(&v)) if col < self.cols => (u, v),
            _ => return Rgb::BLACK,
        };
        let channel = |value: f64| value.floor().clamp(0.0, 255.0) as u8;
        Rgb::new(
            channel((1.0 - v) * 255.0),
            channel((u - v + 1.0) * 128.0),
            channel(v * 255.0),
        )
    }

    #[inline]
    fn laplacian(&self, grid: &[f64], i: usize) -> f64 {
        let c = self.cols;
        let direct = grid[i - c] + grid[i + c] + grid[i - 1] + grid[i + 1];
        let diagonal = grid[i - c - 1] + grid[i - c + 1] + grid[i + c - 1] + grid[i + c + 1];
        direct * LAPLACE_DIRECT + diagonal * LAPLACE_DIAGONAL - grid[i]
    }

    // -- Seeding ----------------------------------------------------------------

    fn seed(&mut self) {
        if self.cols == 0 || self.rows == 0 {
            return;
        }
        let mut rng = Pcg32::seed_from_u64(self.params.effective_seed());

        for (u, v) in self.u.iter_mut().zip(self.v.iter_mut()) {
            *u = 1.0 - rng.random::<f64>() * 0.05;
            *v = rng.random::<f64>() * 0.05;
        }

        let (cols, rows) = (self.cols, self.rows);
        match self.params.preset {
            Preset::Stripes => {
                for y in 0..rows {
                    for x in (0..cols).filter(|x| x % 12 < 6) {
                        self.set(x, y, 0.1, 0.9);
                    }
                }
            }
            Preset::Labyrinth => {
                for y in 0..rows {
                    for x in (0..cols).filter(|x| (x ^ y) % 7 == 0) {
                        self.set(x, y, 0.2, 0.8);
                    }
                }
            }
            Preset::Worms => {
                for _ in 0..20 {
                    let (cx, cy) = random_cell(&mut rng, cols, rows);
                    self.apply_circle(cx, cy, 4, 0.9);
                }
            }
            Preset::SpotsStripes => {
                for y in (0..rows).filter(|y| y % 8 < 4) {
                    for x in (0..cols).filter(|x| x % 20 < 10) {
                        self.set(x, y, 0.15, 0.85);
                    }
                }
                for _ in 0..30 {
                    let (cx, cy) = random_cell(&mut rng, cols, rows);
                    self.apply_circle(cx, cy, 3, 0.95);
                }
            }
            Preset::MovingSpots => {
                for _ in 0..40 {
                    let (cx, cy) = random_cell(&mut rng, cols, rows);
                    self.apply_circle(cx, cy, 3, 1.0);
                }
            }
            Preset::Spots => {
                let center_x = (cols / 2) as i64;
                let center_y = (rows / 2) as i64;
                for _ in 0..60 {
                    let dx = ((rng.random::<f64>() - 0.5) * cols as f64 * 0.7).floor() as i64;
                    let dy = ((rng.random::<f64>() - 0.5) * rows as f64 * 0.7).floor() as i64;
                    let radius = 3 + rng.random_range(0..4);
                    self.apply_circle(center_x + dx, center_y + dy, radius, 1.0);
                }
            }
        }
    }

    fn set(&mut self, x: usize, y: usize, u: f64, v: f64) {
        let i = y * self.cols + x;
        self.u[i] = u;
        self.v[i] = v;
    }

    /// Fill a disc with `V = strength`, `U = max(0, 1 − strength)`, clipped
    /// to the grid.
    fn apply_circle(&mut self, cx: i64, cy: i64, radius: i64, strength: f64) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let (px, py) = (cx + dx, cy + dy);
                if px < 0 || py < 0 || px >= self.cols as i64 || py >= self.rows as i64 {
                    continue;
                }
                self.set(px as usize, py as usize, (1.0 - strength).max(0.0), strength);
            }
        }
    }
}

fn random_cell(rng: &mut Pcg32, cols: usize, rows: usize) -> (i64, i64) {
    (
        rng.random_range(0..cols) as i64,
        rng.random_range(0..rows) as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripes() -> ReactionDiffusionParams {
        ReactionDiffusionParams::for_preset(Preset::Stripes)
    }

    #[test]
    fn structural_presets_are_reproducible_without_seed() {
        for preset in [Preset::Stripes, Preset::Labyrinth] {
            let params = ReactionDiffusionParams::for_preset(preset);
            let mut a = GrayScott::new(&params, 40, 30);
            let mut b = GrayScott::new(&params, 40, 30);
            a.step(20);
            b.step(20);
            assert_eq!(a.u(), b.u());
            assert_eq!(a.v(), b.v());
        }
    }

    #[test]
    fn explicit_seed_makes_random_presets_reproducible() {
        let params = ReactionDiffusionParams {
            seed: Some(7),
            ..ReactionDiffusionParams::for_preset(Preset::Worms)
        };
        let a = GrayScott::new(&params, 50, 50);
        let b = GrayScott::new(&params, 50, 50);
        assert_eq!(a.v(), b.v());
    }

    #[test]
    fn stripes_seed_column_bands() {
        let sim = GrayScott::new(&stripes(), 24, 4);
        let v = |x: usize| sim.v()[x];
        assert_eq!(v(0), 0.9);
        assert_eq!(v(5), 0.9);
        assert!(v(6) <= 0.05);
        assert_eq!(v(12), 0.9);
    }

    #[test]
    fn borders_are_never_updated() {
        let mut sim = GrayScott::new(&stripes(), 16, 12);
        let top: Vec<f64> = sim.u()[..16].to_vec();
        let left: Vec<f64> = (0..12).map(|y| sim.u()[y * 16]).collect();
        sim.step(10);
        assert_eq!(&sim.u()[..16], top.as_slice());
        let left_after: Vec<f64> = (0..12).map(|y| sim.u()[y * 16]).collect();
        assert_eq!(left, left_after);
    }

    #[test]
    fn fields_stay_clamped() {
        let params = ReactionDiffusionParams {
            feed_rate: 0.1,
            kill_rate: 0.0,
            seed: Some(3),
            ..ReactionDiffusionParams::default()
        };
        let mut sim = GrayScott::new(&params, 32, 32);
        sim.step(50);
        assert!(sim.u().iter().chain(sim.v()).all(|x| (0.0..=1.0).contains(x)));
        assert_eq!(sim.generation(), 50);
    }

    #[test]
    fn row_split_matches_sequential_step() {
        let mut sequential = GrayScott::new(&stripes(), 20, 15);
        let mut manual = sequential.clone();
        sequential.step(1);

        manual.advance_with(|current, nu, nv| {
            for y in (0..15).rev() {
                let (ru, rv) = (&mut nu[y * 20..(y + 1) * 20], &mut nv[y * 20..(y + 1) * 20]);
                current.compute_row(y, ru, rv);
            }
        });
        assert_eq!(sequential.u(), manual.u());
        assert_eq!(sequential.v(), manual.v());
        assert_eq!(manual.generation(), 1);
    }

    #[test]
    fn unwound_fill_does_not_shrink_the_next_generation() {
        let mut sim = GrayScott::new(&stripes(), 12, 10);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sim.advance_with(|_, _, _| panic!("fill gave up"));
        }));
        assert!(outcome.is_err());
        assert_eq!(sim.generation(), 0);

        sim.step(3);
        assert_eq!(sim.generation(), 3);
        assert_eq!(sim.u().len(), 120);
        assert_eq!(sim.v().len(), 120);
    }

    #[test]
    fn iteration_count_scales_with_speed() {
        let mut p = stripes();
        p.speed = 0.5;
        assert_eq!(p.iterations_per_frame(), 110);
        p.speed = 2.0;
        assert_eq!(p.iterations_per_frame(), 150);
    }

    #[test]
    fn color_formula() {
        let mut sim = GrayScott::new(&stripes(), 3, 3);
        sim.set(1, 1, 1.0, 0.0);
        assert_eq!(sim.color_at(1, 1), Rgb::new(255, 255, 0));
        sim.set(1, 1, 0.0, 1.0);
        assert_eq!(sim.color_at(1, 1), Rgb::new(0, 0, 255));
        assert_eq!(sim.color_at(5, 1), Rgb::BLACK);
    }

    #[test]
    fn reset_restarts_generation() {
        let mut sim = GrayScott::new(&stripes(), 10, 10);
        sim.step(3);
        sim.reset(&ReactionDiffusionParams::for_preset(Preset::Labyrinth));
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.params().preset, Preset::Labyrinth);
        assert!(sim.matches(&ReactionDiffusionParams::for_preset(Preset::Labyrinth), 10, 10));
    }

    #[test]
    fn tiny_grids_do_not_panic() {
        let mut sim = GrayScott::new(&ReactionDiffusionParams::default(), 0, 0);
        sim.step(5);
        let mut sim = GrayScott::new(&ReactionDiffusionParams::default(), 2, 1);
        sim.step(5);
    }
}
