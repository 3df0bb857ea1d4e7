use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::color::Rgb;
use crate::error::CoreError;
use crate::mode::resolve_seed;

/// Screen pixels per automaton cell.
pub const CELL_SIZE: u32 = 4;

/// Probability that a cell starts alive under random initialisation.
const INITIAL_DENSITY: f64 = 0.3;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A life-like birth/survival rule in `B…/S…` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rule {
    birth: [bool; 9],
    survival: [bool; 9],
}

impl Rule {
    /// Conway's Game of Life, `B3/S23`.
    pub const CONWAY: Self = Self::from_counts(&[3], &[2, 3]);

    pub const fn from_counts(birth: &[usize], survival: &[usize]) -> Self {
        let mut rule = Self {
            birth: [false; 9],
            survival: [false; 9],
        };
        let mut i = 0;
        while i < birth.len() {
            rule.birth[birth[i]] = true;
            i += 1;
        }
        let mut i = 0;
        while i < survival.len() {
            rule.survival[survival[i]] = true;
            i += 1;
        }
        rule
    }

    /// Parse `rule`, falling back to [`Rule::CONWAY`] on malformed input.
    pub fn parse_or_default(rule: &str) -> Self {
        rule.parse().unwrap_or_else(|e| {
            warn!("{e}; using B3/S23");
            Self::CONWAY
        })
    }

    #[inline]
    pub fn born(&self, neighbours: usize) -> bool {
        self.birth.get(neighbours).copied().unwrap_or(false)
    }

    #[inline]
    pub fn survives(&self, neighbours: usize) -> bool {
        self.survival.get(neighbours).copied().unwrap_or(false)
    }

    /// The smallest birth count, used as the cyclic automaton's threshold.
    pub fn min_birth(&self) -> Option<usize> {
        self.birth.iter().position(|&b| b)
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::CONWAY
    }
}

impl FromStr for Rule {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoreError::InvalidRule {
            rule: s.to_string(),
            reason: reason.to_string(),
        };

        let (left, right) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("expected B…/S…"))?;

        let mut birth = None;
        let mut survival = None;
        for part in [left.trim(), right.trim()] {
            let mut chars = part.chars();
            let slot = match chars.next().map(|c| c.to_ascii_uppercase()) {
                Some('B') => &mut birth,
                Some('S') => &mut survival,
                _ => return Err(invalid("each half must start with B or S")),
            };
            if slot.is_some() {
                return Err(invalid("B and S may each appear once"));
            }
            let mut counts = [false; 9];
            for c in chars {
                match c.to_digit(10) {
                    Some(d) if d <= 8 => counts[d as usize] = true,
                    _ => return Err(invalid("neighbour counts must be digits 0–8")),
                }
            }
            *slot = Some(counts);
        }

        match (birth, survival) {
            (Some(birth), Some(survival)) => Ok(Self { birth, survival }),
            _ => Err(invalid("expected B…/S…")),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = |set: &[bool; 9]| -> String {
            (0..9)
                .filter(|&i| set[i])
                .filter_map(|i| char::from_digit(i as u32, 10))
                .collect()
        };
        write!(f, "B{}/S{}", digits(&self.birth), digits(&self.survival))
    }
}

/// Named rules offered alongside free-form entry.
pub const RULE_PRESETS: [(&str, &str); 6] = [
    ("conway", "B3/S23"),
    ("cyclic-2", "B1/S1"),
    ("cyclic-3", "B2/S1"),
    ("cyclic-4", "B3/S1"),
    ("high-life", "B36/S23"),
    ("day-and-night", "B3678/S34678"),
];

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Two-state life-like automaton driven by the birth/survival rule.
    #[default]
    Conway,
    /// N-state cyclic automaton; a cell advances when enough neighbours
    /// already hold its successor state.
    Cyclic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialState {
    #[default]
    Random,
    Centered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellularAutomataParams {
    pub algorithm: Algorithm,
    pub rule_set: String,
    pub initial_state: InitialState,
    pub color_live: Rgb,
    pub color_dead: Rgb,
    pub generations: u32,
    /// State count for the cyclic algorithm.
    pub states: u8,
    pub seed: Option<u64>,
}

impl Default for CellularAutomataParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Conway,
            rule_set: "B3/S23".to_string(),
            initial_state: InitialState::Random,
            color_live: Rgb::new(0xa7, 0x8b, 0xfa),
            color_dead: Rgb::new(0x0a, 0x0a, 0x0a),
            generations: 10,
            states: 4,
            seed: None,
        }
    }
}

impl CellularAutomataParams {
    pub fn sanitized(&self) -> Self {
        Self {
            generations: self.generations.min(500),
            states: self.states.clamp(2, 16),
            ..self.clone()
        }
    }

    pub fn rule(&self) -> Rule {
        Rule::parse_or_default(&self.rule_set)
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A toroidal grid of cell states. State 0 is dead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellGrid {
    cols: usize,
    rows: usize,
    cells: Vec<u8>,
}

impl CellGrid {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![0; cols * rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.cells[y * self.cols + x]
    }

    pub fn set(&mut self, x: usize, y: usize, state: u8) {
        self.cells[y * self.cols + x] = state;
    }

    /// Count of the eight wrapped neighbours of `(x, y)` satisfying `pred`.
    fn count_neighbours(&self, x: usize, y: usize, pred: impl Fn(u8) -> bool) -> usize {
        let mut n = 0;
        for dy in [self.rows - 1, 0, 1] {
            for dx in [self.cols - 1, 0, 1] {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = (x + dx) % self.cols;
                let ny = (y + dy) % self.rows;
                if pred(self.get(nx, ny)) {
                    n += 1;
                }
            }
        }
        n
    }

    /// One synchronous life-like generation.
    pub fn step_life(&self, rule: &Rule) -> Self {
        self.map_cells(|x, y, state| {
            let alive = self.count_neighbours(x, y, |s| s != 0);
            let next = if state != 0 {
                rule.survives(alive)
            } else {
                rule.born(alive)
            };
            u8::from(next)
        })
    }

    /// One synchronous cyclic generation over `states` states.
    pub fn step_cyclic(&self, states: u8, threshold: usize) -> Self {
        self.map_cells(|x, y, state| {
            let successor = (state + 1) % states;
            if self.count_neighbours(x, y, |s| s == successor) >= threshold {
                successor
            } else {
                state
            }
        })
    }

    fn map_cells(&self, f: impl Fn(usize, usize, u8) -> u8) -> Self {
        let mut next = Self::new(self.cols, self.rows);
        for y in 0..self.rows {
            for x in 0..self.cols {
                next.set(x, y, f(x, y, self.get(x, y)));
            }
        }
        next
    }
}

/// Initialise and evolve the automaton described by `params` on a grid that
/// covers a `width × height` raster at [`CELL_SIZE`] pixels per cell.
pub fn generate(params: &CellularAutomataParams, width: u32, height: u32) -> CellGrid {
    let p = params.sanitized();
    let cols = (width / CELL_SIZE) as usize;
    let rows = (height / CELL_SIZE) as usize;
    let mut grid = CellGrid::new(cols, rows);
    if cols == 0 || rows == 0 {
        return grid;
    }

    let states = match p.algorithm {
        Algorithm::Conway => 2,
        Algorithm::Cyclic => p.states,
    };
    match p.initial_state {
        InitialState::Random => {
            let mut rng = Pcg32::seed_from_u64(resolve_seed(p.seed));
            for cell in grid.cells.iter_mut() {
                *cell = match p.algorithm {
                    Algorithm::Conway => u8::from(rng.random::<f64>() < INITIAL_DENSITY),
                    Algorithm::Cyclic => rng.random_range(0..states),
                };
            }
        }
        InitialState::Centered => grid.set(cols / 2, rows / 2, 1),
    }

    let rule = p.rule();
    let threshold = rule.min_birth().unwrap_or(1).max(1);
    for _ in 0..p.generations {
        grid = match p.algorithm {
            Algorithm::Conway => grid.step_life(&rule),
            Algorithm::Cyclic => grid.step_cyclic(states, threshold),
        };
    }
    grid
}

/// Colour of a cell state: dead and live colours at the ends, cyclic
/// intermediate states blended between them.
pub fn state_color(params: &CellularAutomataParams, state: u8) -> Rgb {
    match params.algorithm {
        Algorithm::Conway => {
            if state != 0 {
                params.color_live
            } else {
                params.color_dead
            }
        }
        Algorithm::Cyclic => {
            let top = params.states.clamp(2, 16) - 1;
            params
                .color_dead
                .lerp(params.color_live, state as f64 / top as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_presets() {
        for (_, rule) in RULE_PRESETS {
            let parsed: Rule = rule.parse().unwrap();
            assert_eq!(parsed.to_string(), rule);
        }
        let hl: Rule = "b36/s23".parse().unwrap();
        assert!(hl.born(6) && hl.born(3) && !hl.born(2));
        assert!(hl.survives(2) && !hl.survives(6));
    }

    #[test]
    fn accepts_reversed_halves() {
        assert_eq!("S23/B3".parse::<Rule>().unwrap(), Rule::CONWAY);
    }

    #[test]
    fn malformed_rules_fall_back_to_conway() {
        for bad in ["", "B3S23", "B39/S23", "X3/S23", "B3/B3", "hello/world"] {
            assert!(bad.parse::<Rule>().is_err(), "{bad:?} should not parse");
            assert_eq!(Rule::parse_or_default(bad), Rule::CONWAY);
        }
    }

    #[test]
    fn blinker_oscillates() {
        let mut grid = CellGrid::new(5, 5);
        for x in 1..4 {
            grid.set(x, 2, 1);
        }
        let next = grid.step_life(&Rule::CONWAY);
        assert_eq!((1..4).map(|y| next.get(2, y)).collect::<Vec<_>>(), vec![1, 1, 1]);
        assert_eq!(next.get(1, 2), 0);
        assert_eq!(next.step_life(&Rule::CONWAY), grid);
    }

    #[test]
    fn neighbourhood_wraps_around() {
        let mut grid = CellGrid::new(4, 4);
        grid.set(0, 0, 1);
        grid.set(3, 3, 1);
        grid.set(0, 3, 1);
        assert_eq!(grid.count_neighbours(3, 0, |s| s != 0), 3);
    }

    #[test]
    fn cyclic_states_advance() {
        let mut grid = CellGrid::new(3, 3);
        grid.set(0, 0, 1);
        let next = grid.step_cyclic(3, 1);
        // Every state-0 cell touches the state-1 cell through the torus.
        assert!(next.cells().iter().all(|&s| s == 1 || s == 2));
        assert_eq!(next.get(0, 0), 1);
    }

    #[test]
    fn centered_seed_dies_under_conway() {
        let params = CellularAutomataParams {
            initial_state: InitialState::Centered,
            ..CellularAutomataParams::default()
        };
        let grid = generate(&params, 40, 40);
        assert_eq!((grid.cols(), grid.rows()), (10, 10));
        assert!(grid.cells().iter().all(|&s| s == 0));
    }

    #[test]
    fn seeded_random_start_is_reproducible() {
        let params = CellularAutomataParams {
            seed: Some(21),
            ..CellularAutomataParams::default()
        };
        assert_eq!(generate(&params, 64, 48), generate(&params, 64, 48));
    }

    #[test]
    fn cyclic_colors_span_dead_to_live() {
        let params = CellularAutomataParams {
            algorithm: Algorithm::Cyclic,
            ..CellularAutomataParams::default()
        };
        assert_eq!(state_color(&params, 0), params.color_dead);
        assert_eq!(state_color(&params, 3), params.color_live);
    }
}
