use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::attractor::{AttractorPoint, StrangeAttractorParams};
use crate::cellular_automata::CellularAutomataParams;
use crate::chaos_game::{self, ChaosGameParams};
use crate::circle_packing::{self, CirclePackingParams, PackedCircle};
use crate::error::CoreError;
use crate::escape_time::MandelbrotParams;
use crate::flow_field::{self, FlowFieldParams, FlowPath};
use crate::gradient::GradientState;
use crate::noise_field::NoiseFieldParams;
use crate::op_art::OpArtParams;
use crate::reaction_diffusion::ReactionDiffusionParams;
use crate::tessellation::{self, TessellationParams, Tile};
use crate::voronoi::{VoronoiCell, VoronoiDiagram, VoronoiParams};

/// A point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Reject rasters with a zero side.
pub fn check_dimensions(width: u32, height: u32) -> crate::Result<()> {
    if width == 0 || height == 0 {
        return Err(CoreError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// The explicit seed, or fresh entropy when there is none.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::rng().random())
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Gradient,
    NoiseField,
    Mandelbrot,
    StrangeAttractor,
    ReactionDiffusion,
    FlowField,
    ChaosGame,
    CirclePacking,
    CellularAutomata,
    Tessellation,
    Voronoi,
    OpArt,
}

/// How the orchestrator schedules a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPolicy {
    /// Cheap enough to render synchronously on every change.
    Inline,
    /// Debounced, then handed to the parallel dispatcher.
    Deferred,
}

impl Mode {
    pub const ALL: [Mode; 12] = [
        Self::Gradient,
        Self::NoiseField,
        Self::Mandelbrot,
        Self::StrangeAttractor,
        Self::ReactionDiffusion,
        Self::FlowField,
        Self::ChaosGame,
        Self::CirclePacking,
        Self::CellularAutomata,
        Self::Tessellation,
        Self::Voronoi,
        Self::OpArt,
    ];

    pub fn policy(self) -> RenderPolicy {
        match self {
            Self::Mandelbrot
            | Self::ReactionDiffusion
            | Self::FlowField
            | Self::CirclePacking
            | Self::Voronoi => RenderPolicy::Deferred,
            Self::Gradient
            | Self::NoiseField
            | Self::StrangeAttractor
            | Self::ChaosGame
            | Self::CellularAutomata
            | Self::Tessellation
            | Self::OpArt => RenderPolicy::Inline,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Gradient => "gradient",
            Self::NoiseField => "noise-field",
            Self::Mandelbrot => "mandelbrot",
            Self::StrangeAttractor => "strange-attractor",
            Self::ReactionDiffusion => "reaction-diffusion",
            Self::FlowField => "flow-field",
            Self::ChaosGame => "chaos-game",
            Self::CirclePacking => "circle-packing",
            Self::CellularAutomata => "cellular-automata",
            Self::Tessellation => "tessellation",
            Self::Voronoi => "voronoi",
            Self::OpArt => "op-art",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// A complete parameter set for one mode.
///
/// Values are replaced wholesale on every edit, never patched, so change
/// detection is plain `==`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Params {
    Gradient(GradientState),
    NoiseField(NoiseFieldParams),
    Mandelbrot(MandelbrotParams),
    StrangeAttractor(StrangeAttractorParams),
    ReactionDiffusion(ReactionDiffusionParams),
    FlowField(FlowFieldParams),
    ChaosGame(ChaosGameParams),
    CirclePacking(CirclePackingParams),
    CellularAutomata(CellularAutomataParams),
    Tessellation(TessellationParams),
    Voronoi(VoronoiParams),
    OpArt(OpArtParams),
}

impl Params {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Gradient(_) => Mode::Gradient,
            Self::NoiseField(_) => Mode::NoiseField,
            Self::Mandelbrot(_) => Mode::Mandelbrot,
            Self::StrangeAttractor(_) => Mode::StrangeAttractor,
            Self::ReactionDiffusion(_) => Mode::ReactionDiffusion,
            Self::FlowField(_) => Mode::FlowField,
            Self::ChaosGame(_) => Mode::ChaosGame,
            Self::CirclePacking(_) => Mode::CirclePacking,
            Self::CellularAutomata(_) => Mode::CellularAutomata,
            Self::Tessellation(_) => Mode::Tessellation,
            Self::Voronoi(_) => Mode::Voronoi,
            Self::OpArt(_) => Mode::OpArt,
        }
    }

    /// Default parameters for `mode`.
    pub fn default_for(mode: Mode) -> Self {
        match mode {
            Mode::Gradient => Self::Gradient(Default::default()),
            Mode::NoiseField => Self::NoiseField(Default::default()),
            Mode::Mandelbrot => Self::Mandelbrot(Default::default()),
            Mode::StrangeAttractor => Self::StrangeAttractor(Default::default()),
            Mode::ReactionDiffusion => Self::ReactionDiffusion(Default::default()),
            Mode::FlowField => Self::FlowField(Default::default()),
            Mode::ChaosGame => Self::ChaosGame(Default::default()),
            Mode::CirclePacking => Self::CirclePacking(Default::default()),
            Mode::CellularAutomata => Self::CellularAutomata(Default::default()),
            Mode::Tessellation => Self::Tessellation(Default::default()),
            Mode::Voronoi => Self::Voronoi(Default::default()),
            Mode::OpArt => Self::OpArt(Default::default()),
        }
    }

    pub fn sanitized(&self) -> Self {
        match self {
            Self::Gradient(p) => Self::Gradient(p.sanitized()),
            Self::NoiseField(p) => Self::NoiseField(p.sanitized()),
            Self::Mandelbrot(p) => Self::Mandelbrot(p.sanitized()),
            Self::StrangeAttractor(p) => Self::StrangeAttractor(p.sanitized()),
            Self::ReactionDiffusion(p) => Self::ReactionDiffusion(p.sanitized()),
            Self::FlowField(p) => Self::FlowField(p.sanitized()),
            Self::ChaosGame(p) => Self::ChaosGame(p.sanitized()),
            Self::CirclePacking(p) => Self::CirclePacking(p.sanitized()),
            Self::CellularAutomata(p) => Self::CellularAutomata(p.sanitized()),
            Self::Tessellation(p) => Self::Tessellation(p.sanitized()),
            Self::Voronoi(p) => Self::Voronoi(p.sanitized()),
            Self::OpArt(p) => Self::OpArt(p.sanitized()),
        }
    }
}

// ---------------------------------------------------------------------------
// Vector output
// ---------------------------------------------------------------------------

/// Drawing records produced alongside (or instead of) per-pixel shading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "kebab-case")]
pub enum Geometry {
    Attractor(Vec<AttractorPoint>),
    Points(Vec<Point>),
    Paths(Vec<FlowPath>),
    Circles(Vec<PackedCircle>),
    Tiles(Vec<Tile>),
    Cells(Vec<VoronoiCell>),
}

impl Geometry {
    pub fn len(&self) -> usize {
        match self {
            Self::Attractor(v) => v.len(),
            Self::Points(v) => v.len(),
            Self::Paths(v) => v.len(),
            Self::Circles(v) => v.len(),
            Self::Tiles(v) => v.len(),
            Self::Cells(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The vector records for `params` at this raster size, if the mode has any.
pub fn generate_geometry(params: &Params, width: u32, height: u32) -> Option<Geometry> {
    match params {
        Params::StrangeAttractor(p) => Some(Geometry::Attractor(p.points())),
        Params::ChaosGame(p) => Some(Geometry::Points(chaos_game::generate_points(p, width, height))),
        Params::FlowField(p) => Some(Geometry::Paths(flow_field::generate_paths(p, width, height))),
        Params::CirclePacking(p) => Some(Geometry::Circles(circle_packing::pack(p, width, height))),
        Params::Tessellation(p) => Some(Geometry::Tiles(tessellation::generate(p, width, height))),
        Params::Voronoi(p) => Some(Geometry::Cells(
            VoronoiDiagram::new(p, width, height).cells().to_vec(),
        )),
        Params::Gradient(_)
        | Params::NoiseField(_)
        | Params::Mandelbrot(_)
        | Params::ReactionDiffusion(_)
        | Params::CellularAutomata(_)
        | Params::OpArt(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_rasters_are_rejected() {
        assert!(check_dimensions(10, 10).is_ok());
        assert_eq!(
            check_dimensions(0, 10),
            Err(CoreError::InvalidDimensions { width: 0, height: 10 })
        );
    }

    #[test]
    fn policy_split() {
        let deferred: Vec<Mode> = Mode::ALL
            .into_iter()
            .filter(|m| m.policy() == RenderPolicy::Deferred)
            .collect();
        assert_eq!(
            deferred,
            vec![
                Mode::Mandelbrot,
                Mode::ReactionDiffusion,
                Mode::FlowField,
                Mode::CirclePacking,
                Mode::Voronoi
            ]
        );
    }

    #[test]
    fn default_params_report_their_mode() {
        for mode in Mode::ALL {
            assert_eq!(Params::default_for(mode).mode(), mode);
        }
    }

    #[test]
    fn mode_names_match_serde_tags() {
        for mode in Mode::ALL {
            let json = serde_json::to_value(mode).unwrap();
            assert_eq!(json, mode.name());
        }
    }

    #[test]
    fn only_vector_modes_have_geometry() {
        let vector = [
            Mode::StrangeAttractor,
            Mode::ChaosGame,
            Mode::FlowField,
            Mode::CirclePacking,
            Mode::Tessellation,
            Mode::Voronoi,
        ];
        for mode in Mode::ALL {
            let g = generate_geometry(&Params::default_for(mode), 64, 64);
            assert_eq!(g.is_some(), vector.contains(&mode), "{mode}");
        }
    }
}
