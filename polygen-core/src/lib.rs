pub mod attractor;
pub mod cellular_automata;
pub mod chaos_game;
pub mod circle_packing;
pub mod color;
pub mod complex;
pub mod error;
pub mod escape_time;
pub mod flow_field;
pub mod gradient;
pub mod mode;
pub mod noise;
pub mod noise_field;
pub mod op_art;
pub mod reaction_diffusion;
pub mod tessellation;
pub mod voronoi;

// Re-export primary types for convenience.
pub use attractor::{generate_points, AttractorKind, AttractorPoint, StrangeAttractorParams, Vec3};
pub use cellular_automata::{CellGrid, CellularAutomataParams, Rule};
pub use chaos_game::ChaosGameParams;
pub use circle_packing::{CirclePackingParams, PackedCircle};
pub use color::{interpolate, interpolate_rgba, ColorStop, Palette, Rgb};
pub use complex::Complex;
pub use error::CoreError;
pub use escape_time::{dynamic_iterations, EscapeTime, MandelbrotParams, ZoomTour};
pub use flow_field::{FlowFieldParams, FlowPath};
pub use gradient::{GradientShader, GradientState, Template, TEMPLATES};
pub use mode::{check_dimensions, generate_geometry, Geometry, Mode, Params, Point, RenderPolicy};
pub use noise::Perlin;
pub use noise_field::{NoiseFieldParams, NoiseFieldShader};
pub use op_art::{OpArtParams, OpArtShader};
pub use reaction_diffusion::{GrayScott, Preset, ReactionDiffusionParams};
pub use tessellation::{TessellationParams, Tile};
pub use voronoi::{VoronoiCell, VoronoiDiagram, VoronoiParams};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
