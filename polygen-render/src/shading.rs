//! Per-pixel tasks for the cheap, purely functional modes.

use polygen_core::cellular_automata::{self, CELL_SIZE};
use polygen_core::{
    CellGrid, CellularAutomataParams, GradientShader, GradientState, Mode, NoiseFieldParams,
    NoiseFieldShader, OpArtParams, OpArtShader,
};

use crate::band::Band;
use crate::renderer::CancelToken;
use crate::task::{shade_rows, RasterTask};

// ---------------------------------------------------------------------------
// Gradient
// ---------------------------------------------------------------------------

pub struct GradientTask {
    shader: GradientShader,
    width: u32,
    height: u32,
}

impl GradientTask {
    pub fn new(state: &GradientState, width: u32, height: u32) -> Self {
        Self {
            shader: GradientShader::new(state, width, height),
            width,
            height,
        }
    }
}

impl RasterTask for GradientTask {
    fn mode(&self) -> Mode {
        Mode::Gradient
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn render_rows(&self, band: &Band, out: &mut [u8], cancel: &CancelToken) -> crate::Result<()> {
        shade_rows(band, out, cancel, |x, y| self.shader.pixel(x, y))
    }
}

// ---------------------------------------------------------------------------
// Noise field
// ---------------------------------------------------------------------------

pub struct NoiseFieldTask {
    shader: NoiseFieldShader,
    width: u32,
    height: u32,
}

impl NoiseFieldTask {
    pub fn new(params: &NoiseFieldParams, width: u32, height: u32) -> Self {
        Self {
            shader: NoiseFieldShader::new(params, width, height),
            width,
            height,
        }
    }
}

impl RasterTask for NoiseFieldTask {
    fn mode(&self) -> Mode {
        Mode::NoiseField
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn render_rows(&self, band: &Band, out: &mut [u8], cancel: &CancelToken) -> crate::Result<()> {
        shade_rows(band, out, cancel, |x, y| self.shader.pixel(x, y))
    }
}

// ---------------------------------------------------------------------------
// Op-art
// ---------------------------------------------------------------------------

pub struct OpArtTask {
    shader: OpArtShader,
    width: u32,
    height: u32,
}

impl OpArtTask {
    pub fn new(params: &OpArtParams, width: u32, height: u32) -> Self {
        Self {
            shader: OpArtShader::new(params, width, height),
            width,
            height,
        }
    }
}

impl RasterTask for OpArtTask {
    fn mode(&self) -> Mode {
        Mode::OpArt
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn render_rows(&self, band: &Band, out: &mut [u8], cancel: &CancelToken) -> crate::Result<()> {
        shade_rows(band, out, cancel, |x, y| self.shader.pixel(x, y))
    }
}

// ---------------------------------------------------------------------------
// Cellular automata
// ---------------------------------------------------------------------------

/// An evolved automaton grid, drawn as [`CELL_SIZE`] pixel blocks. Pixels
/// past the last whole cell take the dead colour.
pub struct CellularTask {
    params: CellularAutomataParams,
    grid: CellGrid,
    width: u32,
    height: u32,
}

impl CellularTask {
    pub fn new(params: &CellularAutomataParams, width: u32, height: u32) -> Self {
        let params = params.sanitized();
        Self {
            grid: cellular_automata::generate(&params, width, height),
            params,
            width,
            height,
        }
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }
}

impl RasterTask for CellularTask {
    fn mode(&self) -> Mode {
        Mode::CellularAutomata
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn render_rows(&self, band: &Band, out: &mut [u8], cancel: &CancelToken) -> crate::Result<()> {
        let dead = self.params.color_dead.to_rgba(255);
        let palette: Vec<[u8; 4]> = (0..=u8::MAX)
            .take(self.params.states.max(2) as usize)
            .map(|s| cellular_automata::state_color(&self.params, s).to_rgba(255))
            .collect();
        shade_rows(band, out, cancel, |x, y| {
            let (col, row) = ((x / CELL_SIZE) as usize, (y / CELL_SIZE) as usize);
            if col >= self.grid.cols() || row >= self.grid.rows() {
                return dead;
            }
            palette
                .get(self.grid.get(col, row) as usize)
                .copied()
                .unwrap_or(dead)
        })
    }
}
