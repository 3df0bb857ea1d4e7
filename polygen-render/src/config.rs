use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use polygen_core::Mode;

/// Fewest workers a parallel pool is built with.
pub const MIN_WORKERS: usize = 2;

// ---------------------------------------------------------------------------
// Studio configuration
// ---------------------------------------------------------------------------

/// Tuning for the dispatcher and the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Worker threads. 0 uses the available hardware parallelism.
    #[serde(default)]
    pub workers: usize,
    /// Row bands per dispatch. 0 uses one band per worker.
    #[serde(default)]
    pub band_count: usize,
    /// Quiet period before a deferred render is dispatched.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_fractal_timeout_ms")]
    pub fractal_timeout_ms: u64,
    #[serde(default = "default_simulation_timeout_ms")]
    pub simulation_timeout_ms: u64,
    /// Timeout for every other mode (flow field, circle packing, voronoi, ...).
    #[serde(default = "default_vector_timeout_ms")]
    pub vector_timeout_ms: u64,
    /// Screen pixels per reaction-diffusion cell.
    #[serde(default = "default_reaction_diffusion_scale")]
    pub reaction_diffusion_scale: u32,
}

fn default_debounce_ms() -> u64 {
    150
}
fn default_fractal_timeout_ms() -> u64 {
    10_000
}
fn default_simulation_timeout_ms() -> u64 {
    20_000
}
fn default_vector_timeout_ms() -> u64 {
    15_000
}
fn default_reaction_diffusion_scale() -> u32 {
    polygen_core::reaction_diffusion::DEFAULT_SCALE
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            band_count: 0,
            debounce_ms: default_debounce_ms(),
            fractal_timeout_ms: default_fractal_timeout_ms(),
            simulation_timeout_ms: default_simulation_timeout_ms(),
            vector_timeout_ms: default_vector_timeout_ms(),
            reaction_diffusion_scale: default_reaction_diffusion_scale(),
        }
    }
}

impl StudioConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config.validated())
    }

    /// Like [`load`](Self::load), falling back to defaults on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!("No studio config at {}", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded studio config from {}", path.display());
                config
            }
            Err(e) => {
                error!("Failed to load studio config: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("Saved studio config to {}", path.display());
        Ok(())
    }

    /// Clamp every field into its working range.
    pub fn validated(mut self) -> Self {
        self.workers = self.workers.min(256);
        self.band_count = self.band_count.min(1024);
        self.debounce_ms = self.debounce_ms.min(5_000);
        self.fractal_timeout_ms = self.fractal_timeout_ms.max(1);
        self.simulation_timeout_ms = self.simulation_timeout_ms.max(1);
        self.vector_timeout_ms = self.vector_timeout_ms.max(1);
        self.reaction_diffusion_scale = self.reaction_diffusion_scale.clamp(1, 32);
        self
    }

    /// Resolved pool size, never below [`MIN_WORKERS`].
    pub fn worker_count(&self) -> usize {
        let n = if self.workers == 0 {
            std::thread::available_parallelism().map_or(MIN_WORKERS, |n| n.get())
        } else {
            self.workers
        };
        n.max(MIN_WORKERS)
    }

    /// Resolved bands per dispatch.
    pub fn bands(&self) -> usize {
        if self.band_count == 0 {
            self.worker_count()
        } else {
            self.band_count
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Overall time budget for one dispatch of `mode`.
    pub fn timeout_for(&self, mode: Mode) -> Duration {
        let ms = match mode {
            Mode::Mandelbrot => self.fractal_timeout_ms,
            Mode::ReactionDiffusion => self.simulation_timeout_ms,
            _ => self.vector_timeout_ms,
        };
        Duration::from_millis(ms)
    }
}
