use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use polygen_core::reaction_diffusion::DEFAULT_SCALE;
use polygen_core::{check_dimensions, Geometry, GrayScott, Mode, Params};

use crate::buffer::RenderBuffer;
use crate::dispatch::Dispatcher;
use crate::error::RenderError;
use crate::escape::EscapeTimeTask;
use crate::shading::{CellularTask, GradientTask, NoiseFieldTask, OpArtTask};
use crate::simulation::{step_sequential, GrayScottTask};
use crate::task::RasterTask;
use crate::vector::VectorTask;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Tracks the current render generation for cancellation and progress.
///
/// Incrementing the generation signals every in-flight band to stop early.
/// The progress counters count completed bands.
#[derive(Debug)]
pub struct RenderCancel {
    generation: AtomicU64,
    progress_done: AtomicUsize,
    progress_total: AtomicUsize,
}

impl RenderCancel {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            progress_done: AtomicUsize::new(0),
            progress_total: AtomicUsize::new(0),
        }
    }

    /// Cancel the current render by advancing the generation.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Reset progress for a new phase with `total` work units.
    pub fn reset_progress(&self, total: usize) {
        self.progress_total.store(total, Ordering::Relaxed);
        self.progress_done.store(0, Ordering::Relaxed);
    }

    pub fn inc_progress(&self) {
        self.progress_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current progress as `(done, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.progress_done.load(Ordering::Relaxed),
            self.progress_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for RenderCancel {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of one or more [`RenderCancel`] generations.
///
/// The token reports cancellation as soon as any watched generation moves
/// past the value it had when the token was created. Progress is reported
/// to the first watch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    watches: Vec<(Arc<RenderCancel>, u64)>,
}

impl CancelToken {
    pub fn new(cancel: &Arc<RenderCancel>) -> Self {
        Self {
            watches: vec![(Arc::clone(cancel), cancel.generation())],
        }
    }

    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self::default()
    }

    /// This token, additionally watching `other`.
    pub fn and(&self, other: &Arc<RenderCancel>) -> Self {
        let mut watches = self.watches.clone();
        watches.push((Arc::clone(other), other.generation()));
        Self { watches }
    }

    pub fn is_cancelled(&self) -> bool {
        self.watches
            .iter()
            .any(|(cancel, generation)| cancel.generation() != *generation)
    }

    /// `Err(Cancelled)` once any watched generation has moved.
    #[inline]
    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn reset_progress(&self, total: usize) {
        if let Some((cancel, _)) = self.watches.first() {
            cancel.reset_progress(total);
        }
    }

    pub fn inc_progress(&self) {
        if let Some((cancel, _)) = self.watches.first() {
            cancel.inc_progress();
        }
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// How a frame's pixels were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    /// Rendered on the calling thread as a single band.
    SingleThreaded,
    /// Rendered as bands on the worker pool.
    Parallel,
    /// The worker pool timed out or failed; re-rendered on the calling thread.
    Fallback,
}

/// A finished render.
#[derive(Debug, Clone)]
pub struct Frame {
    pub mode: Mode,
    pub buffer: RenderBuffer,
    /// Vector records for modes that produce them.
    pub geometry: Option<Geometry>,
    pub elapsed: Duration,
    pub path: ExecutionPath,
}

/// A raster task with its geometry already generated.
#[derive(Clone)]
pub struct Prepared {
    pub task: Arc<dyn RasterTask>,
    pub geometry: Option<Geometry>,
}

/// Build the raster task for `params`.
///
/// Stochastic geometry is generated here, once, so the raster and the
/// returned geometry always agree. Reaction-diffusion starts a fresh
/// session and runs one frame's worth of steps; callers that keep a
/// session across frames snapshot it themselves.
pub fn prepare(params: &Params, width: u32, height: u32) -> crate::Result<Prepared> {
    prepare_with(params, width, height, &CancelToken::never())
}

/// [`prepare`], stopping with [`RenderError::Cancelled`] once `cancel` fires.
pub fn prepare_with(
    params: &Params,
    width: u32,
    height: u32,
    cancel: &CancelToken,
) -> crate::Result<Prepared> {
    check_dimensions(width, height)?;
    let raster = |task: Arc<dyn RasterTask>| Prepared {
        task,
        geometry: None,
    };
    let prepared = match params {
        Params::Gradient(p) => raster(Arc::new(GradientTask::new(p, width, height))),
        Params::NoiseField(p) => raster(Arc::new(NoiseFieldTask::new(p, width, height))),
        Params::OpArt(p) => raster(Arc::new(OpArtTask::new(p, width, height))),
        Params::CellularAutomata(p) => raster(Arc::new(CellularTask::new(p, width, height))),
        Params::Mandelbrot(p) => raster(Arc::new(EscapeTimeTask::new(p, width, height))),
        Params::ReactionDiffusion(p) => {
            let mut sim = GrayScott::for_raster(p, width, height, DEFAULT_SCALE);
            let steps = sim.params().iterations_per_frame();
            step_sequential(&mut sim, steps, cancel)?;
            raster(Arc::new(GrayScottTask::snapshot(
                &sim,
                DEFAULT_SCALE,
                width,
                height,
            )))
        }
        Params::StrangeAttractor(_)
        | Params::ChaosGame(_)
        | Params::FlowField(_)
        | Params::CirclePacking(_)
        | Params::Tessellation(_)
        | Params::Voronoi(_) => {
            let (task, geometry) = VectorTask::new(params, width, height, cancel)?
                .ok_or(RenderError::Unavailable)?;
            Prepared {
                task: Arc::new(task),
                geometry: Some(geometry),
            }
        }
    };
    Ok(prepared)
}

/// Render `params` synchronously on the calling thread.
pub fn render(params: &Params, width: u32, height: u32) -> crate::Result<Frame> {
    check_dimensions(width, height)?;
    let start = Instant::now();
    let mode = params.mode();
    debug!(mode = mode.name(), width, height, "Starting render");

    let prepared = prepare(params, width, height)?;

    let dispatched = Dispatcher::single_threaded().dispatch(prepared.task, 1)?;
    let elapsed = start.elapsed();
    info!(
        mode = mode.name(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Render complete"
    );
    Ok(Frame {
        mode,
        buffer: dispatched.buffer,
        geometry: prepared.geometry,
        elapsed,
        path: ExecutionPath::SingleThreaded,
    })
}
