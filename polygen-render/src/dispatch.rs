//! The parallel dispatch layer.
//!
//! A [`Dispatcher`] splits a [`RasterTask`] into row bands, renders them on a
//! rayon pool and assembles the results. If the pool is missing, a band
//! fails, or the join overruns its deadline, the whole task is re-rendered
//! as one band on the calling thread. Tasks draw in global coordinates, so
//! both paths give the same bytes.
//!
//! Work that cannot be split into bands, geometry generation and simulation
//! steps, runs as a single unit on the pool under the same deadline.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use polygen_core::{GrayScott, Mode, Params};

use crate::band::{split_rows, Band};
use crate::buffer::RenderBuffer;
use crate::config::StudioConfig;
use crate::error::RenderError;
use crate::renderer::{prepare_with, CancelToken, ExecutionPath, Prepared, RenderCancel};
use crate::simulation::{step_parallel, step_sequential};
use crate::task::RasterTask;

/// The assembled output of one dispatch.
#[derive(Debug)]
pub struct Dispatched {
    pub buffer: RenderBuffer,
    /// Bands actually rendered (1 on the single-threaded paths).
    pub bands: usize,
    pub path: ExecutionPath,
    pub elapsed: Duration,
}

pub struct Dispatcher {
    pool: Option<Arc<ThreadPool>>,
    config: StudioConfig,
}

impl Dispatcher {
    /// Build a pool of `config.worker_count()` threads. If the pool cannot be
    /// created the dispatcher runs everything single-threaded.
    pub fn new(config: &StudioConfig) -> Self {
        let workers = config.worker_count();
        let pool = match ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("polygen-worker-{i}"))
            .build()
        {
            Ok(pool) => {
                info!(workers, "Worker pool ready");
                Some(Arc::new(pool))
            }
            Err(e) => {
                warn!("Failed to build worker pool, rendering single-threaded: {e}");
                None
            }
        };
        Self {
            pool,
            config: config.clone(),
        }
    }

    /// A dispatcher with no pool: every dispatch runs on the calling thread.
    pub fn single_threaded() -> Self {
        Self {
            pool: None,
            config: StudioConfig::default(),
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn dispatch(&self, task: Arc<dyn RasterTask>, region_count: usize) -> crate::Result<Dispatched> {
        self.dispatch_with(task, region_count, &CancelToken::never())
    }

    /// Render `task` as `region_count` bands.
    ///
    /// Progress is reported to `cancel` one band at a time. Cancellation is
    /// returned as an error and never triggers the fallback.
    pub fn dispatch_with(
        &self,
        task: Arc<dyn RasterTask>,
        region_count: usize,
        cancel: &CancelToken,
    ) -> crate::Result<Dispatched> {
        let (width, height) = (task.width(), task.height());
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        let start = Instant::now();

        let parallel = match &self.pool {
            Some(pool) => {
                let bands = split_rows(width, height, region_count);
                self.run_parallel(pool, &task, &bands, cancel)
                    .map(|buffer| (buffer, bands.len()))
            }
            None => Err(RenderError::Unavailable),
        };

        let (buffer, bands, path) = match parallel {
            Ok((buffer, bands)) => (buffer, bands, ExecutionPath::Parallel),
            Err(e) if e.wants_fallback() => {
                let path = if matches!(e, RenderError::Unavailable) {
                    debug!(mode = task.mode().name(), "No worker pool, rendering inline");
                    ExecutionPath::SingleThreaded
                } else {
                    warn!(mode = task.mode().name(), "Parallel render failed, falling back: {e}");
                    ExecutionPath::Fallback
                };
                (run_single(task.as_ref(), cancel)?, 1, path)
            }
            Err(e) => return Err(e),
        };

        let elapsed = start.elapsed();
        debug!(
            mode = task.mode().name(),
            bands,
            ?path,
            elapsed_ms = elapsed.as_millis() as u64,
            "Dispatch complete"
        );
        Ok(Dispatched {
            buffer,
            bands,
            path,
            elapsed,
        })
    }

    fn run_parallel(
        &self,
        pool: &ThreadPool,
        task: &Arc<dyn RasterTask>,
        bands: &[Band],
        cancel: &CancelToken,
    ) -> crate::Result<RenderBuffer> {
        // Stops the bands that are still running once the join gives up.
        let abort = Arc::new(RenderCancel::new());
        let token = cancel.and(&abort);
        cancel.reset_progress(bands.len());

        let (tx, rx) = mpsc::channel();
        for &band in bands {
            let tx = tx.clone();
            let task = Arc::clone(task);
            let token = token.clone();
            pool.spawn(move || {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    let mut pixels = vec![0u8; band.byte_len()];
                    task.render_rows(&band, &mut pixels, &token).map(|()| pixels)
                }))
                .unwrap_or_else(|payload| Err(RenderError::WorkerFailed(panic_message(&*payload))));
                let _ = tx.send((band, result));
            });
        }
        drop(tx);

        let timeout = self.config.timeout_for(task.mode());
        let deadline = Instant::now() + timeout;
        let mut buffer = RenderBuffer::new(task.width(), task.height());
        let mut done = vec![false; bands.len()];
        let mut remaining = bands.len();

        while remaining > 0 {
            let wait = deadline.saturating_duration_since(Instant::now());
            let received = rx.recv_timeout(wait);
            let (band, pixels) = match received {
                Ok((band, Ok(pixels))) => (band, pixels),
                Ok((_, Err(e))) => {
                    abort.cancel();
                    return Err(e);
                }
                Err(RecvTimeoutError::Timeout) => {
                    abort.cancel();
                    let band = done.iter().position(|d| !d).unwrap_or(0);
                    return Err(RenderError::TimedOut { band, timeout });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    abort.cancel();
                    return Err(RenderError::WorkerFailed(
                        "worker dropped its result".to_string(),
                    ));
                }
            };
            buffer.blit_band(&band, &pixels);
            if let Some(d) = done.get_mut(band.index) {
                *d = true;
            }
            cancel.inc_progress();
            remaining -= 1;
        }
        Ok(buffer)
    }

    /// Build the raster task for `params` as one unit on the pool.
    ///
    /// Geometry generation for flow fields and circle packing can dominate a
    /// render, so it gets the same deadline and fallback as a band: on
    /// timeout or failure the worker is told to stop and the preparation is
    /// redone on the calling thread, where `cancel` still applies.
    pub fn prepare(
        &self,
        params: &Params,
        width: u32,
        height: u32,
        cancel: &CancelToken,
    ) -> crate::Result<(Prepared, ExecutionPath)> {
        let Some(pool) = &self.pool else {
            let prepared = prepare_with(params, width, height, cancel)?;
            return Ok((prepared, ExecutionPath::SingleThreaded));
        };

        let owned = params.clone();
        let unit = move |token: &CancelToken| prepare_with(&owned, width, height, token);
        let failure = match self.run_unit(pool, params.mode(), cancel, unit) {
            Ok(prepared) => return Ok((prepared, ExecutionPath::Parallel)),
            Err(e) if e.wants_fallback() => e,
            Err(e) => return Err(e),
        };

        warn!(mode = params.mode().name(), "Parallel preparation failed, falling back: {failure}");
        let prepared = prepare_with(params, width, height, cancel)?;
        Ok((prepared, ExecutionPath::Fallback))
    }

    /// Advance a reaction-diffusion session by `steps`.
    ///
    /// The steps run on a copy inside the pool with rows filled in parallel.
    /// The copy replaces `sim` only if it finishes in time; otherwise the
    /// untouched `sim` is stepped on the calling thread.
    pub fn step_simulation(
        &self,
        sim: &mut GrayScott,
        steps: u32,
        cancel: &CancelToken,
    ) -> crate::Result<ExecutionPath> {
        let Some(pool) = &self.pool else {
            step_sequential(sim, steps, cancel)?;
            return Ok(ExecutionPath::SingleThreaded);
        };

        let mut work = sim.clone();
        let unit = move |token: &CancelToken| step_parallel(&mut work, steps, token).map(|()| work);
        let failure = match self.run_unit(pool, Mode::ReactionDiffusion, cancel, unit) {
            Ok(next) => {
                *sim = next;
                return Ok(ExecutionPath::Parallel);
            }
            Err(e) if e.wants_fallback() => e,
            Err(e) => return Err(e),
        };

        warn!(steps, "Parallel simulation failed, falling back: {failure}");
        step_sequential(sim, steps, cancel)?;
        Ok(ExecutionPath::Fallback)
    }

    /// Run `unit` on the pool and wait for it no longer than the timeout for
    /// `mode`. On timeout the unit is cancelled and abandoned.
    fn run_unit<T, F>(
        &self,
        pool: &ThreadPool,
        mode: Mode,
        cancel: &CancelToken,
        unit: F,
    ) -> crate::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> crate::Result<T> + Send + 'static,
    {
        let abort = Arc::new(RenderCancel::new());
        let token = cancel.and(&abort);
        let (tx, rx) = mpsc::channel();
        pool.spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(move || unit(&token)))
                .unwrap_or_else(|payload| Err(RenderError::WorkerFailed(panic_message(&*payload))));
            let _ = tx.send(result);
        });

        let timeout = self.config.timeout_for(mode);
        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                abort.cancel();
                Err(RenderError::TimedOut { band: 0, timeout })
            }
            Err(RecvTimeoutError::Disconnected) => Err(RenderError::WorkerFailed(
                "worker dropped its result".to_string(),
            )),
        }
    }
}

/// Render the whole task as one band on the calling thread.
fn run_single(task: &dyn RasterTask, cancel: &CancelToken) -> crate::Result<RenderBuffer> {
    let band = Band::full(task.width(), task.height());
    cancel.reset_progress(1);
    let mut pixels = vec![0u8; band.byte_len()];
    task.render_rows(&band, &mut pixels, cancel)?;
    cancel.inc_progress();
    RenderBuffer::from_pixels(band.width, band.rows(), pixels)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polygen_core::{GradientState, MandelbrotParams, ReactionDiffusionParams};
    use polygen_core::reaction_diffusion::Preset;

    use crate::escape::EscapeTimeTask;
    use crate::shading::GradientTask;

    fn pool_config() -> StudioConfig {
        StudioConfig {
            workers: 3,
            ..StudioConfig::default()
        }
    }

    #[test]
    fn parallel_and_single_threaded_agree() {
        let task: Arc<dyn RasterTask> =
            Arc::new(EscapeTimeTask::new(&MandelbrotParams::default(), 90, 61));
        let parallel = Dispatcher::new(&pool_config())
            .dispatch(Arc::clone(&task), 7)
            .unwrap();
        let single = Dispatcher::single_threaded().dispatch(task, 7).unwrap();
        assert_eq!(parallel.path, ExecutionPath::Parallel);
        assert_eq!(parallel.bands, 7);
        assert_eq!(single.path, ExecutionPath::SingleThreaded);
        assert_eq!(single.bands, 1);
        assert_eq!(parallel.buffer, single.buffer);
    }

    #[test]
    fn progress_counts_bands() {
        let cancel = Arc::new(RenderCancel::new());
        let task: Arc<dyn RasterTask> = Arc::new(GradientTask::new(&GradientState::default(), 20, 20));
        Dispatcher::new(&pool_config())
            .dispatch_with(task, 4, &CancelToken::new(&cancel))
            .unwrap();
        assert_eq!(cancel.progress(), (4, 4));
    }

    #[test]
    fn cancellation_is_not_retried() {
        let cancel = Arc::new(RenderCancel::new());
        let token = CancelToken::new(&cancel);
        cancel.cancel();
        let task: Arc<dyn RasterTask> = Arc::new(GradientTask::new(&GradientState::default(), 20, 20));
        let err = Dispatcher::new(&pool_config())
            .dispatch_with(task, 4, &token)
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn simulation_paths_agree() {
        let params = ReactionDiffusionParams::for_preset(Preset::Stripes);
        let mut a = GrayScott::new(&params, 30, 20);
        let mut b = a.clone();
        let path = Dispatcher::new(&pool_config())
            .step_simulation(&mut a, 20, &CancelToken::never())
            .unwrap();
        let single = Dispatcher::single_threaded()
            .step_simulation(&mut b, 20, &CancelToken::never())
            .unwrap();
        assert_eq!(path, ExecutionPath::Parallel);
        assert_eq!(single, ExecutionPath::SingleThreaded);
        assert_eq!(a.u(), b.u());
        assert_eq!(a.v(), b.v());
    }

    #[test]
    fn panic_messages_are_kept() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
    }
}
