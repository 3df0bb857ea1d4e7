//! The render orchestrator.
//!
//! Cheap modes render synchronously inside [`Orchestrator::submit`]. The
//! expensive ones go to a background thread that waits for a quiet period,
//! keeps only the newest request, and hands it to the [`Dispatcher`].
//!
//! Every submission takes the next value of a monotonic render id. A newer
//! submission never interrupts work already dispatched; the older result is
//! simply refused when it arrives, so only the newest frame is ever
//! composited.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, info};

use polygen_core::{check_dimensions, GrayScott, Params, RenderPolicy};

use crate::config::StudioConfig;
use crate::dispatch::Dispatcher;
use crate::error::RenderError;
use crate::renderer::{render, CancelToken, ExecutionPath, Frame, RenderCancel};
use crate::simulation::GrayScottTask;
use crate::task::RasterTask;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    /// Waiting out the debounce interval.
    Scheduled,
    /// Rendering, inline or on the dispatcher.
    Dispatched,
    /// The newest frame is on the surface.
    Composited,
}

impl RenderPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Scheduled => "Scheduled\u{2026}",
            Self::Dispatched => "Rendering\u{2026}",
            Self::Composited => "Done",
        }
    }
}

/// The phase of the newest submission. Updates for older ids are ignored.
#[derive(Debug)]
struct PhaseState {
    id: u64,
    phase: RenderPhase,
}

#[derive(Debug, Clone)]
struct SharedPhase(Arc<Mutex<PhaseState>>);

impl SharedPhase {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(PhaseState {
            id: 0,
            phase: RenderPhase::Idle,
        })))
    }

    fn get(&self) -> RenderPhase {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).phase
    }

    /// Start tracking submission `id`.
    fn begin(&self, id: u64, phase: RenderPhase) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if id >= state.id {
            *state = PhaseState { id, phase };
        }
    }

    fn set(&self, id: u64, phase: RenderPhase) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if state.id == id {
            state.phase = phase;
        }
    }

    fn settle(&self) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if state.phase == RenderPhase::Composited {
            state.phase = RenderPhase::Idle;
        }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

type Reply = crate::Result<Arc<Frame>>;

/// One submitted render. Resolves exactly once.
pub struct RenderHandle {
    id: u64,
    rx: mpsc::Receiver<Reply>,
    cancel: Arc<RenderCancel>,
}

impl RenderHandle {
    fn resolved(id: u64, cancel: Arc<RenderCancel>, result: Reply) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(result);
        Self { id, rx, cancel }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the render finishes.
    ///
    /// A render overtaken by a newer submission resolves to
    /// [`RenderError::Superseded`]; check [`RenderError::is_cancelled`] to
    /// tell that apart from a failure.
    pub fn wait(self) -> crate::Result<Arc<Frame>> {
        self.rx.recv().unwrap_or(Err(RenderError::Cancelled))
    }

    /// Stop this render at its next row boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Completed and total work units, as `(done, total)`.
    pub fn progress(&self) -> (usize, usize) {
        self.cancel.progress()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

struct Job {
    id: u64,
    params: Params,
    width: u32,
    height: u32,
    token: CancelToken,
    reply: mpsc::Sender<Reply>,
}

impl Job {
    fn supersede(self, latest: u64) {
        debug!(id = self.id, latest, "Render superseded before dispatch");
        let _ = self.reply.send(Err(RenderError::Superseded {
            id: self.id,
            latest,
        }));
    }
}

pub struct Orchestrator {
    tx_jobs: Option<mpsc::Sender<Job>>,
    rx_done: mpsc::Receiver<(u64, Arc<Frame>)>,
    latest: Arc<AtomicU64>,
    phase: SharedPhase,
    /// Cancels every render submitted so far.
    cancel_all: Arc<RenderCancel>,
    surface: Option<(u64, Arc<Frame>)>,
    last_submitted: Option<(Params, u32, u32)>,
    worker: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Start the background render thread with its own worker pool.
    pub fn new(config: StudioConfig) -> crate::Result<Self> {
        let (tx_jobs, rx_jobs) = mpsc::channel();
        let (tx_done, rx_done) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(0));
        let phase = SharedPhase::new();

        let worker = {
            let latest = Arc::clone(&latest);
            let phase = phase.clone();
            thread::Builder::new()
                .name("polygen-render".to_string())
                .spawn(move || render_worker(config, rx_jobs, tx_done, latest, phase))?
        };

        Ok(Self {
            tx_jobs: Some(tx_jobs),
            rx_done,
            latest,
            phase,
            cancel_all: Arc::new(RenderCancel::new()),
            surface: None,
            last_submitted: None,
            worker: Some(worker),
        })
    }

    /// Submit a full parameter set for rendering.
    ///
    /// Inline modes are rendered and composited before this returns.
    /// Deferred modes are scheduled; their frame reaches the surface through
    /// [`poll`](Self::poll).
    pub fn submit(&mut self, params: Params, width: u32, height: u32) -> RenderHandle {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = Arc::new(RenderCancel::new());
        let token = CancelToken::new(&cancel).and(&self.cancel_all);
        self.last_submitted = Some((params.clone(), width, height));
        let mode = params.mode();
        debug!(id, mode = mode.name(), width, height, "Render requested");

        match mode.policy() {
            RenderPolicy::Inline => {
                self.phase.begin(id, RenderPhase::Dispatched);
                let result = render(&params, width, height).map(Arc::new);
                match &result {
                    Ok(frame) => self.composite(id, Arc::clone(frame)),
                    Err(_) => self.phase.set(id, RenderPhase::Idle),
                }
                RenderHandle::resolved(id, cancel, result)
            }
            RenderPolicy::Deferred => {
                self.phase.begin(id, RenderPhase::Scheduled);
                let (reply, rx) = mpsc::channel();
                let job = Job {
                    id,
                    params,
                    width,
                    height,
                    token,
                    reply,
                };
                let sent = match &self.tx_jobs {
                    Some(tx) => tx.send(job).map_err(|mpsc::SendError(job)| job),
                    None => Err(job),
                };
                if let Err(job) = sent {
                    self.phase.set(id, RenderPhase::Idle);
                    let _ = job.reply.send(Err(RenderError::Unavailable));
                }
                RenderHandle { id, rx, cancel }
            }
        }
    }

    /// Like [`submit`](Self::submit), but only when the parameters or the
    /// size differ from the previous submission.
    pub fn submit_if_changed(&mut self, params: &Params, width: u32, height: u32) -> Option<RenderHandle> {
        let unchanged = self
            .last_submitted
            .as_ref()
            .is_some_and(|(p, w, h)| p == params && *w == width && *h == height);
        if unchanged {
            return None;
        }
        Some(self.submit(params.clone(), width, height))
    }

    /// Composite the newest finished frame, if one has arrived.
    ///
    /// Frames whose id is no longer the latest are dropped.
    pub fn poll(&mut self) -> Option<Arc<Frame>> {
        let mut newest = None;
        while let Ok((id, frame)) = self.rx_done.try_recv() {
            let latest = self.latest.load(Ordering::SeqCst);
            if id == latest {
                newest = Some((id, frame));
            } else {
                debug!(id, latest, "Discarding stale render");
            }
        }
        match newest {
            Some((id, frame)) => {
                self.composite(id, Arc::clone(&frame));
                Some(frame)
            }
            None => {
                self.phase.settle();
                None
            }
        }
    }

    /// The frame currently on the surface.
    pub fn surface(&self) -> Option<&Arc<Frame>> {
        self.surface.as_ref().map(|(_, frame)| frame)
    }

    /// Render id of the frame on the surface.
    pub fn surface_id(&self) -> Option<u64> {
        self.surface.as_ref().map(|(id, _)| *id)
    }

    /// The most recently issued render id.
    pub fn latest_id(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase.get()
    }

    /// Cancel every submitted render that has not finished.
    pub fn cancel(&self) {
        self.cancel_all.cancel();
    }

    fn composite(&mut self, id: u64, frame: Arc<Frame>) {
        debug!(id, mode = frame.mode.name(), "Compositing frame");
        self.surface = Some((id, frame));
        self.phase.set(id, RenderPhase::Composited);
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancel_all.cancel();
        self.tx_jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Background render worker
// ---------------------------------------------------------------------------

/// Long-running worker. Waits for the debounce interval to pass without a
/// newer request, renders the newest one, and reports it on `tx_done` if it
/// is still current.
fn render_worker(
    config: StudioConfig,
    rx: mpsc::Receiver<Job>,
    tx_done: mpsc::Sender<(u64, Arc<Frame>)>,
    latest: Arc<AtomicU64>,
    phase: SharedPhase,
) {
    let dispatcher = Dispatcher::new(&config);
    let debounce = config.debounce();
    // Kept across frames so each render continues the simulation.
    let mut session: Option<GrayScott> = None;

    while let Ok(initial) = rx.recv() {
        let mut job = initial;
        loop {
            match rx.recv_timeout(debounce) {
                Ok(newer) => {
                    job.supersede(newer.id);
                    job = newer;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    let _ = job.reply.send(Err(RenderError::Cancelled));
                    return;
                }
            }
        }

        let current = latest.load(Ordering::SeqCst);
        if job.id != current {
            job.supersede(current);
            continue;
        }

        phase.set(job.id, RenderPhase::Dispatched);
        match render_job(&dispatcher, &config, &mut session, &job) {
            Ok(frame) => {
                let frame = Arc::new(frame);
                let current = latest.load(Ordering::SeqCst);
                if job.id != current {
                    debug!(id = job.id, latest = current, "Render finished stale");
                    let _ = job.reply.send(Err(RenderError::Superseded {
                        id: job.id,
                        latest: current,
                    }));
                    continue;
                }
                if tx_done.send((job.id, Arc::clone(&frame))).is_err() {
                    let _ = job.reply.send(Err(RenderError::Cancelled));
                    return;
                }
                let _ = job.reply.send(Ok(frame));
            }
            Err(e) => {
                debug!(id = job.id, "Render did not complete: {e}");
                phase.set(job.id, RenderPhase::Idle);
                let _ = job.reply.send(Err(e));
            }
        }
    }
    debug!("Render worker shutting down");
}

fn render_job(
    dispatcher: &Dispatcher,
    config: &StudioConfig,
    session: &mut Option<GrayScott>,
    job: &Job,
) -> crate::Result<Frame> {
    let (width, height) = (job.width, job.height);
    check_dimensions(width, height)?;
    job.token.check()?;
    let start = Instant::now();
    let mode = job.params.mode();

    let (task, geometry, prep_path) = match &job.params {
        Params::ReactionDiffusion(p) => {
            let scale = config.reaction_diffusion_scale.max(1);
            let (cols, rows) = ((width / scale) as usize, (height / scale) as usize);
            let same_grid = session
                .as_ref()
                .is_some_and(|sim| sim.cols() == cols && sim.rows() == rows);
            if !same_grid {
                *session = None;
            }
            let sim = session.get_or_insert_with(|| GrayScott::new(p, cols, rows));
            if !sim.matches(p, cols, rows) {
                sim.reset(p);
            }
            let path = dispatcher.step_simulation(sim, p.iterations_per_frame(), &job.token)?;
            let task: Arc<dyn RasterTask> =
                Arc::new(GrayScottTask::snapshot(sim, scale, width, height));
            (task, None, path)
        }
        params => {
            let (prepared, path) = dispatcher.prepare(params, width, height, &job.token)?;
            (prepared.task, prepared.geometry, path)
        }
    };

    let dispatched = dispatcher.dispatch_with(task, config.bands(), &job.token)?;
    let path = match prep_path {
        ExecutionPath::Fallback => ExecutionPath::Fallback,
        _ => dispatched.path,
    };
    let elapsed = start.elapsed();
    info!(
        id = job.id,
        mode = mode.name(),
        bands = dispatched.bands,
        ?path,
        elapsed_ms = elapsed.as_millis() as u64,
        "Render complete"
    );
    Ok(Frame {
        mode,
        buffer: dispatched.buffer,
        geometry,
        elapsed,
        path,
    })
}
