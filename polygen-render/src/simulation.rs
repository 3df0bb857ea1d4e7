use rayon::prelude::*;
use tracing::debug;

use polygen_core::{GrayScott, Mode};

use crate::band::Band;
use crate::renderer::CancelToken;
use crate::task::{shade_rows, RasterTask};

// ---------------------------------------------------------------------------
// Stepping
// ---------------------------------------------------------------------------

/// Advance `sim` by `steps`, filling each generation's rows in parallel on
/// the current rayon pool.
///
/// Every row reads only the previous generation, so the result is identical
/// to [`step_sequential`]. The steps run on a copy that replaces `sim` only
/// once all of them are done; a cancelled run leaves `sim` as it was.
pub fn step_parallel(sim: &mut GrayScott, steps: u32, cancel: &CancelToken) -> crate::Result<()> {
    let cols = sim.cols().max(1);
    let mut next = sim.clone();
    for _ in 0..steps {
        cancel.check()?;
        next.advance_with(|current, next_u, next_v| {
            next_u
                .par_chunks_mut(cols)
                .zip(next_v.par_chunks_mut(cols))
                .enumerate()
                .for_each(|(y, (row_u, row_v))| current.compute_row(y, row_u, row_v));
        });
    }
    *sim = next;
    debug!(steps, generation = sim.generation(), "parallel simulation steps done");
    Ok(())
}

/// Advance `sim` by `steps` on the calling thread. Like [`step_parallel`],
/// either every step lands or none does.
pub fn step_sequential(sim: &mut GrayScott, steps: u32, cancel: &CancelToken) -> crate::Result<()> {
    let mut next = sim.clone();
    for _ in 0..steps {
        cancel.check()?;
        next.step(1);
    }
    *sim = next;
    Ok(())
}

// ---------------------------------------------------------------------------
// Colouring
// ---------------------------------------------------------------------------

/// A snapshot of a simulation, block-filled at `scale` pixels per cell.
///
/// Pixels beyond the last whole cell stay transparent.
pub struct GrayScottTask {
    sim: GrayScott,
    scale: u32,
    width: u32,
    height: u32,
}

impl GrayScottTask {
    pub fn snapshot(sim: &GrayScott, scale: u32, width: u32, height: u32) -> Self {
        Self {
            sim: sim.clone(),
            scale: scale.max(1),
            width,
            height,
        }
    }
}

impl RasterTask for GrayScottTask {
    fn mode(&self) -> Mode {
        Mode::ReactionDiffusion
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn render_rows(&self, band: &Band, out: &mut [u8], cancel: &CancelToken) -> crate::Result<()> {
        shade_rows(band, out, cancel, |x, y| {
            let (col, row) = ((x / self.scale) as usize, (y / self.scale) as usize);
            if col >= self.sim.cols() || row >= self.sim.rows() {
                return [0, 0, 0, 0];
            }
            self.sim.color_at(col, row).to_rgba(255)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use polygen_core::reaction_diffusion::Preset;
    use polygen_core::ReactionDiffusionParams;

    use crate::renderer::RenderCancel;

    #[test]
    fn parallel_steps_match_sequential() {
        let params = ReactionDiffusionParams::for_preset(Preset::Labyrinth);
        let mut a = GrayScott::new(&params, 37, 23);
        let mut b = a.clone();
        step_parallel(&mut a, 12, &CancelToken::never()).unwrap();
        step_sequential(&mut b, 12, &CancelToken::never()).unwrap();
        assert_eq!(a.u(), b.u());
        assert_eq!(a.v(), b.v());
        assert_eq!(a.generation(), 12);
    }

    #[test]
    fn cancelled_stepping_leaves_the_session_untouched() {
        let params = ReactionDiffusionParams::for_preset(Preset::Labyrinth);
        let original = GrayScott::new(&params, 24, 18);

        for parallel in [false, true] {
            let cancel = Arc::new(RenderCancel::new());
            let token = CancelToken::new(&cancel);
            let stopper = {
                let cancel = Arc::clone(&cancel);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(20));
                    cancel.cancel();
                })
            };
            let mut sim = original.clone();
            let result = if parallel {
                step_parallel(&mut sim, 10_000_000, &token)
            } else {
                step_sequential(&mut sim, 10_000_000, &token)
            };
            stopper.join().unwrap();

            assert!(result.unwrap_err().is_cancelled());
            assert_eq!(sim.generation(), 0);
            assert_eq!(sim.u(), original.u());
            assert_eq!(sim.v(), original.v());
        }
    }

    #[test]
    fn block_fill_and_transparent_margin() {
        let params = ReactionDiffusionParams::for_preset(Preset::Stripes);
        let sim = GrayScott::for_raster(&params, 10, 10, 4);
        let task = GrayScottTask::snapshot(&sim, 4, 10, 10);
        let band = Band::full(10, 10);
        let mut out = vec![0; band.byte_len()];
        task.render_rows(&band, &mut out, &CancelToken::never())
            .unwrap();

        let at = |x: usize, y: usize| {
            let i = (y * 10 + x) * 4;
            [out[i], out[i + 1], out[i + 2], out[i + 3]]
        };
        assert_eq!(at(0, 0), at(3, 3));
        assert_eq!(at(5, 1), sim.color_at(1, 0).to_rgba(255));
        assert_eq!(at(9, 2), [0, 0, 0, 0]);
        assert_eq!(at(2, 8), [0, 0, 0, 0]);
    }
}
