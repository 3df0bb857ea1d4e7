use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::color::{finite_or, ColorStop, Rgb};
use crate::complex::Complex;

/// Hard ceiling on the dynamic iteration cap.
pub const MAX_DYNAMIC_ITERATIONS: u32 = 1000;

/// Orbits are considered escaped once `|z|² ≥ BAILOUT_SQ`.
pub const BAILOUT_SQ: f64 = 4.0;

/// Parameters for the Mandelbrot / Julia escape-time renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MandelbrotParams {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    /// Base iteration count, raised automatically at deeper zoom.
    pub iterations: u32,
    pub is_julia_set: bool,
    pub julia_seed_x: f64,
    pub julia_seed_y: f64,
    pub color_palette: Vec<ColorStop>,
}

impl Default for MandelbrotParams {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            iterations: 100,
            is_julia_set: false,
            julia_seed_x: -0.7,
            julia_seed_y: 0.27015,
            color_palette: vec![
                ColorStop::new(Rgb::new(0, 7, 100), 0.0),
                ColorStop::new(Rgb::new(32, 107, 203), 16.0),
                ColorStop::new(Rgb::new(237, 255, 255), 42.0),
                ColorStop::new(Rgb::new(255, 170, 0), 64.0),
                ColorStop::new(Rgb::new(0, 2, 0), 100.0),
            ],
        }
    }
}

impl MandelbrotParams {
    pub const MIN_ZOOM: f64 = 1e-6;
    pub const MAX_ZOOM: f64 = 1e13;

    /// Clamp every field into a range the kernel can iterate safely.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let zoom = finite_or(self.zoom, 1.0).clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        let color_palette = if self.color_palette.is_empty() {
            defaults.color_palette
        } else {
            self.color_palette.iter().map(|s| s.sanitized()).collect()
        };
        Self {
            zoom,
            pan_x: finite_or(self.pan_x, 0.0),
            pan_y: finite_or(self.pan_y, 0.0),
            iterations: self.iterations.clamp(1, MAX_DYNAMIC_ITERATIONS),
            is_julia_set: self.is_julia_set,
            julia_seed_x: finite_or(self.julia_seed_x, defaults.julia_seed_x).clamp(-2.0, 2.0),
            julia_seed_y: finite_or(self.julia_seed_y, defaults.julia_seed_y).clamp(-2.0, 2.0),
            color_palette,
        }
    }

    pub fn julia_seed(&self) -> Complex {
        Complex::new(self.julia_seed_x, self.julia_seed_y)
    }

    /// Shift the view by a drag of `(dx, dy)` screen pixels.
    pub fn panned_by_pixels(&self, dx: f64, dy: f64) -> Self {
        let pan_scale = (4.0 / self.zoom) / 800.0;
        Self {
            pan_x: self.pan_x - dx * pan_scale,
            pan_y: self.pan_y - dy * pan_scale,
            ..self.clone()
        }
    }

    /// Apply one wheel notch: positive `delta_y` zooms out, otherwise in.
    pub fn zoomed_by_wheel(&self, delta_y: f64) -> Self {
        let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
        Self {
            zoom: (self.zoom * factor).clamp(Self::MIN_ZOOM, Self::MAX_ZOOM),
            ..self.clone()
        }
    }
}

/// Iteration cap for a base count at a zoom level:
/// `min(1000, max(base, ⌊base · (1 + log₁₀(zoom + 1))⌋))`.
pub fn dynamic_iterations(base: u32, zoom: f64) -> u32 {
    let zoom_factor = (zoom.max(0.0) + 1.0).log10();
    let scaled = (base as f64 * (1.0 + zoom_factor)).floor();
    let scaled = if scaled.is_finite() {
        scaled.min(u32::MAX as f64) as u32
    } else {
        MAX_DYNAMIC_ITERATIONS
    };
    base.max(scaled).min(MAX_DYNAMIC_ITERATIONS)
}

/// Number of `z ← z² + c` steps taken from `z0` before `|z|² ≥ 4`,
/// capped at `max_iterations`.
#[inline]
pub fn escape_count(z0: Complex, c: Complex, max_iterations: u32) -> u32 {
    let mut z = z0;
    let mut iter = 0;
    while iter < max_iterations && z.norm_sq() < BAILOUT_SQ {
        z = z.square() + c;
        iter += 1;
    }
    iter
}

// ---------------------------------------------------------------------------
// View window
// ---------------------------------------------------------------------------

/// The rectangle of the complex plane mapped onto the raster.
///
/// The base window is `[-2.5, 1] × [-1.25, 1.25]`, divided by zoom and
/// shifted by pan. Pixel rows map to increasing imaginary part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewWindow {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl ViewWindow {
    pub fn new(zoom: f64, pan_x: f64, pan_y: f64) -> Self {
        Self {
            x_min: -2.5 / zoom + pan_x,
            x_max: 1.0 / zoom + pan_x,
            y_min: -1.25 / zoom + pan_y,
            y_max: 1.25 / zoom + pan_y,
        }
    }

    #[inline]
    pub fn pixel_to_complex(&self, px: u32, py: u32, width: u32, height: u32) -> Complex {
        Complex::new(
            self.x_min + (px as f64 / width as f64) * (self.x_max - self.x_min),
            self.y_min + (py as f64 / height as f64) * (self.y_max - self.y_min),
        )
    }
}

// ---------------------------------------------------------------------------
// Kernel
// ---------------------------------------------------------------------------

/// A ready-to-iterate escape-time configuration for one raster size.
///
/// Holds only immutable data, so a shared reference can be handed to any
/// number of row-band workers.
#[derive(Debug, Clone)]
pub struct EscapeTime {
    window: ViewWindow,
    width: u32,
    height: u32,
    max_iterations: u32,
    julia_seed: Option<Complex>,
}

impl EscapeTime {
    pub fn new(params: &MandelbrotParams, width: u32, height: u32) -> Self {
        let p = params.sanitized();
        Self {
            window: ViewWindow::new(p.zoom, p.pan_x, p.pan_y),
            width: width.max(1),
            height: height.max(1),
            max_iterations: dynamic_iterations(p.iterations, p.zoom),
            julia_seed: p.is_julia_set.then(|| p.julia_seed()),
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn window(&self) -> &ViewWindow {
        &self.window
    }

    #[inline]
    pub fn point(&self, px: u32, py: u32) -> Complex {
        self.window
            .pixel_to_complex(px, py, self.width, self.height)
    }

    /// Iterate a single complex point. Mandelbrot starts at `z = 0` with
    /// `c = point`; Julia starts at `z = point` with the fixed seed.
    #[inline]
    pub fn iterate(&self, point: Complex) -> u32 {
        match self.julia_seed {
            Some(seed) => escape_count(point, seed, self.max_iterations),
            None => escape_count(Complex::ZERO, point, self.max_iterations),
        }
    }

    #[inline]
    pub fn escape_count(&self, px: u32, py: u32) -> u32 {
        self.iterate(self.point(px, py))
    }

    /// `iterations / cap`, in `[0, 1]`; 1 means the point never escaped.
    #[inline]
    pub fn ratio(&self, px: u32, py: u32) -> f64 {
        self.escape_count(px, py) as f64 / self.max_iterations as f64
    }
}

// ---------------------------------------------------------------------------
// Auto-zoom tour
// ---------------------------------------------------------------------------

/// A point of interest visited by [`ZoomTour`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTarget {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

pub const ZOOM_TARGETS: [ZoomTarget; 4] = [
    // Seahorse valley
    ZoomTarget { pan_x: -0.7469, pan_y: 0.1102, zoom: 1000.0 },
    ZoomTarget { pan_x: -0.748, pan_y: 0.099, zoom: 10000.0 },
    ZoomTarget { pan_x: -0.7492, pan_y: 0.1009, zoom: 100.0 },
    // Back out to the main bulb
    ZoomTarget { pan_x: -0.5, pan_y: 0.0, zoom: 3.0 },
];

/// Quadratic ease-in-out on `[0, 1]`.
pub fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

/// Endless animation that glides between [`ZOOM_TARGETS`], holding at each.
#[derive(Debug, Clone)]
pub struct ZoomTour {
    start: MandelbrotParams,
}

impl ZoomTour {
    pub const TRAVEL: Duration = Duration::from_secs(4);
    pub const HOLD: Duration = Duration::from_secs(2);

    pub fn new(start: MandelbrotParams) -> Self {
        Self { start }
    }

    /// The parameter struct to render `elapsed` after the tour started.
    pub fn params_at(&self, elapsed: Duration) -> MandelbrotParams {
        let leg = (Self::TRAVEL + Self::HOLD).as_secs_f64();
        let t = elapsed.as_secs_f64();
        let index = (t / leg).floor() as usize;
        let within = t - index as f64 * leg;

        let from = if index == 0 {
            ZoomTarget {
                pan_x: self.start.pan_x,
                pan_y: self.start.pan_y,
                zoom: self.start.zoom,
            }
        } else {
            ZOOM_TARGETS[(index - 1) % ZOOM_TARGETS.len()]
        };
        let to = ZOOM_TARGETS[index % ZOOM_TARGETS.len()];

        let progress = ease_in_out(within / Self::TRAVEL.as_secs_f64());
        let mix = |a: f64, b: f64| a + (b - a) * progress;
        MandelbrotParams {
            zoom: mix(from.zoom, to.zoom),
            pan_x: mix(from.pan_x, to.pan_x),
            pan_y: mix(from.pan_y, to.pan_y),
            ..self.start.clone()
        }
    }
}
