use polygen_core::{EscapeTime, MandelbrotParams, Mode, Palette, Rgb};

use crate::band::Band;
use crate::renderer::CancelToken;
use crate::task::{shade_rows, RasterTask};

/// Mandelbrot or Julia escape-time shading.
///
/// The palette is expanded into one colour per possible iteration count, so
/// each pixel is a single table lookup after iterating.
pub struct EscapeTimeTask {
    kernel: EscapeTime,
    lut: Vec<Rgb>,
    width: u32,
    height: u32,
}

impl EscapeTimeTask {
    pub fn new(params: &MandelbrotParams, width: u32, height: u32) -> Self {
        let params = params.sanitized();
        let kernel = EscapeTime::new(&params, width, height);
        let lut = Palette::new(&params.color_palette).lut(kernel.max_iterations());
        Self {
            kernel,
            lut,
            width,
            height,
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.kernel.max_iterations()
    }

    #[inline]
    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let n = self.kernel.escape_count(x, y) as usize;
        self.lut
            .get(n)
            .copied()
            .unwrap_or(Rgb::BLACK)
            .to_rgba(255)
    }
}

impl RasterTask for EscapeTimeTask {
    fn mode(&self) -> Mode {
        Mode::Mandelbrot
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn render_rows(&self, band: &Band, out: &mut [u8], cancel: &CancelToken) -> crate::Result<()> {
        shade_rows(band, out, cancel, |x, y| self.pixel(x, y))
    }
}
