use polygen_core::Mode;

use crate::band::Band;
use crate::renderer::CancelToken;

/// A raster computation that can be split into row bands.
///
/// Implementations hold only immutable, fully prepared data. Any band can be
/// rendered on any thread in any order, and rendering the raster as one band
/// or as many must give identical bytes.
pub trait RasterTask: Send + Sync {
    /// The mode this task renders, used to pick its timeout.
    fn mode(&self) -> Mode;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Write the RGBA rows of `band` into `out` (`band.byte_len()` bytes).
    fn render_rows(&self, band: &Band, out: &mut [u8], cancel: &CancelToken) -> crate::Result<()>;
}

/// Fill `out` one pixel at a time, checking for cancellation every row.
pub fn shade_rows(
    band: &Band,
    out: &mut [u8],
    cancel: &CancelToken,
    pixel: impl Fn(u32, u32) -> [u8; 4],
) -> crate::Result<()> {
    let stride = band.width as usize * 4;
    if stride == 0 {
        return Ok(());
    }
    for (row, y) in out.chunks_exact_mut(stride).zip(band.start_row..band.end_row) {
        cancel.check()?;
        for (px, x) in row.chunks_exact_mut(4).zip(0..band.width) {
            px.copy_from_slice(&pixel(x, y));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::renderer::RenderCancel;
    use std::sync::Arc;

    #[test]
    fn shade_rows_uses_global_coordinates() {
        let band = Band {
            index: 1,
            start_row: 3,
            end_row: 5,
            width: 2,
        };
        let mut out = vec![0; band.byte_len()];
        shade_rows(&band, &mut out, &CancelToken::never(), |x, y| {
            [x as u8, y as u8, 0, 255]
        })
        .unwrap();
        assert_eq!(
            out,
            vec![0, 3, 0, 255, 1, 3, 0, 255, 0, 4, 0, 255, 1, 4, 0, 255]
        );
    }

    #[test]
    fn shade_rows_stops_when_cancelled() {
        let cancel = Arc::new(RenderCancel::new());
        let token = CancelToken::new(&cancel);
        cancel.cancel();
        let band = Band::full(4, 4);
        let mut out = vec![0; band.byte_len()];
        let result = shade_rows(&band, &mut out, &token, |_, _| [1, 1, 1, 255]);
        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert!(out.iter().all(|&b| b == 0));
    }
}
