use crate::band::Band;
use crate::error::RenderError;

/// An RGBA pixel buffer representing a rendered image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, 4 bytes per pixel, row-major order.
    pub pixels: Vec<u8>,
}

impl RenderBuffer {
    /// Create a new buffer filled with black (opaque).
    pub fn new(width: u32, height: u32) -> Self {
        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        for chunk in pixels.chunks_exact_mut(4) {
            chunk[3] = 255;
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wrap existing RGBA data, checking that its length matches.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> crate::Result<Self> {
        if pixels.len() != width as usize * height as usize * 4 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// RGBA of pixel `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copy a band's RGBA rows into place.
    pub fn blit_band(&mut self, band: &Band, band_pixels: &[u8]) {
        debug_assert_eq!(band_pixels.len(), band.byte_len());
        debug_assert_eq!(band.width, self.width);
        let start = band.start_row as usize * self.width as usize * 4;
        let end = start + band.byte_len();
        if let Some(dst) = self.pixels.get_mut(start..end) {
            dst.copy_from_slice(&band_pixels[..band.byte_len()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::split_rows;

    #[test]
    fn new_buffer_is_black_opaque() {
        let buf = RenderBuffer::new(4, 4);
        assert_eq!(buf.pixels.len(), 4 * 4 * 4);
        for chunk in buf.pixels.chunks_exact(4) {
            assert_eq!(chunk, &[0, 0, 0, 255]);
        }
    }

    #[test]
    fn blit_band_writes_correct_rows() {
        let mut buf = RenderBuffer::new(8, 8);
        let bands = split_rows(8, 8, 4);
        let red = [255, 0, 0, 255].repeat(bands[1].pixel_count());
        buf.blit_band(&bands[1], &red);

        assert_eq!(buf.pixel(3, 2), Some([255, 0, 0, 255]));
        assert_eq!(buf.pixel(7, 3), Some([255, 0, 0, 255]));
        assert_eq!(buf.pixel(0, 1), Some([0, 0, 0, 255]));
        assert_eq!(buf.pixel(0, 4), Some([0, 0, 0, 255]));
        assert_eq!(buf.pixel(8, 0), None);
    }

    #[test]
    fn from_pixels_checks_length() {
        assert!(RenderBuffer::from_pixels(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            RenderBuffer::from_pixels(2, 2, vec![0; 15]),
            Err(RenderError::InvalidDimensions {
                width: 2,
                height: 2
            })
        ));
    }
}
