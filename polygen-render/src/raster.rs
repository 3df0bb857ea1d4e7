use std::f64::consts::FRAC_1_SQRT_2;
use std::ops::Range;

use polygen_core::{Point, Rgb};

use crate::band::Band;

/// Drawing surface over one band of a larger raster.
///
/// Every primitive is specified in whole-raster pixel coordinates and decides
/// coverage per pixel centre, so a shape drawn into several bands produces
/// exactly the pixels it would produce in one full-height band. Coverage is
/// binary; there is no anti-aliasing.
pub struct Canvas<'a> {
    band: Band,
    pixels: &'a mut [u8],
    /// Per-pixel stamp of the last stroke that covered it.
    mask: Vec<u32>,
    stamp: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(band: &Band, pixels: &'a mut [u8]) -> Self {
        debug_assert_eq!(pixels.len(), band.byte_len());
        Self {
            band: *band,
            pixels,
            mask: Vec::new(),
            stamp: 0,
        }
    }

    pub fn band(&self) -> &Band {
        &self.band
    }

    /// Overwrite every pixel of the band.
    pub fn fill(&mut self, color: Rgb) {
        let rgba = color.to_rgba(255);
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Overwrite pixel `(x, y)` if it lies in this band.
    pub fn put(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(i) = self.index(x as i64, y as i64) {
            self.pixels[i * 4..i * 4 + 4].copy_from_slice(&rgba);
        }
    }

    /// Composite `color` at `alpha` over pixel `(x, y)`.
    pub fn blend(&mut self, x: i64, y: i64, color: Rgb, alpha: f64) {
        if let Some(i) = self.index(x, y) {
            self.blend_at(i, color, alpha);
        }
    }

    /// Fill pixels whose centres lie in `[x, x + w) × [y, y + h)`.
    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb, alpha: f64) {
        let rows = self.row_span(y, y + h);
        let cols = self.col_span(x, x + w);
        for py in rows {
            for px in cols.clone() {
                self.blend(px as i64, py as i64, color, alpha);
            }
        }
    }

    pub fn fill_circle(&mut self, center: Point, radius: f64, color: Rgb, alpha: f64) {
        let r_sq = radius * radius;
        self.cover(
            center.y - radius,
            center.y + radius,
            center.x - radius,
            center.x + radius,
            |cx, cy| {
                let (dx, dy) = (cx - center.x, cy - center.y);
                dx * dx + dy * dy <= r_sq
            },
            color,
            alpha,
        );
    }

    /// A ring of `width` pixels centred on the circle's edge.
    pub fn stroke_circle(&mut self, center: Point, radius: f64, width: f64, color: Rgb, alpha: f64) {
        let half = stroke_half_width(width);
        let outer = radius + half;
        self.cover(
            center.y - outer,
            center.y + outer,
            center.x - outer,
            center.x + outer,
            |cx, cy| ((cx - center.x).hypot(cy - center.y) - radius).abs() <= half,
            color,
            alpha,
        );
    }

    /// Stroke an open polyline. Pixels covered by several segments of the
    /// same polyline are painted once, so joints and self-crossings do not
    /// darken under partial alpha.
    pub fn stroke_polyline(&mut self, points: &[Point], width: f64, color: Rgb, alpha: f64) {
        let half = stroke_half_width(width);
        let stamp = self.next_stamp();
        let mut covered = Vec::new();
        match points {
            [] => return,
            [only] => self.cover_segment(*only, *only, half, stamp, &mut covered),
            _ => {
                for seg in points.windows(2) {
                    self.cover_segment(seg[0], seg[1], half, stamp, &mut covered);
                }
            }
        }
        for i in covered {
            self.blend_at(i, color, alpha);
        }
    }

    /// Even-odd scanline fill of a closed polygon.
    pub fn fill_polygon(&mut self, vertices: &[Point], color: Rgb, alpha: f64) {
        if vertices.len() < 3 {
            return;
        }
        let (y_min, y_max) = vertices
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v.y), hi.max(v.y))
            });
        let mut crossings = Vec::with_capacity(vertices.len());
        for py in self.row_span(y_min, y_max) {
            let cy = py as f64 + 0.5;
            crossings.clear();
            for (i, p) in vertices.iter().enumerate() {
                let q = vertices[(i + 1) % vertices.len()];
                if (p.y <= cy) != (q.y <= cy) {
                    crossings.push(p.x + (cy - p.y) / (q.y - p.y) * (q.x - p.x));
                }
            }
            crossings.sort_by(f64::total_cmp);
            for pair in crossings.chunks_exact(2) {
                for px in self.col_span(pair[0], pair[1]) {
                    self.blend(px as i64, py as i64, color, alpha);
                }
            }
        }
    }

    // -- Coverage ---------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn cover(
        &mut self,
        y_min: f64,
        y_max: f64,
        x_min: f64,
        x_max: f64,
        inside: impl Fn(f64, f64) -> bool,
        color: Rgb,
        alpha: f64,
    ) {
        let cols = self.col_span(x_min, x_max + 1.0);
        for py in self.row_span(y_min, y_max + 1.0) {
            for px in cols.clone() {
                if inside(px as f64 + 0.5, py as f64 + 0.5) {
                    self.blend(px as i64, py as i64, color, alpha);
                }
            }
        }
    }

    fn cover_segment(&mut self, a: Point, b: Point, half: f64, stamp: u32, covered: &mut Vec<usize>) {
        let rows = self.row_span(a.y.min(b.y) - half, a.y.max(b.y) + half + 1.0);
        if rows.is_empty() {
            return;
        }
        let cols = self.col_span(a.x.min(b.x) - half, a.x.max(b.x) + half + 1.0);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len_sq = dx * dx + dy * dy;
        let half_sq = half * half;
        for py in rows {
            let cy = py as f64 + 0.5;
            for px in cols.clone() {
                let cx = px as f64 + 0.5;
                let t = if len_sq > 0.0 {
                    (((cx - a.x) * dx + (cy - a.y) * dy) / len_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let (ex, ey) = (a.x + t * dx - cx, a.y + t * dy - cy);
                if ex * ex + ey * ey > half_sq {
                    continue;
                }
                if let Some(i) = self.index(px as i64, py as i64) {
                    if self.mask[i] != stamp {
                        self.mask[i] = stamp;
                        covered.push(i);
                    }
                }
            }
        }
    }

    fn next_stamp(&mut self) -> u32 {
        if self.mask.is_empty() {
            self.mask = vec![0; self.band.pixel_count()];
        }
        if self.stamp == u32::MAX {
            self.mask.fill(0);
            self.stamp = 0;
        }
        self.stamp += 1;
        self.stamp
    }

    // -- Addressing -------------------------------------------------------------

    /// Pixel index within the band, if `(x, y)` falls inside it.
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || x >= self.band.width as i64 || !self.band.contains_row(y) {
            return None;
        }
        let row = (y - self.band.start_row as i64) as usize;
        Some(row * self.band.width as usize + x as usize)
    }

    fn blend_at(&mut self, i: usize, color: Rgb, alpha: f64) {
        let Some(px) = self.pixels.get_mut(i * 4..i * 4 + 4) else {
            return;
        };
        let a = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
        if a >= 1.0 {
            px.copy_from_slice(&color.to_rgba(255));
            return;
        }
        for (dst, src) in px.iter_mut().zip([color.r, color.g, color.b]) {
            *dst = (src as f64 * a + *dst as f64 * (1.0 - a)).round() as u8;
        }
        px[3] = 255;
    }

    fn row_span(&self, lo: f64, hi: f64) -> Range<u32> {
        centre_span(lo, hi, self.band.start_row, self.band.end_row)
    }

    fn col_span(&self, lo: f64, hi: f64) -> Range<u32> {
        centre_span(lo, hi, 0, self.band.width)
    }
}

/// Half the stroke width, never thinner than a pixel diagonal so 1 px lines
/// stay connected at any angle.
fn stroke_half_width(width: f64) -> f64 {
    let w = if width.is_finite() { width } else { 1.0 };
    (w * 0.5).max(FRAC_1_SQRT_2)
}

/// Pixels whose centres lie in `[lo, hi)`, clipped to `[min, max)`.
fn centre_span(lo: f64, hi: f64, min: u32, max: u32) -> Range<u32> {
    if !(lo.is_finite() && hi.is_finite()) || hi <= lo {
        return 0..0;
    }
    let first = (lo - 0.5).ceil().max(min as f64);
    let end = (hi - 0.5).ceil().min(max as f64);
    if end <= first {
        return 0..0;
    }
    first as u32..end as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::split_rows;
    use crate::buffer::RenderBuffer;

    const RED: Rgb = Rgb::new(255, 0, 0);

    /// Draw the same scene into `count` bands and assemble the result.
    fn draw_banded(w: u32, h: u32, count: usize, scene: impl Fn(&mut Canvas)) -> RenderBuffer {
        let mut out = RenderBuffer::new(w, h);
        for band in split_rows(w, h, count) {
            let mut pixels = vec![0; band.byte_len()];
            let mut canvas = Canvas::new(&band, &mut pixels);
            canvas.fill(Rgb::BLACK);
            scene(&mut canvas);
            out.blit_band(&band, &pixels);
        }
        out
    }

    #[test]
    fn fill_rect_covers_pixel_centres() {
        let buf = draw_banded(8, 8, 1, |c| c.fill_rect(2.0, 1.0, 3.0, 2.0, RED, 1.0));
        for y in 0..8 {
            for x in 0..8 {
                let inside = (2..5).contains(&x) && (1..3).contains(&y);
                let expected = if inside { [255, 0, 0, 255] } else { [0, 0, 0, 255] };
                assert_eq!(buf.pixel(x, y), Some(expected), "({x}, {y})");
            }
        }
    }

    #[test]
    fn half_alpha_blends_over_background() {
        let buf = draw_banded(2, 2, 1, |c| c.blend(0, 0, Rgb::WHITE, 0.5));
        assert_eq!(buf.pixel(0, 0), Some([128, 128, 128, 255]));
        assert_eq!(buf.pixel(1, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn banding_does_not_change_output() {
        fn scene(c: &mut Canvas) {
            c.fill_circle(Point::new(20.0, 17.0), 9.5, RED, 0.7);
            c.stroke_circle(Point::new(20.0, 17.0), 9.5, 1.0, Rgb::WHITE, 1.0);
            c.stroke_polyline(
                &[Point::new(1.0, 1.0), Point::new(38.0, 30.0), Point::new(5.0, 33.0)],
                2.0,
                Rgb::new(0, 255, 0),
                0.6,
            );
            c.fill_polygon(
                &[Point::new(30.0, 2.0), Point::new(39.0, 12.0), Point::new(26.0, 9.0)],
                Rgb::new(0, 0, 255),
                1.0,
            );
        }
        let whole = draw_banded(40, 35, 1, scene);
        for count in [2, 3, 7, 35] {
            assert_eq!(draw_banded(40, 35, count, scene), whole, "{count} bands");
        }
    }

    #[test]
    fn polyline_joints_are_painted_once() {
        let buf = draw_banded(20, 20, 1, |c| {
            c.stroke_polyline(
                &[Point::new(2.5, 10.5), Point::new(10.5, 10.5), Point::new(18.5, 10.5)],
                1.0,
                Rgb::WHITE,
                0.5,
            )
        });
        // The shared vertex gets the same single coat as the rest of the line.
        assert_eq!(buf.pixel(10, 10), buf.pixel(6, 10));
        assert_eq!(buf.pixel(10, 10), Some([128, 128, 128, 255]));
    }

    #[test]
    fn polygon_fill_stays_inside() {
        let square = [
            Point::new(2.0, 2.0),
            Point::new(6.0, 2.0),
            Point::new(6.0, 6.0),
            Point::new(2.0, 6.0),
        ];
        let buf = draw_banded(8, 8, 2, |c| c.fill_polygon(&square, RED, 1.0));
        assert_eq!(buf.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(buf.pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(buf.pixel(6, 5), Some([0, 0, 0, 255]));
        assert_eq!(buf.pixel(1, 3), Some([0, 0, 0, 255]));
    }

    #[test]
    fn shapes_outside_the_raster_are_ignored() {
        let buf = draw_banded(4, 4, 2, |c| {
            c.fill_circle(Point::new(-50.0, -50.0), 3.0, RED, 1.0);
            c.blend(10, 1, RED, 1.0);
            c.fill_rect(f64::NAN, 0.0, 2.0, 2.0, RED, 1.0);
        });
        assert!(buf.pixels.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }
}
