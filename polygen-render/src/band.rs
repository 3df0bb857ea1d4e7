/// A contiguous range of full-width rows, the unit of parallel work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// Position of this band in the split, top to bottom.
    pub index: usize,
    /// First row, inclusive.
    pub start_row: u32,
    /// Last row, exclusive.
    pub end_row: u32,
    /// Row width in pixels.
    pub width: u32,
}

impl Band {
    /// A single band covering a whole `width × height` raster.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            index: 0,
            start_row: 0,
            end_row: height,
            width,
        }
    }

    pub fn rows(&self) -> u32 {
        self.end_row - self.start_row
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.rows() as usize
    }

    /// RGBA byte length of this band.
    pub fn byte_len(&self) -> usize {
        self.pixel_count() * 4
    }

    pub fn contains_row(&self, y: i64) -> bool {
        y >= self.start_row as i64 && y < self.end_row as i64
    }
}

/// Split `height` rows into at most `count` bands of `ceil(height / count)`
/// rows each. The last band may be shorter; empty bands are not produced.
pub fn split_rows(width: u32, height: u32, count: usize) -> Vec<Band> {
    let count = count.max(1) as u32;
    let rows_per_band = height.div_ceil(count).max(1);
    let mut bands = Vec::with_capacity(count as usize);
    let mut start = 0;
    while start < height {
        let end = (start + rows_per_band).min(height);
        bands.push(Band {
            index: bands.len(),
            start_row: start,
            end_row: end,
            width,
        });
        start = end;
    }
    bands
}
