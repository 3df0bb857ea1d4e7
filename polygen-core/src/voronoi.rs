use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::color::{finite_or, ColorStop, Palette, Rgb};
use crate::mode::{resolve_seed, Point};

/// Jitter of [`Layout::GridJittered`] sites, as a fraction of a grid cell.
const JITTER: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    #[default]
    Random,
    Grid,
    GridJittered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    #[inline]
    pub fn distance(self, a: Point, b: Point) -> f64 {
        let (dx, dy) = (a.x - b.x, a.y - b.y);
        match self {
            Self::Euclidean => dx.hypot(dy),
            Self::Manhattan => dx.abs() + dy.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// One random colour per cell.
    #[default]
    Random,
    /// Palette ramp by distance to the nearest site.
    Distance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoronoiParams {
    /// 10 to 200 sites.
    pub point_count: u32,
    pub layout: Layout,
    pub fill_cells: bool,
    pub show_borders: bool,
    /// Border width in pixels, 1 to 10.
    pub line_weight: f64,
    pub border_color: Rgb,
    pub distance_metric: DistanceMetric,
    pub color_mode: ColorMode,
    pub palette: Vec<ColorStop>,
    pub background: Rgb,
    pub seed: Option<u64>,
}

impl Default for VoronoiParams {
    fn default() -> Self {
        Self {
            point_count: 50,
            layout: Layout::Random,
            fill_cells: true,
            show_borders: true,
            line_weight: 2.0,
            border_color: Rgb::new(0x0a, 0x0a, 0x0a),
            distance_metric: DistanceMetric::Euclidean,
            color_mode: ColorMode::Random,
            palette: vec![
                ColorStop::new(Rgb::new(0xa7, 0x8b, 0xfa), 0.0),
                ColorStop::new(Rgb::new(0xec, 0x48, 0x99), 100.0),
            ],
            background: Rgb::new(0x0a, 0x0a, 0x0a),
            seed: None,
        }
    }
}

impl VoronoiParams {
    pub fn sanitized(&self) -> Self {
        Self {
            point_count: self.point_count.clamp(1, 200),
            line_weight: finite_or(self.line_weight, 2.0).clamp(1.0, 10.0),
            palette: if self.palette.is_empty() {
                Palette::grayscale().stops().to_vec()
            } else {
                self.palette.clone()
            },
            ..self.clone()
        }
    }
}

/// One site of the diagram and the colour of the region it owns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoronoiCell {
    pub id: u32,
    pub site: Point,
    pub color: Rgb,
}

/// The two closest sites to a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    pub cell: usize,
    pub distance: f64,
    pub second_distance: f64,
}

/// Sites plus everything needed to shade any pixel independently.
#[derive(Debug, Clone)]
pub struct VoronoiDiagram {
    params: VoronoiParams,
    cells: Vec<VoronoiCell>,
    palette: Palette,
    /// Typical cell radius, used to normalise distance shading.
    spacing: f64,
}

impl VoronoiDiagram {
    pub fn new(params: &VoronoiParams, width: u32, height: u32) -> Self {
        let p = params.sanitized();
        let mut rng = Pcg32::seed_from_u64(resolve_seed(p.seed));
        let (w, h) = (width.max(1) as f64, height.max(1) as f64);
        let sites = place_sites(p.layout, p.point_count as usize, w, h, &mut rng);
        let cells = sites
            .into_iter()
            .enumerate()
            .map(|(i, site)| VoronoiCell {
                id: i as u32,
                site,
                color: Rgb::from_hsl(rng.random::<f64>() * 360.0, 0.65, 0.55),
            })
            .collect();
        Self {
            palette: Palette::new(&p.palette),
            spacing: (w * h / p.point_count as f64).sqrt(),
            cells,
            params: p,
        }
    }

    pub fn cells(&self) -> &[VoronoiCell] {
        &self.cells
    }

    /// Nearest and second-nearest sites to `at`. Ties go to the lower id.
    pub fn nearest(&self, at: Point) -> Nearest {
        let metric = self.params.distance_metric;
        let mut best = Nearest {
            cell: 0,
            distance: f64::INFINITY,
            second_distance: f64::INFINITY,
        };
        for (i, cell) in self.cells.iter().enumerate() {
            let d = metric.distance(at, cell.site);
            if d < best.distance {
                best.second_distance = best.distance;
                best.distance = d;
                best.cell = i;
            } else if d < best.second_distance {
                best.second_distance = d;
            }
        }
        best
    }

    /// Index of the owning cell of pixel `(x, y)`.
    pub fn cell_at(&self, x: u32, y: u32) -> usize {
        self.nearest(pixel_center(x, y)).cell
    }

    pub fn color(&self, x: u32, y: u32) -> Rgb {
        let p = &self.params;
        let n = self.nearest(pixel_center(x, y));
        if p.show_borders && n.second_distance - n.distance <= p.line_weight {
            return p.border_color;
        }
        if !p.fill_cells {
            return p.background;
        }
        match p.color_mode {
            ColorMode::Random => self
                .cells
                .get(n.cell)
                .map_or(p.background, |c| c.color),
            ColorMode::Distance => self.palette.sample(n.distance / self.spacing),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.color(x, y).to_rgba(255)
    }
}

fn pixel_center(x: u32, y: u32) -> Point {
    Point::new(x as f64 + 0.5, y as f64 + 0.5)
}

fn place_sites(layout: Layout, count: usize, w: f64, h: f64, rng: &mut Pcg32) -> Vec<Point> {
    match layout {
        Layout::Random => (0..count)
            .map(|_| Point::new(rng.random::<f64>() * w, rng.random::<f64>() * h))
            .collect(),
        Layout::Grid | Layout::GridJittered => {
            let cols = (count as f64).sqrt().ceil().max(1.0) as usize;
            let rows = count.div_ceil(cols);
            let (cw, ch) = (w / cols as f64, h / rows as f64);
            (0..count)
                .map(|i| {
                    let (c, r) = (i % cols, i / cols);
                    let mut x = (c as f64 + 0.5) * cw;
                    let mut y = (r as f64 + 0.5) * ch;
                    if layout == Layout::GridJittered {
                        x += (rng.random::<f64>() * 2.0 - 1.0) * JITTER * cw;
                        y += (rng.random::<f64>() * 2.0 - 1.0) * JITTER * ch;
                    }
                    Point::new(x, y)
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(count: u32) -> VoronoiParams {
        VoronoiParams {
            point_count: count,
            layout: Layout::Grid,
            seed: Some(2),
            ..VoronoiParams::default()
        }
    }

    #[test]
    fn grid_sites_sit_in_cell_centres() {
        let d = VoronoiDiagram::new(&grid(4), 100, 100);
        let sites: Vec<_> = d.cells().iter().map(|c| (c.site.x, c.site.y)).collect();
        assert_eq!(sites, vec![(25.0, 25.0), (75.0, 25.0), (25.0, 75.0), (75.0, 75.0)]);
    }

    #[test]
    fn pixels_belong_to_nearest_site() {
        let d = VoronoiDiagram::new(&grid(4), 100, 100);
        assert_eq!(d.cell_at(10, 10), 0);
        assert_eq!(d.cell_at(90, 10), 1);
        assert_eq!(d.cell_at(10, 90), 2);
        assert_eq!(d.cell_at(90, 90), 3);
    }

    #[test]
    fn borders_follow_bisectors() {
        let d = VoronoiDiagram::new(&grid(4), 100, 100);
        let border = d.params.border_color;
        assert_eq!(d.color(49, 20), border);
        assert_ne!(d.color(25, 25), border);
        assert_eq!(d.color(25, 25), d.cells()[0].color);
    }

    #[test]
    fn manhattan_metric() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(DistanceMetric::Manhattan.distance(a, b), 7.0);
        assert_eq!(DistanceMetric::Euclidean.distance(a, b), 5.0);
    }

    #[test]
    fn unfilled_cells_show_background() {
        let params = VoronoiParams {
            fill_cells: false,
            show_borders: false,
            ..grid(9)
        };
        let d = VoronoiDiagram::new(&params, 90, 90);
        assert_eq!(d.color(10, 10), params.background);
    }

    #[test]
    fn jittered_sites_stay_near_their_cell() {
        let params = VoronoiParams {
            layout: Layout::GridJittered,
            ..grid(16)
        };
        let d = VoronoiDiagram::new(&params, 200, 200);
        for (i, cell) in d.cells().iter().enumerate() {
            let cx = (i % 4) as f64 * 50.0 + 25.0;
            let cy = (i / 4) as f64 * 50.0 + 25.0;
            assert!((cell.site.x - cx).abs() <= JITTER * 50.0);
            assert!((cell.site.y - cy).abs() <= JITTER * 50.0);
        }
    }
}
