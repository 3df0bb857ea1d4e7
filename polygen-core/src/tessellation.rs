use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::color::{finite_or, Rgb};
use crate::mode::{resolve_seed, Point};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Maximum hue shift, in degrees, for [`FillMode::Random`].
const HUE_JITTER: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileShape {
    Triangles,
    #[default]
    Squares,
    Hexagons,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[default]
    Solid,
    /// Base colour with a random hue shift per tile.
    Random,
    /// Lightness ramp from the top-left to the bottom-right corner.
    Gradient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TessellationParams {
    pub shape: TileShape,
    /// Tile edge length in pixels.
    pub cell_size: f64,
    /// Horizontal shift of every other row, as a fraction of a tile.
    pub offset: f64,
    /// Gap between neighbouring tiles, 0 to 20 px.
    pub gutter: f64,
    pub fill_mode: FillMode,
    pub base_color: Rgb,
    pub background: Rgb,
    pub seed: Option<u64>,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self {
            shape: TileShape::Squares,
            cell_size: 40.0,
            offset: 0.0,
            gutter: 4.0,
            fill_mode: FillMode::Solid,
            base_color: Rgb::new(0xa7, 0x8b, 0xfa),
            background: Rgb::new(0x0a, 0x0a, 0x0a),
            seed: None,
        }
    }
}

impl TessellationParams {
    pub fn sanitized(&self) -> Self {
        Self {
            cell_size: finite_or(self.cell_size, 40.0).clamp(4.0, 400.0),
            offset: finite_or(self.offset, 0.0).clamp(0.0, 1.0),
            gutter: finite_or(self.gutter, 4.0).clamp(0.0, 20.0),
            ..self.clone()
        }
    }
}

/// One filled polygon of the tiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub vertices: Vec<Point>,
    pub color: Rgb,
}

impl Tile {
    pub fn centroid(&self) -> Point {
        let n = self.vertices.len().max(1) as f64;
        let (sx, sy) = self
            .vertices
            .iter()
            .fold((0.0, 0.0), |(x, y), v| (x + v.x, y + v.y));
        Point::new(sx / n, sy / n)
    }
}

/// Lay out tiles covering a `width × height` raster. Tiles along the edges
/// may extend past the frame.
pub fn generate(params: &TessellationParams, width: u32, height: u32) -> Vec<Tile> {
    let p = params.sanitized();
    let (w, h) = (width as f64, height as f64);
    let shapes = match p.shape {
        TileShape::Squares => squares(&p, w, h),
        TileShape::Triangles => triangles(&p, w, h),
        TileShape::Hexagons => hexagons(&p, w, h),
    };

    let mut rng = Pcg32::seed_from_u64(resolve_seed(p.seed));
    let (hue, sat, light) = p.base_color.to_hsl();
    shapes
        .into_iter()
        .map(|(vertices, inradius)| {
            let mut tile = Tile {
                vertices,
                color: p.base_color,
            };
            let c = tile.centroid();
            tile.color = match p.fill_mode {
                FillMode::Solid => p.base_color,
                FillMode::Random => {
                    let shift = (rng.random::<f64>() * 2.0 - 1.0) * HUE_JITTER;
                    Rgb::from_hsl(hue + shift, sat, light)
                }
                FillMode::Gradient => {
                    let t = ((c.x / w.max(1.0) + c.y / h.max(1.0)) / 2.0).clamp(0.0, 1.0);
                    Rgb::from_hsl(hue, sat, 0.2 + 0.6 * t)
                }
            };
            tile.vertices = inset(&tile.vertices, c, inradius, p.gutter / 2.0);
            tile
        })
        .collect()
}

/// Shrink a convex polygon towards `center` so its inradius drops by `amount`.
fn inset(vertices: &[Point], center: Point, inradius: f64, amount: f64) -> Vec<Point> {
    let k = ((inradius - amount) / inradius).max(0.0);
    vertices
        .iter()
        .map(|v| Point::new(center.x + (v.x - center.x) * k, center.y + (v.y - center.y) * k))
        .collect()
}

type RawTile = (Vec<Point>, f64);

fn row_shift(row: i64, offset: f64, pitch: f64) -> f64 {
    if row.rem_euclid(2) == 1 {
        offset * pitch
    } else {
        0.0
    }
}

fn squares(p: &TessellationParams, w: f64, h: f64) -> Vec<RawTile> {
    let s = p.cell_size;
    let rows = (h / s).ceil() as i64;
    let cols = (w / s).ceil() as i64;
    let mut out = Vec::new();
    for row in 0..rows {
        let y = row as f64 * s;
        let shift = row_shift(row, p.offset, s);
        for col in -1..cols {
            let x = col as f64 * s + shift;
            out.push((
                vec![
                    Point::new(x, y),
                    Point::new(x + s, y),
                    Point::new(x + s, y + s),
                    Point::new(x, y + s),
                ],
                s / 2.0,
            ));
        }
    }
    out
}

fn triangles(p: &TessellationParams, w: f64, h: f64) -> Vec<RawTile> {
    let s = p.cell_size;
    let th = s * SQRT_3 / 2.0;
    let rows = (h / th).ceil() as i64;
    let cols = (w / (s / 2.0)).ceil() as i64;
    let inradius = s * SQRT_3 / 6.0;
    let mut out = Vec::new();
    for row in 0..rows {
        let y = row as f64 * th;
        let shift = row_shift(row, p.offset, s);
        for col in -2..cols + 1 {
            let x = col as f64 * s / 2.0 + shift;
            let up = (col + row).rem_euclid(2) == 0;
            let vertices = if up {
                vec![
                    Point::new(x, y + th),
                    Point::new(x + s / 2.0, y),
                    Point::new(x + s, y + th),
                ]
            } else {
                vec![
                    Point::new(x, y),
                    Point::new(x + s, y),
                    Point::new(x + s / 2.0, y + th),
                ]
            };
            out.push((vertices, inradius));
        }
    }
    out
}

fn hexagons(p: &TessellationParams, w: f64, h: f64) -> Vec<RawTile> {
    // Pointy-top hexagons with circumradius r.
    let r = p.cell_size / 2.0;
    let pitch_x = SQRT_3 * r;
    let pitch_y = 1.5 * r;
    let rows = (h / pitch_y).ceil() as i64 + 1;
    let cols = (w / pitch_x).ceil() as i64 + 1;
    let mut out = Vec::new();
    for row in 0..rows {
        let cy = row as f64 * pitch_y;
        let shift = row_shift(row, p.offset, pitch_x);
        for col in -1..cols {
            let cx = col as f64 * pitch_x + shift;
            let vertices = (0..6)
                .map(|i| {
                    let angle = (60.0 * i as f64 - 30.0).to_radians();
                    Point::new(cx + r * angle.cos(), cy + r * angle.sin())
                })
                .collect();
            out.push((vertices, r * SQRT_3 / 2.0));
        }
    }
    out
}
