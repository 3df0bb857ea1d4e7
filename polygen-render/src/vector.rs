//! Tasks for the modes that generate vector records first and rasterize them
//! second.
//!
//! Geometry is generated once, when the task is built, with any random seed
//! already resolved. Every band then rasterizes the same records, which keeps
//! banded and single-band output identical even for unseeded parameters.

use polygen_core::mode::resolve_seed;
use polygen_core::{
    chaos_game, circle_packing, flow_field, tessellation, AttractorPoint,
    ChaosGameParams, CirclePackingParams, FlowFieldParams, FlowPath, Geometry, Mode, PackedCircle,
    Params, Point, Rgb, StrangeAttractorParams, TessellationParams, Tile, VoronoiDiagram,
    VoronoiParams,
};

use crate::band::Band;
use crate::error::RenderError;
use crate::raster::Canvas;
use crate::renderer::CancelToken;
use crate::task::{shade_rows, RasterTask};

const ATTRACTOR_BACKGROUND: Rgb = Rgb::new(0x0a, 0x0a, 0x0a);
const ATTRACTOR_ALPHA: f64 = 0.6;
/// Empty border around a fitted attractor, per side, as a fraction of the frame.
const FIT_MARGIN: f64 = 0.05;
const CIRCLE_STROKE_WIDTH: f64 = 1.0;

enum Scene {
    Attractor {
        path: Vec<Point>,
        as_points: bool,
        color: Rgb,
        line_weight: f64,
    },
    Chaos {
        points: Vec<Point>,
        color: Rgb,
        background: Rgb,
    },
    Flow {
        paths: Vec<FlowPath>,
        params: FlowFieldParams,
    },
    Circles {
        circles: Vec<PackedCircle>,
        params: CirclePackingParams,
    },
    Tiles {
        tiles: Vec<Tile>,
        background: Rgb,
    },
    Voronoi(VoronoiDiagram),
}

pub struct VectorTask {
    mode: Mode,
    scene: Scene,
    width: u32,
    height: u32,
}

impl VectorTask {
    /// Generate the geometry for `params` and a task that rasterizes it.
    /// Returns `None` for modes without vector output.
    ///
    /// Flow-field tracing and circle packing poll `cancel` as they go and
    /// stop with [`RenderError::Cancelled`].
    pub fn new(
        params: &Params,
        width: u32,
        height: u32,
        cancel: &CancelToken,
    ) -> crate::Result<Option<(Self, Geometry)>> {
        cancel.check()?;
        let stop = || cancel.is_cancelled();
        let (scene, geometry) = match params {
            Params::StrangeAttractor(p) => attractor_scene(p, width, height),
            Params::ChaosGame(p) => {
                let p = ChaosGameParams {
                    seed: Some(resolve_seed(p.seed)),
                    ..p.sanitized()
                };
                let points = chaos_game::generate_points(&p, width, height);
                (
                    Scene::Chaos {
                        points: points.clone(),
                        color: p.point_color,
                        background: p.bg_color,
                    },
                    Geometry::Points(points),
                )
            }
            Params::FlowField(p) => {
                let p = FlowFieldParams {
                    seed: Some(resolve_seed(p.seed)),
                    ..p.sanitized()
                };
                let paths = flow_field::generate_paths_until(&p, width, height, &stop)
                    .ok_or(RenderError::Cancelled)?;
                (
                    Scene::Flow {
                        paths: paths.clone(),
                        params: p,
                    },
                    Geometry::Paths(paths),
                )
            }
            Params::CirclePacking(p) => {
                let p = CirclePackingParams {
                    seed: Some(resolve_seed(p.seed)),
                    ..p.sanitized()
                };
                let circles = circle_packing::pack_until(&p, width, height, &stop)
                    .ok_or(RenderError::Cancelled)?;
                (
                    Scene::Circles {
                        circles: circles.clone(),
                        params: p,
                    },
                    Geometry::Circles(circles),
                )
            }
            Params::Tessellation(p) => {
                let p = TessellationParams {
                    seed: Some(resolve_seed(p.seed)),
                    ..p.sanitized()
                };
                let tiles = tessellation::generate(&p, width, height);
                (
                    Scene::Tiles {
                        tiles: tiles.clone(),
                        background: p.background,
                    },
                    Geometry::Tiles(tiles),
                )
            }
            Params::Voronoi(p) => {
                let p = VoronoiParams {
                    seed: Some(resolve_seed(p.seed)),
                    ..p.sanitized()
                };
                let diagram = VoronoiDiagram::new(&p, width, height);
                let cells = diagram.cells().to_vec();
                (Scene::Voronoi(diagram), Geometry::Cells(cells))
            }
            Params::Gradient(_)
            | Params::NoiseField(_)
            | Params::Mandelbrot(_)
            | Params::ReactionDiffusion(_)
            | Params::CellularAutomata(_)
            | Params::OpArt(_) => return Ok(None),
        };
        let task = Self {
            mode: params.mode(),
            scene,
            width,
            height,
        };
        Ok(Some((task, geometry)))
    }
}

impl RasterTask for VectorTask {
    fn mode(&self) -> Mode {
        self.mode
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn render_rows(&self, band: &Band, out: &mut [u8], cancel: &CancelToken) -> crate::Result<()> {
        if let Scene::Voronoi(diagram) = &self.scene {
            return shade_rows(band, out, cancel, |x, y| diagram.pixel(x, y));
        }

        let mut canvas = Canvas::new(band, out);
        match &self.scene {
            Scene::Attractor {
                path,
                as_points,
                color,
                line_weight,
            } => {
                canvas.fill(ATTRACTOR_BACKGROUND);
                if *as_points {
                    let size = line_weight.max(1.0);
                    for p in path {
                        canvas.fill_rect(
                            p.x - size / 2.0,
                            p.y - size / 2.0,
                            size,
                            size,
                            *color,
                            ATTRACTOR_ALPHA,
                        );
                    }
                } else {
                    canvas.stroke_polyline(path, *line_weight, *color, ATTRACTOR_ALPHA);
                }
            }
            Scene::Chaos {
                points,
                color,
                background,
            } => {
                canvas.fill(*background);
                for p in points {
                    canvas.fill_rect(p.x.floor(), p.y.floor(), 1.0, 1.0, *color, 1.0);
                }
            }
            Scene::Flow { paths, params } => {
                canvas.fill(params.background);
                for (i, path) in paths.iter().enumerate() {
                    if i % 64 == 0 {
                        cancel.check()?;
                    }
                    canvas.stroke_polyline(
                        &path.points,
                        params.line_weight,
                        params.color,
                        params.opacity,
                    );
                }
            }
            Scene::Circles { circles, params } => {
                canvas.fill(params.background);
                for c in circles {
                    if params.show_fill {
                        canvas.fill_circle(c.center, c.radius, params.fill_color, 1.0);
                    }
                    if params.show_stroke {
                        canvas.stroke_circle(
                            c.center,
                            c.radius,
                            CIRCLE_STROKE_WIDTH,
                            params.stroke_color,
                            1.0,
                        );
                    }
                }
            }
            Scene::Tiles { tiles, background } => {
                canvas.fill(*background);
                for tile in tiles {
                    canvas.fill_polygon(&tile.vertices, tile.color, 1.0);
                }
            }
            Scene::Voronoi(_) => {}
        }
        cancel.check()
    }
}

fn attractor_scene(params: &StrangeAttractorParams, width: u32, height: u32) -> (Scene, Geometry) {
    let p = params.sanitized();
    let points = p.points();
    let scene = Scene::Attractor {
        path: fit_to_frame(&points, width, height),
        as_points: p.kind.is_discrete(),
        color: p.color,
        line_weight: p.line_weight,
    };
    (scene, Geometry::Attractor(points))
}

/// Project points onto the x/y plane and scale them uniformly to fill the
/// frame, leaving a [`FIT_MARGIN`] border.
pub fn fit_to_frame(points: &[AttractorPoint], width: u32, height: u32) -> Vec<Point> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let init = (first.position.x, first.position.x, first.position.y, first.position.y);
    let (min_x, max_x, min_y, max_y) = points.iter().fold(init, |(x0, x1, y0, y1), p| {
        (
            x0.min(p.position.x),
            x1.max(p.position.x),
            y0.min(p.position.y),
            y1.max(p.position.y),
        )
    });

    let (w, h) = (width as f64, height as f64);
    let usable = 1.0 - 2.0 * FIT_MARGIN;
    let scale_x = w * usable / (max_x - min_x).max(f64::EPSILON);
    let scale_y = h * usable / (max_y - min_y).max(f64::EPSILON);
    let scale = scale_x.min(scale_y);
    let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

    points
        .iter()
        .map(|p| {
            Point::new(
                w / 2.0 + (p.position.x - cx) * scale,
                h / 2.0 + (p.position.y - cy) * scale,
            )
        })
        .collect()
}
