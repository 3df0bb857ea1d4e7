use polygen_core::attractor::{generate_points, AttractorKind, Coefficients};
use polygen_core::reaction_diffusion::Preset;
use polygen_core::{
    interpolate, ColorStop, EscapeTime, GrayScott, MandelbrotParams, Mode, Params, Perlin,
    ReactionDiffusionParams, Rgb,
};

fn black_to_white() -> Vec<ColorStop> {
    vec![
        ColorStop::new(Rgb::BLACK, 0.0),
        ColorStop::new(Rgb::WHITE, 100.0),
    ]
}

#[test]
fn end_to_end_mandelbrot_structure() {
    let params = MandelbrotParams {
        zoom: 1.0,
        pan_x: 0.0,
        pan_y: 0.0,
        iterations: 100,
        is_julia_set: false,
        color_palette: black_to_white(),
        ..MandelbrotParams::default()
    };
    let kernel = EscapeTime::new(&params, 100, 100);
    let cap = kernel.max_iterations();

    // (38, 50) maps to about -1.17 (period-2 bulb), (57, 50) to about
    // -0.5 (main cardioid).
    assert_eq!(kernel.escape_count(38, 50), cap);
    assert_eq!(kernel.escape_count(57, 50), cap);

    // Frame corners lie far outside the set.
    for (x, y) in [(0, 0), (99, 0), (0, 99), (99, 99)] {
        assert!(kernel.escape_count(x, y) <= 2, "corner ({x}, {y})");
    }

    let inside = (0..100)
        .filter(|&x| kernel.escape_count(x, 50) == cap)
        .count();
    assert!(inside > 10);
}

#[test]
fn interpolation_midpoint_is_grey() {
    let mid = interpolate(&black_to_white(), 0.5);
    for channel in [mid.r, mid.g, mid.b] {
        assert!((127..=128).contains(&channel));
    }
}

#[test]
fn single_octave_is_base_noise() {
    let perlin = Perlin::new();
    for (x, y) in [(1.5, 2.5), (0.3, 7.9), (-4.2, 3.3)] {
        assert_eq!(perlin.octave_noise(x, y, 1, 0.5), perlin.noise(x, y));
    }
}

#[test]
fn extreme_de_jong_returns_finite_points_only() {
    let extreme = Coefficients {
        a: 1e6,
        b: -1e6,
        c: 1e6,
        d: -1e6,
    };
    let points = generate_points(AttractorKind::DeJong, &extreme, 50_000, 0.01);
    assert!(points.len() < 50_000);
    assert!(points.iter().all(|p| p.position.x.is_finite()
        && p.position.y.is_finite()
        && p.position.z.is_finite()));
}

#[test]
fn diverging_lorenz_never_returns_non_finite_points() {
    let wild = Coefficients {
        a: 1e9,
        b: 1e9,
        c: -1e9,
        d: 0.0,
    };
    let points = generate_points(AttractorKind::Lorenz, &wild, 10_000, 0.1);
    assert!(points.len() < 10_000 - 100);
    assert!(points.iter().all(|p| p.position.x.abs() <= 1000.0));
}

#[test]
fn params_round_trip_through_json() {
    for mode in Mode::ALL {
        let params = Params::default_for(mode);
        let json = serde_json::to_string(&params).unwrap();
        let back: Params = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params, "{mode}");
    }
}

#[test]
fn params_json_uses_mode_tag_and_camel_case() {
    let json = r##"{
        "mode": "mandelbrot",
        "zoom": 2.0,
        "panX": -0.5,
        "isJuliaSet": true,
        "colorPalette": [
            {"color": "#000000", "position": 0},
            {"color": "#ffffff", "position": 100}
        ]
    }"##;
    let params: Params = serde_json::from_str(json).unwrap();
    let Params::Mandelbrot(m) = params else {
        panic!("expected mandelbrot params");
    };
    assert_eq!(m.zoom, 2.0);
    assert_eq!(m.pan_x, -0.5);
    assert!(m.is_julia_set);
    // Omitted fields take their defaults.
    assert_eq!(m.iterations, 100);
    assert_eq!(m.color_palette[1].color, Rgb::WHITE);
}

#[test]
fn structural_presets_reproduce_exactly() {
    for preset in [Preset::Stripes, Preset::Labyrinth] {
        let params = ReactionDiffusionParams::for_preset(preset);
        let mut a = GrayScott::new(&params, 40, 30);
        let mut b = GrayScott::new(&params, 40, 30);
        a.step(25);
        b.step(25);
        assert_eq!(a.u(), b.u());
        assert_eq!(a.v(), b.v());
    }
}

#[test]
fn sanitized_params_are_idempotent() {
    for mode in Mode::ALL {
        let once = Params::default_for(mode).sanitized();
        assert_eq!(once.sanitized(), once, "{mode}");
    }
}
