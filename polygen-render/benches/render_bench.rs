use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use polygen_core::reaction_diffusion::Preset;
use polygen_core::{FlowFieldParams, GrayScott, MandelbrotParams, Params, ReactionDiffusionParams};
use polygen_render::escape::EscapeTimeTask;
use polygen_render::{render, CancelToken, Dispatcher, StudioConfig};

fn bench_mandelbrot_single_threaded(c: &mut Criterion) {
    let params = Params::Mandelbrot(MandelbrotParams::default());

    c.bench_function("mandelbrot_640x480_single", |b| {
        b.iter(|| render(&params, 640, 480));
    });
}

fn bench_mandelbrot_dispatch(c: &mut Criterion) {
    let dispatcher = Dispatcher::new(&StudioConfig::default());
    let bands = dispatcher.config().bands();
    let task = Arc::new(EscapeTimeTask::new(&MandelbrotParams::default(), 640, 480));

    c.bench_function("mandelbrot_640x480_dispatch", |b| {
        b.iter(|| dispatcher.dispatch(task.clone(), bands));
    });
}

fn bench_gray_scott_frame(c: &mut Criterion) {
    let dispatcher = Dispatcher::new(&StudioConfig::default());
    let params = ReactionDiffusionParams::for_preset(Preset::Labyrinth);
    let mut sim = GrayScott::for_raster(&params, 800, 600, 4);
    let steps = params.iterations_per_frame();

    c.bench_function("gray_scott_200x150_frame", |b| {
        b.iter(|| dispatcher.step_simulation(&mut sim, steps, &CancelToken::never()));
    });
}

fn bench_flow_field(c: &mut Criterion) {
    let params = Params::FlowField(FlowFieldParams {
        seed: Some(1),
        ..FlowFieldParams::default()
    });

    c.bench_function("flow_field_640x480", |b| {
        b.iter(|| render(&params, 640, 480));
    });
}

criterion_group!(
    benches,
    bench_mandelbrot_single_threaded,
    bench_mandelbrot_dispatch,
    bench_gray_scott_frame,
    bench_flow_field
);
criterion_main!(benches);
