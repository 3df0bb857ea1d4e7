pub mod band;
pub mod buffer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod escape;
pub mod orchestrator;
pub mod raster;
pub mod renderer;
pub mod shading;
pub mod simulation;
pub mod task;
pub mod vector;

pub use band::{split_rows, Band};
pub use buffer::RenderBuffer;
pub use config::StudioConfig;
pub use dispatch::{Dispatched, Dispatcher};
pub use error::RenderError;
pub use orchestrator::{Orchestrator, RenderHandle, RenderPhase};
pub use renderer::{
    prepare, prepare_with, render, CancelToken, ExecutionPath, Frame, Prepared, RenderCancel,
};
pub use task::RasterTask;

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
