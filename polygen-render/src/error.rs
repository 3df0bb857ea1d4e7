use std::time::Duration;

use thiserror::Error;

/// Errors originating from the rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid image dimensions: {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("render cancelled")]
    Cancelled,

    #[error("render {id} superseded by render {latest}")]
    Superseded { id: u64, latest: u64 },

    #[error("band {band} did not finish within {timeout:?}")]
    TimedOut { band: usize, timeout: Duration },

    #[error("worker failed: {0}")]
    WorkerFailed(String),

    #[error("no worker pool available")]
    Unavailable,

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] polygen_core::CoreError),
}

impl RenderError {
    /// Whether this is a logical cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Superseded { .. })
    }

    /// Whether the parallel path should give way to the single-threaded one.
    pub(crate) fn wants_fallback(&self) -> bool {
        matches!(
            self,
            Self::TimedOut { .. } | Self::WorkerFailed(_) | Self::Unavailable
        )
    }
}
