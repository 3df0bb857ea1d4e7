use thiserror::Error;

/// Errors originating from the pattern engine.
///
/// Generators themselves never fail: out-of-range numbers are clamped by
/// `sanitized()`. These errors come from parsing user-facing strings and
/// from constructing rasters with impossible dimensions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid colour {0:?} (expected #rrggbb)")]
    InvalidColor(String),

    #[error("invalid automaton rule {rule:?}: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("invalid raster dimensions: {width}×{height} (both must be > 0)")]
    InvalidDimensions { width: u32, height: u32 },
}
