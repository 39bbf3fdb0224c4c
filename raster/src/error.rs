//! Renderer error types

use thiserror::Error;

/// Errors reported by the renderer surface.
///
/// Only API misuse is reported here. Geometry that is culled, clipped away or
/// degenerate is dropped silently and shows up in `FrameStats` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("invalid framebuffer dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("resolution {width}x{height} exceeds the {max}px limit")]
    ResolutionTooLarge { width: u32, height: u32, max: u32 },

    #[error("unsupported MSAA level {0}, expected a log2 sample count in 0..=5")]
    UnsupportedMsaa(u32),

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
}

pub type Result<T> = core::result::Result<T, RenderError>;
