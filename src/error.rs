//! Crate-level error types.

use std::fmt;

use crate::gpu::render_context::RenderContextError;

/// Errors produced by the prism crate.
#[derive(Debug)]
pub enum PrismError {
    /// GPU context initialization failure.
    Gpu(RenderContextError),
    /// A frame size with a non-positive dimension was requested.
    InvalidSize {
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
    },
    /// A background color component was negative or above the valid range.
    InvalidColor([f32; 3]),
    /// No render-pipeline or post-processing stage has the given name.
    StageNotFound(String),
    /// No post-processing stack is registered under the given name.
    StackNotFound(String),
    /// The named render-pipeline stage is not a post-processing stage.
    NotPostProcessingStage(String),
    /// Index-based access past the end of a stage list.
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Length of the list at the time of the request.
        len: usize,
    },
    /// The light list is already at capacity.
    LightLimit {
        /// Maximum number of simultaneously active lights.
        max: usize,
    },
    /// Every shadow-map layer is already assigned to a light.
    ShadowCasterLimit {
        /// Maximum number of shadow-casting lights.
        max: usize,
    },
    /// A WGSL shader failed to compose or validate.
    ShaderCompose(String),
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// Viewer event-loop failure.
    Viewer(String),
}

impl fmt::Display for PrismError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::InvalidSize { width, height } => {
                write!(f, "invalid frame size {width}x{height}")
            }
            Self::InvalidColor(c) => write!(
                f,
                "invalid color [{}, {}, {}]: components must lie in 0..=1",
                c[0], c[1], c[2]
            ),
            Self::StageNotFound(name) => write!(f, "no stage named '{name}'"),
            Self::StackNotFound(name) => {
                write!(f, "no post-processing stack named '{name}'")
            }
            Self::NotPostProcessingStage(name) => {
                write!(f, "stage '{name}' is not a post-processing stage")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for {len} stages")
            }
            Self::LightLimit { max } => {
                write!(f, "light limit reached ({max} lights)")
            }
            Self::ShadowCasterLimit { max } => {
                write!(f, "shadow caster limit reached ({max} casters)")
            }
            Self::ShaderCompose(msg) => {
                write!(f, "shader composition error: {msg}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Viewer(msg) => write!(f, "viewer error: {msg}"),
        }
    }
}

impl std::error::Error for PrismError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RenderContextError> for PrismError {
    fn from(e: RenderContextError) -> Self {
        Self::Gpu(e)
    }
}

impl From<std::io::Error> for PrismError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
