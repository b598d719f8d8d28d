//! Low-level GPU infrastructure: device/surface context, render targets,
//! shader composition, and pipeline boilerplate.

pub mod pipeline_helpers;
pub mod render_context;
pub mod shader_composer;
pub mod texture;
