// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Deferred-rendering frame compositor built on wgpu.
//!
//! Prism turns a scene's draw calls into a finished frame through a
//! G-Buffer, a deferred lighting pass with shadow maps, weighted blended
//! order-independent transparency, and a reconfigurable post-processing
//! stack. The order of those passes is data: a
//! [`renderer::pipeline::RenderPipeline`] is a list of named stages, each
//! naming a built-in pass and optional callbacks around it.
//!
//! # Key entry points
//!
//! - [`renderer::pipeline::RenderPipeline`] - the stage list and its
//!   executor
//! - [`renderer::postprocess::stack::PostProcessingStack`] - ordered,
//!   editable post-processing effects
//! - [`renderer::frame::DeferredRenderer`] - the GPU resources a frame
//!   runs against
//! - [`renderer::scene::SceneDraw`] - what a host scene implements
//! - [`options::Options`] - runtime configuration with TOML presets
//!
//! # Frame flow
//!
//! [`renderer::pipeline::RenderPipeline::deferred`] builds the usual
//! order: shadows, G-Buffer clear, solids, skybox, lighting, transparents,
//! post-processing. The transparency resolve runs once, right before the
//! first read of the lit output; post-processing effects ping-pong between
//! the default target and a secondary buffer so no pass reads what it
//! writes.

pub mod error;
pub mod gpu;
pub mod options;
pub mod renderer;
pub mod util;
#[cfg(feature = "viewer")]
pub mod viewer;
