//! The deferred frame compositor.
//!
//! [`pipeline::RenderPipeline`] sequences the passes; [`frame::DeferredRenderer`]
//! owns the GPU side of them: the G-Buffer, deferred lighting, shadow maps,
//! the weighted OIT resolve, and the post-processing buffers that
//! [`postprocess::stack::PostProcessingStack`]s draw through.

pub mod blit;
pub mod frame;
pub mod gbuffer;
pub mod lighting;
pub mod pass_id;
pub mod pipeline;
pub mod postprocess;
pub mod scene;
pub mod shadow;
pub mod transparency;
