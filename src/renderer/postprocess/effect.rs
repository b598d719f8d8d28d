//! Post-processing effects: the handle type a stack stores and the
//! fullscreen-shader implementation the compositor ships with.
//!
//! Every effect draws one fullscreen triangle into the default
//! post-processing target. Bind group 0 (the `prism::post_inputs` layout) is
//! set by the compositor before [`PostEffect::encode`] runs; the effect binds
//! whatever else it needs from group 1 onwards.

use std::rc::Rc;

use wgpu::util::DeviceExt;

use crate::error::PrismError;
use crate::gpu::pipeline_helpers::{
    color_target, create_screen_space_pipeline, uniform_buffer,
};
use crate::gpu::render_context::RenderContext;
use crate::gpu::shader_composer::ShaderComposer;
use crate::options::PostProcessingOptions;
use crate::renderer::postprocess::targets::POST_FORMAT;

/// Which buffer feeds `main_image` for the next effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSource {
    /// The lit G-Buffer attachment (first effect of a stack).
    LitOutput,
    /// The post-processing buffer holding the previous effect's output.
    PostProcessBuffer,
}

/// A drawable post-processing effect.
pub trait PostEffect {
    /// Debug label.
    fn label(&self) -> &str;

    /// Record the effect's draw. Group 0 is already bound.
    fn encode(&self, pass: &mut wgpu::RenderPass<'_>);
}

/// Shared handle to a post-processing effect.
pub type ShaderHandle = Rc<dyn PostEffect>;

/// Callback that picks an effect each replay, given where its input comes
/// from.
pub type EffectFn = Rc<dyn Fn(ColorSource) -> ShaderHandle>;

/// Number of free `f32` parameters each [`ShaderEffect`] exposes.
pub const EFFECT_PARAM_COUNT: usize = 8;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct EffectParams {
    values: [f32; EFFECT_PARAM_COUNT],
}

/// A post-processing effect backed by a WGSL fullscreen shader.
///
/// The source must define `vs_main` and `fs_main`, may
/// `#import prism::post_inputs::{...}` for the frame inputs, and reads its
/// parameters through `effect_param(i)`.
pub struct ShaderEffect {
    label: String,
    pipeline: wgpu::RenderPipeline,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
}

impl ShaderEffect {
    /// Compile `source` into an effect writing the post-processing format.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if the shader does not compose,
    /// validate, or expose both entry points.
    pub fn new(
        context: &RenderContext,
        shader_composer: &mut ShaderComposer,
        inputs_layout: &wgpu::BindGroupLayout,
        label: &str,
        source: &str,
    ) -> Result<Self, PrismError> {
        let shader = shader_composer.compose_screen(
            &context.device,
            &format!("{label} Shader"),
            source,
            &format!("{label}.wgsl"),
        )?;

        let params_layout = context.device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label} Params Layout")),
                entries: &[uniform_buffer(0)],
            },
        );
        let params_buffer = context.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Params")),
                contents: bytemuck::bytes_of(&EffectParams {
                    values: [0.0; EFFECT_PARAM_COUNT],
                }),
                usage: wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_DST,
            },
        );
        let params_bind_group =
            context
                .device
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("{label} Params")),
                    layout: &params_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    }],
                });

        let pipeline = create_screen_space_pipeline(
            &context.device,
            label,
            &shader,
            &[color_target(POST_FORMAT, None)],
            &[inputs_layout, &params_layout],
        );
        log::debug!("compiled post-processing effect '{label}'");

        Ok(Self {
            label: label.to_owned(),
            pipeline,
            params_buffer,
            params_bind_group,
        })
    }

    /// The built-in exposure tone-map + gamma effect, applied only to texels
    /// whose lit flag is set.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if the built-in shader fails to
    /// compile.
    pub fn tonemap(
        context: &RenderContext,
        shader_composer: &mut ShaderComposer,
        inputs_layout: &wgpu::BindGroupLayout,
        options: &PostProcessingOptions,
    ) -> Result<Self, PrismError> {
        let effect = Self::new(
            context,
            shader_composer,
            inputs_layout,
            "Tonemap",
            include_str!("../../../assets/shaders/screen/tonemap.wgsl"),
        )?;
        effect.set_params(
            &context.queue,
            tonemap_params(options, context.format()),
        );
        Ok(effect)
    }

    /// Upload the effect's parameters. The write lands before the next
    /// submission, so every use of this effect in that frame sees it.
    pub fn set_params(
        &self,
        queue: &wgpu::Queue,
        values: [f32; EFFECT_PARAM_COUNT],
    ) {
        queue.write_buffer(
            &self.params_buffer,
            0,
            bytemuck::bytes_of(&EffectParams { values }),
        );
    }
}

impl PostEffect for ShaderEffect {
    fn label(&self) -> &str {
        &self.label
    }

    fn encode(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(1, &self.params_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Parameter block of the tone-map effect: exposure, then gamma (1 when the
/// output surface encodes sRGB itself).
pub fn tonemap_params(
    options: &PostProcessingOptions,
    output_format: wgpu::TextureFormat,
) -> [f32; EFFECT_PARAM_COUNT] {
    let mut values = [0.0; EFFECT_PARAM_COUNT];
    values[0] = options.exposure;
    values[1] = options.effective_gamma(output_format);
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tonemap_params_skip_gamma_on_srgb_output() {
        let options = PostProcessingOptions {
            exposure: 1.25,
            gamma: 2.2,
        };
        let linear =
            tonemap_params(&options, wgpu::TextureFormat::Bgra8Unorm);
        assert_eq!(linear[..2], [1.25_f32, 2.2]);
        let srgb =
            tonemap_params(&options, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(srgb[..2], [1.25_f32, 1.0]);
        assert!(srgb[2..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn params_block_matches_uniform_layout() {
        assert_eq!(size_of::<EffectParams>(), 32);
    }
}
