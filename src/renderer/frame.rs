//! The deferred renderer: every GPU resource a frame touches, and the
//! [`FrameTarget`] implementation that records one frame of them.

use glam::Vec3;

use crate::error::PrismError;
use crate::gpu::render_context::RenderContext;
use crate::gpu::shader_composer::ShaderComposer;
use crate::options::{GBufferOptions, Options};
use crate::renderer::blit::Blitter;
use crate::renderer::gbuffer::{
    FrameSize, GBuffer, GEOMETRY_ATTACHMENTS, TRANSPARENT_ATTACHMENTS,
};
use crate::renderer::lighting::LightingCompositor;
use crate::renderer::pass_id::Attachment;
use crate::renderer::pipeline::{FrameTarget, RenderPipeline};
use crate::renderer::postprocess::effect::{ColorSource, PostEffect};
use crate::renderer::postprocess::targets::{PostProcessTargets, POST_FORMAT};
use crate::renderer::scene::SceneDraw;
use crate::renderer::shadow::ShadowMaps;
use crate::renderer::transparency::{ResolveTracker, TransparencyCompositor};

/// Owns the G-Buffer, the lighting, transparency and shadow passes, and the
/// post-processing buffers of one output.
pub struct DeferredRenderer {
    gbuffer: GBuffer,
    lighting: LightingCompositor,
    transparency: TransparencyCompositor,
    shadows: ShadowMaps,
    post: PostProcessTargets,
    blitter: Blitter,
    options: Options,
}

impl DeferredRenderer {
    /// Allocate every target at the context's current size.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::InvalidSize`] if the context is zero-sized,
    /// [`PrismError::InvalidColor`] for an out-of-range background, and
    /// [`PrismError::ShaderCompose`] if a built-in shader fails to compile.
    pub fn new(
        context: &RenderContext,
        shader_composer: &mut ShaderComposer,
        options: Options,
    ) -> Result<Self, PrismError> {
        let _ = GBufferOptions::validated_background(
            options.gbuffer.background,
            false,
        )?;
        let size = FrameSize::new(
            i32::try_from(context.width()).unwrap_or(i32::MAX),
            i32::try_from(context.height()).unwrap_or(i32::MAX),
        )?;
        let device = &context.device;
        let gbuffer = GBuffer::new(device, size);
        let shadows = ShadowMaps::new(device, &options.shadows);
        let lighting =
            LightingCompositor::new(device, shader_composer, &gbuffer, &shadows)?;
        let transparency = TransparencyCompositor::new(
            device,
            shader_composer,
            &gbuffer,
            &options.transparency,
        )?;
        let post = PostProcessTargets::new(device, &gbuffer);
        let blitter = Blitter::new(device, shader_composer)?;
        log::info!(
            "deferred renderer ready at {}x{}",
            size.width(),
            size.height()
        );
        Ok(Self {
            gbuffer,
            lighting,
            transparency,
            shadows,
            post,
            blitter,
            options,
        })
    }

    /// Resize every target together. Invalid sizes are rejected and leave
    /// the renderer untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::InvalidSize`] if either dimension is below 1.
    pub fn resize(
        &mut self,
        context: &RenderContext,
        width: i32,
        height: i32,
    ) -> Result<(), PrismError> {
        if self.gbuffer.resize(&context.device, width, height)? {
            self.lighting.rebind(&context.device, &self.gbuffer);
            self.transparency.rebind(&context.device, &self.gbuffer);
            self.post
                .resize(&context.device, &context.queue, &self.gbuffer);
            log::info!("frame resized to {width}x{height}");
        }
        Ok(())
    }

    /// Current frame size.
    pub fn size(&self) -> FrameSize {
        self.gbuffer.size()
    }

    /// The G-Buffer.
    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    /// The lighting pass and its light list.
    pub fn lighting(&self) -> &LightingCompositor {
        &self.lighting
    }

    /// Mutable lighting pass, for light edits and custom shaders.
    pub fn lighting_mut(&mut self) -> &mut LightingCompositor {
        &mut self.lighting
    }

    /// The shadow maps alongside the mutable lighting pass, for hosts that
    /// build caster pipelines while registering lights.
    pub fn shadows_and_lighting_mut(
        &mut self,
    ) -> (&ShadowMaps, &mut LightingCompositor) {
        (&self.shadows, &mut self.lighting)
    }

    /// Mutable transparency pass, for a custom resolve shader.
    pub fn transparency_mut(&mut self) -> &mut TransparencyCompositor {
        &mut self.transparency
    }

    /// Shadow maps; scene caster pipelines use its layout.
    pub fn shadows(&self) -> &ShadowMaps {
        &self.shadows
    }

    /// Post-processing buffers; effects are built against its
    /// `inputs_layout`.
    pub fn post_targets(&self) -> &PostProcessTargets {
        &self.post
    }

    /// Active options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Replace the options. Shadow resolution is fixed at construction.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::InvalidColor`] for an out-of-range background;
    /// the previous options stay active.
    pub fn set_options(
        &mut self,
        queue: &wgpu::Queue,
        options: Options,
    ) -> Result<(), PrismError> {
        let _ = GBufferOptions::validated_background(
            options.gbuffer.background,
            false,
        )?;
        if options.shadows.resolution != self.shadows.resolution() {
            log::warn!("shadow resolution changes need a new renderer");
        }
        self.transparency.set_options(queue, &options.transparency);
        self.options = options;
        Ok(())
    }

    /// Record and submit one frame: run `pipeline` against `scene`, then
    /// present the default post-processing target into `output`.
    pub fn render(
        &mut self,
        context: &RenderContext,
        pipeline: &mut RenderPipeline,
        scene: &mut dyn SceneDraw,
        camera_position: Vec3,
        output: &wgpu::TextureView,
        output_format: wgpu::TextureFormat,
    ) {
        self.lighting.prepare(
            &context.device,
            &context.queue,
            camera_position,
            &self.options.lighting,
            &self.shadows,
            &self.options.shadows,
        );

        let mut encoder = context.create_encoder();
        let mut frame = Frame {
            context,
            encoder: &mut encoder,
            renderer: self,
            scene,
            oit: ResolveTracker::default(),
            primed: false,
            output_written: false,
        };
        pipeline.execute(&mut frame);
        frame.finish();

        self.blitter.blit(
            &context.device,
            &mut encoder,
            &self.post.default_target().view,
            output,
            output_format,
        );
        self.post.capture_previous(&mut encoder);
        context.submit(encoder);
    }
}

/// One frame in flight. Tracks the OIT resolve and whether the default
/// target has been written yet.
struct Frame<'a> {
    context: &'a RenderContext,
    encoder: &'a mut wgpu::CommandEncoder,
    renderer: &'a DeferredRenderer,
    scene: &'a mut dyn SceneDraw,
    oit: ResolveTracker,
    primed: bool,
    output_written: bool,
}

impl Frame<'_> {
    fn flush_resolve(&mut self) {
        if self.oit.take_pending() {
            self.renderer
                .transparency
                .resolve(self.encoder, &self.renderer.gbuffer);
        }
    }

    /// Resolve any remaining transparency and make sure the default target
    /// holds this frame even if no post-processing stage ran.
    fn finish(mut self) {
        self.flush_resolve();
        if !self.output_written {
            let source = self.begin_post_processing();
            self.copy_to_output(source);
        }
    }

    fn geometry_pass(&mut self, label: &str, skybox: bool) {
        let mut pass = self.renderer.gbuffer.begin_pass(
            self.encoder,
            label,
            &GEOMETRY_ATTACHMENTS,
            true,
        );
        if skybox {
            self.scene.draw_skybox(&mut pass);
        } else {
            self.scene.draw_solid(&mut pass);
        }
    }
}

impl FrameTarget for Frame<'_> {
    fn draw_solid(&mut self) {
        self.geometry_pass("Solid Pass", false);
    }

    fn draw_skybox(&mut self) {
        self.geometry_pass("Skybox Pass", true);
    }

    fn draw_transparent(&mut self) {
        if !self.oit.can_accumulate() {
            log::warn!(
                "transparent draw after this frame's OIT resolve, skipped"
            );
            return;
        }
        let mut pass = self.renderer.gbuffer.begin_pass(
            self.encoder,
            "Transparent Pass",
            &TRANSPARENT_ATTACHMENTS,
            true,
        );
        self.scene.draw_transparent(&mut pass);
        drop(pass);
        self.oit.mark_accumulated();
    }

    fn draw_lighting(&mut self) {
        self.renderer
            .lighting
            .render(self.encoder, &self.renderer.gbuffer);
    }

    fn shadow_pass(&mut self) {
        let renderer = self.renderer;
        let layers = renderer.shadows.render(
            self.encoder,
            &self.context.queue,
            renderer.lighting.lights(),
            &mut *self.scene,
            &renderer.options.shadows,
        );
        log::debug!("shadow pass: redrew {layers} layers");
    }

    fn clear_g_buffer(&mut self) {
        self.renderer
            .gbuffer
            .clear(self.encoder, self.renderer.options.gbuffer.clear_color());
        self.oit.begin_frame();
        self.primed = false;
    }

    fn copy_g_to_pp(&mut self, attachment: Attachment) {
        if attachment == Attachment::Lit {
            self.flush_resolve();
        }
        let renderer = self.renderer;
        let source = renderer.gbuffer.target(attachment);
        let secondary = renderer.post.secondary();
        if source.format() == POST_FORMAT {
            source.copy_to(self.encoder, secondary);
        } else {
            renderer.blitter.blit(
                &self.context.device,
                self.encoder,
                &source.view,
                &secondary.view,
                POST_FORMAT,
            );
        }
        self.primed = true;
    }

    fn begin_post_processing(&mut self) -> ColorSource {
        self.flush_resolve();
        if std::mem::take(&mut self.primed) {
            ColorSource::PostProcessBuffer
        } else {
            ColorSource::LitOutput
        }
    }

    fn apply_effect(&mut self, effect: &dyn PostEffect, source: ColorSource) {
        let post = &self.renderer.post;
        let mut pass = post.begin_effect_pass(self.encoder, effect.label());
        pass.set_bind_group(0, post.inputs(source), &[]);
        effect.encode(&mut pass);
        self.output_written = true;
    }

    fn copy_output_to_post_buffer(&mut self) {
        self.renderer.post.store_output(self.encoder);
    }

    fn copy_to_output(&mut self, source: ColorSource) {
        let renderer = self.renderer;
        let target = match source {
            ColorSource::LitOutput => renderer.gbuffer.target(Attachment::Lit),
            ColorSource::PostProcessBuffer => renderer.post.secondary(),
        };
        renderer.post.copy_into_output(self.encoder, target);
        self.output_written = true;
    }
}
