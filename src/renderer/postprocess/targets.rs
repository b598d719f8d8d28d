//! Post-processing buffers and the input bind groups effects read from.
//!
//! The *default* target receives every effect's output and is what gets
//! presented. The *secondary* target is the post-processing buffer the next
//! effect reads. The *previous-frame* target holds last frame's default
//! target.

use wgpu::util::DeviceExt;

use crate::gpu::pipeline_helpers::{
    clear_attachment, filtering_sampler, linear_sampler, texture_2d,
    uniform_buffer,
};
use crate::gpu::texture::RenderTarget;
use crate::renderer::gbuffer::GBuffer;
use crate::renderer::pass_id::Attachment;
use crate::renderer::postprocess::effect::ColorSource;

/// Format of every post-processing buffer; matches the lit attachment so
/// copies between them are exact.
pub const POST_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameInfo {
    window_size: [f32; 2],
    texel_size: [f32; 2],
}

impl FrameInfo {
    fn for_size(width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            window_size: [w, h],
            texel_size: [1.0 / w, 1.0 / h],
        }
    }
}

/// Owns the post-processing buffers and effect input bind groups.
pub struct PostProcessTargets {
    default_target: RenderTarget,
    secondary: RenderTarget,
    previous: RenderTarget,
    inputs_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    frame_info: wgpu::Buffer,
    lit_inputs: wgpu::BindGroup,
    buffer_inputs: wgpu::BindGroup,
}

impl PostProcessTargets {
    /// Allocate buffers matching the G-Buffer size.
    pub fn new(device: &wgpu::Device, gbuffer: &GBuffer) -> Self {
        let inputs_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Post-Processing Inputs Layout"),
                entries: &[
                    texture_2d(0),
                    texture_2d(1),
                    texture_2d(2),
                    texture_2d(3),
                    texture_2d(4),
                    texture_2d(5),
                    filtering_sampler(6),
                    uniform_buffer(7),
                ],
            });
        let sampler = linear_sampler(device, "Post-Processing Sampler");
        let size = gbuffer.size();
        let frame_info =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Post-Processing Frame Info"),
                contents: bytemuck::bytes_of(&FrameInfo::for_size(
                    size.width(),
                    size.height(),
                )),
                usage: wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_DST,
            });

        let (default_target, secondary, previous) =
            Self::create_targets(device, gbuffer);
        let lit_inputs = Self::create_inputs(
            device,
            &inputs_layout,
            gbuffer,
            gbuffer.view(Attachment::Lit),
            &previous,
            &sampler,
            &frame_info,
        );
        let buffer_inputs = Self::create_inputs(
            device,
            &inputs_layout,
            gbuffer,
            &secondary.view,
            &previous,
            &sampler,
            &frame_info,
        );

        Self {
            default_target,
            secondary,
            previous,
            inputs_layout,
            sampler,
            frame_info,
            lit_inputs,
            buffer_inputs,
        }
    }

    /// Recreate buffers and bind groups after the G-Buffer was resized.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        gbuffer: &GBuffer,
    ) {
        let size = gbuffer.size();
        queue.write_buffer(
            &self.frame_info,
            0,
            bytemuck::bytes_of(&FrameInfo::for_size(
                size.width(),
                size.height(),
            )),
        );
        let (default_target, secondary, previous) =
            Self::create_targets(device, gbuffer);
        self.default_target = default_target;
        self.secondary = secondary;
        self.previous = previous;
        self.rebind(device, gbuffer);
    }

    /// Rebuild the input bind groups against the current G-Buffer views.
    pub fn rebind(&mut self, device: &wgpu::Device, gbuffer: &GBuffer) {
        self.lit_inputs = Self::create_inputs(
            device,
            &self.inputs_layout,
            gbuffer,
            gbuffer.view(Attachment::Lit),
            &self.previous,
            &self.sampler,
            &self.frame_info,
        );
        self.buffer_inputs = Self::create_inputs(
            device,
            &self.inputs_layout,
            gbuffer,
            &self.secondary.view,
            &self.previous,
            &self.sampler,
            &self.frame_info,
        );
    }

    fn create_targets(
        device: &wgpu::Device,
        gbuffer: &GBuffer,
    ) -> (RenderTarget, RenderTarget, RenderTarget) {
        let size = gbuffer.size();
        let make = |label: &str| {
            RenderTarget::new(
                device,
                label,
                size.width(),
                size.height(),
                POST_FORMAT,
            )
        };
        (
            make("Post-Processing Default Target"),
            make("Post-Processing Buffer"),
            make("Previous Frame"),
        )
    }

    fn create_inputs(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        gbuffer: &GBuffer,
        main_image: &wgpu::TextureView,
        previous: &RenderTarget,
        sampler: &wgpu::Sampler,
        frame_info: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post-Processing Inputs"),
            layout,
            entries: &[
                view_entry(0, main_image),
                view_entry(1, gbuffer.view(Attachment::Albedo)),
                view_entry(2, gbuffer.view(Attachment::Normal)),
                view_entry(3, gbuffer.view(Attachment::Position)),
                view_entry(4, gbuffer.view(Attachment::Rml)),
                view_entry(5, &previous.view),
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: frame_info.as_entire_binding(),
                },
            ],
        })
    }

    /// Layout every effect's group 0 must match.
    pub fn inputs_layout(&self) -> &wgpu::BindGroupLayout {
        &self.inputs_layout
    }

    /// Input bind group with `main_image` reading from `source`.
    pub fn inputs(&self, source: ColorSource) -> &wgpu::BindGroup {
        match source {
            ColorSource::LitOutput => &self.lit_inputs,
            ColorSource::PostProcessBuffer => &self.buffer_inputs,
        }
    }

    /// Target effects render into; presented at the end of the frame.
    pub fn default_target(&self) -> &RenderTarget {
        &self.default_target
    }

    /// The post-processing buffer read by the next effect.
    pub fn secondary(&self) -> &RenderTarget {
        &self.secondary
    }

    /// Last frame's presented image.
    pub fn previous(&self) -> &RenderTarget {
        &self.previous
    }

    /// Open a pass over the default target, cleared to black.
    pub fn begin_effect_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
    ) -> wgpu::RenderPass<'e> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[clear_attachment(
                &self.default_target.view,
                wgpu::Color::BLACK,
            )],
            ..Default::default()
        })
    }

    /// Copy the default target into the post-processing buffer.
    pub fn store_output(&self, encoder: &mut wgpu::CommandEncoder) {
        self.default_target.copy_to(encoder, &self.secondary);
    }

    /// Copy `source` unchanged into the default target.
    pub fn copy_into_output(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &RenderTarget,
    ) {
        source.copy_to(encoder, &self.default_target);
    }

    /// Keep this frame's output for the next frame's effects.
    pub fn capture_previous(&self, encoder: &mut wgpu::CommandEncoder) {
        self.default_target.copy_to(encoder, &self.previous);
    }
}

fn view_entry(
    binding: u32,
    view: &wgpu::TextureView,
) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(view),
    }
}
