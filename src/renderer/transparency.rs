//! Weighted-blended order-independent transparency.
//!
//! Transparent draws add premultiplied color and alpha into the
//! accumulation attachment and count fragments in EIDA's blue channel. The
//! resolve pass then composites the averaged color over the lit output
//! with `coverage = 1 - (1 - alpha / n)^n`, which needs no sorting.

use glam::Vec4;
use wgpu::util::DeviceExt;

use crate::error::PrismError;
use crate::gpu::pipeline_helpers::{
    color_target, create_screen_space_pipeline, texture_2d, uniform_buffer,
};
use crate::gpu::shader_composer::ShaderComposer;
use crate::options::TransparencyOptions;
use crate::renderer::gbuffer::GBuffer;
use crate::renderer::pass_id::Attachment;

/// Straight-alpha "over" onto the lit attachment.
const OVER_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ResolveParams {
    epsilon: f32,
    padding: [f32; 3],
}

/// CPU definition of the resolve for one texel: `accum` is the summed
/// premultiplied color and alpha, `count` the number of fragments. Returns
/// the averaged straight color and its coverage.
pub fn resolve_texel(accum: Vec4, count: f32, epsilon: f32) -> Vec4 {
    let n = count.max(1.0);
    let color = accum.truncate() / accum.w.max(epsilon);
    let coverage = 1.0 - (1.0 - accum.w / n).max(0.0).powf(n);
    color.extend(coverage)
}

/// Where the frame is in the accumulate-then-resolve cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveTracker {
    /// No transparent geometry yet this frame.
    #[default]
    Idle,
    /// Transparent geometry accumulated; resolve still owed.
    Accumulated,
    /// Resolve done; no more accumulation this frame.
    Resolved,
}

impl ResolveTracker {
    /// Reset at the start of a frame or after a G-Buffer clear.
    pub fn begin_frame(&mut self) {
        *self = Self::Idle;
    }

    /// Whether another transparent draw may still be accumulated.
    pub fn can_accumulate(self) -> bool {
        self != Self::Resolved
    }

    /// Record a transparent draw.
    pub fn mark_accumulated(&mut self) {
        if self.can_accumulate() {
            *self = Self::Accumulated;
        }
    }

    /// If a resolve is owed, mark it done and return `true`. The caller
    /// must then record the resolve.
    pub fn take_pending(&mut self) -> bool {
        if *self == Self::Accumulated {
            *self = Self::Resolved;
            true
        } else {
            false
        }
    }
}

/// The resolve pass.
pub struct TransparencyCompositor {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    params: wgpu::Buffer,
}

impl TransparencyCompositor {
    /// Build the resolve pass with the built-in shader.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if the built-in shader fails to
    /// compile.
    pub fn new(
        device: &wgpu::Device,
        shader_composer: &mut ShaderComposer,
        gbuffer: &GBuffer,
        options: &TransparencyOptions,
    ) -> Result<Self, PrismError> {
        let layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("OIT Resolve Layout"),
                entries: &[texture_2d(0), texture_2d(1), uniform_buffer(2)],
            });
        let params =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("OIT Resolve Params"),
                contents: bytemuck::bytes_of(&ResolveParams {
                    epsilon: options.weight_epsilon,
                    padding: [0.0; 3],
                }),
                usage: wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = create_bind_group(device, &layout, gbuffer, &params);
        let shader = shader_composer.compose_screen(
            device,
            "OIT Resolve Shader",
            include_str!("../../assets/shaders/screen/oit_resolve.wgsl"),
            "oit_resolve.wgsl",
        )?;
        let pipeline = create_resolve_pipeline(device, &shader, &layout);
        Ok(Self {
            pipeline,
            layout,
            bind_group,
            params,
        })
    }

    /// Replace the resolve shader. It reads accumulation and EIDA from
    /// group 0 and returns straight color plus coverage, blended over the
    /// lit output. The previous shader stays active on error.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if the source does not compile.
    pub fn set_resolve_shader(
        &mut self,
        device: &wgpu::Device,
        shader_composer: &mut ShaderComposer,
        source: &str,
    ) -> Result<(), PrismError> {
        let shader = shader_composer.compose_screen(
            device,
            "Custom OIT Resolve Shader",
            source,
            "custom_oit_resolve.wgsl",
        )?;
        self.pipeline = create_resolve_pipeline(device, &shader, &self.layout);
        log::info!("OIT resolve shader replaced");
        Ok(())
    }

    /// Upload a new weight epsilon.
    pub fn set_options(&self, queue: &wgpu::Queue, options: &TransparencyOptions) {
        queue.write_buffer(
            &self.params,
            0,
            bytemuck::bytes_of(&ResolveParams {
                epsilon: options.weight_epsilon,
                padding: [0.0; 3],
            }),
        );
    }

    /// Rebuild the bind group after a resize.
    pub fn rebind(&mut self, device: &wgpu::Device, gbuffer: &GBuffer) {
        self.bind_group =
            create_bind_group(device, &self.layout, gbuffer, &self.params);
    }

    /// Record the resolve over the lit attachment.
    pub fn resolve(&self, encoder: &mut wgpu::CommandEncoder, gbuffer: &GBuffer) {
        let mut pass = gbuffer.begin_pass(
            encoder,
            "OIT Resolve Pass",
            &[Attachment::Lit],
            false,
        );
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    gbuffer: &GBuffer,
    params: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("OIT Resolve Inputs"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(
                    gbuffer.view(Attachment::TransAccum),
                ),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(
                    gbuffer.view(Attachment::Eida),
                ),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: params.as_entire_binding(),
            },
        ],
    })
}

fn create_resolve_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    create_screen_space_pipeline(
        device,
        "OIT Resolve",
        shader,
        &[color_target(Attachment::Lit.format(), Some(OVER_BLEND))],
        &[layout],
    )
}
