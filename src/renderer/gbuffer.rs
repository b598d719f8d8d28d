//! The G-Buffer: eight color attachments plus depth, all sized to the
//! current frame.
//!
//! Attachment formats are chosen so that every pass the compositor opens
//! stays within the color byte budget it requests from the adapter: the
//! geometry pass binds five attachments ([`GEOMETRY_BYTES_PER_SAMPLE`]),
//! every other pass binds four or fewer.

use crate::error::PrismError;
use crate::gpu::pipeline_helpers::{
    clear_attachment, color_target, load_attachment, ADDITIVE_BLEND,
};
use crate::gpu::texture::RenderTarget;
use crate::renderer::pass_id::Attachment;

/// Color bytes per sample bound by the geometry pass.
pub const GEOMETRY_BYTES_PER_SAMPLE: u32 = 40;

/// Depth format shared by the G-Buffer and the scene pipelines.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Attachments written by solid and skybox draws, in location order.
pub const GEOMETRY_ATTACHMENTS: [Attachment; 5] = [
    Attachment::Albedo,
    Attachment::Normal,
    Attachment::Position,
    Attachment::Rml,
    Attachment::Eida,
];

/// Attachments written by transparent draws, in location order.
pub const TRANSPARENT_ATTACHMENTS: [Attachment; 2] =
    [Attachment::TransAccum, Attachment::Eida];

/// Attachments written by the lighting pass, in location order.
pub const LIGHTING_ATTACHMENTS: [Attachment; 2] =
    [Attachment::Lit, Attachment::Solid];

impl Attachment {
    /// Texture format of this attachment.
    pub const fn format(self) -> wgpu::TextureFormat {
        match self {
            Self::Albedo | Self::Rml => wgpu::TextureFormat::Rgba8Unorm,
            Self::Normal
            | Self::Position
            | Self::Lit
            | Self::Eida
            | Self::Solid
            | Self::TransAccum => wgpu::TextureFormat::Rgba16Float,
        }
    }
}

/// A validated frame size; both dimensions are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    width: u32,
    height: u32,
}

impl FrameSize {
    /// Validate a requested size.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::InvalidSize`] if either dimension is below 1.
    pub fn new(width: i32, height: i32) -> Result<Self, PrismError> {
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok(Self {
                width: w,
                height: h,
            }),
            _ => Err(PrismError::InvalidSize { width, height }),
        }
    }

    /// Width in pixels.
    pub const fn width(self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub const fn height(self) -> u32 {
        self.height
    }
}

/// Owns the G-Buffer attachments and the shared depth target.
pub struct GBuffer {
    size: FrameSize,
    targets: Vec<RenderTarget>,
    depth: RenderTarget,
}

impl GBuffer {
    /// Allocate every attachment at `size`.
    pub fn new(device: &wgpu::Device, size: FrameSize) -> Self {
        let targets = Attachment::ALL
            .iter()
            .map(|a| {
                RenderTarget::new(
                    device,
                    &format!("G-Buffer {}", a.label()),
                    size.width(),
                    size.height(),
                    a.format(),
                )
            })
            .collect();
        let depth = RenderTarget::depth(
            device,
            "G-Buffer Depth",
            size.width(),
            size.height(),
            1,
            DEPTH_FORMAT,
        );
        Self {
            size,
            targets,
            depth,
        }
    }

    /// Reallocate every attachment at the new size. Invalid sizes leave the
    /// buffer untouched. Returns `true` if the attachments were replaced.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::InvalidSize`] if either dimension is below 1.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        width: i32,
        height: i32,
    ) -> Result<bool, PrismError> {
        let size = FrameSize::new(width, height)?;
        if size == self.size {
            return Ok(false);
        }
        *self = Self::new(device, size);
        log::debug!("G-Buffer resized to {width}x{height}");
        Ok(true)
    }

    /// Current frame size.
    pub fn size(&self) -> FrameSize {
        self.size
    }

    /// The render target backing `attachment`.
    pub fn target(&self, attachment: Attachment) -> &RenderTarget {
        &self.targets[attachment.index()]
    }

    /// Default view of `attachment`.
    pub fn view(&self, attachment: Attachment) -> &wgpu::TextureView {
        &self.target(attachment).view
    }

    /// Actual texture dimensions of `attachment`.
    pub fn attachment_size(&self, attachment: Attachment) -> (u32, u32) {
        self.target(attachment).size()
    }

    /// View of the shared depth target.
    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth.view
    }

    /// Clear albedo to `background`, every other attachment to zero and
    /// depth to the far plane.
    pub fn clear(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        background: wgpu::Color,
    ) {
        let first = [
            clear_attachment(self.view(Attachment::Albedo), background),
            clear_attachment(
                self.view(Attachment::Normal),
                wgpu::Color::TRANSPARENT,
            ),
            clear_attachment(
                self.view(Attachment::Position),
                wgpu::Color::TRANSPARENT,
            ),
            clear_attachment(self.view(Attachment::Rml), wgpu::Color::TRANSPARENT),
        ];
        let _ = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("G-Buffer Clear"),
            color_attachments: &first,
            depth_stencil_attachment: Some(
                wgpu::RenderPassDepthStencilAttachment {
                    view: self.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                },
            ),
            ..Default::default()
        });

        let rest = [
            Attachment::Lit,
            Attachment::Eida,
            Attachment::Solid,
            Attachment::TransAccum,
        ]
        .map(|a| clear_attachment(self.view(a), wgpu::Color::TRANSPARENT));
        let _ = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("G-Buffer Clear (Lighting/OIT)"),
            color_attachments: &rest,
            ..Default::default()
        });
    }

    /// Open a pass over `attachments` that loads existing contents, with
    /// the depth target attached when `with_depth` is set.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
        attachments: &[Attachment],
        with_depth: bool,
    ) -> wgpu::RenderPass<'e> {
        let color: Vec<_> = attachments
            .iter()
            .map(|a| load_attachment(self.view(*a)))
            .collect();
        let depth = with_depth.then(|| wgpu::RenderPassDepthStencilAttachment {
            view: self.depth_view(),
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color,
            depth_stencil_attachment: depth,
            ..Default::default()
        })
    }

    /// Color targets a solid or skybox pipeline must declare.
    pub fn geometry_targets() -> [Option<wgpu::ColorTargetState>; 5] {
        GEOMETRY_ATTACHMENTS.map(|a| color_target(a.format(), None))
    }

    /// Color targets a transparent pipeline must declare: additive
    /// premultiplied accumulation, then an additive EIDA write whose blue
    /// channel counts fragments.
    pub fn transparent_targets() -> [Option<wgpu::ColorTargetState>; 2] {
        TRANSPARENT_ATTACHMENTS
            .map(|a| color_target(a.format(), Some(ADDITIVE_BLEND)))
    }

    /// Depth state for scene pipelines. Transparent draws test without
    /// writing.
    pub fn depth_state(write: bool) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::render_context::test_context;

    fn byte_cost(attachments: &[Attachment]) -> u32 {
        attachments
            .iter()
            .map(|a| a.format().target_pixel_byte_cost().unwrap())
            .sum()
    }

    #[test]
    fn frame_size_rejects_non_positive_dimensions() {
        assert!(FrameSize::new(1, 1).is_ok());
        for (w, h) in [(0, 10), (10, 0), (-5, 10), (10, -1), (0, 0)] {
            assert!(matches!(
                FrameSize::new(w, h),
                Err(PrismError::InvalidSize { .. })
            ));
        }
    }

    #[test]
    fn pass_layouts_fit_the_requested_budget() {
        assert_eq!(byte_cost(&GEOMETRY_ATTACHMENTS), GEOMETRY_BYTES_PER_SAMPLE);
        assert!(byte_cost(&TRANSPARENT_ATTACHMENTS) <= 32);
        assert!(byte_cost(&LIGHTING_ATTACHMENTS) <= 32);
        assert!(byte_cost(&Attachment::ALL[..4]) <= 32);
        assert!(byte_cost(&Attachment::ALL[4..]) <= 32);
    }

    #[test]
    fn blended_attachments_are_blendable() {
        for a in TRANSPARENT_ATTACHMENTS.iter().chain(&LIGHTING_ATTACHMENTS) {
            assert_eq!(a.format(), wgpu::TextureFormat::Rgba16Float);
        }
    }

    #[test]
    fn resize_keeps_every_attachment_in_step() {
        let Some(ctx) = test_context() else {
            return;
        };
        let mut gbuffer =
            GBuffer::new(&ctx.device, FrameSize::new(64, 48).unwrap());
        for a in Attachment::ALL {
            assert_eq!(gbuffer.attachment_size(a), (64, 48));
        }

        assert!(gbuffer.resize(&ctx.device, 0, 48).is_err());
        assert!(gbuffer.resize(&ctx.device, 64, -3).is_err());
        assert_eq!(gbuffer.size(), FrameSize::new(64, 48).unwrap());

        assert!(!gbuffer.resize(&ctx.device, 64, 48).unwrap());
        assert!(gbuffer.resize(&ctx.device, 33, 17).unwrap());
        for a in Attachment::ALL {
            assert_eq!(gbuffer.attachment_size(a), (33, 17));
        }
    }
}
