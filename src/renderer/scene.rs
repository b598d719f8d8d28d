//! The draw-call surface a host scene exposes to the compositor.

use crate::renderer::shadow::ShadowDrawContext;

/// Host-side geometry. The compositor opens the pass and binds the right
/// targets; implementations set their own pipelines and issue draws.
///
/// Solid and skybox passes write the five geometry attachments (albedo,
/// normal, position, RML, EIDA) at locations 0..5, with depth. Transparent
/// passes write premultiplied color to location 0 and add `1.0` to the blue
/// channel of location 1 (EIDA) per fragment, depth-testing without
/// writing. Pipelines built from [`GBuffer::geometry_targets`] and
/// [`GBuffer::transparent_targets`] match these layouts.
///
/// [`GBuffer::geometry_targets`]: crate::renderer::gbuffer::GBuffer::geometry_targets
/// [`GBuffer::transparent_targets`]: crate::renderer::gbuffer::GBuffer::transparent_targets
pub trait SceneDraw {
    /// Opaque geometry.
    fn draw_solid(&mut self, pass: &mut wgpu::RenderPass<'_>);

    /// Background geometry drawn after solids.
    fn draw_skybox(&mut self, _pass: &mut wgpu::RenderPass<'_>) {}

    /// Translucent geometry accumulated for the OIT resolve.
    fn draw_transparent(&mut self, _pass: &mut wgpu::RenderPass<'_>) {}

    /// Depth-only redraw for one shadow-casting light. Bind
    /// `ctx.bind_group` with `ctx.dynamic_offset` at the group index of a
    /// pipeline built with [`ShadowMaps::caster_layout`].
    ///
    /// [`ShadowMaps::caster_layout`]: crate::renderer::shadow::ShadowMaps::caster_layout
    fn draw_shadow_casters(
        &mut self,
        _pass: &mut wgpu::RenderPass<'_>,
        _ctx: &ShadowDrawContext<'_>,
    ) {
    }
}
