//! Shadow maps: one depth-array layer per shadow-casting light.
//!
//! Light-space matrices live in a single uniform buffer at
//! [`MATRIX_STRIDE`]-byte offsets; each caster's redraw binds the same bind
//! group with its own dynamic offset.

use std::num::NonZeroU64;

use glam::Mat4;

use crate::gpu::texture::RenderTarget;
use crate::options::ShadowOptions;
use crate::renderer::gbuffer::DEPTH_FORMAT;
use crate::renderer::lighting::Light;
use crate::renderer::scene::SceneDraw;

/// Maximum number of lights that may cast shadows at once.
pub const MAX_SHADOW_CASTERS: usize = 16;

/// Byte distance between consecutive light-space matrices.
pub const MATRIX_STRIDE: u64 = 256;

const MATRIX_SIZE: u64 = size_of::<[[f32; 4]; 4]>() as u64;

/// What a scene needs to redraw its casters for one light.
pub struct ShadowDrawContext<'a> {
    /// Index of the light in the compositor's light list.
    pub light_index: usize,
    /// World to light clip space.
    pub light_space: Mat4,
    /// Bind group holding the light-space matrix buffer.
    pub bind_group: &'a wgpu::BindGroup,
    /// Dynamic offset selecting this light's matrix.
    pub dynamic_offset: u32,
}

/// Depth-array shadow maps and the per-caster matrix buffer.
pub struct ShadowMaps {
    depth: RenderTarget,
    layer_views: Vec<wgpu::TextureView>,
    resolution: u32,
    matrices: wgpu::Buffer,
    caster_layout: wgpu::BindGroupLayout,
    caster_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
}

impl ShadowMaps {
    /// Allocate [`MAX_SHADOW_CASTERS`] layers at the configured
    /// resolution.
    pub fn new(device: &wgpu::Device, options: &ShadowOptions) -> Self {
        let resolution = options.resolution.max(1);
        let depth = RenderTarget::depth(
            device,
            "Shadow Maps",
            resolution,
            resolution,
            MAX_SHADOW_CASTERS as u32,
            DEPTH_FORMAT,
        );
        let layer_views = (0..MAX_SHADOW_CASTERS as u32)
            .map(|layer| depth.layer_view(layer))
            .collect();

        let matrices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Light-Space Matrices"),
            size: MATRIX_STRIDE * MAX_SHADOW_CASTERS as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let caster_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Shadow Caster Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(MATRIX_SIZE),
                    },
                    count: None,
                }],
            });
        let caster_bind_group =
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Shadow Caster Bind Group"),
                layout: &caster_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(
                        wgpu::BufferBinding {
                            buffer: &matrices,
                            offset: 0,
                            size: NonZeroU64::new(MATRIX_SIZE),
                        },
                    ),
                }],
            });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Comparison Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Self {
            depth,
            layer_views,
            resolution,
            matrices,
            caster_layout,
            caster_bind_group,
            sampler,
        }
    }

    /// Edge length of each layer in texels.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Array view sampled by the lighting pass.
    pub fn view(&self) -> &wgpu::TextureView {
        &self.depth.view
    }

    /// Comparison sampler used by the lighting pass.
    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Layout that caster pipelines must include for the light-space
    /// matrix (one uniform `mat4x4<f32>`, dynamic offset, vertex stage).
    pub fn caster_layout(&self) -> &wgpu::BindGroupLayout {
        &self.caster_layout
    }

    /// Redraw every shadow-casting light's layer. Returns the number of
    /// layers rendered.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        lights: &[Light],
        scene: &mut dyn SceneDraw,
        options: &ShadowOptions,
    ) -> usize {
        let mut rendered = 0;
        for (light_index, light) in lights.iter().enumerate() {
            if !light.needs_shadow_update() {
                continue;
            }
            let Some(layer) = light.shadow_layer() else {
                continue;
            };
            let Some(view) = self.layer_views.get(layer as usize) else {
                log::warn!("light {light_index} has no shadow layer {layer}");
                continue;
            };

            let light_space = light.light_space_matrix(options);
            let offset = u64::from(layer) * MATRIX_STRIDE;
            queue.write_buffer(
                &self.matrices,
                offset,
                bytemuck::cast_slice(&light_space.to_cols_array_2d()),
            );

            let mut pass =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Shadow Pass"),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(
                        wgpu::RenderPassDepthStencilAttachment {
                            view,
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Clear(1.0),
                                store: wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        },
                    ),
                    ..Default::default()
                });
            scene.draw_shadow_casters(
                &mut pass,
                &ShadowDrawContext {
                    light_index,
                    light_space,
                    bind_group: &self.caster_bind_group,
                    dynamic_offset: offset as u32,
                },
            );
            rendered += 1;
        }
        rendered
    }

    /// Depth state for caster pipelines.
    pub fn depth_state() -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::gpu::render_context::test_context;

    #[test]
    fn every_caster_matrix_fits_its_stride() {
        assert!(MATRIX_SIZE <= MATRIX_STRIDE);
        assert_eq!(
            MATRIX_STRIDE
                % u64::from(
                    wgpu::Limits::default().min_uniform_buffer_offset_alignment
                ),
            0
        );
    }

    struct CountingScene {
        casters: Vec<(usize, u32)>,
    }

    impl SceneDraw for CountingScene {
        fn draw_solid(&mut self, _pass: &mut wgpu::RenderPass<'_>) {}

        fn draw_shadow_casters(
            &mut self,
            _pass: &mut wgpu::RenderPass<'_>,
            ctx: &ShadowDrawContext<'_>,
        ) {
            self.casters.push((ctx.light_index, ctx.dynamic_offset));
        }
    }

    #[test]
    fn only_assigned_casters_are_redrawn() {
        let Some(ctx) = test_context() else {
            return;
        };
        let options = ShadowOptions {
            resolution: 64,
            ..ShadowOptions::default()
        };
        let maps = ShadowMaps::new(&ctx.device, &options);
        assert_eq!(maps.layer_views.len(), MAX_SHADOW_CASTERS);

        let mut caster =
            Light::spot(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 20.0, 30.0)
                .with_shadows();
        caster.assign_shadow_layer(Some(3));
        let lights = vec![Light::point(Vec3::ZERO), caster];

        let mut scene = CountingScene {
            casters: Vec::new(),
        };
        let mut encoder = ctx.create_encoder();
        let rendered =
            maps.render(&mut encoder, &ctx.queue, &lights, &mut scene, &options);
        ctx.submit(encoder);

        assert_eq!(rendered, 1);
        assert_eq!(scene.casters, vec![(1, 3 * MATRIX_STRIDE as u32)]);
    }
}
