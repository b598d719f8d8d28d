//! Fullscreen copy between targets of possibly different formats.
//!
//! Same-format copies go through `copy_texture_to_texture`; the blitter is
//! for the cases that cannot: G-Buffer attachments into the HDR
//! post-processing buffer and the final image into the output surface.
//! Pipelines are built lazily per destination format.

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::error::PrismError;
use crate::gpu::pipeline_helpers::{
    clear_attachment, color_target, create_screen_space_pipeline,
    filtering_sampler, linear_sampler, texture_2d,
};
use crate::gpu::shader_composer::ShaderComposer;

/// Cached fullscreen copy pipelines keyed by destination format.
pub struct Blitter {
    pipelines: RefCell<FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>>,
    shader: wgpu::ShaderModule,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl Blitter {
    /// Compile the blit shader.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if the built-in shader fails to
    /// compile.
    pub fn new(
        device: &wgpu::Device,
        shader_composer: &mut ShaderComposer,
    ) -> Result<Self, PrismError> {
        let shader = shader_composer.compose_screen(
            device,
            "Blit Shader",
            include_str!("../../assets/shaders/screen/blit.wgsl"),
            "blit.wgsl",
        )?;
        let layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Blit Layout"),
                entries: &[texture_2d(0), filtering_sampler(1)],
            });
        Ok(Self {
            pipelines: RefCell::new(FxHashMap::default()),
            shader,
            layout,
            sampler: linear_sampler(device, "Blit Sampler"),
        })
    }

    /// Draw `src` over the whole of `dst`.
    pub fn blit(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        src: &wgpu::TextureView,
        dst: &wgpu::TextureView,
        dst_format: wgpu::TextureFormat,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Source"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(src),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut pipelines = self.pipelines.borrow_mut();
        let pipeline = pipelines.entry(dst_format).or_insert_with(|| {
            log::debug!("building blit pipeline for {dst_format:?}");
            create_screen_space_pipeline(
                device,
                "Blit",
                &self.shader,
                &[color_target(dst_format, None)],
                &[&self.layout],
            )
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Blit Pass"),
            color_attachments: &[clear_attachment(dst, wgpu::Color::BLACK)],
            ..Default::default()
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    /// Number of destination formats a pipeline has been built for.
    pub fn cached_formats(&self) -> usize {
        self.pipelines.borrow().len()
    }
}
