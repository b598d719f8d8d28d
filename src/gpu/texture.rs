//! Render-target texture abstraction shared by the G-Buffer and the
//! post-processing buffers.

/// A render-target texture and its default view.
///
/// Color targets are created with `RENDER_ATTACHMENT | TEXTURE_BINDING |
/// COPY_SRC | COPY_DST` usage so they can be rendered to, sampled, and copied
/// texel-for-texel between same-format targets.
pub struct RenderTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// A default full-texture view.
    pub view: wgpu::TextureView,
}

impl RenderTarget {
    /// Create a new color render target with the given dimensions and format.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self::with_usage(
            device,
            label,
            (width, height, 1),
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        )
    }

    /// Create a depth target (`RENDER_ATTACHMENT | TEXTURE_BINDING`) with
    /// `layers` array layers.
    #[must_use]
    pub fn depth(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        layers: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self::with_usage(
            device,
            label,
            (width, height, layers.max(1)),
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    fn with_usage(
        device: &wgpu::Device,
        label: &str,
        (width, height, layers): (u32, u32, u32),
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(if layers > 1 {
                wgpu::TextureViewDimension::D2Array
            } else {
                wgpu::TextureViewDimension::D2
            }),
            ..Default::default()
        });
        Self { texture, view }
    }

    /// Texture dimensions as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    /// Texture format.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    /// A view of a single array layer, for rendering into one slice.
    pub fn layer_view(&self, layer: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("RenderTarget Layer"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }

    /// Record a full-texture copy from `self` into `dst`. Both targets must
    /// share size and format.
    pub fn copy_to(&self, encoder: &mut wgpu::CommandEncoder, dst: &Self) {
        let (width, height) = self.size();
        encoder.copy_texture_to_texture(
            self.texture.as_image_copy(),
            dst.texture.as_image_copy(),
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}
