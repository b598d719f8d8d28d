//! Device, queue and (optionally) a presentation surface.

use std::fmt;

use crate::renderer::gbuffer::GEOMETRY_BYTES_PER_SAMPLE;

/// Why a [`RenderContext`] could not be created.
#[derive(Debug)]
pub enum RenderContextError {
    /// The window handle could not be turned into a surface.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No adapter matched the request.
    AdapterRequest(wgpu::RequestAdapterError),
    /// The adapter refused the device request.
    DeviceRequest(wgpu::RequestDeviceError),
    /// The adapter has no default configuration for the surface.
    UnsupportedSurface,
    /// The adapter cannot bind the full G-Buffer in one render pass.
    UnsupportedAttachmentBudget {
        /// Color bytes per sample the geometry pass writes.
        required: u32,
        /// Color bytes per sample the adapter allows.
        available: u32,
    },
}

impl fmt::Display for RenderContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SurfaceCreation(e) => write!(f, "cannot create surface: {e}"),
            Self::AdapterRequest(e) => write!(f, "no usable GPU adapter: {e}"),
            Self::DeviceRequest(e) => write!(f, "cannot open GPU device: {e}"),
            Self::UnsupportedSurface => {
                f.write_str("adapter cannot present to this surface")
            }
            Self::UnsupportedAttachmentBudget {
                required,
                available,
            } => write!(
                f,
                "G-Buffer needs {required} color bytes per sample, adapter \
                 supports {available}"
            ),
        }
    }
}

impl std::error::Error for RenderContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SurfaceCreation(e) => Some(e),
            Self::AdapterRequest(e) => Some(e),
            Self::DeviceRequest(e) => Some(e),
            Self::UnsupportedSurface
            | Self::UnsupportedAttachmentBudget { .. } => None,
        }
    }
}

/// The GPU handles every pass records against.
pub struct RenderContext {
    /// Logical device.
    pub device: wgpu::Device,
    /// Submission queue.
    pub queue: wgpu::Queue,
    /// Presentation surface; `None` when rendering into caller textures.
    pub surface: Option<wgpu::Surface<'static>>,
    /// Output format and size. For surface-less contexts only `format`,
    /// `width` and `height` are meaningful.
    pub config: wgpu::SurfaceConfiguration,
}

impl RenderContext {
    /// Open a device able to present to `window`, sized `initial_size`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderContextError`] if the surface, adapter or device
    /// cannot be obtained, or the adapter cannot host the G-Buffer.
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        initial_size: (u32, u32),
    ) -> Result<Self, RenderContextError> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(RenderContextError::SurfaceCreation)?;
        let adapter = request_adapter(&instance, Some(&surface)).await?;
        let (device, queue) = request_device(&adapter).await?;

        let mut config = surface
            .get_default_config(&adapter, initial_size.0, initial_size.1)
            .ok_or(RenderContextError::UnsupportedSurface)?;
        config.width = initial_size.0.max(1);
        config.height = initial_size.1.max(1);
        config.present_mode = wgpu::PresentMode::Fifo;
        surface.configure(&device, &config);

        Ok(Self {
            device,
            queue,
            surface: Some(surface),
            config,
        })
    }

    /// Open a device without a surface. Frames are rendered into
    /// caller-owned textures of `format`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderContextError`] if no adapter or device is available.
    pub async fn headless(
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderContextError> {
        let instance = wgpu::Instance::default();
        let adapter = request_adapter(&instance, None).await?;
        let (device, queue) = request_device(&adapter).await?;
        Ok(Self::from_device(device, queue, format, width, height))
    }

    /// Wrap a device and queue the host already owns.
    #[must_use]
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
        };
        Self {
            device,
            queue,
            surface: None,
            config,
        }
    }

    /// Output texture format.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Output width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Output height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Record a new output size and reconfigure the surface. Zero sizes
    /// (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
    }

    /// Acquire the next surface texture.
    ///
    /// # Errors
    ///
    /// Returns the surface's [`wgpu::SurfaceError`], or
    /// [`wgpu::SurfaceError::Lost`] for a surface-less context.
    pub fn get_next_frame(
        &self,
    ) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        match &self.surface {
            Some(surface) => surface.get_current_texture(),
            None => Err(wgpu::SurfaceError::Lost),
        }
    }

    /// Whether frames can be presented.
    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// A fresh encoder for one frame.
    pub fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            })
    }

    /// Finish `encoder` and submit it.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        let _ = self.queue.submit(std::iter::once(encoder.finish()));
    }
}

async fn request_adapter(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter, RenderContextError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: surface,
        })
        .await
        .map_err(RenderContextError::AdapterRequest)?;
    log::info!("using adapter {}", adapter.get_info().name);
    Ok(adapter)
}

/// Request a device whose color-attachment budget fits the G-Buffer's
/// geometry pass.
async fn request_device(
    adapter: &wgpu::Adapter,
) -> Result<(wgpu::Device, wgpu::Queue), RenderContextError> {
    let available = adapter.limits().max_color_attachment_bytes_per_sample;
    if available < GEOMETRY_BYTES_PER_SAMPLE {
        return Err(RenderContextError::UnsupportedAttachmentBudget {
            required: GEOMETRY_BYTES_PER_SAMPLE,
            available,
        });
    }
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Prism Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits {
                max_color_attachment_bytes_per_sample: available,
                ..wgpu::Limits::default()
            },
            ..Default::default()
        })
        .await
        .map_err(RenderContextError::DeviceRequest)
}

/// Headless context for GPU-backed tests; `None` on machines without an
/// adapter that fits the G-Buffer.
#[cfg(test)]
pub(crate) fn test_context() -> Option<RenderContext> {
    pollster::block_on(RenderContext::headless(
        wgpu::TextureFormat::Rgba8Unorm,
        64,
        64,
    ))
    .ok()
}
