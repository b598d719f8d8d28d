//! Standalone window running the compositor over the built-in demo scene.
//!
//! ```no_run
//! # use prism::viewer::Viewer;
//! Viewer::builder()
//!     .with_title("Prism")
//!     .build()
//!     .run()
//!     .unwrap();
//! ```
//!
//! Keys: `Space` pauses the orbit, `T` toggles the tone-map stage, `R`
//! reverses the post-processing stack.

pub mod demo;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use web_time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::error::PrismError;
use crate::gpu::render_context::RenderContext;
use crate::gpu::shader_composer::ShaderComposer;
use crate::options::Options;
use crate::renderer::frame::DeferredRenderer;
use crate::renderer::pipeline::RenderPipeline;
use crate::renderer::postprocess::effect::{tonemap_params, ShaderEffect};
use crate::renderer::postprocess::stack::PostProcessingStack;
use crate::util::frame_timing::FrameTiming;
use demo::DemoScene;

const STACK_NAME: &str = "main";
const TONEMAP_STAGE: &str = "tonemap";

// ── Builder ──────────────────────────────────────────────────────────────

/// Fluent builder for [`Viewer`].
pub struct ViewerBuilder {
    options: Option<Options>,
    title: String,
    target_fps: u32,
}

impl ViewerBuilder {
    fn new() -> Self {
        Self {
            options: None,
            title: "Prism".into(),
            target_fps: 0,
        }
    }

    /// Override the default options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Set the window title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Cap the frame rate (0 = unlimited).
    #[must_use]
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Consume the builder and produce a [`Viewer`].
    #[must_use]
    pub fn build(self) -> Viewer {
        Viewer {
            options: self.options.unwrap_or_default(),
            title: self.title,
            target_fps: self.target_fps,
        }
    }
}

// ── Viewer ───────────────────────────────────────────────────────────────

/// A window showing the demo scene through the deferred pipeline.
pub struct Viewer {
    options: Options,
    title: String,
    target_fps: u32,
}

impl Viewer {
    /// Start a new builder.
    #[must_use]
    pub fn builder() -> ViewerBuilder {
        ViewerBuilder::new()
    }

    /// Open the window and run the event loop. Blocks until the window is
    /// closed.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::Viewer`] if the event loop cannot be created
    /// or exits abnormally.
    pub fn run(self) -> Result<(), PrismError> {
        let event_loop =
            EventLoop::new().map_err(|e| PrismError::Viewer(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = ViewerApp {
            state: None,
            options: Some(self.options),
            title: self.title,
            timing: FrameTiming::new(self.target_fps, Duration::from_secs(2)),
            last_frame_time: Instant::now(),
        };

        event_loop
            .run_app(&mut app)
            .map_err(|e| PrismError::Viewer(e.to_string()))
    }
}

// ── Winit app ────────────────────────────────────────────────────────────

/// Everything that exists once the window is up.
struct ViewerState {
    window: Arc<Window>,
    context: RenderContext,
    renderer: DeferredRenderer,
    pipeline: RenderPipeline,
    stack: Rc<RefCell<PostProcessingStack>>,
    tonemap: Rc<ShaderEffect>,
    scene: DemoScene,
    paused: bool,
}

impl ViewerState {
    fn new(window: Arc<Window>, options: Options) -> Result<Self, PrismError> {
        let inner = window.inner_size();
        let context = pollster::block_on(RenderContext::new(
            window.clone(),
            (inner.width.max(1), inner.height.max(1)),
        ))?;
        let mut shader_composer = ShaderComposer::new()?;
        let mut renderer =
            DeferredRenderer::new(&context, &mut shader_composer, options)?;

        let tonemap = Rc::new(ShaderEffect::tonemap(
            &context,
            &mut shader_composer,
            renderer.post_targets().inputs_layout(),
            &renderer.options().post_processing,
        )?);
        let stack = Rc::new(RefCell::new(PostProcessingStack::new()));
        let _ = stack
            .borrow_mut()
            .add_shader_stage(tonemap.clone(), TONEMAP_STAGE);

        let mut pipeline = RenderPipeline::deferred(STACK_NAME);
        pipeline.set_pp_stage_pps(
            Some("post_processing"),
            stack.clone(),
            STACK_NAME,
        )?;

        let gbuffer_options = renderer.options().gbuffer.clone();
        let (shadows, lighting) = renderer.shadows_and_lighting_mut();
        let scene = DemoScene::new(
            &context.device,
            &mut shader_composer,
            &gbuffer_options,
            shadows,
            lighting,
        )?;

        Ok(Self {
            window,
            context,
            renderer,
            pipeline,
            stack,
            tonemap,
            scene,
            paused: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.context.resize(width, height);
        if let Err(e) = self.renderer.resize(
            &self.context,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        ) {
            log::error!("resize failed: {e}");
        }
    }

    fn render(&mut self, dt: f32) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.get_next_frame()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let aspect =
            self.context.width() as f32 / self.context.height().max(1) as f32;
        let dt = if self.paused { 0.0 } else { dt };
        let eye = self.scene.update(&self.context.queue, dt, aspect);
        self.renderer.render(
            &self.context,
            &mut self.pipeline,
            &mut self.scene,
            eye,
            &view,
            self.context.format(),
        );
        frame.present();
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Space => {
                self.paused = !self.paused;
                log::info!(
                    "orbit {}",
                    if self.paused { "paused" } else { "resumed" }
                );
            }
            KeyCode::KeyT => self.toggle_tonemap(),
            KeyCode::KeyR => {
                let mut stack = self.stack.borrow_mut();
                let count = stack.stage_count();
                for i in 0..count / 2 {
                    if let Err(e) = stack.swap_stages(i, count - 1 - i) {
                        log::error!("reorder failed: {e}");
                    }
                }
                log::info!("post-processing stack reversed");
            }
            _ => {}
        }
    }

    fn toggle_tonemap(&self) {
        let mut stack = self.stack.borrow_mut();
        if stack.delete_stage_named(TONEMAP_STAGE).is_ok() {
            log::info!("tone-map disabled");
        } else {
            self.tonemap.set_params(
                &self.context.queue,
                tonemap_params(
                    &self.renderer.options().post_processing,
                    self.context.format(),
                ),
            );
            let _ =
                stack.add_shader_stage(self.tonemap.clone(), TONEMAP_STAGE);
            log::info!("tone-map enabled");
        }
    }
}

/// Internal winit application handler.
struct ViewerApp {
    state: Option<ViewerState>,
    options: Option<Options>,
    title: String,
    timing: FrameTiming,
    last_frame_time: Instant,
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next());
        let attrs = if let Some(mon) = &monitor {
            let mon_size = mon.size();
            let scale = mon.scale_factor();
            let logical_w = (f64::from(mon_size.width) / scale * 0.75) as u32;
            let logical_h = (f64::from(mon_size.height) / scale * 0.75) as u32;
            Window::default_attributes()
                .with_title(&self.title)
                .with_inner_size(winit::dpi::LogicalSize::new(
                    logical_w, logical_h,
                ))
        } else {
            Window::default_attributes().with_title(&self.title)
        };

        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let options = self.options.take().unwrap_or_default();
        match ViewerState::new(window.clone(), options) {
            Ok(state) => {
                window.request_redraw();
                self.last_frame_time = Instant::now();
                self.state = Some(state);
            }
            Err(e) => {
                log::error!("Failed to initialize renderer: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: WindowId,
        event: WindowEvent,
    ) {
        if matches!(event, WindowEvent::CloseRequested) {
            event_loop.exit();
            return;
        }
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::Resized(size) => state.resize(size.width, size.height),

            WindowEvent::ScaleFactorChanged { .. } => {
                let inner = state.window.inner_size();
                state.resize(inner.width, inner.height);
            }

            WindowEvent::RedrawRequested => {
                if !self.timing.should_render() {
                    state.window.request_redraw();
                    return;
                }
                let now = Instant::now();
                let dt = now.duration_since(self.last_frame_time).as_secs_f32();
                self.last_frame_time = now;

                match state.render(dt) {
                    Ok(()) => {
                        if let Some(report) = self.timing.end_frame() {
                            log::info!(
                                "{:.1} fps ({:.2} ms/frame)",
                                report.fps,
                                report.frame_ms
                            );
                        }
                    }
                    Err(
                        wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost,
                    ) => {
                        let inner = state.window.inner_size();
                        state.resize(inner.width, inner.height);
                    }
                    Err(e) => {
                        log::error!("render error: {e:?}");
                    }
                }
                state.window.request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(code) = event.physical_key {
                    state.handle_key(code);
                }
            }

            _ => {}
        }
    }
}
