//! Deferred lighting: one fullscreen pass over the G-Buffer.
//!
//! Lights live in a storage buffer sized to the light list. The buffer and
//! its bind group are rebuilt only when the list changes; per-light values
//! are uploaded every frame in [`LightingCompositor::prepare`].

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::error::PrismError;
use crate::gpu::pipeline_helpers::{
    color_target, comparison_sampler, create_screen_space_pipeline,
    depth_texture_2d_array, storage_buffer, texture_2d, uniform_buffer,
    ADDITIVE_BLEND,
};
use crate::gpu::shader_composer::ShaderComposer;
use crate::options::{LightingOptions, ShadowOptions};
use crate::renderer::gbuffer::{GBuffer, LIGHTING_ATTACHMENTS};
use crate::renderer::pass_id::Attachment;
use crate::renderer::shadow::{ShadowMaps, MAX_SHADOW_CASTERS};

/// Maximum number of simultaneously active lights.
pub const MAX_LIGHTS: usize = 128;

/// Shape of a light's contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Omnidirectional, distance-attenuated.
    Point,
    /// Parallel rays along `direction`, no attenuation.
    Directional,
    /// A point light restricted to a cone around `direction`.
    Spot,
}

impl LightKind {
    const fn gpu_tag(self) -> u32 {
        match self {
            Self::Point => 0,
            Self::Directional => 1,
            Self::Spot => 2,
        }
    }
}

/// A light source. Spot cone angles are half-angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    kind: LightKind,
    position: Vec3,
    direction: Vec3,
    color: Vec3,
    intensity: f32,
    inner_angle: f32,
    outer_angle: f32,
    cast_shadows: bool,
    shadow_layer: Option<u32>,
}

impl Light {
    fn with_kind(kind: LightKind) -> Self {
        Self {
            kind,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            intensity: 1.0,
            inner_angle: 0.0,
            outer_angle: 0.0,
            cast_shadows: false,
            shadow_layer: None,
        }
    }

    /// White point light at `position`.
    pub fn point(position: Vec3) -> Self {
        Self {
            position,
            ..Self::with_kind(LightKind::Point)
        }
    }

    /// White directional light shining along `direction`.
    pub fn directional(direction: Vec3) -> Self {
        Self {
            direction: direction.normalize_or(Vec3::NEG_Y),
            ..Self::with_kind(LightKind::Directional)
        }
    }

    /// White spot light. Full intensity inside `inner_angle`, fading to
    /// zero at `outer_angle`.
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        inner_angle: f32,
        outer_angle: f32,
    ) -> Self {
        Self {
            position,
            direction: direction.normalize_or(Vec3::NEG_Y),
            inner_angle: inner_angle.min(outer_angle),
            outer_angle,
            ..Self::with_kind(LightKind::Spot)
        }
    }

    /// Mark the light as a shadow caster. Point lights never cast shadows.
    #[must_use]
    pub fn with_shadows(mut self) -> Self {
        if self.kind == LightKind::Point {
            log::warn!("point lights cannot cast shadows; ignoring");
        } else {
            self.cast_shadows = true;
        }
        self
    }

    /// Set color and intensity.
    #[must_use]
    pub fn with_color(mut self, color: Vec3, intensity: f32) -> Self {
        self.color = color;
        self.intensity = intensity;
        self
    }

    /// Light kind.
    pub fn kind(&self) -> LightKind {
        self.kind
    }

    /// World-space position (unused for directional lights).
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the light.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Unit direction the light points along.
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Re-aim the light. A zero vector leaves the direction unchanged.
    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction.normalize_or(self.direction);
    }

    /// Linear RGB color.
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Set the linear RGB color.
    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }

    /// Scalar intensity.
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Set the scalar intensity.
    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    /// Whether this light wants a shadow map.
    pub fn cast_shadows(&self) -> bool {
        self.cast_shadows
    }

    /// Shadow-map layer owned by this light, once added to a compositor.
    pub fn shadow_layer(&self) -> Option<u32> {
        self.shadow_layer
    }

    pub(crate) fn assign_shadow_layer(&mut self, layer: Option<u32>) {
        self.shadow_layer = layer;
    }

    /// Whether the shadow pass must redraw this light's layer. Casters are
    /// redrawn every frame.
    pub fn needs_shadow_update(&self) -> bool {
        self.cast_shadows && self.shadow_layer.is_some()
    }

    /// World to light clip-space transform used for its shadow map.
    pub fn light_space_matrix(&self, options: &ShadowOptions) -> Mat4 {
        let up = if self.direction.abs().dot(Vec3::Y) > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        match self.kind {
            LightKind::Point => Mat4::IDENTITY,
            LightKind::Spot => {
                let fov = (2.0 * self.outer_angle).clamp(1.0, 179.0);
                Mat4::perspective_rh(
                    fov.to_radians(),
                    1.0,
                    options.near,
                    options.far,
                ) * Mat4::look_at_rh(
                    self.position,
                    self.position + self.direction,
                    up,
                )
            }
            LightKind::Directional => {
                let extent = options.directional_extent;
                let eye = -self.direction * options.directional_distance;
                Mat4::orthographic_rh(
                    -extent,
                    extent,
                    -extent,
                    extent,
                    options.near,
                    options.far,
                ) * Mat4::look_at_rh(eye, Vec3::ZERO, up)
            }
        }
    }

    fn to_gpu(&self, options: &ShadowOptions) -> GpuLight {
        GpuLight {
            position: self.position.to_array(),
            kind: self.kind.gpu_tag(),
            direction: self.direction.to_array(),
            intensity: self.intensity,
            color: self.color.to_array(),
            cos_inner: self.inner_angle.to_radians().cos(),
            cos_outer: self.outer_angle.to_radians().cos(),
            shadow_layer: self
                .shadow_layer
                .filter(|_| self.cast_shadows)
                .map_or(-1, |layer| layer as i32),
            padding: [0.0; 2],
            light_space: self.light_space_matrix(options).to_cols_array_2d(),
        }
    }
}

/// Storage-buffer element, 128 bytes, mirrors `prism::lights::Light`.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct GpuLight {
    position: [f32; 3],
    kind: u32,
    direction: [f32; 3],
    intensity: f32,
    color: [f32; 3],
    cos_inner: f32,
    cos_outer: f32,
    shadow_layer: i32,
    padding: [f32; 2],
    light_space: [[f32; 4]; 4],
}

/// Mirrors `prism::lights::LightingUniform` (32 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct LightingUniform {
    camera_position: [f32; 3],
    light_count: u32,
    ambient: f32,
    specular: f32,
    shadow_bias: f32,
    padding: f32,
}

/// Owns the light list and the deferred lighting pass.
pub struct LightingCompositor {
    lights: Vec<Light>,
    list_changed: bool,
    pipeline: wgpu::RenderPipeline,
    gbuffer_layout: wgpu::BindGroupLayout,
    gbuffer_bind_group: wgpu::BindGroup,
    lights_layout: wgpu::BindGroupLayout,
    lights_bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    light_buffer: wgpu::Buffer,
    light_capacity: usize,
}

impl LightingCompositor {
    /// Build the lighting pass with the built-in shader.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if the built-in shader fails to
    /// compile.
    pub fn new(
        device: &wgpu::Device,
        shader_composer: &mut ShaderComposer,
        gbuffer: &GBuffer,
        shadows: &ShadowMaps,
    ) -> Result<Self, PrismError> {
        let gbuffer_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Lighting G-Buffer Layout"),
                entries: &[
                    texture_2d(0),
                    texture_2d(1),
                    texture_2d(2),
                    texture_2d(3),
                ],
            });
        let lights_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Lighting Lights Layout"),
                entries: &[
                    uniform_buffer(0),
                    storage_buffer(1),
                    depth_texture_2d_array(2),
                    comparison_sampler(3),
                ],
            });
        let uniform_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Lighting Uniform"),
                contents: bytemuck::bytes_of(&LightingUniform {
                    camera_position: [0.0; 3],
                    light_count: 0,
                    ambient: 0.0,
                    specular: 0.0,
                    shadow_bias: 0.0,
                    padding: 0.0,
                }),
                usage: wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_DST,
            });
        let light_buffer = create_light_buffer(device, 1);
        let lights_bind_group = create_lights_bind_group(
            device,
            &lights_layout,
            &uniform_buffer,
            &light_buffer,
            shadows,
        );
        let gbuffer_bind_group =
            create_gbuffer_bind_group(device, &gbuffer_layout, gbuffer);

        let shader = shader_composer.compose_screen(
            device,
            "Lighting Shader",
            include_str!("../../assets/shaders/screen/lighting.wgsl"),
            "lighting.wgsl",
        )?;
        let pipeline = create_lighting_pipeline(
            device,
            &shader,
            &gbuffer_layout,
            &lights_layout,
        );

        Ok(Self {
            lights: Vec::new(),
            list_changed: true,
            pipeline,
            gbuffer_layout,
            gbuffer_bind_group,
            lights_layout,
            lights_bind_group,
            uniform_buffer,
            light_buffer,
            light_capacity: 1,
        })
    }

    /// Replace the lighting shader. The source must keep the binding
    /// contract of the built-in one (G-Buffer in group 0, lights in group 1)
    /// and write `lit` and `solid` at locations 0 and 1. The previous shader
    /// stays active on error.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if the source does not compile.
    pub fn set_shader(
        &mut self,
        device: &wgpu::Device,
        shader_composer: &mut ShaderComposer,
        source: &str,
    ) -> Result<(), PrismError> {
        let shader = shader_composer.compose_screen(
            device,
            "Custom Lighting Shader",
            source,
            "custom_lighting.wgsl",
        )?;
        self.pipeline = create_lighting_pipeline(
            device,
            &shader,
            &self.gbuffer_layout,
            &self.lights_layout,
        );
        log::info!("lighting shader replaced");
        Ok(())
    }

    /// Append a light. Shadow casters are given the first free shadow-map
    /// layer. Returns the light's index.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::LightLimit`] when [`MAX_LIGHTS`] lights are
    /// active and [`PrismError::ShadowCasterLimit`] when every shadow-map
    /// layer is taken.
    pub fn add_light(&mut self, mut light: Light) -> Result<usize, PrismError> {
        if self.lights.len() >= MAX_LIGHTS {
            log::warn!("light limit of {MAX_LIGHTS} reached; light ignored");
            return Err(PrismError::LightLimit { max: MAX_LIGHTS });
        }
        let layer = if light.cast_shadows {
            let Some(layer) = self.free_shadow_layer() else {
                log::warn!(
                    "all {MAX_SHADOW_CASTERS} shadow layers in use; light \
                     ignored"
                );
                return Err(PrismError::ShadowCasterLimit {
                    max: MAX_SHADOW_CASTERS,
                });
            };
            Some(layer)
        } else {
            None
        };
        light.assign_shadow_layer(layer);
        self.lights.push(light);
        self.list_changed = true;
        log::info!("light added ({} active)", self.lights.len());
        Ok(self.lights.len() - 1)
    }

    /// Remove and return the light at `index`, freeing its shadow layer.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::IndexOutOfRange`] for an invalid index.
    pub fn remove_light(&mut self, index: usize) -> Result<Light, PrismError> {
        if index >= self.lights.len() {
            return Err(PrismError::IndexOutOfRange {
                index,
                len: self.lights.len(),
            });
        }
        let mut light = self.lights.remove(index);
        light.assign_shadow_layer(None);
        self.list_changed = true;
        log::info!("light removed ({} active)", self.lights.len());
        Ok(light)
    }

    /// Remove every light.
    pub fn clear_lights(&mut self) {
        self.lights.clear();
        self.list_changed = true;
    }

    /// Light at `index`.
    pub fn light(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    /// Mutable light at `index`; changes are picked up next frame.
    pub fn light_mut(&mut self, index: usize) -> Option<&mut Light> {
        self.lights.get_mut(index)
    }

    /// Active lights in upload order.
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    fn free_shadow_layer(&self) -> Option<u32> {
        (0..MAX_SHADOW_CASTERS as u32).find(|layer| {
            !self.lights.iter().any(|l| l.shadow_layer == Some(*layer))
        })
    }

    /// Rebuild the G-Buffer bind group after a resize.
    pub fn rebind(&mut self, device: &wgpu::Device, gbuffer: &GBuffer) {
        self.gbuffer_bind_group =
            create_gbuffer_bind_group(device, &self.gbuffer_layout, gbuffer);
    }

    /// Upload the uniform and every light. Re-resolves the storage buffer
    /// and bind group first if the light list changed.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera_position: Vec3,
        lighting: &LightingOptions,
        shadows: &ShadowMaps,
        shadow_options: &ShadowOptions,
    ) {
        if self.list_changed {
            let needed = self.lights.len().max(1);
            if needed != self.light_capacity {
                self.light_buffer = create_light_buffer(device, needed);
                self.light_capacity = needed;
            }
            self.lights_bind_group = create_lights_bind_group(
                device,
                &self.lights_layout,
                &self.uniform_buffer,
                &self.light_buffer,
                shadows,
            );
            self.list_changed = false;
            log::debug!("light storage resolved for {needed} slots");
        }

        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&LightingUniform {
                camera_position: camera_position.to_array(),
                light_count: self.lights.len() as u32,
                ambient: lighting.ambient,
                specular: lighting.specular,
                shadow_bias: shadow_options.bias,
                padding: 0.0,
            }),
        );
        if !self.lights.is_empty() {
            let data: Vec<GpuLight> = self
                .lights
                .iter()
                .map(|l| l.to_gpu(shadow_options))
                .collect();
            queue.write_buffer(
                &self.light_buffer,
                0,
                bytemuck::cast_slice(&data),
            );
        }
    }

    /// Record the lighting pass into the lit and solid attachments.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        gbuffer: &GBuffer,
    ) {
        let mut pass = gbuffer.begin_pass(
            encoder,
            "Lighting Pass",
            &LIGHTING_ATTACHMENTS,
            false,
        );
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.gbuffer_bind_group, &[]);
        pass.set_bind_group(1, &self.lights_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn create_light_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Light Storage"),
        size: (capacity * size_of::<GpuLight>()) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_lights_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform: &wgpu::Buffer,
    lights: &wgpu::Buffer,
    shadows: &ShadowMaps,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Lighting Lights"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: lights.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(shadows.view()),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(shadows.sampler()),
            },
        ],
    })
}

fn create_gbuffer_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    gbuffer: &GBuffer,
) -> wgpu::BindGroup {
    let entries: Vec<_> = [
        Attachment::Albedo,
        Attachment::Normal,
        Attachment::Position,
        Attachment::Rml,
    ]
    .iter()
    .enumerate()
    .map(|(binding, a)| wgpu::BindGroupEntry {
        binding: binding as u32,
        resource: wgpu::BindingResource::TextureView(gbuffer.view(*a)),
    })
    .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Lighting G-Buffer"),
        layout,
        entries: &entries,
    })
}

fn create_lighting_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    gbuffer_layout: &wgpu::BindGroupLayout,
    lights_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let targets = LIGHTING_ATTACHMENTS
        .map(|a| color_target(a.format(), Some(ADDITIVE_BLEND)));
    create_screen_space_pipeline(
        device,
        "Lighting",
        shader,
        &targets,
        &[gbuffer_layout, lights_layout],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::render_context::{test_context, RenderContext};
    use crate::renderer::gbuffer::FrameSize;

    #[test]
    fn gpu_structs_match_wgsl_layout() {
        assert_eq!(size_of::<GpuLight>(), 128);
        assert_eq!(size_of::<LightingUniform>(), 32);
    }

    #[test]
    fn point_lights_ignore_shadow_request() {
        assert!(!Light::point(Vec3::ONE).with_shadows().cast_shadows());
        assert!(Light::directional(Vec3::NEG_Y).with_shadows().cast_shadows());
    }

    #[test]
    fn spot_cone_is_packed_as_cosines() {
        let light = Light::spot(Vec3::ZERO, Vec3::X, 30.0, 60.0);
        let gpu = light.to_gpu(&ShadowOptions::default());
        assert!((gpu.cos_inner - 0.866_025_4).abs() < 1e-5);
        assert!((gpu.cos_outer - 0.5).abs() < 1e-5);
        assert_eq!(gpu.kind, 2);
        assert_eq!(gpu.shadow_layer, -1);
    }

    #[test]
    fn spot_inner_angle_never_exceeds_outer() {
        let light = Light::spot(Vec3::ZERO, Vec3::X, 50.0, 20.0);
        assert_eq!(light.inner_angle, 20.0);
    }

    #[test]
    fn directional_matrix_maps_origin_inside_clip_volume() {
        let options = ShadowOptions::default();
        let light = Light::directional(Vec3::new(-1.0, -1.0, 0.0));
        let clip = light.light_space_matrix(&options)
            * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn spot_matrix_centres_its_axis() {
        let options = ShadowOptions::default();
        let light =
            Light::spot(Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, 20.0, 30.0);
        let clip = light.light_space_matrix(&options)
            * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    /// Evaluates `evaluate_light` for a light straight above an upward
    /// facing texel viewed from above, one case per invocation.
    const BRDF_CASES: &str = r"
#import prism::lights::{Light, LIGHT_DIRECTIONAL, evaluate_light}

@group(0) @binding(0) var<storage, read_write> results: array<vec4<f32>, 4>;

fn overhead(direction: vec3<f32>) -> Light {
    return Light(
        vec3<f32>(0.0), LIGHT_DIRECTIONAL, direction, 1.0,
        vec3<f32>(1.0), 1.0, 1.0, -1, vec2<f32>(0.0),
        mat4x4<f32>(vec4<f32>(0.0), vec4<f32>(0.0), vec4<f32>(0.0), vec4<f32>(0.0)),
    );
}

@compute @workgroup_size(1)
fn main() {
    let up = vec3<f32>(0.0, 1.0, 0.0);
    let down = vec3<f32>(0.0, -1.0, 0.0);
    let white = vec3<f32>(1.0);
    // Rough dielectric.
    results[0] = vec4<f32>(evaluate_light(overhead(down), white, up, vec3<f32>(0.0), up, 1.0, 0.0, 1.0), 0.0);
    // Light from below the surface.
    results[1] = vec4<f32>(evaluate_light(overhead(up), white, up, vec3<f32>(0.0), up, 1.0, 0.0, 1.0), 0.0);
    // Rough metal: specular only.
    results[2] = vec4<f32>(evaluate_light(overhead(down), white, up, vec3<f32>(0.0), up, 1.0, 1.0, 1.0), 0.0);
    // Rough dielectric with the specular lobe disabled.
    results[3] = vec4<f32>(evaluate_light(overhead(down), white, up, vec3<f32>(0.0), up, 1.0, 0.0, 0.0), 0.0);
}
";

    fn run_brdf_cases(ctx: &RenderContext) -> [f32; 4] {
        let mut composer = ShaderComposer::new().unwrap();
        let module = composer
            .compose(&ctx.device, "BRDF Cases", BRDF_CASES, "brdf_cases.wgsl")
            .unwrap();
        let pipeline = ctx.device.create_compute_pipeline(
            &wgpu::ComputePipelineDescriptor {
                label: Some("BRDF Cases"),
                layout: None,
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            },
        );
        let size = 4 * 16;
        let storage = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("BRDF Out"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("BRDF Readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let bind_group =
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("BRDF Cases"),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: storage.as_entire_binding(),
                }],
            });
        let mut encoder = ctx.create_encoder();
        {
            let mut pass =
                encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("BRDF Cases"),
                    timestamp_writes: None,
                });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(1, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&storage, 0, &readback, 0, size);
        ctx.submit(encoder);

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let mapped = loop {
            let _ = ctx.device.poll(wgpu::PollType::Poll);
            if let Ok(result) = receiver.try_recv() {
                break result;
            }
            std::thread::yield_now();
        };
        mapped.unwrap();
        let red: Vec<f32> = slice
            .get_mapped_range()
            .chunks_exact(16)
            .map(|texel| {
                f32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]])
            })
            .collect();
        readback.unmap();
        [red[0], red[1], red[2], red[3]]
    }

    #[test]
    fn cook_torrance_matches_closed_form_at_normal_incidence() {
        let Some(ctx) = test_context() else {
            return;
        };
        let [dielectric, behind, metal, diffuse_only] = run_brdf_cases(&ctx);
        let pi = std::f32::consts::PI;
        // roughness 1: D = 1/pi, G = 1, F = F0 at normal incidence.
        assert!((dielectric - (0.96 + 0.04 / 4.0) / pi).abs() < 1e-3);
        assert_eq!(behind, 0.0);
        assert!((metal - 1.0 / (4.0 * pi)).abs() < 1e-3);
        assert!((diffuse_only - 0.96 / pi).abs() < 1e-3);
    }

    #[test]
    fn light_list_enforces_caps_and_recycles_layers() {
        let Some(ctx) = test_context() else {
            return;
        };
        let gbuffer =
            GBuffer::new(&ctx.device, FrameSize::new(16, 16).unwrap());
        let shadows = ShadowMaps::new(
            &ctx.device,
            &ShadowOptions {
                resolution: 16,
                ..ShadowOptions::default()
            },
        );
        let mut composer = ShaderComposer::new().unwrap();
        let mut lighting = LightingCompositor::new(
            &ctx.device,
            &mut composer,
            &gbuffer,
            &shadows,
        )
        .unwrap();

        let caster = Light::directional(Vec3::NEG_Y).with_shadows();
        for expected in 0..MAX_SHADOW_CASTERS {
            let index = lighting.add_light(caster.clone()).unwrap();
            assert_eq!(
                lighting.light(index).unwrap().shadow_layer(),
                Some(expected as u32)
            );
        }
        assert!(matches!(
            lighting.add_light(caster.clone()),
            Err(PrismError::ShadowCasterLimit { .. })
        ));

        let removed = lighting.remove_light(4).unwrap();
        assert_eq!(removed.shadow_layer(), None);
        let index = lighting.add_light(caster).unwrap();
        assert_eq!(lighting.light(index).unwrap().shadow_layer(), Some(4));

        while lighting.lights().len() < MAX_LIGHTS {
            let _ = lighting.add_light(Light::point(Vec3::ZERO)).unwrap();
        }
        assert!(matches!(
            lighting.add_light(Light::point(Vec3::ZERO)),
            Err(PrismError::LightLimit { max: MAX_LIGHTS })
        ));
        assert!(matches!(
            lighting.remove_light(MAX_LIGHTS),
            Err(PrismError::IndexOutOfRange { .. })
        ));

        lighting.prepare(
            &ctx.device,
            &ctx.queue,
            Vec3::ZERO,
            &LightingOptions::default(),
            &shadows,
            &ShadowOptions::default(),
        );
        assert_eq!(lighting.light_capacity, MAX_LIGHTS);
    }
}
