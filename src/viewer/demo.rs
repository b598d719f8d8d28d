//! Built-in demo scene: a lit floor with a ring of cubes, a few glass
//! panes, a gradient sky, and an orbiting camera.

use glam::{Mat4, Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::error::PrismError;
use crate::gpu::shader_composer::ShaderComposer;
use crate::options::GBufferOptions;
use crate::renderer::gbuffer::GBuffer;
use crate::renderer::lighting::{Light, LightingCompositor};
use crate::renderer::scene::SceneDraw;
use crate::renderer::shadow::{ShadowDrawContext, ShadowMaps};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    color: [f32; 4],
    /// roughness, metallic, lit flag, object id
    material: [f32; 4],
}

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x4,
    3 => Float32x4,
];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    position: [f32; 4],
}

/// Surface parameters shared by every vertex of one object.
#[derive(Clone, Copy)]
struct Material {
    color: Vec4,
    roughness: f32,
    metallic: f32,
    object_id: f32,
}

impl Material {
    fn vertex(self, position: Vec3, normal: Vec3) -> Vertex {
        Vertex {
            position: position.to_array(),
            normal: normal.to_array(),
            color: self.color.to_array(),
            material: [self.roughness, self.metallic, 1.0, self.object_id],
        }
    }
}

#[derive(Default)]
struct MeshData {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl MeshData {
    /// Append one quad spanned by `u` and `v` around `center`, facing
    /// `u x v`.
    fn push_quad(
        &mut self,
        center: Vec3,
        u: Vec3,
        v: Vec3,
        material: Material,
    ) {
        let normal = u.cross(v).normalize_or_zero();
        let base = self.vertices.len() as u32;
        for corner in [-u - v, u - v, u + v, -u + v] {
            self.vertices.push(material.vertex(center + corner, normal));
        }
        self.indices.extend_from_slice(&[
            base,
            base + 1,
            base + 2,
            base,
            base + 2,
            base + 3,
        ]);
    }

    /// Append an axis-aligned box with outward-facing sides.
    fn push_box(&mut self, center: Vec3, half: Vec3, material: Material) {
        let (x, y, z) = (Vec3::X * half.x, Vec3::Y * half.y, Vec3::Z * half.z);
        for (offset, u, v) in [
            (x, -z, y),
            (-x, z, y),
            (y, x, -z),
            (-y, x, z),
            (z, x, y),
            (-z, -x, y),
        ] {
            self.push_quad(center + offset, u, v, material);
        }
    }
}

struct Mesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl Mesh {
    fn upload(device: &wgpu::Device, label: &str, data: &MeshData) -> Self {
        let vertices =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Vertices")),
                contents: bytemuck::cast_slice(&data.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let indices =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Indices")),
                contents: bytemuck::cast_slice(&data.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        Self {
            vertices,
            indices,
            index_count: data.indices.len() as u32,
        }
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertices.slice(..));
        pass.set_index_buffer(self.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

fn solid_scene() -> MeshData {
    let mut mesh = MeshData::default();
    let floor = Material {
        color: Vec4::new(0.55, 0.55, 0.52, 1.0),
        roughness: 0.9,
        metallic: 0.0,
        object_id: 1.0,
    };
    mesh.push_quad(Vec3::ZERO, Vec3::X * 12.0, Vec3::NEG_Z * 12.0, floor);

    const CUBES: usize = 6;
    for i in 0..CUBES {
        let angle = i as f32 / CUBES as f32 * std::f32::consts::TAU;
        let third = std::f32::consts::TAU / 3.0;
        let height = 0.6 + 0.25 * i as f32;
        let material = Material {
            color: Vec4::new(
                0.5 + 0.5 * angle.cos(),
                0.5 + 0.5 * (angle + third).cos(),
                0.5 + 0.5 * (angle + 2.0 * third).cos(),
                1.0,
            ),
            roughness: 0.3 + 0.1 * i as f32,
            metallic: if i % 2 == 0 { 0.0 } else { 0.6 },
            object_id: (i + 2) as f32,
        };
        let center = Vec3::new(angle.cos() * 4.0, height, angle.sin() * 4.0);
        mesh.push_box(center, Vec3::new(0.6, height, 0.6), material);
    }
    mesh
}

fn transparent_scene() -> MeshData {
    let mut mesh = MeshData::default();
    let tints = [
        Vec4::new(0.9, 0.2, 0.2, 0.45),
        Vec4::new(0.2, 0.8, 0.3, 0.35),
        Vec4::new(0.2, 0.4, 0.95, 0.5),
    ];
    for (i, color) in tints.into_iter().enumerate() {
        let material = Material {
            color,
            roughness: 0.1,
            metallic: 0.0,
            object_id: (20 + i) as f32,
        };
        let z = -1.0 + i as f32;
        mesh.push_quad(
            Vec3::new(0.4 * i as f32 - 0.4, 1.5, z),
            Vec3::X * 1.4,
            Vec3::Y * 1.2,
            material,
        );
    }
    mesh
}

/// The lights the demo registers: a warm shadow-casting spot, a cool
/// directional fill with shadows, and a small point light.
pub fn demo_lights() -> Vec<Light> {
    vec![
        Light::spot(
            Vec3::new(6.0, 9.0, 6.0),
            Vec3::new(-0.6, -1.0, -0.6),
            25.0,
            35.0,
        )
        .with_color(Vec3::new(1.0, 0.9, 0.75), 300.0)
        .with_shadows(),
        Light::directional(Vec3::new(0.4, -1.0, 0.2))
            .with_color(Vec3::new(0.55, 0.65, 0.9), 2.5)
            .with_shadows(),
        Light::point(Vec3::new(-2.0, 1.5, 2.0))
            .with_color(Vec3::new(1.0, 0.4, 0.2), 25.0),
    ]
}

/// Orbit camera looking at the middle of the scene.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    /// Current orbit angle in radians.
    pub angle: f32,
    /// Radians per second.
    pub speed: f32,
    /// Horizontal distance from the target.
    pub radius: f32,
    /// Eye height above the floor.
    pub height: f32,
    /// Vertical field of view in degrees.
    pub fovy: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            angle: 0.0,
            speed: 0.25,
            radius: 11.0,
            height: 5.0,
            fovy: 45.0,
        }
    }
}

impl OrbitCamera {
    const TARGET: Vec3 = Vec3::new(0.0, 1.0, 0.0);

    /// Eye position for the current angle.
    pub fn eye(&self) -> Vec3 {
        Vec3::new(
            self.angle.cos() * self.radius,
            self.height,
            self.angle.sin() * self.radius,
        )
    }

    /// Combined view-projection matrix.
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye(), Self::TARGET, Vec3::Y);
        let proj = Mat4::perspective_rh(
            self.fovy.to_radians(),
            aspect.max(f32::EPSILON),
            0.1,
            100.0,
        );
        proj * view
    }

    /// Advance the orbit by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.angle =
            (self.angle + self.speed * dt).rem_euclid(std::f32::consts::TAU);
    }
}

/// GPU side of the demo scene.
pub struct DemoScene {
    camera: OrbitCamera,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    solid_pipeline: wgpu::RenderPipeline,
    sky_pipeline: wgpu::RenderPipeline,
    transparent_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    solid: Mesh,
    transparent: Mesh,
}

impl DemoScene {
    /// Build the meshes and pipelines, and register the demo lights.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if a demo shader fails to
    /// compile, or a light-limit error if the compositor is already full.
    pub fn new(
        device: &wgpu::Device,
        shader_composer: &mut ShaderComposer,
        gbuffer_options: &GBufferOptions,
        shadows: &ShadowMaps,
        lighting: &mut LightingCompositor,
    ) -> Result<Self, PrismError> {
        let camera_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Demo Camera Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Demo Camera"),
            size: size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group =
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Demo Camera"),
                layout: &camera_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                }],
            });

        let mesh_shader = shader_composer.compose(
            device,
            "Demo Mesh Shader",
            include_str!("../../assets/shaders/raster/demo_mesh.wgsl"),
            "demo_mesh.wgsl",
        )?;
        let transparent_shader = shader_composer.compose(
            device,
            "Demo Transparent Shader",
            include_str!("../../assets/shaders/raster/demo_transparent.wgsl"),
            "demo_transparent.wgsl",
        )?;
        let sky_shader = shader_composer.compose_screen(
            device,
            "Demo Sky Shader",
            include_str!("../../assets/shaders/raster/demo_sky.wgsl"),
            "demo_sky.wgsl",
        )?;
        let shadow_shader = shader_composer.compose(
            device,
            "Demo Shadow Shader",
            include_str!("../../assets/shaders/raster/shadow_depth.wgsl"),
            "shadow_depth.wgsl",
        )?;

        let cull_mode = gbuffer_options.cull_mode();
        let solid_pipeline = mesh_pipeline(
            device,
            "Demo Solid",
            &mesh_shader,
            &camera_layout,
            &GBuffer::geometry_targets(),
            GBuffer::depth_state(true),
            cull_mode,
        );
        let transparent_pipeline = mesh_pipeline(
            device,
            "Demo Transparent",
            &transparent_shader,
            &camera_layout,
            &GBuffer::transparent_targets(),
            GBuffer::depth_state(false),
            None,
        );
        let sky_pipeline = sky_pipeline(device, &sky_shader);
        let shadow_pipeline =
            caster_pipeline(device, &shadow_shader, shadows.caster_layout());

        let solid = Mesh::upload(device, "Demo Solid", &solid_scene());
        let transparent =
            Mesh::upload(device, "Demo Transparent", &transparent_scene());

        for light in demo_lights() {
            let _ = lighting.add_light(light)?;
        }
        log::info!(
            "demo scene ready: {} solid and {} transparent indices, {} lights",
            solid.index_count,
            transparent.index_count,
            lighting.lights().len()
        );

        Ok(Self {
            camera: OrbitCamera::default(),
            camera_buffer,
            camera_bind_group,
            solid_pipeline,
            sky_pipeline,
            transparent_pipeline,
            shadow_pipeline,
            solid,
            transparent,
        })
    }

    /// Advance the camera and upload it. Returns the eye position.
    pub fn update(&mut self, queue: &wgpu::Queue, dt: f32, aspect: f32) -> Vec3 {
        self.camera.advance(dt);
        let eye = self.camera.eye();
        let uniform = CameraUniform {
            view_proj: self.camera.view_proj(aspect).to_cols_array_2d(),
            position: eye.extend(1.0).to_array(),
        };
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));
        eye
    }
}

impl SceneDraw for DemoScene {
    fn draw_solid(&mut self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.solid_pipeline);
        pass.set_bind_group(0, &self.camera_bind_group, &[]);
        self.solid.draw(pass);
    }

    fn draw_skybox(&mut self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.sky_pipeline);
        pass.draw(0..3, 0..1);
    }

    fn draw_transparent(&mut self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.transparent_pipeline);
        pass.set_bind_group(0, &self.camera_bind_group, &[]);
        self.transparent.draw(pass);
    }

    fn draw_shadow_casters(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        ctx: &ShadowDrawContext<'_>,
    ) {
        pass.set_pipeline(&self.shadow_pipeline);
        pass.set_bind_group(0, ctx.bind_group, &[ctx.dynamic_offset]);
        self.solid.draw(pass);
    }
}

fn mesh_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    camera_layout: &wgpu::BindGroupLayout,
    targets: &[Option<wgpu::ColorTargetState>],
    depth: wgpu::DepthStencilState,
    cull_mode: Option<wgpu::Face>,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{label} Pipeline Layout")),
        bind_group_layouts: &[camera_layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{label} Pipeline")),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[vertex_layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            cull_mode,
            ..Default::default()
        },
        depth_stencil: Some(depth),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn sky_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Demo Sky Pipeline Layout"),
        bind_group_layouts: &[],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Demo Sky Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &GBuffer::geometry_targets(),
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        // Far plane only: fills whatever the solids left at clear depth.
        depth_stencil: Some(GBuffer::depth_state(false)),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn caster_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    caster_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Demo Shadow Pipeline Layout"),
        bind_group_layouts: &[caster_layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Demo Shadow Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &VERTEX_ATTRIBUTES[..1],
            }],
            compilation_options: Default::default(),
        },
        fragment: None,
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: Some(ShadowMaps::depth_state()),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
