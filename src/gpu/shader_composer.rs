//! WGSL shader composition with `#import` support via naga_oil.

use std::borrow::Cow;

use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, NagaModuleDescriptor,
    ShaderLanguage, ShaderType,
};

use crate::error::PrismError;

/// Wraps `naga_oil::compose::Composer` to provide shader composition with
/// `#import` support.
///
/// Pre-loads the shared WGSL modules at construction time. Consuming shaders
/// use `#import prism::module_name` to pull in shared code; user-supplied
/// lighting, resolve and post-processing shaders go through the same path.
/// The composer produces `naga::Module` IR directly, skipping WGSL re-parse
/// at runtime.
pub struct ShaderComposer {
    composer: Composer,
}

/// Shared module definition: (source, file_path)
struct ModuleDef {
    source: &'static str,
    file_path: &'static str,
}

/// Shared modules in dependency order.
const MODULES: &[ModuleDef] = &[
    ModuleDef {
        source: include_str!("../../assets/shaders/modules/fullscreen.wgsl"),
        file_path: "modules/fullscreen.wgsl",
    },
    ModuleDef {
        source: include_str!("../../assets/shaders/modules/lights.wgsl"),
        file_path: "modules/lights.wgsl",
    },
    ModuleDef {
        source: include_str!("../../assets/shaders/modules/post_inputs.wgsl"),
        file_path: "modules/post_inputs.wgsl",
    },
];

impl ShaderComposer {
    /// Build a composer with every shared module registered.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if a shared module fails to
    /// parse.
    pub fn new() -> Result<Self, PrismError> {
        let mut composer = Composer::default();
        for m in MODULES {
            let _ = composer
                .add_composable_module(ComposableModuleDescriptor {
                    source: m.source,
                    file_path: m.file_path,
                    language: ShaderLanguage::Wgsl,
                    ..Default::default()
                })
                .map_err(|e| {
                    PrismError::ShaderCompose(format!(
                        "shared module '{}': {e}",
                        m.file_path
                    ))
                })?;
        }
        Ok(Self { composer })
    }

    /// Compose a shader source string (which may contain `#import`
    /// directives) into a `wgpu::ShaderModule` ready for pipeline creation.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if the source does not compose
    /// or the composed module fails validation.
    pub fn compose(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        source: &str,
        file_path: &str,
    ) -> Result<wgpu::ShaderModule, PrismError> {
        self.build(device, label, source, file_path, &[])
    }

    /// Like [`Self::compose`], additionally requiring the `vs_main` vertex
    /// and `fs_main` fragment entry points every fullscreen pass uses.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if composition or validation
    /// fails or an entry point is missing.
    pub fn compose_screen(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        source: &str,
        file_path: &str,
    ) -> Result<wgpu::ShaderModule, PrismError> {
        self.build(
            device,
            label,
            source,
            file_path,
            &[
                ("vs_main", naga::ShaderStage::Vertex),
                ("fs_main", naga::ShaderStage::Fragment),
            ],
        )
    }

    fn build(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        source: &str,
        file_path: &str,
        entry_points: &[(&str, naga::ShaderStage)],
    ) -> Result<wgpu::ShaderModule, PrismError> {
        let naga_module = self.compose_naga(source, file_path)?;
        for (name, stage) in entry_points {
            if !naga_module
                .entry_points
                .iter()
                .any(|ep| ep.name == *name && ep.stage == *stage)
            {
                return Err(PrismError::ShaderCompose(format!(
                    "'{file_path}': missing {stage:?} entry point '{name}'"
                )));
            }
        }
        let _info = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&naga_module)
        .map_err(|e| {
            PrismError::ShaderCompose(format!("'{file_path}': {e}"))
        })?;

        Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Naga(Cow::Owned(naga_module)),
        }))
    }

    /// Compose a shader source into a `naga::Module` without creating a wgpu
    /// shader module. Useful for testing shader composition without a GPU
    /// device.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::ShaderCompose`] if composition fails.
    pub fn compose_naga(
        &mut self,
        source: &str,
        file_path: &str,
    ) -> Result<naga::Module, PrismError> {
        self.composer
            .make_naga_module(NagaModuleDescriptor {
                source,
                file_path,
                shader_type: ShaderType::Wgsl,
                ..Default::default()
            })
            .map_err(|e| {
                PrismError::ShaderCompose(format!("'{file_path}': {e}"))
            })
    }
}
