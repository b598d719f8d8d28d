//! Centralized compositor options with TOML preset support.
//!
//! Tweakable settings (G-Buffer clear, lighting, shadows, transparency
//! resolve, tone-mapping) are consolidated here. Options serialize to/from
//! TOML for presets stored in `assets/view_presets/`.

mod gbuffer;
mod lighting;
mod post_processing;
mod shadows;
mod transparency;

use std::path::Path;

pub use gbuffer::GBufferOptions;
pub use lighting::LightingOptions;
pub use post_processing::PostProcessingOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
pub use shadows::ShadowOptions;
pub use transparency::TransparencyOptions;

use crate::error::PrismError;

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[lighting]`) work correctly.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// G-Buffer clear color and culling.
    pub gbuffer: GBufferOptions,
    /// Deferred lighting parameters.
    pub lighting: LightingOptions,
    /// Shadow-map parameters.
    pub shadows: ShadowOptions,
    /// Transparency resolve parameters.
    #[schemars(skip)]
    pub transparency: TransparencyOptions,
    /// Built-in tone-map parameters.
    pub post_processing: PostProcessingOptions,
}

impl Options {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::Io`] if the file cannot be read,
    /// [`PrismError::OptionsParse`] if it is not valid TOML, and
    /// [`PrismError::InvalidColor`] if the background is out of range.
    pub fn load(path: &Path) -> Result<Self, PrismError> {
        let content = std::fs::read_to_string(path).map_err(PrismError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse options from TOML text. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn from_toml(content: &str) -> Result<Self, PrismError> {
        let options: Self = toml::from_str(content)
            .map_err(|e| PrismError::OptionsParse(e.to_string()))?;
        let _ = GBufferOptions::validated_background(
            options.gbuffer.background,
            false,
        )?;
        Ok(options)
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::OptionsParse`] on serialization failure and
    /// [`PrismError::Io`] on write failure.
    pub fn save(&self, path: &Path) -> Result<(), PrismError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PrismError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(PrismError::Io)?;
        }
        std::fs::write(path, content).map_err(PrismError::Io)
    }

    /// List available preset names (TOML file stems) in a directory.
    #[must_use]
    pub fn list_presets(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) =
                        path.file_stem().and_then(|s| s.to_str())
                    {
                        names.push(stem.to_owned());
                    }
                }
            }
        }
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = Options::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed = Options::from_toml(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r"
[lighting]
ambient = 0.25
";
        let opts = Options::from_toml(toml_str).unwrap();
        assert_eq!(opts.lighting.ambient, 0.25);
        // Everything else should be default
        assert_eq!(opts.lighting.specular, 0.5);
        assert_eq!(opts.shadows.resolution, 1024);
        assert_eq!(opts.transparency.weight_epsilon, 1e-4);
    }

    #[test]
    fn out_of_range_background_fails_to_load() {
        let toml_str = r"
[gbuffer]
background = [0.0, 2.0, 0.0]
";
        assert!(matches!(
            Options::from_toml(toml_str),
            Err(PrismError::InvalidColor(_))
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Options::from_toml("[lighting\nambient = "),
            Err(PrismError::OptionsParse(_))
        ));
    }

    #[test]
    fn save_load_and_list_presets() {
        let dir = std::env::temp_dir()
            .join(format!("prism-presets-{}", std::process::id()));
        let mut opts = Options::default();
        opts.post_processing.exposure = 1.5;
        opts.save(&dir.join("bright.toml")).unwrap();
        Options::default().save(&dir.join("neutral.toml")).unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        assert_eq!(Options::list_presets(&dir), vec!["bright", "neutral"]);
        let loaded = Options::load(&dir.join("bright.toml")).unwrap();
        assert_eq!(loaded, opts);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value =
            serde_json::to_value(Options::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();

        assert!(props.contains_key("gbuffer"));
        assert!(props.contains_key("lighting"));
        assert!(props.contains_key("shadows"));
        assert!(props.contains_key("post_processing"));
        assert!(!props.contains_key("transparency"));

        let shadows = &props["shadows"]["properties"];
        assert!(shadows.get("bias").is_some());
        assert!(shadows.get("near").is_none());
    }
}
