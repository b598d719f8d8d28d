use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Global deferred-lighting parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Lighting", inline)]
#[serde(default)]
pub struct LightingOptions {
    /// Fraction of albedo added to every lit texel regardless of lights.
    #[schemars(title = "Ambient", range(min = 0.0, max = 1.0), extend("step" = 0.01))]
    pub ambient: f32,
    /// Scale of the Blinn-Phong highlight.
    #[schemars(title = "Specular", range(min = 0.0, max = 2.0), extend("step" = 0.05))]
    pub specular: f32,
}

impl Default for LightingOptions {
    fn default() -> Self {
        Self {
            ambient: 0.1,
            specular: 0.5,
        }
    }
}
