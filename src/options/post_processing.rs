use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters of the built-in tone-mapping effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Effects", inline)]
#[serde(default)]
pub struct PostProcessingOptions {
    /// Exposure applied before the exponential tone curve.
    #[schemars(title = "Exposure", range(min = 0.1, max = 5.0), extend("step" = 0.05))]
    pub exposure: f32,
    /// Display gamma. Ignored when the output surface is sRGB.
    #[schemars(title = "Gamma", range(min = 1.0, max = 3.0), extend("step" = 0.1))]
    pub gamma: f32,
}

impl Default for PostProcessingOptions {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            gamma: 2.2,
        }
    }
}

impl PostProcessingOptions {
    /// Gamma the tone-map should apply for the given output format. sRGB
    /// surfaces encode on write, so the shader stays linear.
    pub fn effective_gamma(&self, output: wgpu::TextureFormat) -> f32 {
        if output.is_srgb() {
            1.0
        } else {
            self.gamma
        }
    }
}
