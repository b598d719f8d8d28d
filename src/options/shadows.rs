use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Shadow-map settings shared by every shadow-casting light.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Shadows", inline)]
#[serde(default)]
pub struct ShadowOptions {
    /// Edge length of each shadow-map layer in texels.
    #[schemars(title = "Resolution", range(min = 128, max = 4096))]
    pub resolution: u32,
    /// Near plane of the light-space projection.
    #[schemars(skip)]
    pub near: f32,
    /// Far plane of the light-space projection.
    #[schemars(title = "Range", range(min = 1.0, max = 1000.0), extend("step" = 1.0))]
    pub far: f32,
    /// Depth bias subtracted before the comparison.
    #[schemars(title = "Bias", range(min = 0.0, max = 0.05), extend("step" = 0.0005))]
    pub bias: f32,
    /// Half-extent of the orthographic box used by directional lights.
    #[schemars(skip)]
    pub directional_extent: f32,
    /// Distance a directional light's virtual eye is pulled back from the
    /// origin.
    #[schemars(skip)]
    pub directional_distance: f32,
}

impl Default for ShadowOptions {
    fn default() -> Self {
        Self {
            resolution: 1024,
            near: 0.1,
            far: 100.0,
            bias: 0.002,
            directional_extent: 20.0,
            directional_distance: 50.0,
        }
    }
}
