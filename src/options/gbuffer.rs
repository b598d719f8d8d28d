use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::PrismError;

/// G-Buffer clear and rasterization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "G-Buffer", inline)]
#[serde(default)]
pub struct GBufferOptions {
    /// Clear color of the albedo attachment, RGB in `0..=1`.
    #[schemars(title = "Background")]
    pub background: [f32; 3],
    /// Whether scene pipelines should cull back faces.
    #[schemars(title = "Backface Culling")]
    pub backface_culling: bool,
}

impl Default for GBufferOptions {
    fn default() -> Self {
        Self {
            background: [0.0, 0.0, 0.0],
            backface_culling: true,
        }
    }
}

impl GBufferOptions {
    /// Validate a background color, optionally rescaling 0..=255 input to
    /// 0..=1 first. Negative components or components above 1 after scaling
    /// are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::InvalidColor`] with the offending (scaled)
    /// color.
    pub fn validated_background(
        color: [f32; 3],
        normalise: bool,
    ) -> Result<[f32; 3], PrismError> {
        let scaled = if normalise {
            color.map(|c| c / 255.0)
        } else {
            color
        };
        if scaled.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(PrismError::InvalidColor(scaled));
        }
        Ok(scaled)
    }

    /// Set the background color after validation. The previous value is
    /// kept on error.
    ///
    /// # Errors
    ///
    /// See [`Self::validated_background`].
    pub fn set_background(
        &mut self,
        color: [f32; 3],
        normalise: bool,
    ) -> Result<(), PrismError> {
        self.background = Self::validated_background(color, normalise)?;
        Ok(())
    }

    /// The background as a wgpu clear color (alpha 1).
    pub fn clear_color(&self) -> wgpu::Color {
        wgpu::Color {
            r: f64::from(self.background[0]),
            g: f64::from(self.background[1]),
            b: f64::from(self.background[2]),
            a: 1.0,
        }
    }

    /// Face culling mode scene pipelines should use.
    pub fn cull_mode(&self) -> Option<wgpu::Face> {
        self.backface_culling.then_some(wgpu::Face::Back)
    }
}
