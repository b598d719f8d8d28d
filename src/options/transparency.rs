use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Weighted-blended OIT resolve settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Transparency", inline)]
#[serde(default)]
pub struct TransparencyOptions {
    /// Lower bound on the accumulated alpha used as a divisor.
    #[schemars(skip)]
    pub weight_epsilon: f32,
}

impl Default for TransparencyOptions {
    fn default() -> Self {
        Self {
            weight_epsilon: 1e-4,
        }
    }
}
