//! Model catalog: per-model cost, complexity, and duration estimates.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Static description of one generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Credits charged per requested output image.
    pub credits_per_output: i64,
    /// Priority weight reflecting how slow or expensive the model is.
    #[serde(default)]
    pub complexity_weight: i32,
    /// Typical wall time of one generation call, in seconds.
    pub estimated_duration_seconds: u64,
}

impl ModelProfile {
    /// Estimated duration as a [`Duration`].
    pub fn estimated_duration(&self) -> Duration {
        Duration::from_secs(self.estimated_duration_seconds)
    }
}

/// All models the queue accepts, keyed by model id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog(HashMap<String, ModelProfile>);

impl ModelCatalog {
    /// Build a catalog from explicit profiles.
    pub fn new(models: HashMap<String, ModelProfile>) -> Self {
        Self(models)
    }

    /// Look up a model profile.
    pub fn get(&self, model_id: &str) -> Option<&ModelProfile> {
        self.0.get(model_id)
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over model ids in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let profiles = [
            ("flux-schnell", 1, 0, 8),
            ("sdxl", 1, 0, 15),
            ("flux-dev", 2, 1, 25),
            ("flux-pro", 4, 2, 45),
        ];

        Self(
            profiles
                .into_iter()
                .map(|(id, credits, complexity, seconds)| {
                    (
                        id.to_string(),
                        ModelProfile {
                            credits_per_output: credits,
                            complexity_weight: complexity,
                            estimated_duration_seconds: seconds,
                        },
                    )
                })
                .collect(),
        )
    }
}
