//! Remote generation backend configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the image-generation backend and request validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the generation service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with each request.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Hard timeout for one generation call, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Largest `num_outputs` a single job may request.
    #[serde(default = "default_max_outputs")]
    pub max_outputs_per_request: u32,
    /// Longest accepted prompt, in characters.
    #[serde(default = "default_max_prompt_length")]
    pub max_prompt_length: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_seconds: default_timeout(),
            max_outputs_per_request: default_max_outputs(),
            max_prompt_length: default_max_prompt_length(),
        }
    }
}

impl GenerationConfig {
    /// Per-call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_base_url() -> String {
    "http://localhost:8188".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_outputs() -> u32 {
    8
}

fn default_max_prompt_length() -> usize {
    2000
}
