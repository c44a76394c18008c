//! The generative model seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sampling and output settings for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    /// Ask the model for `application/json` output.
    pub json_mode: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { temperature: 0.3, max_output_tokens: 2048, top_p: 0.95, top_k: 40, json_mode: true }
    }
}

impl GenerationConfig {
    /// Override the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the output token limit.
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

/// A text-in, text-out language model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;
}
