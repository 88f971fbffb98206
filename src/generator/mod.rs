//! Document generation capability
//!
//! The HyDE constructors only need "give me `n` completions for this prompt".
//! `LlmGenerator` implements that against hosted and local model servers;
//! tests substitute their own `DocumentGenerator`.

pub mod llm;
pub mod retry;

pub use crate::config::GeneratorBackend;
pub use llm::LlmGenerator;
pub use retry::RetryPolicy;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Generator shared by the query constructors and the query improver.
pub type SharedGenerator = Arc<dyn DocumentGenerator>;

#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Returns exactly `n` independently sampled completions for `prompt`.
    async fn generate(&self, prompt: &str, n: usize) -> Result<Vec<String>>;
}

/// Sampling parameters forwarded to the model server.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: "llama3.1".to_string(),
            max_tokens: 512,
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: Vec::new(),
        }
    }
}
