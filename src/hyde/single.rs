//! Single-perspective HyDE

use crate::embeddings::SharedEmbedder;
use crate::generator::SharedGenerator;
use crate::hyde::{encode_pool, HydeVector, Promptor, QueryVectorConstructor};
use crate::search::{SearchHit, SharedSearcher};
use anyhow::Result;
use async_trait::async_trait;

pub const DEFAULT_HYPOTHESIS_COUNT: usize = 8;

/// Fills the hypothesis pool from one primary prompt, optionally sharing it
/// with a secondary task style.
pub struct SinglePromptHyde {
    promptor: Promptor,
    second_promptor: Option<Promptor>,
    generator: SharedGenerator,
    encoder: SharedEmbedder,
    searcher: SharedSearcher,
    hypothesis_count: usize,
}

impl SinglePromptHyde {
    pub fn new(
        promptor: Promptor,
        generator: SharedGenerator,
        encoder: SharedEmbedder,
        searcher: SharedSearcher,
    ) -> Self {
        Self {
            promptor,
            second_promptor: None,
            generator,
            encoder,
            searcher,
            hypothesis_count: DEFAULT_HYPOTHESIS_COUNT,
        }
    }

    pub fn with_second_promptor(mut self, promptor: Promptor) -> Self {
        self.second_promptor = Some(promptor);
        self
    }

    pub fn with_hypothesis_count(mut self, count: usize) -> Self {
        self.hypothesis_count = count;
        self
    }

    pub fn second_promptor(&self) -> Option<&Promptor> {
        self.second_promptor.as_ref()
    }

    /// Human-readable preview of the configured prompt(s).
    pub fn prompt(&self, query: &str) -> String {
        let mut out = self.promptor.build_prompt(query);
        if let Some(second) = &self.second_promptor {
            out.push_str("\n Second Prompt: ");
            out.push_str(&second.build_prompt(query));
        }
        out
    }

    /// Draws `total_count` hypothesis documents.
    ///
    /// With a secondary promptor the secondary style gets `total_count / 2`
    /// documents and the primary style the rest; secondary documents come
    /// first in the returned pool.
    pub async fn generate(&self, query: &str, total_count: usize) -> Result<Vec<String>> {
        let mut hypotheses = Vec::with_capacity(total_count);
        let mut primary_count = total_count;

        if let Some(second) = &self.second_promptor {
            let second_count = total_count / 2;
            primary_count = total_count - second_count;
            let prompt = second.build_prompt(query);
            hypotheses.extend(self.generator.generate(&prompt, second_count).await?);
        }

        let prompt = self.promptor.build_prompt(query);
        hypotheses.extend(self.generator.generate(&prompt, primary_count).await?);

        tracing::debug!(
            primary = %self.promptor.style(),
            secondary = ?self.second_promptor.map(|p| p.style().name()),
            count = hypotheses.len(),
            "Generated hypothesis documents"
        );
        Ok(hypotheses)
    }

    /// Prompt, generate, encode and search in one call.
    ///
    /// Only the primary promptor is used here, even when a secondary one is
    /// configured, and it always requests `DEFAULT_HYPOTHESIS_COUNT`
    /// documents; `generate` is the path that honours the split and the
    /// configured count.
    pub async fn search_end_to_end(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.second_promptor.is_some() {
            tracing::warn!(
                "search_end_to_end ignores the secondary promptor; use generate + compute_vector for the split pool"
            );
        }
        let prompt = self.promptor.build_prompt(query);
        let hypotheses = self.generator.generate(&prompt, DEFAULT_HYPOTHESIS_COUNT).await?;
        let vector = encode_pool(&self.encoder, query, &hypotheses).await?;
        self.searcher.search(&vector, k).await
    }
}

#[async_trait]
impl QueryVectorConstructor for SinglePromptHyde {
    fn label(&self) -> &'static str {
        "single_prompt"
    }

    fn hypothesis_count(&self) -> usize {
        self.hypothesis_count
    }

    async fn generate_hypotheses(&self, query: &str) -> Result<Vec<String>> {
        self.generate(query, self.hypothesis_count).await
    }

    async fn compute_vector(&self, query: &str, hypotheses: &[String]) -> Result<HydeVector> {
        encode_pool(&self.encoder, query, hypotheses).await
    }

    async fn search(&self, vector: &HydeVector, k: usize) -> Result<Vec<SearchHit>> {
        self.searcher.search(vector, k).await
    }
}
