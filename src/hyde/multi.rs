//! Multi-perspective HyDE
//!
//! Four task styles, two hypothesis documents each, concatenated in style
//! order. The fan-out is fixed: `promptors` is an array, not a list.

use crate::embeddings::SharedEmbedder;
use crate::generator::SharedGenerator;
use crate::hyde::{encode_pool, HydeVector, Promptor, QueryVectorConstructor, TaskStyle};
use crate::search::{SearchHit, SharedSearcher};
use anyhow::Result;
use async_trait::async_trait;

pub const PERSPECTIVES: usize = 4;
pub const REPS_PER_PERSPECTIVE: usize = 2;

pub struct MultiPromptHyde {
    promptors: [Promptor; PERSPECTIVES],
    generator: SharedGenerator,
    encoder: SharedEmbedder,
    searcher: SharedSearcher,
}

impl MultiPromptHyde {
    pub fn new(
        promptors: [Promptor; PERSPECTIVES],
        generator: SharedGenerator,
        encoder: SharedEmbedder,
        searcher: SharedSearcher,
    ) -> Self {
        Self {
            promptors,
            generator,
            encoder,
            searcher,
        }
    }

    /// Default, expert, novice and intermediate web-search framings.
    pub fn with_default_perspectives(
        generator: SharedGenerator,
        encoder: SharedEmbedder,
        searcher: SharedSearcher,
    ) -> Self {
        Self::new(
            TaskStyle::WEB_PERSPECTIVES.map(Promptor::new),
            generator,
            encoder,
            searcher,
        )
    }

    pub fn promptors(&self) -> &[Promptor; PERSPECTIVES] {
        &self.promptors
    }

    pub fn prompts(&self, query: &str) -> [String; PERSPECTIVES] {
        self.promptors.map(|p| p.build_prompt(query))
    }
}

#[async_trait]
impl QueryVectorConstructor for MultiPromptHyde {
    fn label(&self) -> &'static str {
        "multi_prompt"
    }

    fn hypothesis_count(&self) -> usize {
        PERSPECTIVES * REPS_PER_PERSPECTIVE
    }

    async fn generate_hypotheses(&self, query: &str) -> Result<Vec<String>> {
        let mut hypotheses = Vec::with_capacity(self.hypothesis_count());
        for (promptor, prompt) in self.promptors.iter().zip(self.prompts(query)) {
            let docs = self.generator.generate(&prompt, REPS_PER_PERSPECTIVE).await?;
            tracing::trace!(style = %promptor.style(), count = docs.len(), "Perspective generated");
            hypotheses.extend(docs);
        }
        Ok(hypotheses)
    }

    async fn compute_vector(&self, query: &str, hypotheses: &[String]) -> Result<HydeVector> {
        encode_pool(&self.encoder, query, hypotheses).await
    }

    async fn search(&self, vector: &HydeVector, k: usize) -> Result<Vec<SearchHit>> {
        self.searcher.search(vector, k).await
    }
}
