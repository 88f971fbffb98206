//! HyDE (Hypothetical Document Embeddings) query construction
//!
//! A language model writes passages that would answer the query. The query
//! embedding is averaged with the embeddings of those passages and the mean is
//! used as the dense search vector.
//!
//! Two variants share the `QueryVectorConstructor` interface and the same
//! combination rule; they differ only in how the hypothesis pool is filled:
//! * `SinglePromptHyde` samples repeatedly from one prompt (optionally split
//!   with a secondary task style).
//! * `MultiPromptHyde` samples twice from each of four fixed perspectives.

pub mod multi;
pub mod prompt;
pub mod single;
pub mod vector;

#[cfg(test)]
pub(crate) mod testing;

pub use multi::MultiPromptHyde;
pub use prompt::{build_prompt, Promptor, TaskStyle};
pub use single::SinglePromptHyde;
pub use vector::{encode_pool, mean_embedding, HydeVector};

use crate::generator::SharedGenerator;
use crate::search::SearchHit;
use anyhow::{anyhow, Result};
use async_trait::async_trait;

#[async_trait]
pub trait QueryVectorConstructor: Send + Sync {
    /// Short label used in run file names, e.g. `single_prompt`.
    fn label(&self) -> &'static str;

    /// Number of hypothesis documents `generate_hypotheses` produces.
    fn hypothesis_count(&self) -> usize;

    async fn generate_hypotheses(&self, query: &str) -> Result<Vec<String>>;

    /// Mean of the query embedding and every hypothesis embedding.
    async fn compute_vector(&self, query: &str, hypotheses: &[String]) -> Result<HydeVector>;

    /// Delegates to the search engine; its ranking is returned unmodified.
    async fn search(&self, vector: &HydeVector, k: usize) -> Result<Vec<SearchHit>>;
}

const IMPROVE_QUERY_INSTRUCTION: &str = "Improve the following search query to be more \
specific, clear, and optimized for retrieving accurate and relevant results. The improved \
version should maintain the original intent while refining the search for better precision. \
Output only the improved search query, without adding any context or explanation: ";

/// Rewrites a query with the generator before hypotheses are drawn.
///
/// The rewritten query only feeds prompt construction; the HyDE vector stays
/// anchored on the original query.
pub struct QueryImprover {
    generator: SharedGenerator,
}

impl QueryImprover {
    pub fn new(generator: SharedGenerator) -> Self {
        Self { generator }
    }

    pub fn prompt(query: &str) -> String {
        format!("{IMPROVE_QUERY_INSTRUCTION}{query}")
    }

    pub async fn improve(&self, query: &str) -> Result<String> {
        let rewrites = self.generator.generate(&Self::prompt(query), 1).await?;
        let improved = rewrites
            .into_iter()
            .next()
            .map(|s| s.trim().trim_matches('"').trim().to_string())
            .ok_or_else(|| anyhow!("Generator returned no query rewrite"))?;

        if improved.is_empty() {
            tracing::warn!(query, "Empty query rewrite, keeping the original query");
            return Ok(query.to_string());
        }
        tracing::debug!(original = query, improved = %improved, "Rewrote query");
        Ok(improved)
    }
}
