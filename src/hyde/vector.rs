//! Embedding combination shared by every HyDE variant.

use crate::embeddings::SharedEmbedder;
use crate::error::HydeError;
use anyhow::{Context, Result};

/// Single-row dense query vector handed to the search engine.
#[derive(Debug, Clone, PartialEq)]
pub struct HydeVector(Vec<f32>);

impl HydeVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

/// Element-wise arithmetic mean of `embeddings`.
///
/// Accumulates in f64 and divides once by the row count. Every row must have
/// the dimension of the first one.
pub fn mean_embedding(embeddings: &[Vec<f32>]) -> Result<Vec<f32>> {
    let first = embeddings
        .first()
        .ok_or(HydeError::EmptyHypothesisPool)?;
    let dim = first.len();

    let mut sum = vec![0.0f64; dim];
    for row in embeddings {
        if row.len() != dim {
            return Err(HydeError::DimensionMismatch {
                expected: dim,
                actual: row.len(),
            }
            .into());
        }
        for (acc, v) in sum.iter_mut().zip(row) {
            *acc += f64::from(*v);
        }
    }

    let count = embeddings.len() as f64;
    Ok(sum.into_iter().map(|s| (s / count) as f32).collect())
}

/// Encodes the query followed by each hypothesis and averages the stack.
///
/// The query embedding is always part of the pool exactly once. An empty
/// hypothesis list is rejected before the encoder is touched.
pub async fn encode_pool(
    encoder: &SharedEmbedder,
    query: &str,
    hypotheses: &[String],
) -> Result<HydeVector> {
    if hypotheses.is_empty() {
        return Err(HydeError::EmptyHypothesisPool.into());
    }

    let mut texts = Vec::with_capacity(hypotheses.len() + 1);
    texts.push(query.to_string());
    texts.extend(hypotheses.iter().cloned());

    let embeddings = {
        let mut encoder = encoder.lock().await;
        let expected = encoder.dim();
        let embeddings = encoder
            .embed(&texts)
            .context("Failed to encode query and hypothesis documents")?;
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(HydeError::DimensionMismatch {
                expected,
                actual: bad.len(),
            }
            .into());
        }
        embeddings
    };

    if embeddings.len() != texts.len() {
        anyhow::bail!(
            "Encoder returned {} embeddings for {} texts",
            embeddings.len(),
            texts.len()
        );
    }

    tracing::debug!(pool_size = embeddings.len(), "Averaging HyDE embedding pool");
    Ok(HydeVector::new(mean_embedding(&embeddings)?))
}
