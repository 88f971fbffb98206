//! Exact inner-product search over vectors held in memory.

use crate::corpus::Passage;
use crate::embeddings::SharedEmbedder;
use crate::error::HydeError;
use crate::hyde::HydeVector;
use crate::search::{SearchHit, VectorSearcher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::cmp::Ordering;

pub struct FlatIndex {
    dim: usize,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn add(&mut self, id: impl Into<String>, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dim {
            return Err(HydeError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            }
            .into());
        }
        self.ids.push(id.into());
        self.vectors.push(vector);
        Ok(())
    }

    /// Embeds `(id, text)` passages in batches of `batch_size` and indexes them.
    pub async fn build(
        passages: &[Passage],
        embedder: &SharedEmbedder,
        batch_size: usize,
    ) -> Result<Self> {
        let mut embedder = embedder.lock().await;
        let mut index = Self::new(embedder.dim());
        for chunk in passages.chunks(batch_size.max(1)) {
            let texts = chunk.iter().map(|p| p.text.clone()).collect::<Vec<_>>();
            let vectors = embedder
                .embed(&texts)
                .context("Failed to embed corpus batch")?;
            for (passage, vector) in chunk.iter().zip(vectors) {
                index.add(passage.id.clone(), vector)?;
            }
        }
        tracing::info!(passages = index.len(), dim = index.dim, "Built in-memory flat index");
        Ok(index)
    }

    fn top_k(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(query, v)))
            .collect::<Vec<_>>();
        // Stable sort keeps insertion order among equal scores; NaN sorts last.
        scored.sort_by(|a, b| by_score_desc(a.1, b.1));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| SearchHit {
                doc_id: self.ids[i].clone(),
                score,
            })
            .collect()
    }
}

#[async_trait]
impl VectorSearcher for FlatIndex {
    async fn search(&self, vector: &HydeVector, k: usize) -> Result<Vec<SearchHit>> {
        if vector.dim() != self.dim {
            return Err(HydeError::DimensionMismatch {
                expected: self.dim,
                actual: vector.dim(),
            }
            .into());
        }
        Ok(self.top_k(vector.as_slice(), k))
    }
}

/// Total order: larger first, NaN after every real score.
fn by_score_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.total_cmp(&a),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{hash::HashEmbedder, shared};
    use crate::error::find_hyde_error;

    fn axis_index() -> FlatIndex {
        let mut index = FlatIndex::new(3);
        index.add("x", vec![1.0, 0.0, 0.0]).unwrap();
        index.add("y", vec![0.0, 1.0, 0.0]).unwrap();
        index.add("z", vec![0.0, 0.0, 1.0]).unwrap();
        index.add("xy", vec![0.7, 0.7, 0.0]).unwrap();
        index
    }

    #[tokio::test]
    async fn ranks_by_inner_product() {
        let index = axis_index();
        let hits = index
            .search(&HydeVector::new(vec![0.9, 0.1, 0.0]), 2)
            .await
            .unwrap();
        let ids = hits.iter().map(|h| h.doc_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["x", "xy"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn returns_at_most_k_hits() {
        let index = axis_index();
        let hits = index
            .search(&HydeVector::new(vec![1.0, 1.0, 1.0]), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let mut index = FlatIndex::new(2);
        index.add("first", vec![1.0, 0.0]).unwrap();
        index.add("second", vec![1.0, 0.0]).unwrap();
        let hits = index.search(&HydeVector::new(vec![1.0, 0.0]), 2).await.unwrap();
        assert_eq!(hits[0].doc_id, "first");
        assert_eq!(hits[1].doc_id, "second");
    }

    #[tokio::test]
    async fn nan_scores_rank_after_real_ones() {
        let mut index = FlatIndex::new(2);
        index.add("nan", vec![f32::NAN, 0.0]).unwrap();
        index.add("a", vec![1.0, 0.0]).unwrap();
        index.add("b", vec![0.5, 0.0]).unwrap();
        let hits = index.search(&HydeVector::new(vec![1.0, 0.0]), 3).await.unwrap();
        let ids = hits.iter().map(|h| h.doc_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b", "nan"]);
    }

    #[tokio::test]
    async fn wrong_query_dimension_is_rejected() {
        let index = axis_index();
        let err = index
            .search(&HydeVector::new(vec![1.0, 0.0]), 1)
            .await
            .unwrap_err();
        assert_eq!(
            find_hyde_error(&err),
            Some(&HydeError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn add_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(3);
        assert!(index.add("bad", vec![1.0]).is_err());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn build_embeds_every_passage() {
        let embedder = shared(Box::new(HashEmbedder::new(16)));
        let passages = [
            ("d1", "wisdom teeth extraction recovery"),
            ("d2", "dense passage retrieval"),
            ("d3", "hypothetical document embeddings"),
        ]
        .map(|(id, text)| Passage {
            id: id.to_string(),
            text: text.to_string(),
        });
        let index = FlatIndex::build(&passages, &embedder, 2).await.unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dim(), 16);
    }
}
