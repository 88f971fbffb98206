//! Stub collaborators for unit tests.

use crate::embeddings::Embedder;
use crate::generator::DocumentGenerator;
use crate::hyde::HydeVector;
use crate::search::{SearchHit, VectorSearcher};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every `(prompt, n)` request and answers with `"call<call>-doc<i>"`.
#[derive(Default)]
pub struct RecordingGenerator {
    calls: Mutex<Vec<(String, usize)>>,
}

impl RecordingGenerator {
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentGenerator for RecordingGenerator {
    async fn generate(&self, prompt: &str, n: usize) -> Result<Vec<String>> {
        let mut calls = self.calls.lock().unwrap();
        let call = calls.len();
        calls.push((prompt.to_string(), n));
        Ok((0..n).map(|i| format!("call{call}-doc{i}")).collect())
    }
}

/// Always fails.
pub struct FailingGenerator;

#[async_trait]
impl DocumentGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _n: usize) -> Result<Vec<String>> {
        anyhow::bail!("model server unavailable")
    }
}

/// Text to a one-element vector holding its character count.
pub struct LengthEmbedder;

impl Embedder for LengthEmbedder {
    fn dim(&self) -> usize {
        1
    }

    fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vec![t.chars().count() as f32]).collect())
    }
}

/// Records the vectors it receives and answers with a fixed ranking.
pub struct RecordingSearcher {
    hits: Vec<SearchHit>,
    received: Mutex<Vec<(Vec<f32>, usize)>>,
}

impl RecordingSearcher {
    pub fn with_hits(ids: &[(&str, f32)]) -> Self {
        Self {
            hits: ids
                .iter()
                .map(|(id, score)| SearchHit {
                    doc_id: id.to_string(),
                    score: *score,
                })
                .collect(),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn received(&self) -> Vec<(Vec<f32>, usize)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorSearcher for RecordingSearcher {
    async fn search(&self, vector: &HydeVector, k: usize) -> Result<Vec<SearchHit>> {
        self.received
            .lock()
            .unwrap()
            .push((vector.as_slice().to_vec(), k));
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}
