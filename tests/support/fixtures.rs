//! rstest fixtures for integration tests
//!
//! Stub collaborators with observable behaviour:
//! * `RecordingGenerator` logs every `(prompt, n)` request.
//! * `LengthEmbedder` maps a text to `[len(text)]`.
//! * `RecordingSearcher` logs the vectors it receives and answers with a
//!   fixed ranking.
//!
//! # Usage
//!
//! ```rust
//! use crate::support::fixtures::*;
//!
//! #[rstest]
//! #[tokio::test]
//! async fn my_test(recording_generator: Arc<RecordingGenerator>) {
//!     // ...
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use hyde_retrieval::{
    embeddings::{hash::HashEmbedder, shared, Embedder, SharedEmbedder},
    generator::{DocumentGenerator, GenerationParams, GeneratorBackend, LlmGenerator, RetryPolicy},
    hyde::HydeVector,
    search::{SearchHit, VectorSearcher},
};
use rstest::*;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Fresh temporary directory, removed when the fixture is dropped.
#[fixture]
pub fn tmp_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

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

#[fixture]
pub fn recording_generator() -> Arc<RecordingGenerator> {
    Arc::new(RecordingGenerator::default())
}

pub struct LengthEmbedder;

impl Embedder for LengthEmbedder {
    fn dim(&self) -> usize {
        1
    }

    fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vec![t.chars().count() as f32]).collect())
    }
}

#[fixture]
pub fn length_encoder() -> SharedEmbedder {
    shared(Box::new(LengthEmbedder))
}

#[fixture]
pub fn hash_encoder() -> SharedEmbedder {
    shared(Box::new(HashEmbedder::new(32)))
}

pub struct RecordingSearcher {
    hits: Vec<SearchHit>,
    received: Mutex<Vec<(Vec<f32>, usize)>>,
}

impl RecordingSearcher {
    pub fn with_hits(hits: &[(&str, f32)]) -> Self {
        Self {
            hits: hits
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

#[fixture]
pub fn recording_searcher() -> Arc<RecordingSearcher> {
    Arc::new(RecordingSearcher::with_hits(&[
        ("7067032", 0.91),
        ("7067034", 0.88),
        ("8182161", 0.42),
    ]))
}

/// Offline LLM generator; deterministic and query dependent.
#[fixture]
pub fn mock_llm() -> Arc<LlmGenerator> {
    Arc::new(LlmGenerator::new(
        GeneratorBackend::Mock,
        None,
        None,
        GenerationParams::default(),
        RetryPolicy::fail_fast(),
    ))
}
