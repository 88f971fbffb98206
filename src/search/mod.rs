//! Vector search capability
//!
//! The HyDE core hands a `HydeVector` to a `VectorSearcher` and returns its
//! ranking untouched.

pub mod flat;
pub mod lance;

pub use flat::FlatIndex;
pub use lance::{LanceDbStore, LanceVectorTable, PassageRecord};

use crate::hyde::HydeVector;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// One retrieved passage. Larger scores rank higher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorSearcher: Send + Sync {
    /// Top `k` nearest passages for `vector`, best first. At most `k` hits.
    async fn search(&self, vector: &HydeVector, k: usize) -> Result<Vec<SearchHit>>;
}

pub type SharedSearcher = Arc<dyn VectorSearcher>;
