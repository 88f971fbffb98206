//! Embedding encoders
//!
//! Every text the HyDE core embeds (the query and each hypothesis document)
//! goes through one `Embedder` instance, so all vectors share its dimension.

pub mod fastembed;
pub mod hash;

use crate::config::{EmbeddingsBackend, EmbeddingsDevice};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub trait Embedder {
    fn dim(&self) -> usize;
    fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embedder shared between the query constructors and the indexer.
pub type SharedEmbedder = Arc<Mutex<Box<dyn Embedder + Send>>>;

pub fn shared(embedder: Box<dyn Embedder + Send>) -> SharedEmbedder {
    Arc::new(Mutex::new(embedder))
}

/// Factory function to create an embedder based on the backend configuration.
///
/// # Arguments
/// * `backend` - The embeddings backend to use
/// * `model_dir` - Optional fastembed cache directory
/// * `model_repo` - Model repository name (e.g., "BAAI/bge-base-en-v1.5")
/// * `device` - Device to use for inference (CPU/Metal)
/// * `hash_dim` - Dimension for hash embedder (only used if backend is Hash)
///
/// # Errors
/// Returns error if the fastembed model is unsupported or fails to load.
pub fn create_embedder(
    backend: EmbeddingsBackend,
    model_dir: Option<&Path>,
    model_repo: Option<&str>,
    device: EmbeddingsDevice,
    hash_dim: usize,
) -> Result<Box<dyn Embedder + Send>> {
    match backend {
        EmbeddingsBackend::FastEmbed => {
            let model_repo = model_repo.unwrap_or(fastembed::DEFAULT_MODEL);
            Ok(Box::new(fastembed::FastEmbedder::new(
                model_repo, model_dir, device,
            )?))
        }
        EmbeddingsBackend::Hash => Ok(Box::new(hash::HashEmbedder::new(hash_dim))),
    }
}
