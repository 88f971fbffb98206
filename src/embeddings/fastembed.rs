use crate::config::EmbeddingsDevice;
use crate::embeddings::Embedder;
use anyhow::{anyhow, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;

#[cfg(target_os = "macos")]
use ort::execution_providers::CoreMLExecutionProvider;

pub const DEFAULT_MODEL: &str = "BAAI/bge-base-en-v1.5";

const SUPPORTED_MODELS: &[(&str, EmbeddingModel, usize)] = &[
    ("BAAI/bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15, 768),
    ("BAAI/bge-small-en-v1.5", EmbeddingModel::BGESmallENV15, 384),
    ("BAAI/bge-large-en-v1.5", EmbeddingModel::BGELargeENV15, 1024),
    (
        "sentence-transformers/all-MiniLM-L6-v2",
        EmbeddingModel::AllMiniLML6V2,
        384,
    ),
    (
        "nomic-ai/nomic-embed-text-v1.5",
        EmbeddingModel::NomicEmbedTextV15,
        768,
    ),
];

/// Dense passage/query encoder backed by a local ONNX model.
pub struct FastEmbedder {
    model: TextEmbedding,
    dim: usize,
}

impl FastEmbedder {
    pub fn new(model_name: &str, cache_dir: Option<&Path>, device: EmbeddingsDevice) -> Result<Self> {
        let (model_enum, dim) = SUPPORTED_MODELS
            .iter()
            .find(|(name, _, _)| *name == model_name)
            .map(|(_, model, dim)| (model.clone(), *dim))
            .ok_or_else(|| {
                let supported = SUPPORTED_MODELS
                    .iter()
                    .map(|(name, _, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ");
                anyhow!("Unsupported model for FastEmbed: {model_name}. Supported: {supported}")
            })?;

        let mut options = InitOptions::new(model_enum);

        if let Some(path) = cache_dir {
            options = options.with_cache_dir(path.to_path_buf());
        }

        match device {
            EmbeddingsDevice::Metal => {
                #[cfg(target_os = "macos")]
                {
                    tracing::info!("Initializing FastEmbed with Metal (CoreML) acceleration");
                    let coreml = CoreMLExecutionProvider::default();
                    options = options.with_execution_providers(vec![coreml.into()]);
                }
                #[cfg(not(target_os = "macos"))]
                {
                    tracing::warn!("Metal device requested but not on macOS - falling back to CPU");
                }
            }
            EmbeddingsDevice::Cpu => {
                tracing::debug!("Initializing FastEmbed with CPU execution provider");
            }
        }

        let model = TextEmbedding::try_new(options)
            .map_err(|e| anyhow!("Failed to initialize FastEmbed: {}", e))?;

        tracing::info!(model = model_name, dim, "FastEmbed model loaded");

        Ok(Self { model, dim })
    }
}

impl Embedder for FastEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| anyhow!("Embedding failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_model_lists_alternatives() {
        let err = match FastEmbedder::new("facebook/contriever", None, EmbeddingsDevice::Cpu) {
            Ok(_) => panic!("contriever is not a fastembed model"),
            Err(err) => err.to_string(),
        };
        assert!(err.contains("facebook/contriever"));
        assert!(err.contains(DEFAULT_MODEL));
    }
}
