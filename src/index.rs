//! Corpus indexing into the LanceDB passage table

use crate::corpus::Passage;
use crate::embeddings::SharedEmbedder;
use crate::search::{LanceVectorTable, PassageRecord};
use anyhow::{Context, Result};
use std::time::Instant;

/// Replaces the table contents with `passages`, embedded `batch_size` at a
/// time. Returns the number of rows written.
///
/// On failure the table is rolled back to the version it had on entry, so a
/// broken reindex never leaves a partial corpus behind.
pub async fn index_passages(
    passages: &[Passage],
    embedder: &SharedEmbedder,
    table: &LanceVectorTable,
    batch_size: usize,
) -> Result<usize> {
    let start = Instant::now();
    let version = table.version().await?;

    let written = match replace_rows(passages, embedder, table, batch_size).await {
        Ok(written) => written,
        Err(err) => {
            tracing::warn!(version, error = %format!("{err:#}"), "Indexing failed, rolling back");
            if let Err(rollback) = table.rollback_to(version).await {
                tracing::error!(version, error = %format!("{rollback:#}"), "Rollback failed");
            }
            return Err(err);
        }
    };

    tracing::info!(
        passages = written,
        duration_ms = start.elapsed().as_millis() as u64,
        "Indexed corpus"
    );
    Ok(written)
}

async fn replace_rows(
    passages: &[Passage],
    embedder: &SharedEmbedder,
    table: &LanceVectorTable,
    batch_size: usize,
) -> Result<usize> {
    table.clear().await?;

    let batch_size = batch_size.max(1);
    let mut written = 0;
    for (batch_no, chunk) in passages.chunks(batch_size).enumerate() {
        let texts = chunk.iter().map(|p| p.text.clone()).collect::<Vec<_>>();
        let vectors = {
            let mut embedder = embedder.lock().await;
            embedder
                .embed(&texts)
                .with_context(|| format!("Failed to embed corpus batch {batch_no}"))?
        };

        let records = chunk
            .iter()
            .zip(vectors)
            .map(|(passage, vector)| PassageRecord {
                id: passage.id.clone(),
                vector,
                text: passage.text.clone(),
            })
            .collect::<Vec<_>>();
        table.add_records(&records).await?;
        written += records.len();

        if batch_no % 100 == 0 {
            tracing::debug!(written, total = passages.len(), "Indexing progress");
        }
    }
    Ok(written)
}
