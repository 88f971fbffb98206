use crate::error::HydeError;
use crate::hyde::HydeVector;
use crate::search::{SearchHit, VectorSearcher};
use anyhow::{anyhow, Context, Result};
use arrow_array::{
    types::Float32Type, Array, FixedSizeListArray, Float32Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    query::{ExecutableQuery, QueryBase},
    Connection,
};
use std::{path::Path, sync::Arc};

#[derive(Debug, Clone, PartialEq)]
pub struct PassageRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassageHit {
    pub id: String,
    pub text: String,
    pub distance: Option<f32>,
}

impl PassageHit {
    /// Negated L2 distance, so larger means closer.
    pub fn score(&self) -> f32 {
        self.distance.map(|d| -d).unwrap_or(f32::NEG_INFINITY)
    }
}

pub struct LanceDbStore {
    db: Connection,
}

impl LanceDbStore {
    pub async fn connect(path: &Path) -> Result<Self> {
        let uri = path
            .to_str()
            .ok_or_else(|| anyhow!("VECTOR_DB_PATH is not valid UTF-8"))?;

        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create VECTOR_DB_PATH: {}", path.display()))?;

        let db = lancedb::connect(uri)
            .execute()
            .await
            .context("Failed to connect to lancedb")?;
        Ok(Self { db })
    }

    pub async fn open_or_create_table(
        &self,
        table_name: &str,
        vector_dim: usize,
    ) -> Result<LanceVectorTable> {
        let existing = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list lancedb table names")?;

        if !existing.iter().any(|n| n == table_name) {
            let schema = Arc::new(build_schema(vector_dim));
            self.db
                .create_empty_table(table_name, schema)
                .execute()
                .await
                .context("Failed to create lancedb table")?;
            tracing::info!(table = table_name, vector_dim, "Created passage table");
        }

        let table = self
            .db
            .open_table(table_name)
            .execute()
            .await
            .context("Failed to open lancedb table")?;

        let stored_dim = stored_vector_dim(&table).await?;
        if stored_dim != vector_dim {
            return Err(anyhow::Error::new(HydeError::DimensionMismatch {
                expected: stored_dim,
                actual: vector_dim,
            })
            .context(format!(
                "Table {table_name} holds {stored_dim}-dim vectors but the embedder produces {vector_dim}; re-run `hyde-retrieval index`"
            )));
        }

        Ok(LanceVectorTable { table, vector_dim })
    }

    /// Drops `table_name` if present and creates it empty with `vector_dim`.
    pub async fn recreate_table(
        &self,
        table_name: &str,
        vector_dim: usize,
    ) -> Result<LanceVectorTable> {
        let existing = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list lancedb table names")?;
        if existing.iter().any(|n| n == table_name) {
            self.db
                .drop_table(table_name, &[])
                .await
                .context("Failed to drop lancedb table")?;
        }
        self.open_or_create_table(table_name, vector_dim).await
    }
}

async fn stored_vector_dim(table: &lancedb::Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .context("Failed to read lancedb table schema")?;
    let field = schema
        .field_with_name("vector")
        .context("lancedb table has no vector column")?;
    match field.data_type() {
        DataType::FixedSizeList(_, size) => Ok(*size as usize),
        other => Err(anyhow!("vector column has unexpected type {other:?}")),
    }
}

pub struct LanceVectorTable {
    table: lancedb::Table,
    vector_dim: usize,
}

impl LanceVectorTable {
    pub fn vector_dim(&self) -> usize {
        self.vector_dim
    }

    pub async fn version(&self) -> Result<u64> {
        self.table
            .version()
            .await
            .context("Failed to read lancedb table version")
    }

    /// Makes `version` the latest table state again, discarding later writes.
    pub async fn rollback_to(&self, version: u64) -> Result<()> {
        self.table
            .checkout(version)
            .await
            .with_context(|| format!("Failed to check out lancedb version {version}"))?;
        self.table
            .restore()
            .await
            .with_context(|| format!("Failed to restore lancedb version {version}"))
    }

    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .context("Failed to count lancedb rows")
    }

    /// Removes every passage, keeping the table and its schema.
    pub async fn clear(&self) -> Result<()> {
        self.table
            .delete("true")
            .await
            .context("Failed to clear lancedb table")?;
        Ok(())
    }

    pub async fn add_records(&self, records: &[PassageRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        for record in records {
            if record.vector.len() != self.vector_dim {
                return Err(anyhow::Error::new(HydeError::DimensionMismatch {
                    expected: self.vector_dim,
                    actual: record.vector.len(),
                })
                .context(format!("Passage {} has the wrong embedding size", record.id)));
            }
        }

        let schema = Arc::new(build_schema(self.vector_dim));
        let batch = build_record_batch(schema.clone(), records, self.vector_dim)?;
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema.clone());

        self.table
            .add(Box::new(batches))
            .execute()
            .await
            .context("Failed to add records to lancedb table")?;

        Ok(())
    }

    pub async fn nearest(&self, query_vector: &[f32], limit: usize) -> Result<Vec<PassageHit>> {
        if query_vector.len() != self.vector_dim {
            return Err(HydeError::DimensionMismatch {
                expected: self.vector_dim,
                actual: query_vector.len(),
            }
            .into());
        }

        let stream = self
            .table
            .query()
            .nearest_to(query_vector)
            .context("Failed to create lancedb nearest_to query")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute lancedb query")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut out = Vec::new();
        for batch in batches {
            let id = string_column(&batch, "id")?;
            let text = string_column(&batch, "text")?;
            let distance_col = batch
                .column_by_name("_distance")
                .or_else(|| batch.column_by_name("distance"))
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

            for row in 0..batch.num_rows() {
                if id.is_null(row) {
                    continue;
                }
                out.push(PassageHit {
                    id: id.value(row).to_string(),
                    text: if text.is_null(row) {
                        String::new()
                    } else {
                        text.value(row).to_string()
                    },
                    distance: distance_col.and_then(|d| {
                        if d.is_null(row) {
                            None
                        } else {
                            Some(d.value(row))
                        }
                    }),
                });
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl VectorSearcher for LanceVectorTable {
    async fn search(&self, vector: &HydeVector, k: usize) -> Result<Vec<SearchHit>> {
        let hits = self.nearest(vector.as_slice(), k).await?;
        Ok(hits
            .into_iter()
            .take(k)
            .map(|h| SearchHit {
                score: h.score(),
                doc_id: h.id,
            })
            .collect())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("Missing {name} column in lancedb result"))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("{name} column is not StringArray"))
}

fn build_schema(vector_dim: usize) -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, true),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                vector_dim as i32,
            ),
            true,
        ),
        Field::new("text", DataType::Utf8, true),
    ])
}

fn build_record_batch(
    schema: Arc<Schema>,
    records: &[PassageRecord],
    vector_dim: usize,
) -> Result<RecordBatch> {
    let ids = StringArray::from(records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>());
    let texts = StringArray::from(records.iter().map(|r| r.text.as_str()).collect::<Vec<_>>());
    let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        records
            .iter()
            .map(|r| Some(r.vector.iter().copied().map(Some))),
        vector_dim as i32,
    );

    RecordBatch::try_new(
        schema,
        vec![Arc::new(ids), Arc::new(vectors), Arc::new(texts)],
    )
    .context("Failed to build arrow record batch")
}
