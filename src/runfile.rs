//! TREC run files and the hypothesis log

use crate::search::SearchHit;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output file names for one variant of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub trec: PathBuf,
    pub hypotheses: PathBuf,
    pub report: PathBuf,
    pub metrics: PathBuf,
}

impl RunPaths {
    /// `<label>-hyde-<topics>-<model>-top<k>-<n>rep-{trec,hyd.jsonl,output.csv,metrics.prom}`
    pub fn new(
        run_dir: &Path,
        label: &str,
        topics_name: &str,
        model: &str,
        top_k: usize,
        reps: usize,
    ) -> Self {
        let stem = format!("{label}-hyde-{topics_name}-{model}-top{top_k}-{reps}rep");
        Self {
            trec: run_dir.join(format!("{stem}-trec")),
            hypotheses: run_dir.join(format!("{stem}-hyd.jsonl")),
            report: run_dir.join(format!("{stem}-output.csv")),
            metrics: run_dir.join(format!("{stem}-metrics.prom")),
        }
    }
}

/// Writes `<qid> Q0 <doc_id> <rank> <score> rank` lines.
pub struct RunFileWriter {
    out: BufWriter<File>,
    path: PathBuf,
}

impl RunFileWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create run file: {}", path.display()))?;
        Ok(Self {
            out: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ranks are 1-based and follow the order of `hits`.
    pub fn write_hits(&mut self, qid: &str, hits: &[SearchHit]) -> Result<()> {
        for (rank, hit) in hits.iter().enumerate() {
            writeln!(
                self.out,
                "{} Q0 {} {} {} rank",
                qid,
                hit.doc_id,
                rank + 1,
                hit.score
            )?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.out
            .flush()
            .with_context(|| format!("Failed to flush run file: {}", self.path.display()))
    }
}

#[derive(Debug, Serialize)]
struct HypothesisRecord<'a> {
    query_id: &'a str,
    query: &'a str,
    hypothesis_documents: &'a [String],
}

/// One JSON object per query with the documents its vector was built from.
///
/// Each record is flushed as it is written so a crashed run keeps the
/// queries it finished.
pub struct HypothesisLog {
    out: BufWriter<File>,
}

impl HypothesisLog {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create hypothesis log: {}", path.display()))?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, query_id: &str, query: &str, hypotheses: &[String]) -> Result<()> {
        let record = HypothesisRecord {
            query_id,
            query,
            hypothesis_documents: hypotheses,
        };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
