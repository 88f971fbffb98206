//! Batch retrieval driver
//!
//! Runs one `QueryVectorConstructor` over a topic set, writing the run file,
//! the hypothesis log, the metric report and a Prometheus snapshot.

use crate::corpus::Topic;
use crate::error::{find_hyde_error, HydeError};
use crate::eval::{write_metric_report, MetricEvaluator};
use crate::hyde::{QueryImprover, QueryVectorConstructor};
use crate::metrics::MetricsRegistry;
use crate::runfile::{HypothesisLog, RunFileWriter, RunPaths};
use crate::search::SearchHit;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub run_dir: PathBuf,
    pub topics_name: String,
    pub model: String,
    pub top_k: usize,
}

#[derive(Debug)]
pub struct RunSummary {
    pub label: &'static str,
    pub paths: RunPaths,
    pub queries: usize,
    pub failed: usize,
    pub metrics: Vec<(String, f64)>,
}

pub struct Experiment<'a> {
    constructor: &'a dyn QueryVectorConstructor,
    settings: &'a RunSettings,
    improver: Option<&'a QueryImprover>,
    evaluator: Option<&'a dyn MetricEvaluator>,
}

impl<'a> Experiment<'a> {
    pub fn new(constructor: &'a dyn QueryVectorConstructor, settings: &'a RunSettings) -> Self {
        Self {
            constructor,
            settings,
            improver: None,
            evaluator: None,
        }
    }

    pub fn with_improver(mut self, improver: &'a QueryImprover) -> Self {
        self.improver = Some(improver);
        self
    }

    pub fn with_evaluator(mut self, evaluator: &'a dyn MetricEvaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Retrieves every topic in order.
    ///
    /// A query whose generation or search fails is logged, counted and left
    /// out of the run file. Embedding invariant violations abort the run.
    pub async fn run(&self, topics: &[Topic]) -> Result<RunSummary> {
        let label = self.constructor.label();
        let settings = self.settings;
        std::fs::create_dir_all(&settings.run_dir).with_context(|| {
            format!("Failed to create HYDE_RUN_DIR: {}", settings.run_dir.display())
        })?;

        let paths = RunPaths::new(
            &settings.run_dir,
            label,
            &settings.topics_name,
            &settings.model,
            settings.top_k,
            self.constructor.hypothesis_count(),
        );
        let metrics = MetricsRegistry::new().context("Failed to create metrics registry")?;
        let mut run_file = RunFileWriter::create(&paths.trec)?;
        let mut hypothesis_log = HypothesisLog::create(&paths.hypotheses)?;

        tracing::info!(variant = label, topics = topics.len(), run_file = %paths.trec.display(), "Starting run");

        let mut failed = 0;
        for topic in topics {
            metrics.queries_total.inc();
            match self.retrieve(topic, &metrics).await {
                Ok((hypotheses, hits)) => {
                    run_file.write_hits(&topic.qid, &hits)?;
                    hypothesis_log.append(&topic.qid, &topic.query, &hypotheses)?;
                    metrics.search_hits_total.inc_by(hits.len() as f64);
                }
                Err(err) if is_fatal(&err) => {
                    return Err(err.context(format!("Query {} aborted the run", topic.qid)));
                }
                Err(err) => {
                    failed += 1;
                    metrics.query_errors_total.inc();
                    tracing::error!(qid = %topic.qid, error = %format!("{err:#}"), "Query failed, skipping");
                }
            }
        }
        run_file.finish()?;

        let mut scores = Vec::new();
        if let Some(evaluator) = self.evaluator {
            scores = evaluator
                .evaluate(&paths.trec)
                .await
                .with_context(|| format!("Failed to evaluate {}", paths.trec.display()))?;
            write_metric_report(&paths.report, &scores)?;
        }

        let rendered = metrics.render().context("Failed to render metrics")?;
        std::fs::write(&paths.metrics, rendered)
            .with_context(|| format!("Failed to write {}", paths.metrics.display()))?;

        tracing::info!(
            variant = label,
            queries = topics.len(),
            failed,
            "Run finished"
        );

        Ok(RunSummary {
            label,
            paths,
            queries: topics.len(),
            failed,
            metrics: scores,
        })
    }

    /// prompt → generate → encode → search, strictly in that order.
    async fn retrieve(
        &self,
        topic: &Topic,
        metrics: &MetricsRegistry,
    ) -> Result<(Vec<String>, Vec<SearchHit>)> {
        let generation_query = match self.improver {
            Some(improver) => improver.improve(&topic.query).await?,
            None => topic.query.clone(),
        };

        let timer = metrics.generation_duration.start_timer();
        let hypotheses = self
            .constructor
            .generate_hypotheses(&generation_query)
            .await?;
        timer.observe_duration();
        metrics.hypotheses_total.inc_by(hypotheses.len() as f64);

        let vector = self
            .constructor
            .compute_vector(&topic.query, &hypotheses)
            .await?;

        let timer = metrics.search_duration.start_timer();
        let hits = self
            .constructor
            .search(&vector, self.settings.top_k)
            .await?;
        timer.observe_duration();

        tracing::debug!(qid = %topic.qid, hypotheses = hypotheses.len(), hits = hits.len(), "Retrieved");
        Ok((hypotheses, hits))
    }
}

fn is_fatal(err: &anyhow::Error) -> bool {
    matches!(
        find_hyde_error(err),
        Some(HydeError::DimensionMismatch { .. } | HydeError::EmptyHypothesisPool)
    )
}
