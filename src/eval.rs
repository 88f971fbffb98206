//! Run-file evaluation
//!
//! Retrieval never calls this; the driver hands a finished run file to a
//! `MetricEvaluator` and stores the scores as a two-column report.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait MetricEvaluator: Send + Sync {
    /// `(metric, value)` pairs in the requested metric order.
    async fn evaluate(&self, run_file: &Path) -> Result<Vec<(String, f64)>>;
}

/// Shells out to `trec_eval` once per metric.
pub struct TrecEval {
    program: String,
    args: Vec<String>,
    qrels: PathBuf,
    metrics: Vec<String>,
}

impl TrecEval {
    /// `command` may carry leading arguments, e.g.
    /// `python -m pyserini.eval.trec_eval`.
    pub fn new(command: &str, qrels: &Path, metrics: Vec<String>) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("TREC_EVAL_COMMAND is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            qrels: qrels.to_path_buf(),
            metrics,
        })
    }

    async fn run_metric(&self, metric: &str, run_file: &Path) -> Result<String> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .args(["-c", "-l", "2", "-m", metric])
            .arg(&self.qrels)
            .arg(run_file)
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.program))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} exited with {} for metric {metric}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MetricEvaluator for TrecEval {
    async fn evaluate(&self, run_file: &Path) -> Result<Vec<(String, f64)>> {
        let mut results = Vec::with_capacity(self.metrics.len());
        for metric in &self.metrics {
            let stdout = self.run_metric(metric, run_file).await?;
            match parse_metric(&stdout, metric)? {
                Some(value) => {
                    tracing::info!(metric = %metric, value, "Evaluated");
                    results.push((metric.clone(), value));
                }
                None => tracing::warn!(metric = %metric, "Could not parse trec_eval output, skipping metric"),
            }
        }
        Ok(results)
    }
}

/// Finds `<metric>  all  <value>` in trec_eval output.
///
/// trec_eval prints `ndcg_cut.10` as `ndcg_cut_10`, so a `.` in the requested
/// name matches either separator.
pub fn parse_metric(output: &str, metric: &str) -> Result<Option<f64>> {
    let name = metric
        .split('.')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[._]");
    let re = Regex::new(&format!(r"(?m)^{name}\s+all\s+([0-9.]+)"))
        .context("Failed to build metric pattern")?;
    Ok(re
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok()))
}

/// `Metric,Value` header followed by one row per metric.
pub fn write_metric_report(path: &Path, results: &[(String, f64)]) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create metric report: {}", path.display()))?;
    writeln!(file, "Metric,Value")?;
    for (metric, value) in results {
        writeln!(file, "{metric},{value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("map                   \tall\t0.4186\n", "map", Some(0.4186) ; "map")]
    #[test_case("recall_1000           \tall\t0.8245\n", "recall.1000", Some(0.8245) ; "underscore spelling")]
    #[test_case("ndcg_cut.10 all 0.5\n", "ndcg_cut.10", Some(0.5) ; "dotted spelling")]
    #[test_case("runid all hyde\n", "map", None ; "absent")]
    #[test_case("gm_map all 0.3\n", "map", None ; "suffix of another metric")]
    fn parses_metric_lines(output: &str, metric: &str, expected: Option<f64>) {
        assert_eq!(parse_metric(output, metric).unwrap(), expected);
    }

    #[test]
    fn other_characters_are_literal() {
        assert_eq!(parse_metric("P_10 all 0.7\n", "P+10").unwrap(), None);
    }

    #[test]
    fn report_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        write_metric_report(
            &path,
            &[("map".to_string(), 0.25), ("ndcg_cut.10".to_string(), 0.5)],
        )
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Metric,Value\nmap,0.25\nndcg_cut.10,0.5\n"
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(TrecEval::new("  ", Path::new("qrels"), vec![]).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_command_once_per_metric() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake_trec_eval.sh");
        // $5 is the metric after `-c -l 2 -m`.
        std::fs::write(&script, "echo \"$5 all 0.375\"\n").unwrap();
        let run = dir.path().join("run");
        std::fs::write(&run, "").unwrap();

        let eval = TrecEval::new(
            &format!("sh {}", script.display()),
            &dir.path().join("qrels"),
            vec!["map".to_string(), "ndcg_cut.10".to_string()],
        )
        .unwrap();
        let results = eval.evaluate(&run).await.unwrap();
        assert_eq!(
            results,
            vec![("map".to_string(), 0.375), ("ndcg_cut.10".to_string(), 0.375)]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unparseable_metric_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let eval = TrecEval::new("echo", &dir.path().join("qrels"), vec!["map".to_string()]).unwrap();
        let results = eval.evaluate(&dir.path().join("run")).await.unwrap();
        assert!(results.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let eval = TrecEval::new("false", &dir.path().join("qrels"), vec!["map".to_string()]).unwrap();
        assert!(eval.evaluate(&dir.path().join("run")).await.is_err());
    }
}
