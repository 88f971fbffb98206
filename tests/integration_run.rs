mod support;

use hyde_retrieval::{
    corpus::{judged_topics, load_passages, load_qrels, load_topics},
    embeddings::SharedEmbedder,
    experiment::{Experiment, RunSettings},
    generator::LlmGenerator,
    hyde::{MultiPromptHyde, Promptor, QueryImprover, SinglePromptHyde, TaskStyle},
    index::index_passages,
    search::{FlatIndex, LanceDbStore},
};
use rstest::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use support::{fixtures::*, helpers::*};
use tempfile::TempDir;

fn settings(dir: &Path, top_k: usize) -> RunSettings {
    RunSettings {
        run_dir: dir.join("runs"),
        topics_name: "toy".to_string(),
        model: "mock".to_string(),
        top_k,
    }
}

#[rstest]
#[tokio::test]
async fn flat_index_run_writes_trec_file_for_judged_topics(
    tmp_dir: TempDir,
    mock_llm: Arc<LlmGenerator>,
    hash_encoder: SharedEmbedder,
) {
    let (corpus, topics, qrels) = write_collection(tmp_dir.path());
    let passages = load_passages(&corpus).unwrap();
    let qrels = load_qrels(&qrels).unwrap();
    let topics = judged_topics(load_topics(&topics).unwrap(), &qrels);
    assert_eq!(topics.len(), 2);

    let index = FlatIndex::build(&passages, &hash_encoder, 2).await.unwrap();
    let hyde = SinglePromptHyde::new(
        Promptor::new(TaskStyle::WebSearch),
        mock_llm,
        hash_encoder,
        Arc::new(index),
    );
    let settings = settings(tmp_dir.path(), 3);

    let summary = Experiment::new(&hyde, &settings).run(&topics).await.unwrap();

    assert_eq!(summary.failed, 0);
    assert!(summary
        .paths
        .trec
        .ends_with("single_prompt-hyde-toy-mock-top3-8rep-trec"));

    let rows = read_run(&summary.paths.trec);
    assert_eq!(rows.len(), 6);
    let qids = rows.iter().map(|r| r.0.as_str()).collect::<HashSet<_>>();
    assert_eq!(qids, HashSet::from(["q1", "q2"]));
    for qid in ["q1", "q2"] {
        let per_query = rows.iter().filter(|r| r.0 == qid).collect::<Vec<_>>();
        let ranks = per_query.iter().map(|r| r.2).collect::<Vec<_>>();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(per_query.windows(2).all(|w| w[0].3 >= w[1].3));
    }

    let log = std::fs::read_to_string(&summary.paths.hypotheses).unwrap();
    let first: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(first["query_id"], "q1");
    assert_eq!(first["hypothesis_documents"].as_array().unwrap().len(), 8);
}

#[rstest]
#[tokio::test]
async fn lancedb_run_uses_indexed_passages(
    tmp_dir: TempDir,
    mock_llm: Arc<LlmGenerator>,
    hash_encoder: SharedEmbedder,
) {
    let (corpus, topics, qrels) = write_collection(tmp_dir.path());
    let passages = load_passages(&corpus).unwrap();
    let topics = judged_topics(
        load_topics(&topics).unwrap(),
        &load_qrels(&qrels).unwrap(),
    );

    let store = LanceDbStore::connect(&tmp_dir.path().join("vectors"))
        .await
        .unwrap();
    let table = store.open_or_create_table("passages", 32).await.unwrap();
    assert_eq!(
        index_passages(&passages, &hash_encoder, &table, 3).await.unwrap(),
        4
    );

    let hyde = MultiPromptHyde::with_default_perspectives(mock_llm, hash_encoder, Arc::new(table));
    let settings = settings(tmp_dir.path(), 10);
    let summary = Experiment::new(&hyde, &settings).run(&topics).await.unwrap();

    let rows = read_run(&summary.paths.trec);
    // Only four passages exist, so k=10 yields four hits per query.
    assert_eq!(rows.len(), 8);
    let docs = rows
        .iter()
        .filter(|r| r.0 == "q2")
        .map(|r| r.1.as_str())
        .collect::<HashSet<_>>();
    assert_eq!(docs, HashSet::from(["p1", "p2", "p3", "p4"]));

    let prom = std::fs::read_to_string(&summary.paths.metrics).unwrap();
    assert!(prom.contains("hyde_queries_total 2"));
    assert!(prom.contains("hyde_hypotheses_total 16"));
}

#[rstest]
#[tokio::test]
async fn improver_rewrites_before_generation(
    tmp_dir: TempDir,
    recording_generator: Arc<RecordingGenerator>,
    length_encoder: SharedEmbedder,
    recording_searcher: Arc<RecordingSearcher>,
) {
    let hyde = SinglePromptHyde::new(
        Promptor::new(TaskStyle::WebSearch),
        recording_generator.clone(),
        length_encoder,
        recording_searcher,
    );
    let improver = QueryImprover::new(recording_generator.clone());
    let settings = settings(tmp_dir.path(), 2);
    let topics = judged_topics(
        load_topics(&write_file(tmp_dir.path(), "topics.tsv", TOPICS)).unwrap(),
        &load_qrels(&write_file(tmp_dir.path(), "qrels.txt", QRELS)).unwrap(),
    );

    Experiment::new(&hyde, &settings)
        .with_improver(&improver)
        .run(&topics[..1])
        .await
        .unwrap();

    let calls = recording_generator.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, QueryImprover::prompt("how long does wisdom tooth extraction take"));
    assert_eq!(calls[0].1, 1);
    assert_eq!(calls[1].0, Promptor::new(TaskStyle::WebSearch).build_prompt("call0-doc0"));
}
