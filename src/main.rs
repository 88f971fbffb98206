use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hyde_retrieval::cli::{self, Command};
use hyde_retrieval::config::{Config, IndexBackend};
use hyde_retrieval::corpus::{judged_topics, load_passages, load_qrels, load_topics};
use hyde_retrieval::embeddings::{create_embedder, shared, SharedEmbedder};
use hyde_retrieval::error::{find_hyde_error, HydeError};
use hyde_retrieval::eval::TrecEval;
use hyde_retrieval::experiment::{Experiment, RunSettings};
use hyde_retrieval::generator::{LlmGenerator, SharedGenerator};
use hyde_retrieval::hyde::{
    MultiPromptHyde, QueryImprover, QueryVectorConstructor, SinglePromptHyde,
};
use hyde_retrieval::index::index_passages;
use hyde_retrieval::search::{FlatIndex, LanceDbStore, SharedSearcher};

const LOG_FILE: &str = "hyde-retrieval.log";

#[tokio::main]
async fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if cli::wants_help(&args) {
        cli::print_help();
        return Ok(());
    }
    if cli::wants_version(&args) {
        cli::print_version();
        return Ok(());
    }

    let config = Config::from_env();
    let _log_guard = init_tracing(config.as_ref().ok().and_then(|c| c.log_dir.as_deref()))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting hyde-retrieval");

    let result = match config {
        Ok(config) => match cli::parse_command(&args) {
            Ok(command) => run(command, config).await,
            Err(err) => Err(err),
        },
        Err(err) => Err(err.context("Invalid configuration")),
    };

    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "hyde-retrieval exited with error");
    }
    result
}

/// Logs to stderr, and additionally to `<log_dir>/hyde-retrieval.log` when set.
fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create LOG_DIR: {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

async fn run(command: Command, config: Config) -> Result<()> {
    tracing::debug!(
        run_dir = %config.run_dir.display(),
        index_backend = ?config.index_backend,
        vector_db_path = %config.vector_db_path.display(),
        embeddings_backend = ?config.embeddings_backend,
        embeddings_model_repo = %config.embeddings_model_repo,
        embeddings_device = ?config.embeddings_device,
        llm_backend = %config.llm_backend,
        llm_model = %config.llm_model,
        variant = ?config.variant,
        task = %config.task.style(),
        secondary_task = ?config.secondary_task.map(|p| p.style().name()),
        hypothesis_count = config.hypothesis_count,
        top_k = config.top_k,
        retry = ?config.retry_policy(),
        "Loaded config"
    );

    match command {
        Command::Index => index(&config).await,
        Command::Run => run_topics(&config).await,
        Command::Search { query } => search(&config, &query).await,
    }
}

fn build_embedder(config: &Config) -> Result<SharedEmbedder> {
    info!(
        backend = ?config.embeddings_backend,
        model = %config.embeddings_model_repo,
        "Initializing embedder"
    );
    let embedder = create_embedder(
        config.embeddings_backend,
        config.embeddings_model_dir.as_deref(),
        Some(config.embeddings_model_repo.as_str()),
        config.embeddings_device,
        config.hash_embedding_dim,
    )?;
    Ok(shared(embedder))
}

fn build_generator(config: &Config) -> SharedGenerator {
    Arc::new(LlmGenerator::new(
        config.llm_backend,
        config.api_key.clone(),
        config.llm_base_url.clone(),
        config.generation_params(),
        config.retry_policy(),
    ))
}

async fn build_searcher(config: &Config, embedder: &SharedEmbedder) -> Result<SharedSearcher> {
    match config.index_backend {
        IndexBackend::LanceDb => {
            let dim = embedder.lock().await.dim();
            let store = LanceDbStore::connect(&config.vector_db_path).await?;
            let table = store.open_or_create_table(&config.vector_table, dim).await?;
            if table.count().await? == 0 {
                warn!(
                    table = %config.vector_table,
                    "Passage table is empty; run `hyde-retrieval index` first"
                );
            }
            Ok(Arc::new(table))
        }
        IndexBackend::Flat => {
            let passages = load_passages(config.require_corpus()?)?;
            let index = FlatIndex::build(&passages, embedder, config.embedding_batch_size).await?;
            Ok(Arc::new(index))
        }
    }
}

fn single_prompt(
    config: &Config,
    generator: &SharedGenerator,
    embedder: &SharedEmbedder,
    searcher: &SharedSearcher,
) -> SinglePromptHyde {
    let hyde = SinglePromptHyde::new(
        config.task,
        generator.clone(),
        embedder.clone(),
        searcher.clone(),
    )
    .with_hypothesis_count(config.hypothesis_count);
    match config.secondary_task {
        Some(second) => hyde.with_second_promptor(second),
        None => hyde,
    }
}

fn multi_prompt(
    generator: &SharedGenerator,
    embedder: &SharedEmbedder,
    searcher: &SharedSearcher,
) -> MultiPromptHyde {
    MultiPromptHyde::with_default_perspectives(generator.clone(), embedder.clone(), searcher.clone())
}

async fn index(config: &Config) -> Result<()> {
    if config.index_backend == IndexBackend::Flat {
        warn!("HYDE_INDEX_BACKEND=flat builds its index in memory; writing the LanceDB table anyway");
    }
    let corpus_path = config.require_corpus()?;
    let passages = load_passages(corpus_path)?;
    let embedder = build_embedder(config)?;
    let dim = embedder.lock().await.dim();

    let store = LanceDbStore::connect(&config.vector_db_path).await?;
    let table = match store.open_or_create_table(&config.vector_table, dim).await {
        Ok(table) => table,
        Err(err) => match find_hyde_error(&err) {
            Some(HydeError::DimensionMismatch { expected, actual }) => {
                warn!(
                    table = %config.vector_table,
                    stored_dim = expected,
                    embedder_dim = actual,
                    "Embedder dimension changed; recreating passage table"
                );
                store.recreate_table(&config.vector_table, dim).await?
            }
            _ => return Err(err),
        },
    };
    let written = index_passages(&passages, &embedder, &table, config.embedding_batch_size).await?;

    println!(
        "Indexed {written} passages from {} into {}/{}",
        corpus_path.display(),
        config.vector_db_path.display(),
        config.vector_table
    );
    Ok(())
}

async fn run_topics(config: &Config) -> Result<()> {
    let (topics_path, qrels_path) = config.require_topics()?;
    let qrels = load_qrels(qrels_path)?;
    let topics = judged_topics(load_topics(topics_path)?, &qrels);

    let embedder = build_embedder(config)?;
    let generator = build_generator(config);
    let searcher = build_searcher(config, &embedder).await?;

    let settings = RunSettings {
        run_dir: config.run_dir.clone(),
        topics_name: config.topics_name.clone(),
        model: config.model_slug(),
        top_k: config.top_k,
    };
    let evaluator = if config.eval_enabled {
        Some(TrecEval::new(
            &config.trec_eval_command,
            qrels_path,
            config.eval_metrics.clone(),
        )?)
    } else {
        None
    };
    let improver = config
        .improve_query
        .then(|| QueryImprover::new(generator.clone()));

    let mut constructors: Vec<Box<dyn QueryVectorConstructor>> = Vec::new();
    if config.variant.includes_single() {
        constructors.push(Box::new(single_prompt(config, &generator, &embedder, &searcher)));
    }
    if config.variant.includes_multi() {
        constructors.push(Box::new(multi_prompt(&generator, &embedder, &searcher)));
    }

    for constructor in &constructors {
        let mut experiment = Experiment::new(constructor.as_ref(), &settings);
        if let Some(improver) = &improver {
            experiment = experiment.with_improver(improver);
        }
        if let Some(evaluator) = &evaluator {
            experiment = experiment.with_evaluator(evaluator);
        }
        let summary = experiment.run(&topics).await?;

        println!(
            "{}: {} queries ({} failed) -> {}",
            summary.label,
            summary.queries,
            summary.failed,
            summary.paths.trec.display()
        );
        for (metric, value) in &summary.metrics {
            println!("  {metric:<12} {value:.4}");
        }
    }
    Ok(())
}

async fn search(config: &Config, query: &str) -> Result<()> {
    let embedder = build_embedder(config)?;
    let generator = build_generator(config);
    let searcher = build_searcher(config, &embedder).await?;

    let constructor: Box<dyn QueryVectorConstructor> = if config.variant.includes_single() {
        let hyde = single_prompt(config, &generator, &embedder, &searcher);
        println!("Prompt:\n{}\n", hyde.prompt(query));
        Box::new(hyde)
    } else {
        let hyde = multi_prompt(&generator, &embedder, &searcher);
        for (i, prompt) in hyde.prompts(query).iter().enumerate() {
            println!("Prompt {}:\n{}\n", i + 1, prompt);
        }
        Box::new(hyde)
    };

    let hypotheses = constructor.generate_hypotheses(query).await?;
    for (i, doc) in hypotheses.iter().enumerate() {
        println!("HyDE Generated Document {i}:\n{}\n", doc.trim());
    }

    let vector = constructor.compute_vector(query, &hypotheses).await?;
    let hits = constructor.search(&vector, 10).await?;
    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>2} {:<12} {:.5}", rank + 1, hit.doc_id, hit.score);
    }
    Ok(())
}
