use crate::generator::{GenerationParams, RetryPolicy};
use crate::hyde::Promptor;
use anyhow::{anyhow, Context, Result};
use std::{env, fmt, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingsDevice {
    Cpu,
    Metal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingsBackend {
    FastEmbed,
    Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorBackend {
    OpenAi,
    Cohere,
    Ollama,
    Mock,
}

impl fmt::Display for GeneratorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GeneratorBackend::OpenAi => "openai",
            GeneratorBackend::Cohere => "cohere",
            GeneratorBackend::Ollama => "ollama",
            GeneratorBackend::Mock => "mock",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBackend {
    LanceDb,
    Flat,
}

/// Which query constructor(s) `run` drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydeVariant {
    Single,
    Multi,
    Both,
}

impl HydeVariant {
    pub fn includes_single(self) -> bool {
        matches!(self, HydeVariant::Single | HydeVariant::Both)
    }

    pub fn includes_multi(self) -> bool {
        matches!(self, HydeVariant::Multi | HydeVariant::Both)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub run_dir: PathBuf,
    pub topics_path: Option<PathBuf>,
    pub qrels_path: Option<PathBuf>,
    pub topics_name: String,
    pub corpus_path: Option<PathBuf>,

    pub index_backend: IndexBackend,
    pub vector_db_path: PathBuf,
    pub vector_table: String,

    pub embeddings_backend: EmbeddingsBackend,
    pub embeddings_model_repo: String,
    pub embeddings_model_dir: Option<PathBuf>,
    pub embeddings_device: EmbeddingsDevice,
    pub embedding_batch_size: usize,
    pub hash_embedding_dim: usize,

    // Generator
    pub llm_backend: GeneratorBackend,
    pub llm_model: String,
    pub llm_base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub stop: Vec<String>,

    // Retry
    pub wait_till_success: bool,
    pub max_attempts: Option<u32>,
    pub retry_backoff_ms: u64,

    // Run
    pub variant: HydeVariant,
    pub task: Promptor,
    pub secondary_task: Option<Promptor>,
    pub hypothesis_count: usize,
    pub top_k: usize,
    pub improve_query: bool,

    // Evaluation
    pub eval_enabled: bool,
    pub trec_eval_command: String,
    pub eval_metrics: Vec<String>,

    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let run_dir = path_or_default("HYDE_RUN_DIR", "./runs");
        let topics_path = optional_env("HYDE_TOPICS_PATH").map(PathBuf::from);
        let qrels_path = optional_env("HYDE_QRELS_PATH").map(PathBuf::from);
        let topics_name =
            optional_env("HYDE_TOPICS_NAME").unwrap_or_else(|| "dl19-passage".to_string());
        let corpus_path = optional_env("HYDE_CORPUS_PATH").map(PathBuf::from);

        let index_backend = optional_env("HYDE_INDEX_BACKEND")
            .as_deref()
            .map(parse_index_backend)
            .transpose()?
            .unwrap_or(IndexBackend::LanceDb);
        let vector_db_path = path_or_default("VECTOR_DB_PATH", "./.hyde/vectors");
        let vector_table = optional_env("VECTOR_TABLE").unwrap_or_else(|| "passages".to_string());

        let embeddings_backend = optional_env("EMBEDDINGS_BACKEND")
            .as_deref()
            .map(parse_embeddings_backend)
            .transpose()?
            .unwrap_or(EmbeddingsBackend::FastEmbed);

        // The cache dir only matters to fastembed.
        let embeddings_model_dir = match embeddings_backend {
            EmbeddingsBackend::FastEmbed => Some(path_or_default(
                "EMBEDDINGS_MODEL_DIR",
                "./.hyde/embeddings-cache",
            )),
            EmbeddingsBackend::Hash => None,
        };
        let embeddings_model_repo = optional_env("EMBEDDINGS_MODEL_REPO")
            .unwrap_or_else(|| "BAAI/bge-base-en-v1.5".to_string());

        let embeddings_device = optional_env("EMBEDDINGS_DEVICE")
            .as_deref()
            .map(parse_embeddings_device)
            .transpose()?
            .unwrap_or(EmbeddingsDevice::Cpu);

        let embedding_batch_size = optional_env("EMBEDDING_BATCH_SIZE")
            .as_deref()
            .map(parse_usize)
            .transpose()
            .context("EMBEDDING_BATCH_SIZE")?
            .unwrap_or(32)
            .max(1);

        let hash_embedding_dim = optional_env("HASH_EMBEDDING_DIM")
            .as_deref()
            .map(parse_usize)
            .transpose()
            .context("HASH_EMBEDDING_DIM")?
            .unwrap_or(64);

        let llm_backend = optional_env("HYDE_LLM_BACKEND")
            .as_deref()
            .map(parse_generator_backend)
            .transpose()?
            .unwrap_or(GeneratorBackend::Ollama);
        let llm_model = optional_env("HYDE_LLM_MODEL").unwrap_or_else(|| "llama3.1".to_string());
        let llm_base_url = optional_env("HYDE_LLM_BASE_URL");
        let api_key = optional_env("HYDE_API_KEY");

        let max_tokens = optional_env("HYDE_MAX_TOKENS")
            .as_deref()
            .map(parse_usize)
            .transpose()
            .context("HYDE_MAX_TOKENS")?
            .unwrap_or(512);
        let temperature = optional_env("HYDE_TEMPERATURE")
            .as_deref()
            .map(parse_any_f32)
            .transpose()
            .context("HYDE_TEMPERATURE")?
            .unwrap_or(0.7);
        let top_p = optional_env("HYDE_TOP_P")
            .as_deref()
            .map(parse_unit_f32)
            .transpose()
            .context("HYDE_TOP_P")?
            .unwrap_or(1.0);
        let stop = optional_env("HYDE_STOP")
            .as_deref()
            .map(parse_csv)
            .unwrap_or_default();

        let wait_till_success = optional_env("HYDE_WAIT_TILL_SUCCESS")
            .as_deref()
            .map(parse_bool)
            .transpose()
            .context("HYDE_WAIT_TILL_SUCCESS")?
            .unwrap_or(false);
        let max_attempts = optional_env("HYDE_MAX_ATTEMPTS")
            .as_deref()
            .map(parse_u32)
            .transpose()
            .context("HYDE_MAX_ATTEMPTS")?;
        let retry_backoff_ms = optional_env("HYDE_RETRY_BACKOFF_MS")
            .as_deref()
            .map(parse_u64)
            .transpose()
            .context("HYDE_RETRY_BACKOFF_MS")?
            .unwrap_or(1000);

        let variant = optional_env("HYDE_VARIANT")
            .as_deref()
            .map(parse_variant)
            .transpose()?
            .unwrap_or(HydeVariant::Both);
        let task = Promptor::from_task(
            optional_env("HYDE_TASK").as_deref().unwrap_or("web search"),
        )
        .context("HYDE_TASK")?;
        let secondary_task = optional_env("HYDE_SECONDARY_TASK")
            .as_deref()
            .map(Promptor::from_task)
            .transpose()
            .context("HYDE_SECONDARY_TASK")?;
        let hypothesis_count = optional_env("HYDE_HYPOTHESIS_COUNT")
            .as_deref()
            .map(parse_usize)
            .transpose()
            .context("HYDE_HYPOTHESIS_COUNT")?
            .unwrap_or(8);
        if hypothesis_count == 0 {
            return Err(anyhow!("HYDE_HYPOTHESIS_COUNT must be at least 1"));
        }
        let top_k = optional_env("HYDE_TOP_K")
            .as_deref()
            .map(parse_usize)
            .transpose()
            .context("HYDE_TOP_K")?
            .unwrap_or(1000);
        let improve_query = optional_env("HYDE_IMPROVE_QUERY")
            .as_deref()
            .map(parse_bool)
            .transpose()
            .context("HYDE_IMPROVE_QUERY")?
            .unwrap_or(false);

        let eval_enabled = optional_env("HYDE_EVAL_ENABLED")
            .as_deref()
            .map(parse_bool)
            .transpose()
            .context("HYDE_EVAL_ENABLED")?
            .unwrap_or(true);
        let trec_eval_command =
            optional_env("TREC_EVAL_COMMAND").unwrap_or_else(|| "trec_eval".to_string());
        let eval_metrics = parse_csv_or_default(
            optional_env("HYDE_EVAL_METRICS").as_deref(),
            &["map", "ndcg_cut.10", "recall.1000"],
        );

        let log_dir = optional_env("LOG_DIR").map(PathBuf::from);

        Ok(Self {
            run_dir,
            topics_path,
            qrels_path,
            topics_name,
            corpus_path,
            index_backend,
            vector_db_path,
            vector_table,
            embeddings_backend,
            embeddings_model_repo,
            embeddings_model_dir,
            embeddings_device,
            embedding_batch_size,
            hash_embedding_dim,
            llm_backend,
            llm_model,
            llm_base_url,
            api_key,
            max_tokens,
            temperature,
            top_p,
            stop,
            wait_till_success,
            max_attempts,
            retry_backoff_ms,
            variant,
            task,
            secondary_task,
            hypothesis_count,
            top_k,
            improve_query,
            eval_enabled,
            trec_eval_command,
            eval_metrics,
            log_dir,
        })
    }

    /// `HYDE_MAX_ATTEMPTS` wins over `HYDE_WAIT_TILL_SUCCESS`.
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = Duration::from_millis(self.retry_backoff_ms);
        match (self.max_attempts, self.wait_till_success) {
            (Some(n), _) => RetryPolicy::bounded(n, backoff),
            (None, true) => RetryPolicy::wait_till_success(backoff),
            (None, false) => RetryPolicy::fail_fast(),
        }
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.llm_model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            stop: self.stop.clone(),
            ..GenerationParams::default()
        }
    }

    pub fn require_topics(&self) -> Result<(&PathBuf, &PathBuf)> {
        let topics = self
            .topics_path
            .as_ref()
            .ok_or_else(|| anyhow!("Missing required env var: HYDE_TOPICS_PATH"))?;
        let qrels = self
            .qrels_path
            .as_ref()
            .ok_or_else(|| anyhow!("Missing required env var: HYDE_QRELS_PATH"))?;
        Ok((topics, qrels))
    }

    pub fn require_corpus(&self) -> Result<&PathBuf> {
        self.corpus_path
            .as_ref()
            .ok_or_else(|| anyhow!("Missing required env var: HYDE_CORPUS_PATH"))
    }

    /// Model name with path separators removed, for use in file names.
    pub fn model_slug(&self) -> String {
        self.llm_model.replace(['/', ':', ' '], "_")
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|v| {
        let v = v.trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

fn path_or_default(key: &str, default: &str) -> PathBuf {
    PathBuf::from(optional_env(key).unwrap_or_else(|| default.to_string()))
}

fn parse_csv_or_default(value: Option<&str>, default: &[&str]) -> Vec<String> {
    match value {
        Some(v) => parse_csv(v),
        None => default.iter().map(|s| (*s).to_string()).collect(),
    }
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_embeddings_device(value: &str) -> Result<EmbeddingsDevice> {
    match value.trim().to_lowercase().as_str() {
        "cpu" => Ok(EmbeddingsDevice::Cpu),
        "metal" => Ok(EmbeddingsDevice::Metal),
        other => Err(anyhow!("Invalid EMBEDDINGS_DEVICE: {other}")),
    }
}

fn parse_embeddings_backend(value: &str) -> Result<EmbeddingsBackend> {
    match value.trim().to_lowercase().as_str() {
        "fastembed" => Ok(EmbeddingsBackend::FastEmbed),
        "hash" => Ok(EmbeddingsBackend::Hash),
        other => Err(anyhow!("Invalid EMBEDDINGS_BACKEND: {other}")),
    }
}

fn parse_generator_backend(value: &str) -> Result<GeneratorBackend> {
    match value.trim().to_lowercase().as_str() {
        "openai" => Ok(GeneratorBackend::OpenAi),
        "cohere" => Ok(GeneratorBackend::Cohere),
        "ollama" => Ok(GeneratorBackend::Ollama),
        "mock" => Ok(GeneratorBackend::Mock),
        other => Err(anyhow!("Invalid HYDE_LLM_BACKEND: {other}")),
    }
}

fn parse_index_backend(value: &str) -> Result<IndexBackend> {
    match value.trim().to_lowercase().as_str() {
        "lancedb" | "lance" => Ok(IndexBackend::LanceDb),
        "flat" => Ok(IndexBackend::Flat),
        other => Err(anyhow!("Invalid HYDE_INDEX_BACKEND: {other}")),
    }
}

fn parse_variant(value: &str) -> Result<HydeVariant> {
    match value.trim().to_lowercase().as_str() {
        "single" => Ok(HydeVariant::Single),
        "multi" => Ok(HydeVariant::Multi),
        "both" => Ok(HydeVariant::Both),
        other => Err(anyhow!("Invalid HYDE_VARIANT: {other}")),
    }
}

fn parse_usize(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|err| anyhow!("Invalid integer '{value}': {err}"))
}

fn parse_u32(value: &str) -> Result<u32> {
    let v = value
        .trim()
        .parse::<u32>()
        .map_err(|err| anyhow!("Invalid integer '{value}': {err}"))?;
    if v == 0 {
        return Err(anyhow!("Expected at least 1 attempt"));
    }
    Ok(v)
}

fn parse_u64(value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|err| anyhow!("Invalid integer '{value}': {err}"))
}

fn parse_unit_f32(value: &str) -> Result<f32> {
    let v = parse_any_f32(value)?;
    if !(0.0..=1.0).contains(&v) {
        return Err(anyhow!("Expected a value in 0..=1, got {v}"));
    }
    Ok(v)
}

fn parse_any_f32(value: &str) -> Result<f32> {
    value
        .trim()
        .parse::<f32>()
        .map_err(|err| anyhow!("Invalid float '{value}': {err}"))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        other => Err(anyhow!("Invalid boolean '{other}'")),
    }
}
