//! LLM-backed hypothesis document generation
//!
//! Talks to OpenAI-compatible chat endpoints, Cohere's generate endpoint or a
//! local Ollama server. Each completion request goes through the configured
//! `RetryPolicy`.

use crate::config::GeneratorBackend;
use crate::error::HydeError;
use crate::generator::{DocumentGenerator, GenerationParams, RetryPolicy};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const COHERE_BASE_URL: &str = "https://api.cohere.ai/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

pub struct LlmGenerator {
    backend: GeneratorBackend,
    api_key: Option<String>,
    base_url: String,
    params: GenerationParams,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl LlmGenerator {
    pub fn new(
        backend: GeneratorBackend,
        api_key: Option<String>,
        base_url: Option<String>,
        params: GenerationParams,
        retry: RetryPolicy,
    ) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| default_base_url(backend).to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            backend,
            api_key,
            base_url,
            params,
            retry,
            client: reqwest::Client::new(),
        }
    }

    pub fn backend(&self) -> GeneratorBackend {
        self.backend
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("{} API key not set (HYDE_API_KEY)", self.backend))
    }

    async fn generate_openai(&self, prompt: &str, n: usize) -> Result<Vec<String>> {
        let api_key = self.require_api_key()?;
        let url = format!("{}/chat/completions", self.base_url);

        // Some OpenAI-compatible servers ignore `n`; keep asking for the rest.
        let mut texts = Vec::with_capacity(n);
        while texts.len() < n {
            let remaining = n - texts.len();
            let body = serde_json::json!({
                "model": self.params.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": self.params.max_tokens,
                "temperature": self.params.temperature,
                "top_p": self.params.top_p,
                "frequency_penalty": self.params.frequency_penalty,
                "presence_penalty": self.params.presence_penalty,
                "stop": stop_or_null(&self.params.stop),
                "n": remaining,
            });

            let (client, url, body) = (&self.client, url.as_str(), &body);
            let response: OpenAIResponse = self
                .retry
                .run("openai", move || {
                    post_json(client, url, Some(api_key), body, "OpenAI API")
                })
                .await?;

            if response.choices.is_empty() {
                return Err(HydeError::ShortGeneration {
                    requested: n,
                    received: texts.len(),
                }
                .into());
            }

            texts.extend(
                response
                    .choices
                    .into_iter()
                    .take(remaining)
                    .map(|c| c.message.content.trim().to_string()),
            );
        }

        Ok(texts)
    }

    async fn generate_cohere(&self, prompt: &str, n: usize) -> Result<Vec<String>> {
        let api_key = self.require_api_key()?;
        let url = format!("{}/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.params.model,
            "prompt": prompt,
            "max_tokens": self.params.max_tokens,
            "temperature": self.params.temperature,
            "p": self.params.top_p,
            "k": 0,
            "frequency_penalty": self.params.frequency_penalty,
            "presence_penalty": self.params.presence_penalty,
            "stop_sequences": self.params.stop,
        });

        let (client, url, body) = (&self.client, url.as_str(), &body);
        let mut texts = Vec::with_capacity(n);
        for _ in 0..n {
            let response: CohereResponse = self
                .retry
                .run("cohere", move || {
                    post_json(client, url, Some(api_key), body, "Cohere API")
                })
                .await?;

            let text = response
                .generations
                .into_iter()
                .next()
                .map(|g| g.text.trim().to_string())
                .ok_or_else(|| anyhow!("Cohere response contained no generations"))?;
            texts.push(text);
        }

        Ok(texts)
    }

    async fn generate_ollama(&self, prompt: &str, n: usize) -> Result<Vec<String>> {
        let url = format!("{}/api/generate", self.base_url);
        let mut options = serde_json::json!({
            "temperature": self.params.temperature,
            "top_p": self.params.top_p,
            "num_predict": self.params.max_tokens,
        });
        if !self.params.stop.is_empty() {
            options["stop"] = serde_json::json!(self.params.stop);
        }
        let body = serde_json::json!({
            "model": self.params.model,
            "prompt": prompt,
            "stream": false,
            "options": options,
        });

        let (client, url, body) = (&self.client, url.as_str(), &body);
        let mut texts = Vec::with_capacity(n);
        for _ in 0..n {
            let response: OllamaResponse = self
                .retry
                .run("ollama", move || post_json(client, url, None, body, "Ollama"))
                .await?;
            texts.push(response.response.trim().to_string());
        }

        Ok(texts)
    }

    fn generate_mock(&self, prompt: &str, n: usize) -> Vec<String> {
        // Offline stand-in: echoes the prompt's last line so dry runs stay
        // query-dependent.
        let subject = prompt
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty() && !l.trim_end().ends_with(':'))
            .unwrap_or(prompt)
            .trim();
        (0..n)
            .map(|i| format!("Hypothetical passage {} about: {}", i + 1, subject))
            .collect()
    }
}

#[async_trait]
impl DocumentGenerator for LlmGenerator {
    async fn generate(&self, prompt: &str, n: usize) -> Result<Vec<String>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        tracing::debug!(backend = %self.backend, model = %self.params.model, n, "Generating hypothesis documents");

        let texts = match self.backend {
            GeneratorBackend::OpenAi => self.generate_openai(prompt, n).await?,
            GeneratorBackend::Cohere => self.generate_cohere(prompt, n).await?,
            GeneratorBackend::Ollama => self.generate_ollama(prompt, n).await?,
            GeneratorBackend::Mock => self.generate_mock(prompt, n),
        };

        if texts.len() != n {
            return Err(HydeError::ShortGeneration {
                requested: n,
                received: texts.len(),
            }
            .into());
        }
        Ok(texts)
    }
}

async fn post_json<R: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    service: &str,
) -> Result<R> {
    let mut request = client.post(url).json(body);
    if let Some(key) = bearer {
        request = request.bearer_auth(key);
    }
    request
        .send()
        .await
        .with_context(|| format!("{service} request failed"))?
        .error_for_status()
        .with_context(|| format!("{service} returned an error status"))?
        .json::<R>()
        .await
        .with_context(|| format!("Failed to parse {service} response"))
}

fn default_base_url(backend: GeneratorBackend) -> &'static str {
    match backend {
        GeneratorBackend::OpenAi => OPENAI_BASE_URL,
        GeneratorBackend::Cohere => COHERE_BASE_URL,
        GeneratorBackend::Ollama | GeneratorBackend::Mock => OLLAMA_BASE_URL,
    }
}

fn stop_or_null(stop: &[String]) -> serde_json::Value {
    if stop.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::json!(stop)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    generations: Vec<CohereGeneration>,
}

#[derive(Debug, Deserialize)]
struct CohereGeneration {
    text: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}
