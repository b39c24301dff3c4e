use crate::adapters::llm::{LLMAdapter, LLMRequest, LLMResponse, ModelConfig, Usage, DEFAULT_OLLAMA_HOST};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cannot reach Ollama at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Ollama did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Ollama API error ({status}): {body}")]
    Status { status: StatusCode, body: String },
}

pub struct OllamaAdapter {
    client: Client,
    config: ModelConfig,
    base_url: String,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    model: String,
    #[serde(default)]
    done: bool,
    prompt_eval_count: Option<usize>,
    eval_count: Option<usize>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaAdapter {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks that the server answers on `/api/tags`.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        self.send_with_retry(&url, || self.client.get(&url)).await?;
        Ok(())
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.send_with_retry(&url, || self.client.get(&url)).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama model list")?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn send_with_retry<F>(&self, url: &str, mut make_request: F) -> Result<reqwest::Response, GatewayError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 250;
        let max_retries = self.config.max_retries;

        let mut attempt = 0;
        loop {
            let error = match make_request().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let error = GatewayError::Status { status, body };
                    if !is_retryable_status(status) {
                        return Err(error);
                    }
                    error
                }
                Err(err) if err.is_timeout() => {
                    GatewayError::Timeout(Duration::from_secs(self.config.timeout_secs))
                }
                Err(source) => GatewayError::Transport {
                    url: url.to_string(),
                    source,
                },
            };

            if attempt >= max_retries {
                return Err(error);
            }
            attempt += 1;
            warn!("Ollama request failed ({}), retry {}/{}", error, attempt, max_retries);
            sleep(Duration::from_millis(BASE_DELAY_MS * attempt as u64)).await;
        }
    }
}

#[async_trait]
impl LLMAdapter for OllamaAdapter {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse> {
        let ollama_request = OllamaRequest {
            model: self.model_name().to_string(),
            prompt: request.user_prompt,
            system: request.system_prompt,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature.unwrap_or(self.config.temperature),
                top_p: self.config.top_p,
                num_predict: request.max_tokens.unwrap_or(self.config.max_tokens),
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        debug!("Sending prompt to {} (model {})", url, ollama_request.model);
        let response = self
            .send_with_retry(&url, || self.client.post(&url).json(&ollama_request))
            .await
            .context("Failed to send request to Ollama")?;

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        let prompt_tokens = ollama_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = ollama_response.eval_count.unwrap_or(0);
        Ok(LLMResponse {
            content: ollama_response.response,
            model: ollama_response.model,
            usage: ollama_response.done.then(|| Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        self.config
            .model_name
            .strip_prefix("ollama:")
            .unwrap_or(&self.config.model_name)
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
