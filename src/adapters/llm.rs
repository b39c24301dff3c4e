use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Connection and sampling settings for the model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
    /// Extra attempts after the first failed request.
    pub max_retries: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "gemma3n:e4b".to_string(),
            base_url: None,
            temperature: 0.1,
            top_p: 0.9,
            max_tokens: 4000,
            timeout_secs: 300,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LLMRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Overrides `ModelConfig::temperature` for this call.
    pub temperature: Option<f32>,
    /// Overrides `ModelConfig::max_tokens` for this call.
    pub max_tokens: Option<usize>,
}

impl LLMRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Raw reply text; it may or may not contain JSON.
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// A text-completion backend.
#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse>;
    fn model_name(&self) -> &str;
}

pub fn create_adapter(config: &ModelConfig) -> Result<Box<dyn LLMAdapter>> {
    Ok(Box::new(crate::adapters::OllamaAdapter::new(config.clone())?))
}
