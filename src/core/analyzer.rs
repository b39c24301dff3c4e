use crate::adapters::llm::{LLMAdapter, LLMRequest};
use crate::core::aggregator::ResultAggregator;
use crate::core::analysis::{AnalysisResult, AnalyzerKind};
use crate::core::normalizer::ResponseNormalizer;
use crate::core::prompt::PromptBuilder;
use anyhow::{Context, Result};
use tracing::debug;

/// Runs one unit of code through prompt building, the model and normalization.
pub struct Analyzer {
    adapter: Box<dyn LLMAdapter>,
    prompts: PromptBuilder,
}

impl Analyzer {
    pub fn new(adapter: Box<dyn LLMAdapter>, prompts: PromptBuilder) -> Self {
        Self { adapter, prompts }
    }

    pub fn model_name(&self) -> &str {
        self.adapter.model_name()
    }

    /// Only a failed model call is an error; any reply text yields a result.
    pub async fn analyze(&self, kind: AnalyzerKind, code: &str, context: &str) -> Result<AnalysisResult> {
        let (system_prompt, user_prompt) = self.prompts.build_prompt(kind, code, context);
        let request = LLMRequest::new(system_prompt, user_prompt);

        let response = self
            .adapter
            .complete(request)
            .await
            .with_context(|| format!("{} analysis failed", kind))?;
        debug!("Model replied with {} characters", response.content.len());

        Ok(ResponseNormalizer::normalize(&response.content, kind))
    }

    /// Quality, security and architecture passes over the same code, merged.
    pub async fn analyze_all(&self, code: &str, context: &str) -> Result<AnalysisResult> {
        let mut results = Vec::with_capacity(3);
        for kind in [
            AnalyzerKind::Quality,
            AnalyzerKind::Security,
            AnalyzerKind::Architecture,
        ] {
            results.push(self.analyze(kind, code, context).await?);
        }

        ResultAggregator::merge_categories(results).context("no category results to merge")
    }
}
