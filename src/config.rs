use crate::adapters::llm::{ModelConfig, DEFAULT_OLLAMA_HOST};
use crate::core::prompt::PromptConfig;
use crate::core::report::{ReportFormat, ReportOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAMES: &[&str] = &[".minireviewer.yml", ".minireviewer.yaml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub reports: ReportsConfig,

    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub max_retries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Bytes; 0 disables the limit.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default)]
    pub format: ReportFormat,

    #[serde(flatten)]
    pub options: ReportOptions,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: default_ignore_patterns(),
            max_file_size: default_max_file_size(),
        }
    }
}

/// Overrides given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub host: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Loads `path` when given, otherwise the first config file found in the
    /// current directory or the home directory, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        for name in CONFIG_FILE_NAMES {
            let candidate = PathBuf::from(name);
            if candidate.exists() {
                return Self::from_file(&candidate);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(CONFIG_FILE_NAMES[0]);
            if home_config.exists() {
                return Self::from_file(&home_config);
            }
        }

        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn merge_with_cli(&mut self, overrides: CliOverrides) {
        if let Some(model) = overrides.model {
            self.ollama.model = model;
        }
        if let Some(host) = overrides.host {
            self.ollama.host = host;
        }
        if let Some(temperature) = overrides.temperature {
            self.ollama.temperature = temperature;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.ollama.timeout_secs = timeout_secs;
        }
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model_name: self.ollama.model.clone(),
            base_url: Some(self.ollama.host.clone()),
            temperature: self.ollama.temperature,
            top_p: self.ollama.top_p,
            max_tokens: self.ollama.max_tokens,
            timeout_secs: self.ollama.timeout_secs,
            max_retries: self.ollama.max_retries,
        }
    }

    pub fn prompt_config(&self) -> PromptConfig {
        let mut prompt_config = PromptConfig::default();
        if let Some(system_prompt) = &self.system_prompt {
            prompt_config.system_prompt = system_prompt.clone();
        }
        prompt_config
    }

    /// Config ignore patterns followed by the extra ones from the command line.
    pub fn ignore_patterns(&self, extra: &[String]) -> Vec<String> {
        let mut patterns = self.analysis.ignore_patterns.clone();
        patterns.extend(extra.iter().cloned());
        patterns
    }
}

fn default_host() -> String {
    DEFAULT_OLLAMA_HOST.to_string()
}

fn default_model() -> String {
    "gemma3n:e4b".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_tokens() -> usize {
    4000
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_ignore_patterns() -> Vec<String> {
    ["vendor/*", "node_modules/*", "*.min.js", "*.min.css"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.ollama.host, "http://localhost:11434");
        assert_eq!(config.ollama.model, "gemma3n:e4b");
        assert_eq!(config.ollama.max_tokens, 4000);
        assert_eq!(config.ollama.timeout_secs, 300);
        assert_eq!(config.ollama.max_retries, 0);
        assert_eq!(config.analysis.max_file_size, 1_048_576);
        assert_eq!(config.analysis.ignore_patterns.len(), 4);
        assert_eq!(config.reports.format, ReportFormat::Html);
        assert!(config.reports.options.include_suggestions);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.yml");
        std::fs::write(
            &path,
            "ollama:\n  model: llama3:8b\n  max_retries: 2\nreports:\n  format: markdown\n  include_metrics: false\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.ollama.model, "llama3:8b");
        assert_eq!(config.ollama.max_retries, 2);
        assert_eq!(config.ollama.host, "http://localhost:11434");
        assert_eq!(config.reports.format, ReportFormat::Markdown);
        assert!(!config.reports.options.include_metrics);
        assert!(config.reports.options.include_recommendations);
        assert_eq!(config.analysis.ignore_patterns[0], "vendor/*");
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.yml");
        std::fs::write(&path, "ollama: [unclosed").unwrap();
        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load(Some(&dir.path().join("missing.yml"))).is_err());
    }

    #[test]
    fn cli_overrides_win() {
        let mut config = Config::default();
        config.merge_with_cli(CliOverrides {
            model: Some("codellama".to_string()),
            host: Some("http://gpu-box:11434".to_string()),
            temperature: None,
            timeout_secs: Some(30),
        });

        let model = config.model_config();
        assert_eq!(model.model_name, "codellama");
        assert_eq!(model.base_url.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(model.temperature, 0.1);
        assert_eq!(model.timeout_secs, 30);
    }

    #[test]
    fn custom_system_prompt_reaches_prompt_config() {
        let config = Config {
            system_prompt: Some("Be brief.".to_string()),
            ..Config::default()
        };
        assert_eq!(config.prompt_config().system_prompt, "Be brief.");
        assert_eq!(
            config.ignore_patterns(&["gen/*".to_string()]).last().map(String::as_str),
            Some("gen/*")
        );
    }
}
