pub mod llm;
pub mod ollama;

pub use ollama::{GatewayError, OllamaAdapter};
