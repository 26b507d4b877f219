//! LLM provider implementations for visagent.
//!
//! The backend talks to one generation adapter at a time; the
//! OpenAI-compatible client covers Ollama, OpenAI, vLLM, and anything
//! else exposing a `/v1/chat/completions` endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;
use visagent_core::provider::Provider;

/// Build the generation provider declared in the configuration.
pub fn build_from_config(config: &visagent_config::AppConfig) -> Arc<dyn Provider> {
    let api_key = config.api_key.clone().unwrap_or_default();
    Arc::new(OpenAiCompatProvider::new(
        &config.provider.name,
        &config.provider.api_url,
        &api_key,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_from_default_config() {
        let config = visagent_config::AppConfig::default();
        let provider = build_from_config(&config);
        assert_eq!(provider.name(), "ollama");
    }
}
