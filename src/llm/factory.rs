//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use tracing::info;

use crate::config::LlmConfig;
use crate::error::{AskError, Result};
use crate::llm::ollama::DEFAULT_OLLAMA_URL;
use crate::llm::{
    AnthropicClient, AnthropicConfig, LlmClient, LlmProvider, MockLlmClient, OllamaClient,
    OllamaConfig, OpenAiClient, OpenAiConfig,
};

/// Creates an LLM client from configuration, reading the process environment.
///
/// API keys resolve in order: `llm.api_key`, then `OPENAI_API_KEY` or
/// `ANTHROPIC_API_KEY`. Models resolve in order: `llm.model`, then
/// `OPENAI_MODEL`, `ANTHROPIC_MODEL` or `OLLAMA_MODEL`, then the provider
/// default. Ollama reads `OLLAMA_URL` when no base URL is configured.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    create_client_with_env(config, |key| std::env::var(key).ok())
}

/// Creates an LLM client resolving unset values through `lookup`.
pub fn create_client_with_env(
    config: &LlmConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn LlmClient>> {
    let provider: LlmProvider = config.provider.parse()?;

    let model = |env_key: &str| {
        config
            .model
            .clone()
            .or_else(|| lookup(env_key))
            .unwrap_or_else(|| provider.default_model().to_string())
    };

    let api_key = |env_key: &str| {
        config
            .api_key
            .clone()
            .or_else(|| lookup(env_key))
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AskError::config(format!("No API key configured. Set {env_key}.")))
    };

    let client: Arc<dyn LlmClient> = match provider {
        LlmProvider::OpenAi => {
            let model = model("OPENAI_MODEL");
            info!(provider = %provider, model = %model, "Using language model");
            let mut openai = OpenAiConfig::new(api_key("OPENAI_API_KEY")?, model)
                .with_timeout(config.timeout_secs);
            if let Some(url) = &config.base_url {
                openai = openai.with_base_url(url.clone());
            }
            Arc::new(OpenAiClient::new(openai)?)
        }
        LlmProvider::Anthropic => {
            let model = model("ANTHROPIC_MODEL");
            info!(provider = %provider, model = %model, "Using language model");
            Arc::new(AnthropicClient::new(
                AnthropicConfig::new(api_key("ANTHROPIC_API_KEY")?, model)
                    .with_timeout(config.timeout_secs),
            )?)
        }
        LlmProvider::Ollama => {
            let model = model("OLLAMA_MODEL");
            let url = config
                .base_url
                .clone()
                .or_else(|| lookup("OLLAMA_URL"))
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            info!(provider = %provider, model = %model, url = %url, "Using language model");
            Arc::new(OllamaClient::new(
                OllamaConfig::new(model)
                    .with_url(url)
                    .with_timeout(config.timeout_secs),
            )?)
        }
        LlmProvider::Mock => {
            info!(provider = %provider, "Using mock language model");
            Arc::new(MockLlmClient::new())
        }
    };

    Ok(client)
}
