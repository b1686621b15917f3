//! Configuration-driven construction of the LLM client stack

use std::time::Duration;

use crate::config::Config;
use crate::error::{PaperboyError, Result};
use crate::llm::client::LlmClient;
use crate::llm::limited::RateLimitedClient;
use crate::llm::ollama::{OllamaClient, OllamaConfig};
use crate::llm::openai::{OpenAiClient, OpenAiConfig};
use crate::llm::rate_limit::RateLimiter;

/// Groq speaks the OpenAI chat-completions protocol at its own endpoint
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default Groq model
const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Build the configured backend, wrapped with rate limiting when enabled.
pub fn create_client(config: &Config) -> Result<Box<dyn LlmClient>> {
    let base = build_backend(config)?;

    if !config.rate_limit.enabled {
        return Ok(base);
    }

    let limiter = RateLimiter::new(config.rate_limit.max_requests_per_minute);
    Ok(Box::new(RateLimitedClient::new(
        base,
        limiter,
        config.rate_limit.enable_backoff,
        Duration::from_secs_f64(config.rate_limit.max_backoff_secs),
    )))
}

fn build_backend(config: &Config) -> Result<Box<dyn LlmClient>> {
    let llm = &config.llm;
    let timeout = Duration::from_secs(llm.timeout_secs);

    match llm.provider.to_lowercase().as_str() {
        "openai" => {
            let api_key = llm
                .api_key
                .clone()
                .ok_or_else(|| PaperboyError::Config("OpenAI API key is required".to_string()))?;
            let defaults = OpenAiConfig::default();
            let backend = OpenAiConfig {
                base_url: llm.base_url.clone().unwrap_or(defaults.base_url),
                model: llm.model.clone().unwrap_or(defaults.model),
                max_tokens: llm.max_tokens,
                timeout,
            };
            Ok(Box::new(OpenAiClient::new(api_key, backend)?))
        }
        "groq" => {
            let api_key = llm
                .api_key
                .clone()
                .ok_or_else(|| PaperboyError::Config("Groq API key is required".to_string()))?;
            let backend = OpenAiConfig {
                base_url: llm.base_url.clone().unwrap_or_else(|| GROQ_BASE_URL.to_string()),
                model: llm
                    .model
                    .clone()
                    .unwrap_or_else(|| GROQ_DEFAULT_MODEL.to_string()),
                max_tokens: llm.max_tokens,
                timeout,
            };
            Ok(Box::new(OpenAiClient::new(api_key, backend)?))
        }
        "ollama" => {
            let defaults = OllamaConfig::default();
            let backend = OllamaConfig {
                base_url: llm.base_url.clone().unwrap_or(defaults.base_url),
                model: llm.model.clone().unwrap_or(defaults.model),
                timeout,
            };
            Ok(Box::new(OllamaClient::new(backend)?))
        }
        other => Err(PaperboyError::Config(format!(
            "Unsupported LLM provider: {other}"
        ))),
    }
}
