//! Ollama local-model client (`/api/generate`, non-streaming)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::llm::client::{LlmClient, LlmError};

/// Default Ollama endpoint
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Default local model
const DEFAULT_MODEL: &str = "llama3";

/// Configuration for the Ollama client
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: OLLAMA_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Client for a locally served Ollama model
#[derive(Debug)]
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, prompt: &str, system_prompt: Option<&str>) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(system) = system_prompt {
            body["system"] = json!(system);
        }
        body
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, LlmError> {
        let body = self.build_request(prompt, system_prompt);

        let response = self
            .client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let result: Value = response.json().await?;
        Ok(result["response"].as_str().unwrap_or("").trim().to_string())
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = OllamaConfig::default();
        assert_eq!(config.base_url, OLLAMA_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_generate_url() {
        let mut config = OllamaConfig::default();
        config.base_url = "http://127.0.0.1:11434/".to_string();
        let client = OllamaClient::new(config).unwrap();
        assert_eq!(client.generate_url(), "http://127.0.0.1:11434/api/generate");
    }

    #[test]
    fn test_build_request_includes_system_prompt() {
        let client = OllamaClient::new(OllamaConfig::default()).unwrap();

        let body = client.build_request("hello", Some("be brief"));
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["prompt"], "hello");
        assert_eq!(body["stream"], false);
        assert_eq!(body["system"], "be brief");

        let bare = client.build_request("hello", None);
        assert!(bare.get("system").is_none());
    }
}
