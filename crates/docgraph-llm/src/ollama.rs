//! Ollama Provider Implementation
//!
//! Talks to a local Ollama server through `/api/generate`, asking for JSON
//! output. One request per call; no retries.
//!
//! # Examples
//!
//! ```no_run
//! use docgraph_llm::OllamaProvider;
//! use docgraph_domain::traits::LlmProvider;
//!
//! let provider = OllamaProvider::new("http://localhost:11434", "tinyllama");
//! let json = provider.generate("Extract entities from: Alice met Bob.")?;
//! # Ok::<(), docgraph_llm::LlmError>(())
//! ```

use crate::{send_error, LlmConfig, LlmError};
use docgraph_domain::traits::LlmProvider as LlmProviderTrait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default timeout for one generation call
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Ollama API provider for local LLM inference
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    timeout: Duration,
    temperature: f32,
    num_predict: u32,
}

/// Request body for Ollama generate API
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response from Ollama generate API
#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaProvider {
    /// Create a provider with default sampling settings
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            temperature: 0.7,
            num_predict: 1000,
        }
    }

    /// Create a provider from the `[llm]` config section
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            endpoint: config.base_url().to_string(),
            model: config.model_name.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            temperature: config.temperature,
            num_predict: config.max_tokens,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.num_predict,
            },
        }
    }
}

impl LlmProviderTrait for OllamaProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        let url = format!("{}/api/generate", self.endpoint);
        debug!(url = %url, model = %self.model, prompt_chars = prompt.len(), "Ollama request");

        // Built per call so the blocking client never lives on an async thread
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let response = client
            .post(&url)
            .json(&self.request_body(prompt))
            .send()
            .map_err(send_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.model.clone()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::BackendUnavailable(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        debug!(response_chars = parsed.response.len(), "Ollama response");
        Ok(parsed.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
