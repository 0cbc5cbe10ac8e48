//! docgraph LLM Provider Layer
//!
//! Implementations of the `LlmProvider` trait from `docgraph-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OllamaProvider`: Local Ollama API integration
//! - `OpenAiProvider`: Hosted OpenAI-compatible chat completions
//!
//! All providers are blocking. Async callers run them on the blocking pool.
//!
//! # Examples
//!
//! ```
//! use docgraph_llm::MockProvider;
//! use docgraph_domain::traits::LlmProvider;
//!
//! let provider = MockProvider::new(r#"{"nodes":[],"edges":[]}"#);
//! let result = provider.generate("test prompt").unwrap();
//! assert_eq!(result, r#"{"nodes":[],"edges":[]}"#);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod ollama;
pub mod openai;

use docgraph_domain::traits::LlmProvider as LlmProviderTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub use config::{Backend, LlmConfig};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Connection failure, timeout, or non-success status
    #[error("LLM backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered but the envelope could not be read
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Misconfiguration detected before any request was sent
    #[error("LLM configuration error: {0}")]
    Config(String),
}

/// A provider chosen at runtime from configuration
pub type SharedProvider = Arc<dyn LlmProviderTrait<Error = LlmError> + Send + Sync>;

/// Build the provider named by `config.backend`
///
/// # Errors
///
/// Returns [`LlmError::Config`] when the configuration is invalid.
pub fn provider_from_config(config: &LlmConfig) -> Result<SharedProvider, LlmError> {
    config.validate()?;
    info!(
        backend = config.backend.as_str(),
        endpoint = %config.endpoint,
        model = %config.model_name,
        "Configured LLM provider"
    );
    Ok(match config.backend {
        Backend::Local => Arc::new(OllamaProvider::from_config(config)),
        Backend::Remote => Arc::new(OpenAiProvider::from_config(config)?),
    })
}

/// Map a transport-level reqwest failure
pub(crate) fn send_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::BackendUnavailable(format!("Request timed out: {}", e))
    } else if e.is_connect() {
        LlmError::BackendUnavailable(format!("Cannot connect: {}", e))
    } else {
        LlmError::BackendUnavailable(format!("Request failed: {}", e))
    }
}

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(LlmError),
}

/// Mock LLM provider for deterministic testing
///
/// Returns pre-configured responses without making any network calls.
/// Clones share their response table and call count.
///
/// # Examples
///
/// ```
/// use docgraph_llm::{LlmError, MockProvider};
/// use docgraph_domain::traits::LlmProvider;
///
/// // Simple fixed response
/// let provider = MockProvider::new("Fixed response");
/// assert_eq!(provider.generate("any prompt").unwrap(), "Fixed response");
///
/// // Per-prompt responses
/// let provider = MockProvider::default();
/// provider.add_response("prompt1", "response1");
/// assert_eq!(provider.generate("prompt1").unwrap(), "response1");
///
/// // A backend that is down
/// let provider = MockProvider::unavailable();
/// assert!(matches!(provider.generate("x"), Err(LlmError::BackendUnavailable(_))));
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    model: String,
    default_reply: MockReply,
    responses: Arc<Mutex<HashMap<String, MockReply>>>,
    call_count: Arc<Mutex<usize>>,
    delay: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    /// Create a MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self::with_default(MockReply::Text(response.into()))
    }

    /// Create a MockProvider whose every call fails with `BackendUnavailable`
    pub fn unavailable() -> Self {
        Self::with_default(MockReply::Fail(LlmError::BackendUnavailable(
            "mock backend offline".to_string(),
        )))
    }

    /// Create a MockProvider whose every call fails with `error`
    pub fn failing(error: LlmError) -> Self {
        Self::with_default(MockReply::Fail(error))
    }

    fn with_default(default_reply: MockReply) -> Self {
        Self {
            model: "mock".to_string(),
            default_reply,
            responses: Arc::new(Mutex::new(HashMap::new())),
            call_count: Arc::new(Mutex::new(0)),
            delay: None,
        }
    }

    /// Set the reported model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sleep this long inside every call (for timeout tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a specific response for a given prompt
    pub fn add_response(&self, prompt: impl Into<String>, response: impl Into<String>) {
        lock(&self.responses).insert(prompt.into(), MockReply::Text(response.into()));
    }

    /// Configure to return an error for a specific prompt
    pub fn add_error(&self, prompt: impl Into<String>, error: LlmError) {
        lock(&self.responses).insert(prompt.into(), MockReply::Fail(error));
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        *lock(&self.call_count) = 0;
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(r#"{"nodes":[],"edges":[]}"#)
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        *lock(&self.call_count) += 1;

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let reply = lock(&self.responses)
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| self.default_reply.clone());

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(err) => Err(err),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_default() {
        let provider = MockProvider::new("Test response");
        assert_eq!(provider.generate("any prompt").unwrap(), "Test response");
        assert_eq!(provider.model_name(), "mock");
    }

    #[test]
    fn test_mock_provider_specific_responses() {
        let provider = MockProvider::new("fallthrough");
        provider.add_response("hello", "world");
        provider.add_response("foo", "bar");

        assert_eq!(provider.generate("hello").unwrap(), "world");
        assert_eq!(provider.generate("foo").unwrap(), "bar");
        assert_eq!(provider.generate("unknown").unwrap(), "fallthrough");
    }

    #[test]
    fn test_mock_provider_call_count() {
        let provider = MockProvider::new("test");
        assert_eq!(provider.call_count(), 0);

        provider.generate("prompt1").unwrap();
        provider.generate("prompt2").unwrap();
        assert_eq!(provider.call_count(), 2);

        provider.reset_call_count();
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_mock_provider_error() {
        let provider = MockProvider::default();
        provider.add_error("bad prompt", LlmError::InvalidResponse("garbled".into()));

        let result = provider.generate("bad prompt");
        assert_eq!(result, Err(LlmError::InvalidResponse("garbled".into())));
        assert!(provider.generate("good prompt").is_ok());
    }

    #[test]
    fn test_mock_provider_clone_shares_state() {
        let provider1 = MockProvider::new("test").with_model("tiny");
        let provider2 = provider1.clone();

        provider1.generate("test").unwrap();
        provider2.add_response("late", "added");

        assert_eq!(provider2.call_count(), 1);
        assert_eq!(provider1.generate("late").unwrap(), "added");
        assert_eq!(provider2.model_name(), "tiny");
    }

    #[test]
    fn test_provider_from_config_local() {
        let provider = provider_from_config(&LlmConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "tinyllama");
    }

    #[test]
    fn test_provider_from_config_remote_without_key() {
        let config = LlmConfig {
            backend: Backend::Remote,
            ..LlmConfig::default()
        };
        assert!(matches!(
            provider_from_config(&config),
            Err(LlmError::Config(_))
        ));
    }
}
