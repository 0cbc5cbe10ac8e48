//! Backend selection and connection settings (the `[llm]` config section)

use crate::LlmError;
use serde::{Deserialize, Serialize};

/// Default local (Ollama) endpoint
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:11434";

/// Default remote (OpenAI-compatible) endpoint
pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://api.openai.com";

/// Which kind of backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Local Ollama server
    #[default]
    Local,

    /// Hosted OpenAI-compatible chat completions API
    Remote,
}

impl Backend {
    /// Name used in logs and the health endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Remote => "remote",
        }
    }
}

/// LLM backend configuration
///
/// # Examples
///
/// ```
/// use docgraph_llm::{Backend, LlmConfig};
///
/// let config = LlmConfig::default();
/// assert_eq!(config.backend, Backend::Local);
/// assert_eq!(config.timeout_seconds, 120);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// When false, graph extraction skips the backend and uses rule-based extraction
    pub enabled: bool,

    /// Local or remote backend
    pub backend: Backend,

    /// Base URL of the backend
    pub endpoint: String,

    /// Model identifier sent with every request
    pub model_name: String,

    /// Upper bound on one generation call
    pub timeout_seconds: u64,

    /// Bearer token; required for the remote backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: Backend::Local,
            endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            model_name: "tinyllama".to_string(),
            timeout_seconds: 120,
            api_key: None,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

impl LlmConfig {
    /// Preset for a hosted OpenAI-compatible backend
    pub fn remote(api_key: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            backend: Backend::Remote,
            endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            model_name: model_name.into(),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Preset that never contacts a backend
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.timeout_seconds == 0 {
            return Err(LlmError::Config("timeout_seconds must be > 0".to_string()));
        }
        if !self.enabled {
            return Ok(());
        }
        if self.endpoint.trim().is_empty() {
            return Err(LlmError::Config("endpoint must not be empty".to_string()));
        }
        if self.model_name.trim().is_empty() {
            return Err(LlmError::Config("model_name must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LlmError::Config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.backend == Backend::Remote
            && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(LlmError::Config(
                "api_key is required for the remote backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Endpoint with any trailing slash removed
    pub(crate) fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(LlmConfig::default().validate().is_ok());
        assert!(LlmConfig::disabled().validate().is_ok());
    }

    #[test]
    fn test_remote_requires_api_key() {
        let mut config = LlmConfig::remote("sk-test", "gpt-3.5-turbo");
        assert!(config.validate().is_ok());

        config.api_key = None;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LlmError::Config(_)));
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = LlmConfig {
            timeout_seconds: 0,
            ..LlmConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_skips_backend_checks() {
        let config = LlmConfig {
            enabled: false,
            model_name: String::new(),
            ..LlmConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: LlmConfig = toml::from_str(
            r#"
            backend = "remote"
            model_name = "gpt-4o-mini"
            api_key = "sk-abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, Backend::Remote);
        assert_eq!(config.model_name, "gpt-4o-mini");
        assert_eq!(config.timeout_seconds, 120);
        assert!(config.enabled);
    }

    #[test]
    fn test_base_url_trims_slash() {
        let config = LlmConfig {
            endpoint: "http://localhost:11434/".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(config.base_url(), "http://localhost:11434");
    }
}
