//! Configuration file parsing for the server.
//!
//! Loads settings from TOML files: bind address, storage locations, upload
//! limits, and the `[llm]` and `[extractor]` sections.

use docgraph_extractor::ExtractorConfig;
use docgraph_llm::LlmConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default upload limit: 10 MiB
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration loaded from TOML
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8000)
    pub bind_port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Directory that receives uploaded files
    pub upload_dir: String,

    /// Largest accepted upload, in bytes
    pub max_file_size: usize,

    /// LLM backend settings
    pub llm: LlmConfig,

    /// Graph extraction settings
    pub extractor: ExtractorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8000,
            database_path: "knowledge_graph.db".to_string(),
            upload_dir: "uploads".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            llm: LlmConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges, including the nested sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_port == 0 {
            return Err(ConfigError::Invalid("bind_port must be > 0".to_string()));
        }
        if self.max_file_size == 0 {
            return Err(ConfigError::Invalid("max_file_size must be > 0".to_string()));
        }
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid("database_path must not be empty".to_string()));
        }
        if self.upload_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("upload_dir must not be empty".to_string()));
        }

        self.llm
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.extractor
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_llm::Backend;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
        assert_eq!(config.max_file_size, 10_485_760);
        assert!(config.llm.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "0.0.0.0"
            bind_port = 9000
            database_path = "/var/lib/docgraph/graph.db"
            max_file_size = 1024

            [llm]
            backend = "remote"
            endpoint = "https://llm.example.com"
            model_name = "gpt-4o-mini"
            api_key = "sk-test"
            timeout_seconds = 30

            [extractor]
            max_prompt_chars = 500
            fallback_on_unavailable = false
        "#;

        let config = ServerConfig::from_toml(toml).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.upload_dir, "uploads");
        assert_eq!(config.max_file_size, 1024);
        assert_eq!(config.llm.backend, Backend::Remote);
        assert_eq!(config.llm.timeout_seconds, 30);
        assert_eq!(config.extractor.max_prompt_chars, 500);
        assert!(!config.extractor.fallback_on_unavailable);
    }

    #[test]
    fn test_rejects_zero_values() {
        for toml in [
            "bind_port = 0",
            "max_file_size = 0",
            "[llm]\ntimeout_seconds = 0",
            "[extractor]\nmax_prompt_chars = 0",
        ] {
            let result = ServerConfig::from_toml(toml);
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "expected rejection for {:?}",
                toml
            );
        }
    }

    #[test]
    fn test_remote_backend_needs_api_key() {
        let result = ServerConfig::from_toml("[llm]\nbackend = \"remote\"");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = ServerConfig::from_toml("bind_port = \"eighty\"");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/docgraph.toml");
        let config = ServerConfig::from_file(path).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let result = ServerConfig::from_file("/nonexistent/docgraph.toml");
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }
}
