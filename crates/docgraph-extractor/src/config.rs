//! Configuration for the Extractor (the `[extractor]` config section)

use crate::error::ExtractorError;
use serde::{Deserialize, Serialize};

/// Configuration for graph extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Source text is truncated to this many characters before prompting
    pub max_prompt_chars: usize,

    /// Use rule-based extraction when the backend is down instead of failing
    pub fallback_on_unavailable: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 2000,
            fallback_on_unavailable: true,
        }
    }
}

impl ExtractorConfig {
    /// Strict preset: surface backend outages instead of degrading
    pub fn strict() -> Self {
        Self {
            fallback_on_unavailable: false,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ExtractorError> {
        if self.max_prompt_chars == 0 {
            return Err(ExtractorError::Config(
                "max_prompt_chars must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ExtractorError> {
        toml::from_str(toml_str)
            .map_err(|e| ExtractorError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ExtractorError> {
        toml::to_string_pretty(self)
            .map_err(|e| ExtractorError::Config(format!("Failed to serialize to TOML: {}", e)))
    }
}
