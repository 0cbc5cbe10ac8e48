//! docgraph Server
//!
//! HTTP front end for document upload and versioned knowledge-graph
//! retrieval. Wires the store, the LLM provider and the extractor together
//! from one [`ServerConfig`].

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod upload;

use config::ServerConfig;
use docgraph_extractor::GraphExtractor;
use docgraph_llm::{provider_from_config, LlmError};
use docgraph_store::{SqliteStore, StoreError};
use handlers::{create_router, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Store could not be opened
    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),

    /// LLM provider could not be built
    #[error("Failed to configure LLM provider: {0}")]
    Llm(#[from] LlmError),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Open the store and build the extractor described by `config`
pub fn build_state(config: ServerConfig) -> Result<AppState, ServerError> {
    config.validate()?;

    let store = SqliteStore::new(&config.database_path)?;
    let provider = provider_from_config(&config.llm)?;
    let extractor = GraphExtractor::from_llm_config(provider, &config.llm, config.extractor.clone());

    Ok(AppState::new(store, Arc::new(extractor), config))
}

/// Start the HTTP server
///
/// Opens the store, configures the LLM provider and serves until the
/// process is stopped.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("Starting docgraph server");
    info!(database = %config.database_path, upload_dir = %config.upload_dir, "Storage");
    info!(
        llm_enabled = config.llm.enabled,
        backend = config.llm.backend.as_str(),
        model = %config.llm.model_name,
        "Extraction"
    );

    let bind_addr = config.bind_addr();
    std::fs::create_dir_all(&config.upload_dir)?;
    let state = build_state(config)?;
    let app = create_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_state_in_memory() {
        let config = ServerConfig {
            database_path: ":memory:".to_string(),
            llm: docgraph_llm::LlmConfig::disabled(),
            ..ServerConfig::default()
        };

        let state = build_state(config).unwrap();
        assert!(!state.extractor.llm_enabled());
        assert_eq!(state.extractor.model_name(), "tinyllama");
    }

    #[test]
    fn test_build_state_rejects_invalid_config() {
        let config = ServerConfig {
            bind_port: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(build_state(config), Err(ServerError::Config(_))));
    }
}
