//! docgraph server CLI
//!
//! Starts the HTTP server for document upload and knowledge-graph retrieval.

use anyhow::Context;
use clap::Parser;
use docgraph_server::{config::ServerConfig, start_server};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// docgraph - turn documents into versioned knowledge graphs
#[derive(Debug, Parser)]
#[command(name = "docgraph-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DOCGRAPH_CONFIG")]
    config: Option<String>,

    /// Bind address as host:port, overriding the configuration file
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database path, overriding the configuration file
    #[arg(short, long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => {
            warn!("No config file specified, using defaults (see --help)");
            ServerConfig::default()
        }
    };

    if let Some(bind) = &cli.bind {
        let (host, port) = bind
            .rsplit_once(':')
            .with_context(|| format!("--bind must be host:port, got {}", bind))?;
        config.bind_address = host.to_string();
        config.bind_port = port
            .parse()
            .with_context(|| format!("Invalid port in --bind: {}", port))?;
    }
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    start_server(config).await?;
    Ok(())
}
