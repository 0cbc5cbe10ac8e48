//! docgraph Extractor
//!
//! Turns uploaded documents into entity/relationship graphs.
//!
//! # Architecture
//!
//! ```text
//! bytes → extract_text → GraphExtractor → LLM → parse_response → Graph
//!                                           ↘ (unavailable) fallback_graph
//! ```
//!
//! # Key Features
//!
//! - **Text extraction**: pdf, docx, txt and csv decoded to plain text
//! - **Staged parsing**: strict JSON, embedded JSON spans, arrow heuristics
//! - **Validation**: every returned edge resolves to a node of its graph
//! - **Fallback**: deterministic rule-based extraction when the LLM fails
//!
//! # Example Usage
//!
//! ```no_run
//! use docgraph_extractor::{extract_text, ExtractorConfig, GraphExtractor};
//! use docgraph_llm::MockProvider;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let llm = Arc::new(MockProvider::new(r#"{"nodes":[{"id":"n1","label":"Alice"}],"edges":[]}"#));
//! let extractor = GraphExtractor::new(llm, ExtractorConfig::default());
//!
//! let text = extract_text(b"Alice works at Acme Corp.", "txt")?;
//! let outcome = extractor.extract_graph(&text).await?;
//!
//! println!("{} nodes via {} stage", outcome.graph.nodes.len(), outcome.stage);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
mod fallback;
mod parser;
mod prompt;
mod text;
mod types;


pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub use extractor::GraphExtractor;
pub use fallback::{fallback_graph, MAX_FALLBACK_ENTITIES};
pub use parser::{parse_response, MAX_NODE_ID_LEN};
pub use prompt::PromptBuilder;
pub use text::extract_text;
pub use types::{ExtractionOutcome, ParseStage, ParsedGraph};
