//! docgraph Domain Layer
//!
//! Core types and trait seams shared by every other docgraph crate. Nothing
//! here performs I/O; storage, LLM access and HTTP live in their own crates.
//!
//! ## Key Concepts
//!
//! - **Graph**: a node list plus an edge list extracted from one document
//! - **Document**: an uploaded file together with its extracted text
//! - **Version**: an immutable, numbered snapshot of a document's graph
//!
//! ## Architecture
//!
//! - Pure data and validation helpers only
//! - Trait definitions for the LLM backend and the persistent store
//! - Infrastructure implementations live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod graph;
pub mod traits;
pub mod version;

// Re-exports for convenience
pub use document::{Document, DocumentId, FileType, NewDocument};
pub use graph::{Graph, GraphEdge, GraphNode, DEFAULT_NODE_TYPE, DEFAULT_RELATIONSHIP};
pub use version::{StoreStats, VersionInfo, VersionedGraph};
