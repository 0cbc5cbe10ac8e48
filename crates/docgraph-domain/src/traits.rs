//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::{Document, DocumentId, Graph, NewDocument, StoreStats, VersionInfo, VersionedGraph};

/// Trait for storing and retrieving documents
///
/// Implemented by the infrastructure layer (docgraph-store)
pub trait DocumentStore {
    /// Error type for store operations
    type Error;

    /// Insert a document and return its id
    fn create_document(&mut self, doc: NewDocument) -> Result<DocumentId, Self::Error>;

    /// Get a document by id
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, Self::Error>;

    /// All documents, newest upload first
    fn list_documents(&self) -> Result<Vec<Document>, Self::Error>;

    /// Row counts across the store
    fn stats(&self) -> Result<StoreStats, Self::Error>;
}

/// Trait for per-document graph version history
///
/// Version numbers start at 1 and increase by exactly 1 with each call to
/// [`VersionStore::create_version`]. Stored versions are never modified.
///
/// Implemented by the infrastructure layer (docgraph-store)
pub trait VersionStore {
    /// Error type for store operations
    type Error;

    /// Store `graph` as the next version of `document_id`; returns the new number
    fn create_version(&mut self, document_id: DocumentId, graph: &Graph)
        -> Result<u32, Self::Error>;

    /// The highest-numbered version
    fn get_current(&self, document_id: DocumentId) -> Result<VersionedGraph, Self::Error>;

    /// A specific version
    fn get_version(&self, document_id: DocumentId, version: u32)
        -> Result<VersionedGraph, Self::Error>;

    /// Every version, newest first
    fn list_versions(&self, document_id: DocumentId) -> Result<Vec<VersionInfo>, Self::Error>;

    /// Delete all but the `keep` most recent versions; returns the count deleted
    fn cleanup(&mut self, document_id: DocumentId, keep: i64) -> Result<usize, Self::Error>;
}

/// Trait for LLM provider operations
///
/// Calls are blocking; async callers are expected to move them off the
/// runtime (e.g. `tokio::task::spawn_blocking`).
///
/// Implemented by the infrastructure layer (docgraph-llm)
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Generate a completion for `prompt`
    fn generate(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Model identifier, recorded alongside extraction results
    fn model_name(&self) -> &str;
}
