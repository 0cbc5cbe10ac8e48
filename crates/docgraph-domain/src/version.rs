//! Version module - numbered graph snapshots

use crate::{DocumentId, Graph};
use serde::{Deserialize, Serialize};

/// Summary of one stored version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Per-document version number, starting at 1
    pub version_number: u32,

    /// Creation time (seconds since Unix epoch)
    pub created_at: u64,
}

/// A graph together with the version it was read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedGraph {
    /// Owning document
    pub document_id: DocumentId,

    /// Version number of this snapshot
    pub version: u32,

    /// Creation time (seconds since Unix epoch)
    pub created_at: u64,

    /// The snapshot itself
    #[serde(flatten)]
    pub graph: Graph,
}

/// Row counts across the whole store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of documents
    pub total_documents: u64,

    /// Number of versions across all documents
    pub total_versions: u64,

    /// Number of nodes across all versions
    pub total_nodes: u64,

    /// Number of edges across all versions
    pub total_edges: u64,

    /// Nodes per document (0 when there are no documents)
    pub avg_nodes_per_document: f64,

    /// Edges per document (0 when there are no documents)
    pub avg_edges_per_document: f64,
}

impl StoreStats {
    /// Build stats from raw counts, deriving the averages
    pub fn from_counts(documents: u64, versions: u64, nodes: u64, edges: u64) -> Self {
        let per_doc = |n: u64| {
            if documents == 0 {
                0.0
            } else {
                n as f64 / documents as f64
            }
        };

        Self {
            total_documents: documents,
            total_versions: versions,
            total_nodes: nodes,
            total_edges: edges,
            avg_nodes_per_document: per_doc(nodes),
            avg_edges_per_document: per_doc(edges),
        }
    }
}
