//! Result types for parsing and extraction

use docgraph_domain::Graph;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which stage of response parsing produced the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStage {
    /// The whole response (minus a code fence) was a JSON graph
    Strict,

    /// A balanced JSON span inside the response was a graph
    SpanExtracted,

    /// Arrow and `label: Type` lines were read from prose
    Heuristic,

    /// Rule-based extraction over the source text
    Fallback,
}

impl ParseStage {
    /// Get the stage name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStage::Strict => "strict",
            ParseStage::SpanExtracted => "span_extracted",
            ParseStage::Heuristic => "heuristic",
            ParseStage::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated graph plus how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGraph {
    /// The graph; every edge resolves to one of its nodes
    pub graph: Graph,

    /// Stage that produced the graph
    pub stage: ParseStage,

    /// Edges dropped because an endpoint did not resolve, or because they were self-loops
    pub dropped_edges: usize,

    /// Nodes merged into an earlier node with the same label and type
    pub merged_nodes: usize,
}

impl ParsedGraph {
    pub(crate) fn fallback(graph: Graph) -> Self {
        Self {
            graph,
            stage: ParseStage::Fallback,
            dropped_edges: 0,
            merged_nodes: 0,
        }
    }
}

/// Result of one `extract_graph` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionOutcome {
    /// The extracted graph
    pub graph: Graph,

    /// Stage that produced the graph
    pub stage: ParseStage,

    /// Edges dropped during validation
    pub dropped_edges: usize,

    /// Nodes merged during validation
    pub merged_nodes: usize,

    /// True when the backend was unavailable and the fallback was used instead
    pub degraded: bool,

    /// Model that was asked (even when its answer was not used)
    pub model_name: String,

    /// Wall-clock time spent, in milliseconds
    pub processing_time_ms: u64,
}
