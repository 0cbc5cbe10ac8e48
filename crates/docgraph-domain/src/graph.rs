//! Graph module - the entity/relationship graph extracted from a document

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Node type used when the source does not name one
pub const DEFAULT_NODE_TYPE: &str = "Entity";

/// Relationship used when the source does not name one
pub const DEFAULT_RELATIONSHIP: &str = "related_to";

/// An entity in the graph
///
/// `id` is only unique within the graph that owns the node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphNode {
    /// Identifier, unique within one graph (e.g., "n1")
    pub id: String,

    /// Human-readable entity name (e.g., "Acme Corp")
    pub label: String,

    /// Entity category (e.g., "Person", "Organization")
    #[serde(rename = "type")]
    pub node_type: String,
}

impl GraphNode {
    /// Create a new node
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type: node_type.into(),
        }
    }
}

/// A directed relationship between two nodes of the same graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Id of the source node
    pub source: String,

    /// Id of the target node
    pub target: String,

    /// Relationship name (e.g., "works_at")
    pub relationship: String,
}

impl GraphEdge {
    /// Create a new edge
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship: relationship.into(),
        }
    }
}

/// A node list plus an edge list
///
/// # Examples
///
/// ```
/// use docgraph_domain::{Graph, GraphNode, GraphEdge};
///
/// let graph = Graph::new(
///     vec![
///         GraphNode::new("n1", "Alice", "Person"),
///         GraphNode::new("n2", "Acme", "Organization"),
///     ],
///     vec![GraphEdge::new("n1", "n2", "works_at")],
/// );
/// assert!(graph.is_consistent());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    /// Entities
    #[serde(default)]
    pub nodes: Vec<GraphNode>,

    /// Relationships between entities
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    /// Create a graph from nodes and edges
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    /// The empty graph
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find a node by id
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Set of node ids
    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Edges whose source or target is not a node of this graph
    pub fn dangling_edges(&self) -> Vec<&GraphEdge> {
        let ids = self.node_ids();
        self.edges
            .iter()
            .filter(|e| !ids.contains(e.source.as_str()) || !ids.contains(e.target.as_str()))
            .collect()
    }

    /// Node ids that appear more than once, in first-repeat order
    pub fn duplicate_node_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) && !duplicates.contains(&node.id.as_str()) {
                duplicates.push(node.id.as_str());
            }
        }
        duplicates
    }

    /// Check the structural invariants
    ///
    /// Node ids are unique and non-blank, labels are non-blank, and every
    /// edge resolves to nodes of this graph.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(node) = self.nodes.iter().find(|n| n.id.trim().is_empty()) {
            return Err(format!("node '{}' has a blank id", node.label));
        }
        if let Some(node) = self.nodes.iter().find(|n| n.label.trim().is_empty()) {
            return Err(format!("node '{}' has a blank label", node.id));
        }
        if let Some(id) = self.duplicate_node_ids().first() {
            return Err(format!("duplicate node id '{}'", id));
        }
        if let Some(edge) = self.dangling_edges().first() {
            return Err(format!(
                "edge {} -[{}]-> {} references a missing node",
                edge.source, edge.relationship, edge.target
            ));
        }
        Ok(())
    }

    /// True when [`Graph::validate`] passes
    pub fn is_consistent(&self) -> bool {
        self.validate().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Graph {
        Graph::new(
            vec![
                GraphNode::new("n1", "John Doe", "Person"),
                GraphNode::new("n2", "Acme Corp", "Organization"),
            ],
            vec![GraphEdge::new("n1", "n2", "works_at")],
        )
    }

    #[test]
    fn test_consistent_graph() {
        let graph = sample();
        assert!(graph.is_consistent());
        assert!(graph.dangling_edges().is_empty());
        assert_eq!(graph.node("n2").unwrap().label, "Acme Corp");
    }

    #[test]
    fn test_dangling_edge_detected() {
        let mut graph = sample();
        graph.edges.push(GraphEdge::new("n1", "n9", "knows"));
        assert_eq!(graph.dangling_edges().len(), 1);
        assert!(graph.validate().unwrap_err().contains("n9"));
    }

    #[test]
    fn test_duplicate_ids_detected() {
        let mut graph = sample();
        graph.nodes.push(GraphNode::new("n1", "Jane", "Person"));
        graph.nodes.push(GraphNode::new("n1", "Jim", "Person"));
        assert_eq!(graph.duplicate_node_ids(), vec!["n1"]);
        assert!(!graph.is_consistent());
    }

    #[test]
    fn test_blank_label_rejected() {
        let graph = Graph::new(vec![GraphNode::new("n1", "  ", "Person")], vec![]);
        assert!(graph.validate().unwrap_err().contains("blank label"));
    }

    #[test]
    fn test_empty_graph() {
        let graph = Graph::empty();
        assert!(graph.is_empty());
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_node_type_serialized_as_type() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["nodes"][0]["type"], "Person");
        assert_eq!(json["edges"][0]["relationship"], "works_at");

        let back: Graph = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }
}
