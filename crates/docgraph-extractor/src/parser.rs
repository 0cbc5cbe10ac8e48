//! Turn a raw LLM response into a validated graph
//!
//! Parsing runs in stages and stops at the first stage that yields a graph
//! candidate:
//!
//! 1. [`ParseStage::Strict`]: the whole response (minus a markdown code fence) is JSON
//! 2. [`ParseStage::SpanExtracted`]: a balanced `{...}` or `[...]` span inside the response
//! 3. [`ParseStage::Heuristic`]: `A -> B`, `A -[rel]-> B` and `label: Type` lines
//!
//! The candidate is then validated (blank labels dropped, duplicate nodes
//! merged, edges resolved by id or label). If no node survives, the
//! rule-based [`fallback_graph`](crate::fallback_graph) over the source text
//! is used instead.

use crate::error::ExtractorError;
use crate::fallback::fallback_graph;
use crate::types::{ParseStage, ParsedGraph};
use docgraph_domain::{Graph, GraphEdge, GraphNode, DEFAULT_NODE_TYPE, DEFAULT_RELATIONSHIP};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Ids longer than this are replaced with synthetic ones
pub const MAX_NODE_ID_LEN: usize = 50;

const NODE_KEYS: [&str; 2] = ["nodes", "entities"];
const EDGE_KEYS: [&str; 3] = ["edges", "relations", "relationships"];
const LABEL_KEYS: [&str; 2] = ["label", "name"];
const SOURCE_KEYS: [&str; 3] = ["source", "from", "subject"];
const TARGET_KEYS: [&str; 3] = ["target", "to", "object"];
const RELATIONSHIP_KEYS: [&str; 4] = ["relationship", "type", "label", "predicate"];

/// Types a free-standing `label: Type` line may declare
const ENTITY_TYPES: [&str; 9] = [
    "Person",
    "Organization",
    "Location",
    "Concept",
    "Event",
    "Product",
    "Technology",
    "Date",
    "Entity",
];

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+").expect("valid list marker pattern"));

static LABELED_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s*-+\s*\[\s*(.*?)\s*\]\s*-*>\s*(.+)$").expect("valid arrow pattern")
});

static PLAIN_ARROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*(?:-+>|→)\s*(.+)$").expect("valid arrow pattern"));

static TYPED_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]{1,100}?)\s*:\s*([A-Z][A-Za-z_]*)\s*$").expect("valid label pattern")
});

/// A node as found in the response, before validation
#[derive(Debug, Clone, PartialEq)]
struct RawNode {
    id: Option<String>,
    label: String,
    node_type: String,
}

/// An edge as found in the response; endpoints may be ids or labels
#[derive(Debug, Clone, PartialEq)]
struct RawEdge {
    source: String,
    target: String,
    relationship: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Candidate {
    nodes: Vec<RawNode>,
    edges: Vec<RawEdge>,
    /// Edge entries without a usable source or target
    malformed_edges: usize,
}

impl Candidate {
    fn has_nodes(&self) -> bool {
        self.nodes.iter().any(|n| !n.label.trim().is_empty())
    }
}

/// Parse `response` into a graph, falling back to rule-based extraction over
/// `source_text` when the response holds no usable nodes
///
/// Malformed responses never cause an error.
///
/// # Errors
///
/// [`ExtractorError::InvalidGraphShape`] if the final graph breaks a
/// structural invariant. Validation makes this unreachable in practice.
///
/// # Examples
///
/// ```
/// use docgraph_extractor::{parse_response, ParseStage};
///
/// let response = r#"Sure! {"nodes":[{"label":"John Doe","type":"Person"}],"edges":[]}"#;
/// let parsed = parse_response(response, "John Doe").unwrap();
/// assert_eq!(parsed.stage, ParseStage::SpanExtracted);
/// assert_eq!(parsed.graph.nodes.len(), 1);
/// ```
pub fn parse_response(response: &str, source_text: &str) -> Result<ParsedGraph, ExtractorError> {
    let parsed = match parse_stages(response) {
        Some((stage, candidate)) => {
            let (graph, dropped_edges, merged_nodes) = normalize(candidate);
            if graph.is_empty() {
                warn!(stage = %stage, "No usable nodes in LLM response, using fallback extraction");
                ParsedGraph::fallback(fallback_graph(source_text))
            } else {
                if dropped_edges > 0 {
                    warn!(dropped_edges, "Dropped unresolvable edges from LLM response");
                }
                ParsedGraph {
                    graph,
                    stage,
                    dropped_edges,
                    merged_nodes,
                }
            }
        }
        None => {
            warn!(
                response_chars = response.len(),
                "LLM response not recognizable as a graph, using fallback extraction"
            );
            ParsedGraph::fallback(fallback_graph(source_text))
        }
    };

    parsed
        .graph
        .validate()
        .map_err(ExtractorError::InvalidGraphShape)?;

    debug!(
        stage = %parsed.stage,
        nodes = parsed.graph.nodes.len(),
        edges = parsed.graph.edges.len(),
        merged_nodes = parsed.merged_nodes,
        "Parsed graph"
    );
    Ok(parsed)
}

fn parse_stages(response: &str) -> Option<(ParseStage, Candidate)> {
    let cleaned = strip_code_fence(response);

    if let Some(candidate) = serde_json::from_str::<Value>(cleaned)
        .ok()
        .and_then(|v| interpret(&v))
    {
        return Some((ParseStage::Strict, candidate));
    }

    // An empty template echoed ahead of the answer must not shadow it
    let mut first_empty = None;
    for candidate in balanced_spans(cleaned)
        .into_iter()
        .filter_map(|span| serde_json::from_str::<Value>(span).ok())
        .filter_map(|v| interpret(&v))
    {
        if candidate.has_nodes() {
            return Some((ParseStage::SpanExtracted, candidate));
        }
        first_empty.get_or_insert(candidate);
    }
    if let Some(candidate) = first_empty {
        return Some((ParseStage::SpanExtracted, candidate));
    }

    heuristic(cleaned).map(|candidate| (ParseStage::Heuristic, candidate))
}

/// Strip a surrounding markdown code fence (with or without a language tag)
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Balanced `{...}` and `[...]` spans, ordered by opening position
///
/// Brackets inside JSON strings are ignored. A mismatched closing bracket
/// abandons every span open at that point.
fn balanced_spans(text: &str) -> Vec<&str> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' if !stack.is_empty() => in_string = true,
            b'{' | b'[' => stack.push((byte, idx)),
            b'}' | b']' => {
                let open = if byte == b'}' { b'{' } else { b'[' };
                match stack.pop() {
                    Some((o, start)) if o == open => spans.push((start, idx + 1)),
                    Some(_) => stack.clear(),
                    None => {}
                }
            }
            _ => {}
        }
    }

    spans.sort_by_key(|&(start, _)| start);
    spans.into_iter().map(|(s, e)| &text[s..e]).collect()
}

/// Interpret a JSON value as a graph candidate
///
/// Accepts an object with a node list and/or an edge list (under any of the
/// known key aliases), or a bare array of node objects.
fn interpret(value: &Value) -> Option<Candidate> {
    match value {
        Value::Object(obj) => {
            let nodes = first_key(obj, &NODE_KEYS);
            let edges = first_key(obj, &EDGE_KEYS);
            if nodes.is_none() && edges.is_none() {
                return None;
            }

            let mut candidate = Candidate::default();
            if let Some(items) = nodes.and_then(Value::as_array) {
                candidate.nodes = items.iter().filter_map(interpret_node).collect();
            }
            if let Some(items) = edges.and_then(Value::as_array) {
                for item in items {
                    match interpret_edge(item) {
                        Some(edge) => candidate.edges.push(edge),
                        None => candidate.malformed_edges += 1,
                    }
                }
            }
            Some(candidate)
        }
        Value::Array(items) => {
            let nodes: Vec<RawNode> = items.iter().filter_map(interpret_node).collect();
            if nodes.is_empty() {
                None
            } else {
                Some(Candidate {
                    nodes,
                    ..Candidate::default()
                })
            }
        }
        _ => None,
    }
}

fn first_key<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_str))
}

fn first_scalar(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(scalar_id))
}

/// A string, or an integer rendered as a string
fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn interpret_node(value: &Value) -> Option<RawNode> {
    let obj = value.as_object()?;
    let label = first_str(obj, &LABEL_KEYS)?;
    let node_type = obj
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_NODE_TYPE);
    Some(RawNode {
        id: obj.get("id").and_then(scalar_id),
        label: label.to_string(),
        node_type: node_type.to_string(),
    })
}

fn interpret_edge(value: &Value) -> Option<RawEdge> {
    let obj = value.as_object()?;
    let source = first_scalar(obj, &SOURCE_KEYS)?;
    let target = first_scalar(obj, &TARGET_KEYS)?;
    let relationship = first_str(obj, &RELATIONSHIP_KEYS).unwrap_or(DEFAULT_RELATIONSHIP);
    Some(RawEdge {
        source,
        target,
        relationship: relationship.to_string(),
    })
}

/// Read arrow and `label: Type` lines out of free text
///
/// A `label: Type` line only declares a node when the type is a known entity
/// type or the label is an endpoint of some arrow line, so prose such as
/// `Answer: Yes` is ignored.
fn heuristic(text: &str) -> Option<Candidate> {
    let lines: Vec<String> = text
        .lines()
        .map(|line| LIST_MARKER.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    let mut candidate = Candidate::default();
    let mut endpoints: Vec<&str> = Vec::new();

    for line in &lines {
        let (source, relationship, target) = if let Some(caps) = LABELED_ARROW.captures(line) {
            (
                clean_label(group(&caps, 1)),
                clean_label(group(&caps, 2)),
                clean_label(group(&caps, 3)),
            )
        } else if let Some(caps) = PLAIN_ARROW.captures(line) {
            (
                clean_label(group(&caps, 1)),
                DEFAULT_RELATIONSHIP,
                clean_label(group(&caps, 2)),
            )
        } else {
            continue;
        };
        if source.is_empty() || target.is_empty() {
            candidate.malformed_edges += 1;
            continue;
        }
        endpoints.extend([source, target]);
        candidate.edges.push(RawEdge {
            source: source.to_string(),
            target: target.to_string(),
            relationship: relationship.to_string(),
        });
    }

    let referenced: HashSet<String> = endpoints.iter().map(|e| e.to_lowercase()).collect();
    let mut known: HashSet<String> = HashSet::new();

    // Typed declarations first so edges reuse their labels and types
    for line in &lines {
        if PLAIN_ARROW.is_match(line) {
            continue;
        }
        let Some(caps) = TYPED_LABEL.captures(line) else {
            continue;
        };
        let label = clean_label(group(&caps, 1));
        let node_type = group(&caps, 2);
        let declared = ENTITY_TYPES.contains(&node_type) || referenced.contains(&label.to_lowercase());
        if !label.is_empty() && declared && known.insert(label.to_lowercase()) {
            candidate.nodes.push(RawNode {
                id: None,
                label: label.to_string(),
                node_type: node_type.to_string(),
            });
        }
    }

    for label in endpoints {
        if known.insert(label.to_lowercase()) {
            candidate.nodes.push(RawNode {
                id: None,
                label: label.to_string(),
                node_type: DEFAULT_NODE_TYPE.to_string(),
            });
        }
    }

    if candidate.nodes.is_empty() {
        None
    } else {
        Some(candidate)
    }
}

fn group<'h>(caps: &Captures<'h>, index: usize) -> &'h str {
    caps.get(index).map_or("", |m| m.as_str())
}

/// Trim whitespace, quotes and trailing punctuation from a heuristic label
fn clean_label(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '*'))
        .trim_end_matches(|c| matches!(c, '.' | ',' | ';'))
        .trim()
}

/// Validate a candidate: drop blank labels, merge duplicates, resolve edges,
/// and assign synthetic ids when the given ones are unusable
///
/// Returns the graph, the number of dropped edges and the number of merged nodes.
fn normalize(candidate: Candidate) -> (Graph, usize, usize) {
    struct Kept {
        id: Option<String>,
        label: String,
        node_type: String,
    }

    let mut kept: Vec<Kept> = Vec::new();
    let mut by_key: HashMap<(String, String), usize> = HashMap::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut by_label: HashMap<String, usize> = HashMap::new();
    let mut merged_nodes = 0;

    for raw in candidate.nodes {
        let label = raw.label.trim();
        if label.is_empty() {
            continue;
        }
        let node_type = match raw.node_type.trim() {
            "" => DEFAULT_NODE_TYPE,
            t => t,
        };
        let id = raw.id.map(|id| id.trim().to_string());

        let key = (label.to_lowercase(), node_type.to_lowercase());
        let index = match by_key.get(&key) {
            Some(&existing) => {
                merged_nodes += 1;
                existing
            }
            None => {
                kept.push(Kept {
                    id: id.clone(),
                    label: label.to_string(),
                    node_type: node_type.to_string(),
                });
                by_key.insert(key, kept.len() - 1);
                kept.len() - 1
            }
        };

        if let Some(id) = id.filter(|id| !id.is_empty()) {
            by_id.entry(id).or_insert(index);
        }
        by_label.entry(label.to_lowercase()).or_insert(index);
    }

    let resolve = |endpoint: &str| {
        let endpoint = endpoint.trim();
        by_id
            .get(endpoint)
            .or_else(|| by_label.get(&endpoint.to_lowercase()))
            .copied()
    };

    let mut dropped_edges = candidate.malformed_edges;
    let mut seen_edges: HashSet<(usize, usize, String)> = HashSet::new();
    let mut edges: Vec<(usize, usize, String)> = Vec::new();
    for raw in candidate.edges {
        let (Some(source), Some(target)) = (resolve(&raw.source), resolve(&raw.target)) else {
            debug!(source = %raw.source, target = %raw.target, "Dropping unresolved edge");
            dropped_edges += 1;
            continue;
        };
        if source == target {
            dropped_edges += 1;
            continue;
        }
        let relationship = match raw.relationship.trim() {
            "" => DEFAULT_RELATIONSHIP.to_string(),
            r => r.to_string(),
        };
        let edge = (source, target, relationship);
        if seen_edges.insert(edge.clone()) {
            edges.push(edge);
        }
    }

    let ids_usable = {
        let mut seen = HashSet::new();
        kept.iter().all(|k| match &k.id {
            Some(id) => !id.is_empty() && id.chars().count() <= MAX_NODE_ID_LEN && seen.insert(id),
            None => false,
        })
    };

    let ids: Vec<String> = kept
        .iter()
        .enumerate()
        .map(|(i, k)| match (&k.id, ids_usable) {
            (Some(id), true) => id.clone(),
            _ => format!("n{}", i + 1),
        })
        .collect();

    let graph = Graph::new(
        kept.iter()
            .zip(&ids)
            .map(|(k, id)| GraphNode::new(id.clone(), k.label.clone(), k.node_type.clone()))
            .collect(),
        edges
            .into_iter()
            .map(|(s, t, r)| GraphEdge::new(ids[s].clone(), ids[t].clone(), r))
            .collect(),
    );

    (graph, dropped_edges, merged_nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(response: &str) -> ParsedGraph {
        parse_response(response, "Alice met Bob.").unwrap()
    }

    fn labels(parsed: &ParsedGraph) -> Vec<&str> {
        parsed.graph.nodes.iter().map(|n| n.label.as_str()).collect()
    }

    #[test]
    fn test_strict_json() {
        let parsed = parse(
            r#"{"nodes":[{"id":"a","label":"Alice","type":"Person"},{"id":"b","label":"Acme","type":"Organization"}],
                "edges":[{"source":"a","target":"b","relationship":"works_at"}]}"#,
        );
        assert_eq!(parsed.stage, ParseStage::Strict);
        assert_eq!(parsed.graph.nodes[0].id, "a");
        assert_eq!(parsed.graph.edges, vec![GraphEdge::new("a", "b", "works_at")]);
        assert_eq!(parsed.dropped_edges, 0);
    }

    #[test]
    fn test_strict_json_in_code_fence() {
        let parsed = parse("```json\n{\"nodes\":[{\"id\":\"n1\",\"label\":\"Alice\"}],\"edges\":[]}\n```");
        assert_eq!(parsed.stage, ParseStage::Strict);
        assert_eq!(parsed.graph.nodes[0].node_type, "Entity");
    }

    #[test]
    fn test_span_extracted_from_prose() {
        let parsed = parse(
            r#"Sure! {"nodes":[{"label":"John Doe","type":"Person"}],"edges":[]} Hope this helps."#,
        );
        assert_eq!(parsed.stage, ParseStage::SpanExtracted);
        assert_eq!(labels(&parsed), vec!["John Doe"]);
        assert_eq!(parsed.graph.nodes[0].id, "n1");
        assert!(parsed.graph.edges.is_empty());
    }

    #[test]
    fn test_span_ignores_braces_inside_strings() {
        let parsed = parse(
            r#"Result: {"nodes":[{"id":"n1","label":"Set {A}","type":"Concept"},{"id":"n2","label":"B ]","type":"Concept"}],"edges":[{"source":"n1","target":"n2"}]}"#,
        );
        assert_eq!(parsed.stage, ParseStage::SpanExtracted);
        assert_eq!(labels(&parsed), vec!["Set {A}", "B ]"]);
        assert_eq!(parsed.graph.edges[0].relationship, "related_to");
    }

    #[test]
    fn test_truncated_response_salvages_node_array() {
        let parsed = parse(
            r#"{"nodes":[{"id":"n1","label":"Alice","type":"Person"},{"id":"n2","label":"Bob","type":"Person"}],"edges":[{"source":"n1","#,
        );
        assert_eq!(parsed.stage, ParseStage::SpanExtracted);
        assert_eq!(labels(&parsed), vec!["Alice", "Bob"]);
        assert!(parsed.graph.edges.is_empty());
    }

    #[test]
    fn test_skips_spans_that_are_not_graphs() {
        let parsed = parse(
            r#"{"status":"ok"} then {"entities":[{"name":"Acme"}],"relations":[]}"#,
        );
        assert_eq!(parsed.stage, ParseStage::SpanExtracted);
        assert_eq!(labels(&parsed), vec!["Acme"]);
    }

    #[test]
    fn test_aliases_and_integer_ids() {
        let parsed = parse(
            r#"{"entities":[{"id":1,"name":"Alice","type":"Person"},{"id":2,"name":"Acme"}],
                "relationships":[{"from":1,"to":2,"predicate":"works_at"},{"subject":"Acme","object":"Alice","type":"employs"}]}"#,
        );
        assert_eq!(parsed.stage, ParseStage::Strict);
        assert_eq!(parsed.graph.nodes[0].id, "1");
        assert_eq!(
            parsed.graph.edges,
            vec![
                GraphEdge::new("1", "2", "works_at"),
                GraphEdge::new("2", "1", "employs"),
            ]
        );
    }

    #[test]
    fn test_bare_node_array() {
        let parsed = parse(r#"[{"label":"Alice"},{"label":"Bob"},"junk"]"#);
        assert_eq!(parsed.stage, ParseStage::Strict);
        assert_eq!(labels(&parsed), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_edges_resolved_by_label() {
        let parsed = parse(
            r#"{"nodes":[{"id":"p1","label":"Alice"},{"id":"o1","label":"Acme Corp"}],
                "edges":[{"source":"alice","target":"ACME CORP","relationship":"works_at"}]}"#,
        );
        assert_eq!(parsed.graph.edges, vec![GraphEdge::new("p1", "o1", "works_at")]);
    }

    #[test]
    fn test_dangling_and_self_loop_edges_dropped() {
        let parsed = parse(
            r#"{"nodes":[{"id":"n1","label":"Alice"},{"id":"n2","label":"Bob"}],
                "edges":[{"source":"n1","target":"n9"},{"source":"n1","target":"n1"},
                         {"source":"n1","target":"n2","relationship":"knows"},{"target":"n2"}]}"#,
        );
        assert_eq!(parsed.graph.edges, vec![GraphEdge::new("n1", "n2", "knows")]);
        assert_eq!(parsed.dropped_edges, 3);
        assert!(parsed.graph.is_consistent());
    }

    #[test]
    fn test_duplicate_nodes_merged_case_insensitively() {
        let parsed = parse(
            r#"{"nodes":[{"id":"n1","label":"Alice","type":"Person"},{"id":"n2","label":"ALICE","type":"person"},
                         {"id":"n3","label":"Alice","type":"Company"},{"id":"n4","label":"Bob"}],
                "edges":[{"source":"n2","target":"n4","relationship":"knows"},
                         {"source":"n1","target":"n4","relationship":"knows"}]}"#,
        );
        assert_eq!(parsed.merged_nodes, 1);
        assert_eq!(
            parsed.graph.nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
            vec!["n1", "n3", "n4"]
        );
        // Both edges collapse onto the surviving node; the duplicate is removed
        assert_eq!(parsed.graph.edges, vec![GraphEdge::new("n1", "n4", "knows")]);
    }

    #[test]
    fn test_blank_labels_and_relationships() {
        let parsed = parse(
            r#"{"nodes":[{"id":"n1","label":"  "},{"id":"n2","label":"Alice"},{"id":"n3","label":"Bob"}],
                "edges":[{"source":"n2","target":"n3","relationship":" "},{"source":"n1","target":"n3"}]}"#,
        );
        assert_eq!(labels(&parsed), vec!["Alice", "Bob"]);
        assert_eq!(parsed.graph.edges, vec![GraphEdge::new("n2", "n3", "related_to")]);
        assert_eq!(parsed.dropped_edges, 1);
    }

    #[test]
    fn test_synthetic_ids_when_ids_unusable() {
        let long_id = "x".repeat(MAX_NODE_ID_LEN + 1);
        let response = format!(
            r#"{{"nodes":[{{"id":"{}","label":"Alice"}},{{"id":"b","label":"Bob"}}],
                 "edges":[{{"source":"{}","target":"b"}}]}}"#,
            long_id, long_id
        );
        let parsed = parse(&response);
        assert_eq!(
            parsed.graph.nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
            vec!["n1", "n2"]
        );
        assert_eq!(parsed.graph.edges, vec![GraphEdge::new("n1", "n2", "related_to")]);
    }

    #[test]
    fn test_duplicate_ids_replaced() {
        let parsed = parse(
            r#"{"nodes":[{"id":"x","label":"Alice"},{"id":"x","label":"Bob"}],"edges":[]}"#,
        );
        assert_eq!(parsed.graph.nodes[0].id, "n1");
        assert_eq!(parsed.graph.nodes[1].id, "n2");
        assert!(parsed.graph.is_consistent());
    }

    #[test]
    fn test_heuristic_arrows_and_types() {
        let parsed = parse(
            "Here is what I found:\n- Alice: Person\n- Acme Corp: Organization\n1. Alice -[works_at]-> Acme Corp\n2. Acme Corp -> Springfield\n",
        );
        assert_eq!(parsed.stage, ParseStage::Heuristic);
        assert_eq!(labels(&parsed), vec!["Alice", "Acme Corp", "Springfield"]);
        assert_eq!(parsed.graph.nodes[0].node_type, "Person");
        assert_eq!(parsed.graph.nodes[2].node_type, "Entity");
        assert_eq!(
            parsed.graph.edges,
            vec![
                GraphEdge::new("n1", "n2", "works_at"),
                GraphEdge::new("n2", "n3", "related_to"),
            ]
        );
    }

    #[test]
    fn test_heuristic_ignores_prose_labels() {
        let parsed = parse("Answer: Yes\nNote: Unclear\nAlice: Person\nBob -[knows]-> Alice\nBob: Friend\n");
        assert_eq!(parsed.stage, ParseStage::Heuristic);
        assert_eq!(labels(&parsed), vec!["Alice", "Bob"]);
        assert_eq!(parsed.graph.nodes[1].node_type, "Friend");
        assert_eq!(parsed.graph.edges, vec![GraphEdge::new("n2", "n1", "knows")]);
    }

    #[test]
    fn test_prose_only_label_lines_fall_back() {
        let parsed = parse("Answer: Yes\nStatus: Done");
        assert_eq!(parsed.stage, ParseStage::Fallback);
        assert_eq!(labels(&parsed), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_echoed_empty_template_does_not_shadow_answer() {
        let parsed = parse(
            r#"Format: {"nodes":[],"edges":[]}
               Answer: {"nodes":[{"id":"a","label":"Alice","type":"Person"},{"id":"b","label":"Bob","type":"Person"}],
                        "edges":[{"source":"a","target":"b","relationship":"knows"}]}"#,
        );
        assert_eq!(parsed.stage, ParseStage::SpanExtracted);
        assert_eq!(labels(&parsed), vec!["Alice", "Bob"]);
        assert_eq!(parsed.graph.edges, vec![GraphEdge::new("a", "b", "knows")]);
    }

    #[test]
    fn test_garbage_falls_back() {
        let parsed = parse("I'm sorry, I can't help with that.");
        assert_eq!(parsed.stage, ParseStage::Fallback);
        assert_eq!(labels(&parsed), vec!["Alice", "Bob"]);
        assert!(parsed.graph.is_consistent());
    }

    #[test]
    fn test_empty_graph_json_falls_back() {
        let parsed = parse(r#"{"nodes":[],"edges":[]}"#);
        assert_eq!(parsed.stage, ParseStage::Fallback);
        assert_eq!(parsed.graph.nodes.len(), 2);
    }

    #[test]
    fn test_empty_response_and_empty_text() {
        let parsed = parse_response("", "").unwrap();
        assert_eq!(parsed.stage, ParseStage::Fallback);
        assert!(parsed.graph.is_empty());
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n[1]\n```\n"), "[1]");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_balanced_spans_order() {
        let spans = balanced_spans(r#"x {"a":[1,2]} y [3]"#);
        assert_eq!(spans, vec![r#"{"a":[1,2]}"#, "[1,2]", "[3]"]);
    }

    #[test]
    fn test_balanced_spans_escaped_quotes() {
        let spans = balanced_spans(r#"{"a":"he said \"}\""}"#);
        assert_eq!(spans, vec![r#"{"a":"he said \"}\""}"#]);
    }
}
