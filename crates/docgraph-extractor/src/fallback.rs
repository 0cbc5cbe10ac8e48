//! Rule-based entity and relationship extraction
//!
//! Used when the LLM is disabled, unreachable, or returns nothing usable.
//! The output depends only on the input text.

use docgraph_domain::{Graph, GraphEdge, GraphNode, DEFAULT_NODE_TYPE};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Maximum number of entities the fallback emits
pub const MAX_FALLBACK_ENTITIES: usize = 15;

const STOP_WORDS: [&str; 15] = [
    "In", "The", "A", "An", "This", "That", "These", "Those", "It", "Is", "Was", "Are", "Were",
    "Be", "Been",
];

/// One or more capitalized words separated by whitespace
const PHRASE: &str = r"[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*";

static CAPITALIZED_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\b{}\b", PHRASE)).expect("valid phrase pattern"));

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid sentence pattern"));

/// Sentence patterns; entity groups are case-sensitive, connecting words are not
static RELATION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    let e = format!(r"\b({})", PHRASE);
    let patterns: Vec<(String, &'static str)> = vec![
        (format!(r"{e}\s+(?i:is\s+the\s+CEO\s+of)\s+{e}"), "ceo_of"),
        (format!(r"{e}\s+(?i:is\s+the\s+CTO\s+of)\s+{e}"), "cto_of"),
        (
            format!(r"{e}\s+(?i:(?:works?|worked|working)\s+(?:as\s+a?\s*)?(?:\w+\s+)?(?:at|for|in|with))\s+{e}"),
            "works_at",
        ),
        (format!(r"{e}\s+(?i:founded)\s+{e}\s+(?i:in)\s+{e}"), "founded"),
        (
            format!(r"{e}\s+(?i:founded|established|created|started)\s+{e}"),
            "founded",
        ),
        (format!(r"{e}\s+(?i:in)\s+{e}\s+(?i:in)\s+\d{{4}}"), "located_in"),
        (
            format!(r"{e},?\s+(?i:(?:is\s+)?(?:headquartered|located|based)\s+in)\s+{e}"),
            "located_in",
        ),
        (
            format!(r"{e}\s+(?i:is\s+located\s+in)\s+(?i:the\s+)?{e}"),
            "located_in",
        ),
        (
            format!(r"{e}\s+(?i:acquired|bought|purchased)\s+{e}"),
            "acquired",
        ),
        (
            format!(r"{e}\s+(?i:manages|managed|leads|led|oversees)\s+(?i:the\s+)?{e}"),
            "manages",
        ),
        (
            format!(r"{e}\s+(?i:(?:now\s+)?serves\s+as)\s+(?:\w+\s+)?(?i:of)\s+{e}"),
            "member_of",
        ),
        (
            format!(r"{e}\s+(?i:developed)\s+(?i:an?\s+)?(?:\w+\s+)?(?i:platform\s+)?(?i:called)\s+{e}"),
            "developed",
        ),
        (
            format!(r"{e}\s+(?i:developed|built|designed|created)\s+{e}"),
            "developed",
        ),
        (format!(r"{e}\s+(?i:is\s+used\s+by)\s+{e}"), "used_by"),
    ];

    patterns
        .into_iter()
        .map(|(p, rel)| (Regex::new(&p).expect("valid relationship pattern"), rel))
        .collect()
});

const ORG_KEYWORDS: [&str; 10] = [
    "corporation", "corp", "company", "inc", "ltd", "llc", "university", "institute",
    "department", "division",
];
const LOCATION_KEYWORDS: [&str; 11] = [
    "city", "country", "state", "street", "avenue", "road", "york", "francisco", "london",
    "paris", "tokyo",
];
const TECH_KEYWORDS: [&str; 8] = ["bot", "app", "system", "platform", "software", "tool", "ai", "tech"];
const TITLE_KEYWORDS: [&str; 8] = [
    "engineer", "manager", "director", "ceo", "cto", "cfo", "president", "vice president",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.iter().any(|s| s.eq_ignore_ascii_case(word))
}

/// Remove leading stop words from a multi-word phrase ("The Acme Corp" -> "Acme Corp")
fn strip_leading_stop_words(phrase: &str) -> Option<&str> {
    let mut rest = phrase.trim();
    loop {
        match rest.split_once(char::is_whitespace) {
            Some((first, tail)) if is_stop_word(first) => rest = tail.trim_start(),
            _ => break,
        }
    }
    if rest.is_empty() || is_stop_word(rest) {
        None
    } else {
        Some(rest)
    }
}

/// Extract a graph from `text` without an LLM
///
/// Empty or whitespace-only text yields the empty graph; any other text
/// yields at least one node. Node ids are `n1, n2, ...` in first-seen order.
///
/// # Examples
///
/// ```
/// use docgraph_extractor::fallback_graph;
///
/// let graph = fallback_graph("Alice met Bob.");
/// let labels: Vec<_> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
/// assert_eq!(labels, vec!["Alice", "Bob"]);
/// ```
pub fn fallback_graph(text: &str) -> Graph {
    if text.trim().is_empty() {
        return Graph::empty();
    }

    let labels = entity_labels(text);
    let nodes: Vec<GraphNode> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| GraphNode::new(format!("n{}", i + 1), *label, guess_entity_type(label, text)))
        .collect();

    let mut edges = Vec::new();
    for sentence in SENTENCE_BREAK.split(text) {
        let sentence = sentence.trim();
        if !sentence.is_empty() {
            relationships_in_sentence(sentence, &nodes, &mut edges);
        }
    }

    Graph::new(nodes, edges)
}

fn entity_labels(text: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut labels: Vec<&str> = CAPITALIZED_PHRASE
        .find_iter(text)
        .filter_map(|m| strip_leading_stop_words(m.as_str()))
        .filter(|label| seen.insert(*label))
        .take(MAX_FALLBACK_ENTITIES)
        .collect();

    if labels.is_empty() {
        labels = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= 3)
            .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
            .filter(|w| !is_stop_word(w))
            .filter(|w| seen.insert(*w))
            .take(MAX_FALLBACK_ENTITIES)
            .collect();
    }

    if labels.is_empty() {
        labels.extend(text.split_whitespace().next());
    }

    labels
}

/// Guess an entity type from the entity's own words, then from its context
pub(crate) fn guess_entity_type(entity: &str, context: &str) -> &'static str {
    fn has_any(haystack: &str, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| haystack.contains(k))
    }

    let lower = entity.to_lowercase();
    if has_any(&lower, &ORG_KEYWORDS) {
        return "Organization";
    }
    if has_any(&lower, &LOCATION_KEYWORDS) {
        return "Location";
    }
    if has_any(&lower, &TECH_KEYWORDS) {
        return "Technology";
    }
    if has_any(&lower, &TITLE_KEYWORDS) {
        return "JobTitle";
    }

    let escaped = regex::escape(entity);
    let person_patterns = [
        format!(r"(?i){}\s+(?:is|was|works|worked|manages|founded)", escaped),
        format!(r"(?i)(?:Mr\.|Mrs\.|Dr\.|Ms\.)\s+{}", escaped),
        format!(r"(?i){}\s+(?:serves as|joined|left)", escaped),
    ];
    if person_patterns
        .iter()
        .any(|p| Regex::new(p).map(|re| re.is_match(context)).unwrap_or(false))
    {
        return "Person";
    }

    let words: Vec<&str> = entity.split_whitespace().collect();
    if words.len() == 2 && words.iter().all(|w| w.chars().next().is_some_and(char::is_uppercase)) {
        return "Person";
    }

    DEFAULT_NODE_TYPE
}

fn relationships_in_sentence(sentence: &str, nodes: &[GraphNode], edges: &mut Vec<GraphEdge>) {
    for (pattern, relationship) in RELATION_PATTERNS.iter() {
        for caps in pattern.captures_iter(sentence) {
            let source = caps.get(1).map(|m| m.as_str());
            let target = caps.get(2).map(|m| m.as_str());
            if let (Some(source), Some(target)) = (source, target) {
                add_edge(source, target, relationship, nodes, edges);
            }
            // "X founded Y in Z" also places Y in Z
            if let (Some(target), Some(location)) = (target, caps.get(3).map(|m| m.as_str())) {
                add_edge(target, location, "located_in", nodes, edges);
            }
        }
    }
}

fn find_node<'a>(phrase: &str, nodes: &'a [GraphNode]) -> Option<&'a GraphNode> {
    let phrase = strip_leading_stop_words(phrase)?;
    nodes.iter().find(|n| n.label.eq_ignore_ascii_case(phrase))
}

fn add_edge(
    source: &str,
    target: &str,
    relationship: &str,
    nodes: &[GraphNode],
    edges: &mut Vec<GraphEdge>,
) {
    let (Some(source), Some(target)) = (find_node(source, nodes), find_node(target, nodes)) else {
        return;
    };
    if source.id == target.id {
        return;
    }
    let edge = GraphEdge::new(source.id.clone(), target.id.clone(), relationship);
    if !edges.contains(&edge) {
        edges.push(edge);
    }
}
