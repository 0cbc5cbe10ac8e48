//! LLM prompt for entity and relationship extraction

/// Builds the extraction prompt around a (truncated) source text
pub struct PromptBuilder<'a> {
    text: &'a str,
    max_chars: usize,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder with the default 2000-character limit
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            max_chars: 2000,
        }
    }

    /// Limit how much of the source text is included
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Build the complete extraction prompt
    pub fn build(&self) -> String {
        let excerpt = truncate_chars(self.text, self.max_chars);

        let mut prompt = String::with_capacity(
            EXTRACTION_INSTRUCTIONS.len() + excerpt.len() + OUTPUT_FORMAT_REMINDER.len() + 32,
        );
        prompt.push_str(EXTRACTION_INSTRUCTIONS);
        prompt.push_str("\n\nText to analyze:\n");
        prompt.push_str(excerpt);
        prompt.push_str("\n\n");
        prompt.push_str(OUTPUT_FORMAT_REMINDER);
        prompt
    }
}

/// Longest prefix of `text` with at most `max_chars` characters
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"Extract entities and relationships from the following text and return ONLY a valid JSON object with this exact structure:

{
  "nodes": [
    {"id": "n1", "label": "Entity Name", "type": "Person"},
    {"id": "n2", "label": "Another Entity", "type": "Organization"}
  ],
  "edges": [
    {"source": "n1", "target": "n2", "relationship": "works_at"}
  ]
}

Entity types can be: Person, Organization, Location, Concept, Event, Product, Technology, etc.
Relationships should be concise verbs or phrases like: works_at, located_in, founded_by, created, manages, etc."#;

const OUTPUT_FORMAT_REMINDER: &str = "Return ONLY the JSON object, no other text.";
