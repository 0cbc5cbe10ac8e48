//! Graph extraction: prompt the LLM, parse its answer, fall back when needed

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::fallback::fallback_graph;
use crate::parser::parse_response;
use crate::prompt::PromptBuilder;
use crate::types::{ExtractionOutcome, ParsedGraph};
use docgraph_domain::traits::LlmProvider;
use docgraph_llm::{LlmConfig, LlmError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Extracts a graph from document text using an LLM provider
///
/// Generic over the provider so tests can use `MockProvider` and the server
/// can use a provider chosen from configuration.
pub struct GraphExtractor<L: ?Sized> {
    provider: Arc<L>,
    config: ExtractorConfig,
    llm_enabled: bool,
    timeout: Duration,
}

impl<L> GraphExtractor<L>
where
    L: LlmProvider<Error = LlmError> + ?Sized + Send + Sync + 'static,
{
    /// Create an extractor with the LLM enabled and a 120 second timeout
    pub fn new(provider: Arc<L>, config: ExtractorConfig) -> Self {
        Self {
            provider,
            config,
            llm_enabled: true,
            timeout: Duration::from_secs(120),
        }
    }

    /// Create an extractor honoring the `[llm]` section's switch and timeout
    pub fn from_llm_config(provider: Arc<L>, llm: &LlmConfig, config: ExtractorConfig) -> Self {
        Self::new(provider, config)
            .with_llm_enabled(llm.enabled)
            .with_timeout(Duration::from_secs(llm.timeout_seconds))
    }

    /// Set the upper bound on one LLM call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable the LLM; when disabled only rule-based extraction runs
    pub fn with_llm_enabled(mut self, enabled: bool) -> Self {
        self.llm_enabled = enabled;
        self
    }

    /// Extraction configuration in use
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Model name reported by the provider
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Whether the LLM is consulted
    pub fn llm_enabled(&self) -> bool {
        self.llm_enabled
    }

    /// Extract a graph from `text`
    ///
    /// Every returned edge references nodes of the returned graph. The LLM is
    /// called at most once.
    ///
    /// # Errors
    ///
    /// [`ExtractorError::BackendUnavailable`] when the backend cannot be
    /// reached (or times out) and `fallback_on_unavailable` is off.
    pub async fn extract_graph(&self, text: &str) -> Result<ExtractionOutcome, ExtractorError> {
        let start = Instant::now();

        if !self.llm_enabled || text.trim().is_empty() {
            debug!(llm_enabled = self.llm_enabled, "Using rule-based extraction");
            return Ok(self.outcome(ParsedGraph::fallback(fallback_graph(text)), false, start));
        }

        let prompt = PromptBuilder::new(text)
            .with_max_chars(self.config.max_prompt_chars)
            .build();
        debug!(prompt_chars = prompt.len(), "Built extraction prompt");

        let parsed = match self.call_llm(prompt).await {
            Ok(response) => {
                debug!(response_chars = response.len(), "LLM response received");
                parse_response(&response, text)?
            }
            Err(LlmError::InvalidResponse(msg)) => {
                warn!(error = %msg, "Unreadable LLM response, using fallback extraction");
                parse_response("", text)?
            }
            Err(e) => {
                if !self.config.fallback_on_unavailable {
                    return Err(ExtractorError::BackendUnavailable(e.to_string()));
                }
                warn!(error = %e, "LLM backend unavailable, using fallback extraction");
                return Ok(self.outcome(ParsedGraph::fallback(fallback_graph(text)), true, start));
            }
        };

        let outcome = self.outcome(parsed, false, start);
        info!(
            stage = %outcome.stage,
            nodes = outcome.graph.nodes.len(),
            edges = outcome.graph.edges.len(),
            dropped_edges = outcome.dropped_edges,
            elapsed_ms = outcome.processing_time_ms,
            "Graph extraction complete"
        );
        Ok(outcome)
    }

    fn outcome(&self, parsed: ParsedGraph, degraded: bool, start: Instant) -> ExtractionOutcome {
        ExtractionOutcome {
            graph: parsed.graph,
            stage: parsed.stage,
            dropped_edges: parsed.dropped_edges,
            merged_nodes: parsed.merged_nodes,
            degraded,
            model_name: self.provider.model_name().to_string(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Call the provider on the blocking pool, bounded by the timeout
    async fn call_llm(&self, prompt: String) -> Result<String, LlmError> {
        let provider = Arc::clone(&self.provider);
        let task = tokio::task::spawn_blocking(move || provider.generate(&prompt));

        match timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(LlmError::BackendUnavailable(format!(
                "LLM task failed: {}",
                join_err
            ))),
            Err(_) => Err(LlmError::BackendUnavailable(format!(
                "No response within {}s",
                self.timeout.as_secs_f64()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParseStage;
    use docgraph_llm::MockProvider;

    const GRAPH_JSON: &str = r#"{"nodes":[{"id":"n1","label":"Alice","type":"Person"},{"id":"n2","label":"Acme","type":"Organization"}],"edges":[{"source":"n1","target":"n2","relationship":"works_at"}]}"#;

    fn extractor(provider: MockProvider) -> GraphExtractor<MockProvider> {
        GraphExtractor::new(Arc::new(provider), ExtractorConfig::default())
    }

    #[tokio::test]
    async fn test_extract_from_llm_json() {
        let extractor = extractor(MockProvider::new(GRAPH_JSON).with_model("tinyllama"));
        let outcome = extractor.extract_graph("Alice works at Acme.").await.unwrap();

        assert_eq!(outcome.stage, ParseStage::Strict);
        assert_eq!(outcome.graph.nodes.len(), 2);
        assert_eq!(outcome.graph.edges.len(), 1);
        assert!(!outcome.degraded);
        assert_eq!(outcome.model_name, "tinyllama");
    }

    #[tokio::test]
    async fn test_disabled_llm_skips_provider() {
        let provider = MockProvider::new(GRAPH_JSON);
        let extractor = GraphExtractor::new(Arc::new(provider.clone()), ExtractorConfig::default())
            .with_llm_enabled(false);

        let outcome = extractor.extract_graph("Alice met Bob.").await.unwrap();
        assert_eq!(outcome.stage, ParseStage::Fallback);
        assert!(!outcome.degraded);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_text_skips_provider() {
        let provider = MockProvider::new(GRAPH_JSON);
        let extractor = extractor(provider.clone());

        let outcome = extractor.extract_graph("  ").await.unwrap();
        assert!(outcome.graph.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_backend_degrades() {
        let extractor = extractor(MockProvider::unavailable());
        let outcome = extractor.extract_graph("Alice met Bob.").await.unwrap();

        assert!(outcome.degraded);
        assert_eq!(outcome.stage, ParseStage::Fallback);
        assert_eq!(outcome.graph.nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_backend_without_fallback_errors() {
        let extractor = GraphExtractor::new(
            Arc::new(MockProvider::unavailable()),
            ExtractorConfig::strict(),
        );
        let result = extractor.extract_graph("Alice met Bob.").await;
        assert!(matches!(result, Err(ExtractorError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_model_treated_as_unavailable() {
        let extractor = extractor(MockProvider::failing(LlmError::ModelNotAvailable(
            "tinyllama".into(),
        )));
        let outcome = extractor.extract_graph("Alice met Bob.").await.unwrap();
        assert!(outcome.degraded);
    }

    #[tokio::test]
    async fn test_invalid_envelope_uses_fallback_without_degrading() {
        let extractor = extractor(MockProvider::failing(LlmError::InvalidResponse(
            "bad envelope".into(),
        )));
        let outcome = extractor.extract_graph("Alice met Bob.").await.unwrap();
        assert_eq!(outcome.stage, ParseStage::Fallback);
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn test_timeout_degrades() {
        let provider = MockProvider::new(GRAPH_JSON).with_delay(Duration::from_millis(500));
        let extractor = extractor(provider).with_timeout(Duration::from_millis(50));

        let outcome = extractor.extract_graph("Alice met Bob.").await.unwrap();
        assert!(outcome.degraded);
    }

    #[tokio::test]
    async fn test_prompt_is_truncated() {
        let provider = MockProvider::new(GRAPH_JSON);
        let config = ExtractorConfig {
            max_prompt_chars: 10,
            ..ExtractorConfig::default()
        };
        let text = "Alice works at Acme and this part is cut off";
        let expected_prompt = PromptBuilder::new(text).with_max_chars(10).build();
        provider.add_response(expected_prompt, r#"{"nodes":[{"label":"Truncated"}]}"#);

        let extractor = GraphExtractor::new(Arc::new(provider), config);
        let outcome = extractor.extract_graph(text).await.unwrap();
        assert_eq!(outcome.graph.nodes[0].label, "Truncated");
    }

    #[tokio::test]
    async fn test_from_llm_config() {
        let llm = LlmConfig {
            timeout_seconds: 7,
            ..LlmConfig::disabled()
        };
        let extractor = GraphExtractor::from_llm_config(
            Arc::new(MockProvider::default()),
            &llm,
            ExtractorConfig::default(),
        );
        assert!(!extractor.llm_enabled());
        assert_eq!(extractor.timeout, Duration::from_secs(7));
    }
}
