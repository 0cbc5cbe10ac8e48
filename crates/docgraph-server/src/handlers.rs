//! HTTP request handlers.
//!
//! Upload, versioned graph retrieval, update, cleanup and stats endpoints
//! using axum. The store sits behind a mutex that is never held across an
//! `.await`.

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::upload::{discard_upload, inspect_content, store_upload, validate_text, validate_upload};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use docgraph_domain::traits::{DocumentStore, LlmProvider, VersionStore};
use docgraph_domain::{
    Document, DocumentId, FileType, NewDocument, StoreStats, VersionInfo, VersionedGraph,
};
use docgraph_extractor::{extract_text, ExtractionOutcome, GraphExtractor, ParseStage};
use docgraph_llm::LlmError;
use docgraph_store::{SqliteStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Versions kept by `DELETE /documents/:id/versions` when `keep` is absent
pub const DEFAULT_KEEP_VERSIONS: i64 = 10;

/// Slack on top of `max_file_size` for multipart framing and text fields
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Appends re-read the document this many times before giving up
const UPDATE_ATTEMPTS: usize = 3;

/// Graph extractor over a provider chosen at startup
pub type SharedExtractor = Arc<GraphExtractor<dyn LlmProvider<Error = LlmError> + Send + Sync>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Document and version store
    pub store: Arc<Mutex<SqliteStore>>,
    /// LLM-backed graph extraction
    pub extractor: SharedExtractor,
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Bundle the components into shareable state
    pub fn new(store: SqliteStore, extractor: SharedExtractor, config: ServerConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            extractor,
            config: Arc::new(config),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, SqliteStore>, AppError> {
        self.store
            .lock()
            .map_err(|_| AppError::Internal("Store lock poisoned".to_string()))
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
    /// Whether the LLM is consulted during extraction
    pub llm_enabled: bool,
    /// Configured backend ("local" or "remote")
    pub backend: String,
    /// Configured model
    pub model: String,
}

/// Document metadata, without its text
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Document id
    pub id: DocumentId,
    /// Sanitized filename
    pub filename: String,
    /// File type
    pub file_type: FileType,
    /// Upload time (seconds since Unix epoch)
    pub upload_date: u64,
    /// Length of the extracted text, in characters
    pub text_length: usize,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            file_type: doc.file_type,
            upload_date: doc.upload_date,
            text_length: doc.text_content.chars().count(),
        }
    }
}

/// Result of an upload or update
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessedResponse {
    /// Document metadata after the operation
    #[serde(flatten)]
    pub document: DocumentSummary,
    /// Version created by the operation
    pub version: u32,
    /// "success"
    pub status: String,
    /// Human-readable summary
    pub message: String,
    /// Node count of the new version
    pub nodes: usize,
    /// Edge count of the new version
    pub edges: usize,
    /// Parser stage that produced the graph
    pub stage: ParseStage,
    /// Whether the graph came from the fallback because the LLM was down
    pub degraded: bool,
}

impl ProcessedResponse {
    fn new(document: &Document, version: u32, outcome: &ExtractionOutcome, message: String) -> Self {
        Self {
            document: DocumentSummary::from(document),
            version,
            status: "success".to_string(),
            message,
            nodes: outcome.graph.nodes.len(),
            edges: outcome.graph.edges.len(),
            stage: outcome.stage,
            degraded: outcome.degraded,
        }
    }
}

/// Version history of one document
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionListResponse {
    /// Document id
    pub document_id: DocumentId,
    /// Versions, newest first
    pub versions: Vec<VersionInfo>,
}

/// Query string of the cleanup endpoint
#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    /// Number of most recent versions to keep
    pub keep: Option<i64>,
}

/// Result of a cleanup
#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    /// Document id
    pub document_id: DocumentId,
    /// Versions removed
    pub deleted: usize,
    /// Requested number of versions to keep
    pub keep: i64,
}

/// How `POST /documents/:id/update` combines old and new text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Old text, a newline, then the new text
    #[default]
    Append,
    /// New text only
    Replace,
}

impl UpdateMode {
    /// Parse a form value ("append" or "replace", case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "append" => Some(UpdateMode::Append),
            "replace" => Some(UpdateMode::Replace),
            _ => None,
        }
    }

    /// Combine the stored text with the new text
    pub fn apply(self, existing: &str, new_text: &str) -> String {
        match self {
            UpdateMode::Replace => new_text.to_string(),
            UpdateMode::Append if existing.is_empty() => new_text.to_string(),
            UpdateMode::Append => format!("{}\n{}", existing, new_text),
        }
    }
}

/// A file received in a multipart body
struct FilePart {
    filename: String,
    bytes: Vec<u8>,
}

/// An uploaded file after validation and text extraction
struct DecodedFile {
    filename: String,
    file_type: FileType,
    bytes: Arc<Vec<u8>>,
    text: String,
}

/// Validate an uploaded file, inspect its content and extract its text
///
/// Nothing is written to disk.
async fn decode_file(state: &AppState, file: FilePart) -> Result<DecodedFile, AppError> {
    let upload = validate_upload(&file.filename, file.bytes.len(), state.config.max_file_size)?;
    inspect_content(upload.file_type, &file.bytes)?;

    let file_type = upload.file_type;
    let bytes = Arc::new(file.bytes);
    let decode_bytes = Arc::clone(&bytes);
    let text = tokio::task::spawn_blocking(move || extract_text(&decode_bytes, file_type.as_str()))
        .await
        .map_err(|e| AppError::Internal(format!("Text extraction task failed: {}", e)))??;

    Ok(DecodedFile {
        filename: upload.filename,
        file_type,
        bytes,
        text,
    })
}

/// GET / - Service name, version and endpoint map
async fn root() -> Json<Value> {
    Json(json!({
        "message": "docgraph knowledge graph API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "upload": "/documents/upload",
            "list_documents": "/documents",
            "get_document": "/documents/{document_id}",
            "get_graph": "/documents/{document_id}/graph",
            "list_versions": "/documents/{document_id}/versions",
            "get_version": "/documents/{document_id}/versions/{version_number}",
            "update": "/documents/{document_id}/update",
            "cleanup": "/documents/{document_id}/versions?keep=N",
            "stats": "/stats"
        }
    }))
}

/// GET /health - Liveness and LLM settings
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        llm_enabled: state.extractor.llm_enabled(),
        backend: state.config.llm.backend.as_str().to_string(),
        model: state.extractor.model_name().to_string(),
    })
}

/// POST /documents/upload - Store a document and extract its first graph version
async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessedResponse>, AppError> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?.to_vec();
            file = Some(FilePart { filename, bytes });
        }
    }
    let file = file.ok_or_else(|| AppError::BadRequest("Missing multipart field 'file'".to_string()))?;

    let decoded = decode_file(&state, file)
        .await
        .map_err(|e| e.during("upload"))?;

    let outcome = state
        .extractor
        .extract_graph(&decoded.text)
        .await
        .map_err(|e| AppError::from(e).during(format!("extract graph for {}", decoded.filename)))?;

    // Written last so that a failed upload leaves no file behind
    let path = store_upload(FsPath::new(&state.config.upload_dir), &decoded.filename, &decoded.bytes)
        .await
        .map_err(|e| AppError::from(e).during("upload"))?;

    let new_doc = NewDocument {
        filename: decoded.filename,
        file_type: decoded.file_type,
        file_path: path.to_string_lossy().into_owned(),
        text_content: decoded.text,
    };
    let stored = state.store().and_then(|mut store| {
        store
            .create_document_with_graph(new_doc, &outcome.graph)
            .map_err(|e| AppError::from(e).during("store upload"))
    });
    let (document, version) = match stored {
        Ok(stored) => stored,
        Err(e) => {
            discard_upload(&path).await;
            return Err(e);
        }
    };

    info!(
        document_id = document.id,
        filename = %document.filename,
        stage = %outcome.stage,
        degraded = outcome.degraded,
        "Upload processed"
    );
    Ok(Json(ProcessedResponse::new(
        &document,
        version,
        &outcome,
        "Document processed and knowledge graph extracted".to_string(),
    )))
}

/// GET /documents - All documents, newest first
async fn list_documents(State(state): State<AppState>) -> Result<Json<Vec<DocumentSummary>>, AppError> {
    let documents = state
        .store()?
        .list_documents()
        .map_err(|e| AppError::from(e).during("list documents"))?;
    Ok(Json(documents.iter().map(DocumentSummary::from).collect()))
}

/// GET /documents/:id - Document metadata
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> Result<Json<DocumentSummary>, AppError> {
    let document = find_document(&state, id, "get document")?;
    Ok(Json(DocumentSummary::from(&document)))
}

/// GET /documents/:id/graph - Current graph version
async fn get_graph(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> Result<Json<VersionedGraph>, AppError> {
    let graph = state
        .store()?
        .get_current(id)
        .map_err(|e| AppError::from(e).during(format!("get graph for document {}", id)))?;
    Ok(Json(graph))
}

/// GET /documents/:id/versions - Version history, newest first
async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> Result<Json<VersionListResponse>, AppError> {
    let versions = state
        .store()?
        .list_versions(id)
        .map_err(|e| AppError::from(e).during(format!("list versions of document {}", id)))?;
    Ok(Json(VersionListResponse {
        document_id: id,
        versions,
    }))
}

/// GET /documents/:id/versions/:n - Graph at version n
async fn get_version(
    State(state): State<AppState>,
    Path((id, version)): Path<(DocumentId, u32)>,
) -> Result<Json<VersionedGraph>, AppError> {
    let graph = state.store()?.get_version(id, version).map_err(|e| {
        AppError::from(e).during(format!("get version {} of document {}", version, id))
    })?;
    Ok(Json(graph))
}

/// POST /documents/:id/update - Add or replace text and create the next version
///
/// Multipart fields: `new_text` or `file`, and optionally `mode`. A file sent
/// here only contributes its text; it is not stored. An append is applied to
/// the text as stored at write time: if another update lands while the graph
/// is being extracted, the append is recomputed on the newer text.
async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    mut multipart: Multipart,
) -> Result<Json<ProcessedResponse>, AppError> {
    let operation = format!("update document {}", id);
    find_document(&state, id, &operation)?;

    let mut new_text = None;
    let mut file = None;
    let mut mode = UpdateMode::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("new_text") => new_text = Some(field.text().await?),
            Some("mode") => {
                let value = field.text().await?;
                mode = UpdateMode::parse(&value).ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "Invalid mode '{}': expected 'append' or 'replace'",
                        value
                    ))
                })?;
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?.to_vec();
                file = Some(FilePart { filename, bytes });
            }
            _ => {}
        }
    }

    let incoming = match (new_text.filter(|t| !t.trim().is_empty()), file) {
        (Some(text), _) => {
            validate_text(&text).map_err(|e| AppError::from(e).during(&operation))?;
            text
        }
        (None, Some(file)) => {
            decode_file(&state, file)
                .await
                .map_err(|e| e.during(&operation))?
                .text
        }
        (None, None) => {
            return Err(AppError::BadRequest(
                "Provide either new_text or a file for update".to_string(),
            ))
        }
    };

    for attempt in 1..=UPDATE_ATTEMPTS {
        let existing = find_document(&state, id, &operation)?;
        let text = mode.apply(&existing.text_content, &incoming);
        let outcome = state
            .extractor
            .extract_graph(&text)
            .await
            .map_err(|e| AppError::from(e).during(&operation))?;

        let written = {
            let mut store = state.store()?;
            match mode {
                UpdateMode::Append => store.update_document_if_unchanged(
                    id,
                    &existing.text_content,
                    &text,
                    &outcome.graph,
                ),
                UpdateMode::Replace => store.update_document_with_graph(id, &text, &outcome.graph),
            }
        };

        let version = match written {
            Ok(version) => version,
            Err(StoreError::DocumentChanged(_)) if attempt < UPDATE_ATTEMPTS => {
                warn!(document_id = id, attempt, "Document changed during update, retrying");
                continue;
            }
            Err(e) => return Err(AppError::from(e).during(&operation)),
        };

        let updated = Document {
            text_content: text,
            ..existing
        };
        return Ok(Json(ProcessedResponse::new(
            &updated,
            version,
            &outcome,
            format!("Document updated and new version {} created", version),
        )));
    }

    Err(AppError::Conflict(format!(
        "{}: document kept changing, try again",
        operation
    )))
}

/// DELETE /documents/:id/versions?keep=N - Remove all but the newest N versions
async fn cleanup_versions(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    Query(params): Query<CleanupParams>,
) -> Result<Json<CleanupResponse>, AppError> {
    let keep = params.keep.unwrap_or(DEFAULT_KEEP_VERSIONS);
    let deleted = state
        .store()?
        .cleanup(id, keep)
        .map_err(|e| AppError::from(e).during(format!("clean up versions of document {}", id)))?;

    Ok(Json(CleanupResponse {
        document_id: id,
        deleted,
        keep,
    }))
}

/// GET /stats - Store-wide counts
async fn stats(State(state): State<AppState>) -> Result<Json<StoreStats>, AppError> {
    let stats = state
        .store()?
        .stats()
        .map_err(|e| AppError::from(e).during("collect stats"))?;
    Ok(Json(stats))
}

fn find_document(state: &AppState, id: DocumentId, operation: &str) -> Result<Document, AppError> {
    state
        .store()?
        .get_document(id)
        .map_err(|e| AppError::from(e).during(operation))?
        .ok_or_else(|| AppError::NotFound(format!("{}: Document not found: {}", operation, id)))
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(BODY_LIMIT_SLACK);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .route("/documents", get(list_documents))
        .route("/documents/upload", post(upload_document))
        .route("/documents/:id", get(get_document))
        .route("/documents/:id/graph", get(get_graph))
        .route("/documents/:id/update", post(update_document))
        .route(
            "/documents/:id/versions",
            get(list_versions).delete(cleanup_versions),
        )
        .route("/documents/:id/versions/:version", get(get_version))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_mode_parse() {
        assert_eq!(UpdateMode::parse("append"), Some(UpdateMode::Append));
        assert_eq!(UpdateMode::parse(" REPLACE "), Some(UpdateMode::Replace));
        assert_eq!(UpdateMode::parse("merge"), None);
        assert_eq!(UpdateMode::default(), UpdateMode::Append);
    }

    #[test]
    fn test_update_mode_apply() {
        assert_eq!(UpdateMode::Append.apply("old", "new"), "old\nnew");
        assert_eq!(UpdateMode::Append.apply("", "new"), "new");
        assert_eq!(UpdateMode::Replace.apply("old", "new"), "new");
    }
}
