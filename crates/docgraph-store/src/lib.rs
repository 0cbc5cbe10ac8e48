//! docgraph Storage Layer
//!
//! Implements the `DocumentStore` and `VersionStore` traits on SQLite.
//!
//! # Architecture
//!
//! - One `documents` row per upload, holding the extracted text
//! - One `versions` row per graph snapshot, numbered from 1 per document
//! - `nodes` and `edges` rows owned by a version (`ON DELETE CASCADE`)
//!
//! Version numbers are assigned inside an `IMMEDIATE` transaction, so two
//! connections to the same database file never hand out the same number.
//!
//! # Examples
//!
//! ```no_run
//! use docgraph_domain::{FileType, Graph, GraphNode, NewDocument};
//! use docgraph_domain::traits::VersionStore;
//! use docgraph_store::SqliteStore;
//!
//! let mut store = SqliteStore::new("knowledge_graph.db").unwrap();
//! let doc = NewDocument {
//!     filename: "notes.txt".to_string(),
//!     file_type: FileType::Txt,
//!     file_path: "uploads/notes.txt".to_string(),
//!     text_content: "Alice met Bob.".to_string(),
//! };
//! let graph = Graph::new(vec![GraphNode::new("n1", "Alice", "Person")], vec![]);
//!
//! let (document, version) = store.create_document_with_graph(doc, &graph).unwrap();
//! assert_eq!(version, 1);
//! assert_eq!(store.get_current(document.id).unwrap().graph, graph);
//! ```

#![warn(missing_docs)]

mod versions;

use docgraph_domain::traits::DocumentStore;
use docgraph_domain::{Document, DocumentId, FileType, Graph, NewDocument, StoreStats};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document does not exist (or has no versions)
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// Version does not exist for an existing document
    #[error("Version {version} not found for document {document_id}")]
    VersionNotFound {
        /// Owning document
        document_id: DocumentId,
        /// Requested version number
        version: u32,
    },

    /// Caller passed an argument outside the accepted range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Stored data could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Document text no longer matches what the caller last read
    #[error("Document {0} was modified concurrently")]
    DocumentChanged(DocumentId),

    /// Version number assignment kept colliding with another writer
    #[error("Version conflict for document {0}")]
    VersionConflict(DocumentId),
}

/// SQLite-based implementation of `DocumentStore` and `VersionStore`
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Each thread should have its own
/// `SqliteStore`, or share one behind a mutex.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // In-memory databases report "memory" and keep their journal mode
        let mode: String =
            self.conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "SQLite journal mode set");

        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Insert a document and its version 1 in one transaction
    pub fn create_document_with_graph(
        &mut self,
        doc: NewDocument,
        graph: &Graph,
    ) -> Result<(Document, u32), StoreError> {
        let (document, version) = self.write_version(0, |tx| {
            let document = insert_document(tx, &doc)?;
            let version = insert_version(tx, document.id, graph)?;
            Ok((document, version))
        })?;

        info!(
            document_id = document.id,
            filename = %document.filename,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Document stored"
        );
        Ok((document, version))
    }

    /// Replace a document's text and store `graph` as its next version
    ///
    /// Both writes happen in one transaction.
    pub fn update_document_with_graph(
        &mut self,
        id: DocumentId,
        text_content: &str,
        graph: &Graph,
    ) -> Result<u32, StoreError> {
        self.update_text_and_version(id, None, text_content, graph)
    }

    /// Like [`SqliteStore::update_document_with_graph`], but only while the
    /// stored text still equals `expected_text`
    ///
    /// Returns [`StoreError::DocumentChanged`] and writes nothing when another
    /// writer got there first.
    pub fn update_document_if_unchanged(
        &mut self,
        id: DocumentId,
        expected_text: &str,
        text_content: &str,
        graph: &Graph,
    ) -> Result<u32, StoreError> {
        self.update_text_and_version(id, Some(expected_text), text_content, graph)
    }

    fn update_text_and_version(
        &mut self,
        id: DocumentId,
        expected_text: Option<&str>,
        text_content: &str,
        graph: &Graph,
    ) -> Result<u32, StoreError> {
        let version = self.write_version(id, |tx| {
            let updated = match expected_text {
                Some(expected) => tx.execute(
                    "UPDATE documents SET text_content = ?1 WHERE id = ?2 AND text_content = ?3",
                    params![text_content, id, expected],
                )?,
                None => tx.execute(
                    "UPDATE documents SET text_content = ?1 WHERE id = ?2",
                    params![text_content, id],
                )?,
            };
            if updated == 0 {
                return Err(if document_exists(tx, id)? {
                    StoreError::DocumentChanged(id)
                } else {
                    StoreError::DocumentNotFound(id)
                });
            }
            insert_version(tx, id, graph)
        })?;

        info!(document_id = id, version, "Document updated");
        Ok(version)
    }

    /// Run `op` in an `IMMEDIATE` transaction, retrying once if the version
    /// number it picked was taken by another writer
    fn write_version<T>(
        &mut self,
        document_id: DocumentId,
        mut op: impl FnMut(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        for attempt in 0..2 {
            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?;

            match op(&tx) {
                Ok(value) => {
                    tx.commit()?;
                    return Ok(value);
                }
                Err(StoreError::Database(e)) if attempt == 0 && is_version_number_taken(&e) => {
                    warn!(document_id, "Version number taken by another writer, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::VersionConflict(document_id))
    }

    fn count(&self, table: &str) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

impl DocumentStore for SqliteStore {
    type Error = StoreError;

    fn create_document(&mut self, doc: NewDocument) -> Result<DocumentId, Self::Error> {
        let document = insert_document(&self.conn, &doc)?;
        info!(document_id = document.id, filename = %document.filename, "Document created");
        Ok(document.id)
    }

    fn get_document(&self, id: DocumentId) -> Result<Option<Document>, Self::Error> {
        let document = self
            .conn
            .query_row(
                "SELECT id, filename, file_type, file_path, upload_date, text_content
                 FROM documents WHERE id = ?1",
                params![id],
                row_to_document,
            )
            .optional()?;
        Ok(document)
    }

    fn list_documents(&self) -> Result<Vec<Document>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, file_type, file_path, upload_date, text_content
             FROM documents ORDER BY upload_date DESC, id DESC",
        )?;
        let documents = stmt
            .query_map([], row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    fn stats(&self) -> Result<StoreStats, Self::Error> {
        Ok(StoreStats::from_counts(
            self.count("documents")?,
            self.count("versions")?,
            self.count("nodes")?,
            self.count("edges")?,
        ))
    }
}

/// Current timestamp in seconds since Unix epoch
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// True for a collision on `UNIQUE(document_id, version_number)` only
fn is_version_number_taken(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && msg.contains("versions.version_number")
    )
}

pub(crate) fn document_exists(conn: &Connection, id: DocumentId) -> Result<bool, StoreError> {
    let exists = conn
        .query_row("SELECT 1 FROM documents WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?
        .is_some();
    Ok(exists)
}

fn insert_document(conn: &Connection, doc: &NewDocument) -> Result<Document, StoreError> {
    let upload_date = current_timestamp();
    conn.execute(
        "INSERT INTO documents (filename, file_type, file_path, upload_date, text_content)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            &doc.filename,
            doc.file_type.as_str(),
            &doc.file_path,
            upload_date as i64,
            &doc.text_content,
        ],
    )?;

    Ok(Document {
        id: conn.last_insert_rowid(),
        filename: doc.filename.clone(),
        file_type: doc.file_type,
        file_path: doc.file_path.clone(),
        upload_date,
        text_content: doc.text_content.clone(),
    })
}

/// Insert the next version of `document_id` with all of its nodes and edges
pub(crate) fn insert_version(
    conn: &Connection,
    document_id: DocumentId,
    graph: &Graph,
) -> Result<u32, StoreError> {
    graph
        .validate()
        .map_err(|reason| StoreError::InvalidArgument(format!("invalid graph: {}", reason)))?;
    if !document_exists(conn, document_id)? {
        return Err(StoreError::DocumentNotFound(document_id));
    }

    let next: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version_number), 0) + 1 FROM versions WHERE document_id = ?1",
        params![document_id],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO versions (document_id, version_number, created_at) VALUES (?1, ?2, ?3)",
        params![document_id, next, current_timestamp() as i64],
    )?;
    let version_id = conn.last_insert_rowid();

    let mut node_stmt = conn.prepare(
        "INSERT INTO nodes (document_id, version_id, node_id, label, node_type)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for node in &graph.nodes {
        node_stmt.execute(params![document_id, version_id, &node.id, &node.label, &node.node_type])?;
    }

    let mut edge_stmt = conn.prepare(
        "INSERT INTO edges (document_id, version_id, source_node_id, target_node_id, relationship)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for edge in &graph.edges {
        edge_stmt.execute(params![
            document_id,
            version_id,
            &edge.source,
            &edge.target,
            &edge.relationship
        ])?;
    }

    debug!(
        document_id,
        version = next,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Version rows written"
    );
    Ok(next)
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let type_str: String = row.get(2)?;
    let file_type = FileType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            Box::new(StoreError::InvalidData(format!("Unknown file type: {}", type_str))),
        )
    })?;

    Ok(Document {
        id: row.get(0)?,
        filename: row.get(1)?,
        file_type,
        file_path: row.get(3)?,
        upload_date: row.get::<_, i64>(4)? as u64,
        text_content: row.get(5)?,
    })
}
