//! Version history: numbered, immutable graph snapshots per document

use crate::{document_exists, insert_version, SqliteStore, StoreError};
use docgraph_domain::traits::VersionStore;
use docgraph_domain::{DocumentId, Graph, GraphEdge, GraphNode, VersionInfo, VersionedGraph};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

impl VersionStore for SqliteStore {
    type Error = StoreError;

    fn create_version(&mut self, document_id: DocumentId, graph: &Graph) -> Result<u32, Self::Error> {
        let version = self.write_version(document_id, |tx| insert_version(tx, document_id, graph))?;
        info!(
            document_id,
            version,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Version created"
        );
        Ok(version)
    }

    fn get_current(&self, document_id: DocumentId) -> Result<VersionedGraph, Self::Error> {
        let row = self
            .conn
            .query_row(
                "SELECT id, version_number, created_at FROM versions
                 WHERE document_id = ?1 ORDER BY version_number DESC LIMIT 1",
                params![document_id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, u32>(1)?, row.get::<_, i64>(2)?)),
            )
            .optional()?;

        let (version_id, version, created_at) =
            row.ok_or(StoreError::DocumentNotFound(document_id))?;
        load_graph(&self.conn, document_id, version_id, version, created_at)
    }

    fn get_version(&self, document_id: DocumentId, version: u32) -> Result<VersionedGraph, Self::Error> {
        if !document_exists(&self.conn, document_id)? {
            return Err(StoreError::DocumentNotFound(document_id));
        }

        let row = self
            .conn
            .query_row(
                "SELECT id, created_at FROM versions
                 WHERE document_id = ?1 AND version_number = ?2",
                params![document_id, version],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        let (version_id, created_at) = row.ok_or(StoreError::VersionNotFound {
            document_id,
            version,
        })?;
        load_graph(&self.conn, document_id, version_id, version, created_at)
    }

    fn list_versions(&self, document_id: DocumentId) -> Result<Vec<VersionInfo>, Self::Error> {
        if !document_exists(&self.conn, document_id)? {
            return Err(StoreError::DocumentNotFound(document_id));
        }

        let mut stmt = self.conn.prepare(
            "SELECT version_number, created_at FROM versions
             WHERE document_id = ?1 ORDER BY version_number DESC",
        )?;
        let versions = stmt
            .query_map(params![document_id], |row| {
                Ok(VersionInfo {
                    version_number: row.get(0)?,
                    created_at: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    fn cleanup(&mut self, document_id: DocumentId, keep: i64) -> Result<usize, Self::Error> {
        if keep <= 0 {
            return Err(StoreError::InvalidArgument(format!(
                "keep must be at least 1, got {}",
                keep
            )));
        }
        if !document_exists(&self.conn, document_id)? {
            return Err(StoreError::DocumentNotFound(document_id));
        }

        let tx = self.conn.transaction()?;
        // Nodes and edges go with their version via ON DELETE CASCADE
        let deleted = tx.execute(
            "DELETE FROM versions
             WHERE document_id = ?1
               AND version_number NOT IN (
                   SELECT version_number FROM versions
                   WHERE document_id = ?1
                   ORDER BY version_number DESC
                   LIMIT ?2
               )",
            params![document_id, keep],
        )?;
        tx.commit()?;

        if deleted > 0 {
            info!(document_id, keep, deleted, "Old versions removed");
        }
        Ok(deleted)
    }
}

fn load_graph(
    conn: &Connection,
    document_id: DocumentId,
    version_id: i64,
    version: u32,
    created_at: i64,
) -> Result<VersionedGraph, StoreError> {
    let mut node_stmt = conn.prepare(
        "SELECT node_id, label, node_type FROM nodes WHERE version_id = ?1 ORDER BY id",
    )?;
    let nodes = node_stmt
        .query_map(params![version_id], |row| {
            Ok(GraphNode {
                id: row.get(0)?,
                label: row.get(1)?,
                node_type: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut edge_stmt = conn.prepare(
        "SELECT source_node_id, target_node_id, relationship FROM edges
         WHERE version_id = ?1 ORDER BY id",
    )?;
    let edges = edge_stmt
        .query_map(params![version_id], |row| {
            Ok(GraphEdge {
                source: row.get(0)?,
                target: row.get(1)?,
                relationship: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(VersionedGraph {
        document_id,
        version,
        created_at: created_at as u64,
        graph: Graph::new(nodes, edges),
    })
}
