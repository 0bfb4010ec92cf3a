use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use docshift_common::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::store::{Document, DocumentStore, OrderBy, SortDirection};

/// Document store backed by a single SQLite file. Each document is one row
/// holding its JSON body; collections are a column, not separate tables.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening document store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("document store lock poisoned".into()))
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );",
        )
        .map_err(|e| Error::Database(format!("schema setup failed: {e}")))?;

        Ok(())
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to count documents: {e}")))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn list(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<Document>> {
        let conn = self.connection()?;

        let documents = match order {
            Some(order) => {
                validate_field_name(&order.field)?;
                let dir = match order.direction {
                    SortDirection::Ascending => "ASC",
                    SortDirection::Descending => "DESC",
                };
                let sql = format!(
                    "SELECT id, data FROM documents
                     WHERE collection = ?1
                     ORDER BY json_extract(data, ?2) {dir}, id {dir}"
                );
                let path = format!("$.{}", order.field);
                read_documents(&conn, &sql, params![collection, path])?
            }
            None => read_documents(
                &conn,
                "SELECT id, data FROM documents WHERE collection = ?1",
                params![collection],
            )?,
        };

        debug!("listed {} documents from '{collection}'", documents.len());
        Ok(documents)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let conn = self.connection()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Database(format!("failed to read document: {e}")))?;

        raw.map(|raw| Ok(Document::new(id, parse_body(&raw)?)))
            .transpose()
    }

    async fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<()> {
        let body = serde_json::to_string(&data)?;
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data",
            params![collection, id, body],
        )
        .map_err(|e| Error::Database(format!("failed to write {collection}/{id}: {e}")))?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )
        .map_err(|e| Error::Database(format!("failed to delete {collection}/{id}: {e}")))?;
        Ok(())
    }
}

fn read_documents<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Document>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

    let rows = stmt
        .query_map(params, |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| Error::Database(format!("failed to query documents: {e}")))?;

    let mut documents = Vec::new();
    for row in rows {
        let (id, raw) =
            row.map_err(|e| Error::Database(format!("failed to read document row: {e}")))?;
        documents.push(Document::new(id, parse_body(&raw)?));
    }
    Ok(documents)
}

fn parse_body(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Database(format!(
            "document body is not an object: {other}"
        ))),
    }
}

/// Ordering fields are interpolated into a JSON path, so only plain
/// identifiers are accepted.
fn validate_field_name(field: &str) -> Result<()> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Validation(format!(
            "invalid order-by field '{field}'"
        )));
    }
    Ok(())
}
