use async_trait::async_trait;
use docshift_common::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single document: an id unique within its collection plus a JSON object body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordering requested from [`DocumentStore::list`]. Documents tie on `field`
/// are ordered by id in the same direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// The document database as seen by migrations and the ledger.
///
/// Implementations arrive already connected and authenticated; nothing in
/// the migration engine knows how the handle was obtained.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read every document of `collection`, optionally ordered by a top-level field.
    async fn list(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<Document>>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Create or fully replace the document `id`.
    async fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<()>;

    /// Delete the document `id`. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}
