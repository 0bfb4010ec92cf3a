//! The execution ledger: one document per applied migration.
//!
//! A migration counts as applied exactly when its entry exists. The runner
//! is the only writer.

use chrono::{DateTime, Utc};
use docshift_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::store::{Document, DocumentStore, OrderBy, SortDirection};

/// Default name of the ledger collection.
pub const DEFAULT_COLLECTION: &str = "migrations";

const CREATE_DATE_FIELD: &str = "createDate";

/// A completed migration as stored in the ledger collection.
///
/// The document id is `id`; the remaining fields form the document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(skip)]
    pub id: String,
    pub migration_filename: String,
    pub create_date: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl LedgerEntry {
    fn to_body(&self) -> Result<serde_json::Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::Other("ledger entry did not serialize to an object".into())),
        }
    }
}

pub struct Ledger<'a> {
    store: &'a dyn DocumentStore,
    collection: String,
}

impl<'a> Ledger<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// All entries ordered by creation date in `direction`.
    pub async fn entries(&self, direction: SortDirection) -> Result<Vec<LedgerEntry>> {
        let order = OrderBy {
            field: CREATE_DATE_FIELD.to_string(),
            direction,
        };
        let documents = self.store.list(&self.collection, Some(&order)).await?;

        documents
            .into_iter()
            .map(|doc| self.decode(doc))
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<Option<LedgerEntry>> {
        let Some(doc) = self.store.get(&self.collection, id).await? else {
            return Ok(None);
        };
        self.decode(doc).map(Some)
    }

    pub async fn record(&self, entry: &LedgerEntry) -> Result<()> {
        debug!("recording {}/{}", self.collection, entry.id);
        self.store
            .set(&self.collection, &entry.id, entry.to_body()?)
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        debug!("removing {}/{id}", self.collection);
        self.store.delete(&self.collection, id).await
    }

    fn decode(&self, doc: Document) -> Result<LedgerEntry> {
        let mut entry: LedgerEntry =
            serde_json::from_value(Value::Object(doc.data)).map_err(|e| {
                Error::Integrity(format!(
                    "ledger entry '{}/{}' is malformed: {e}",
                    self.collection, doc.id
                ))
            })?;
        entry.id = doc.id;
        Ok(entry)
    }
}
