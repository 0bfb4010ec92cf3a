use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use docshift_common::Result;
use docshift_db::DocumentStore;

use crate::id::MigrationId;

/// A reversible unit of change.
///
/// Both operations receive the live database handle; it is the same store
/// the ledger is written to. Either may await arbitrary I/O.
#[async_trait]
pub trait Migration: Send + Sync {
    async fn apply(&self, db: &dyn DocumentStore) -> Result<()>;

    async fn revert(&self, db: &dyn DocumentStore) -> Result<()>;
}

/// A migration resolved from its source, ready to be planned.
#[derive(Clone)]
pub struct MigrationDefinition {
    pub id: MigrationId,
    /// Name recorded as `migrationFilename` in the ledger.
    pub filename: String,
    pub migration: Arc<dyn Migration>,
}

impl MigrationDefinition {
    pub fn new(id: MigrationId, filename: impl Into<String>, migration: Arc<dyn Migration>) -> Self {
        Self {
            id,
            filename: filename.into(),
            migration,
        }
    }
}

impl fmt::Debug for MigrationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDefinition")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// Where migration definitions come from. The order of the returned list is
/// not significant.
pub trait MigrationSource: Send + Sync {
    fn discover(&self) -> Result<Vec<MigrationDefinition>>;
}

/// Migrations compiled into the program rather than read from disk.
#[derive(Default, Clone)]
pub struct MigrationRegistry {
    definitions: Vec<MigrationDefinition>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `migration` under an identifier such as `1700000000_add_users`.
    pub fn register(&mut self, id: &str, migration: Arc<dyn Migration>) -> Result<&mut Self> {
        let id: MigrationId = id.parse()?;
        self.definitions
            .push(MigrationDefinition::new(id.clone(), id.as_str(), migration));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl MigrationSource for MigrationRegistry {
    fn discover(&self) -> Result<Vec<MigrationDefinition>> {
        Ok(self.definitions.clone())
    }
}
