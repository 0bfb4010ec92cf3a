use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
pub const DEFAULT_LEDGER_COLLECTION: &str = "migrations";

/// Settings read from `docshift.yml` / `docshift.toml`. Every field has a
/// default so an absent or partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// Directory holding `<timestamp>_<name>.<ext>` migration files,
    /// relative to the working directory.
    pub migrations_dir: PathBuf,

    /// Collection that records applied migrations.
    pub ledger_collection: String,

    pub project: Option<String>,

    /// Path to a credentials file. Falls back to `DOCSHIFT_CREDENTIALS`.
    pub credentials: Option<PathBuf>,

    /// Where per-project databases live when the credentials do not name one.
    pub data_dir: Option<PathBuf>,

    /// Treat ledger entries without a migration file as fatal.
    pub strict: bool,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            ledger_collection: DEFAULT_LEDGER_COLLECTION.to_string(),
            project: None,
            credentials: None,
            data_dir: None,
            strict: false,
        }
    }
}

impl MigratorConfig {
    /// Resolved data directory: configured value or `<platform data dir>/docshift`.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("docshift")
        })
    }
}
