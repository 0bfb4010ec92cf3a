use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("naming error: {0}")]
    Naming(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("script error: {0}")]
    Script(String),

    /// A migration's own operation failed. `processed` counts the plan items
    /// that completed before the abort.
    #[error("migration '{id}' failed after {processed} completed: {reason}")]
    Execution {
        id: String,
        processed: usize,
        reason: String,
    },

    /// The migration ran but its ledger record could not be written or removed.
    #[error(
        "ledger update for '{id}' failed after {processed} completed, database and ledger are now out of sync: {reason}"
    )]
    Ledger {
        id: String,
        processed: usize,
        reason: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Number of plan items that completed before a run aborted, if this error
    /// came out of the runner.
    pub fn processed(&self) -> Option<usize> {
        match self {
            Error::Execution { processed, .. } | Error::Ledger { processed, .. } => Some(*processed),
            _ => None,
        }
    }
}
