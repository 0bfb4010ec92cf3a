pub mod ledger;
pub mod sqlite_store;
pub mod store;

pub use ledger::{Ledger, LedgerEntry};
pub use sqlite_store::SqliteDocumentStore;
pub use store::{Document, DocumentStore, OrderBy, SortDirection};
