pub mod file_store;
pub mod id;
pub mod migration;
pub mod reconciler;
pub mod reporter;
pub mod runner;
pub mod scaffold;
pub mod script;

pub use file_store::FileStore;
pub use id::{MigrationId, validate_name};
pub use migration::{Migration, MigrationDefinition, MigrationRegistry, MigrationSource};
pub use reconciler::{Direction, Reconciliation, reconcile};
pub use reporter::{Reporter, TracingReporter};
pub use runner::{Migrator, Outcome, RunOptions, RunSummary, Status};
pub use scaffold::{Scaffolder, init};
pub use script::{MigrationScript, Operation, ScriptFormat, ScriptMigration};
