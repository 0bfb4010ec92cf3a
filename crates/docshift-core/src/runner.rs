//! Sequential execution of a reconciled plan.
//!
//! One migration at a time: step N+1 starts only after step N's ledger
//! write (or delete) has been confirmed, so an interrupted run leaves the
//! ledger describing exactly the completed prefix of the plan.

use std::sync::Arc;

use chrono::Utc;
use docshift_common::{Error, Result};
use docshift_db::ledger::DEFAULT_COLLECTION;
use docshift_db::{DocumentStore, Ledger, LedgerEntry, SortDirection};
use tracing::debug;

use crate::id::MigrationId;
use crate::migration::{MigrationDefinition, MigrationSource};
use crate::reconciler::{Direction, Reconciliation, reconcile};
use crate::reporter::{Reporter, TracingReporter};

/// Parameters of a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub direction: Direction,
    /// Collection holding the ledger. Defaults to `migrations`.
    pub ledger_collection: String,
    /// Fail instead of warning when the ledger names migrations that no
    /// longer exist.
    pub strict: bool,
    /// Reconcile and report the plan without executing it.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Apply,
            ledger_collection: DEFAULT_COLLECTION.to_string(),
            strict: false,
            dry_run: false,
        }
    }
}

impl RunOptions {
    pub fn apply() -> Self {
        Self::default()
    }

    pub fn revert() -> Self {
        Self {
            direction: Direction::Revert,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one migration ran.
    Completed,
    /// Apply run with nothing pending.
    UpToDate,
    /// Revert run with nothing recorded.
    NothingToRevert,
    /// Dry run with a non-empty plan; nothing executed.
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub direction: Direction,
    pub outcome: Outcome,
    pub processed: usize,
    /// Executed identifiers, or the planned ones for a dry run.
    pub migrations: Vec<String>,
}

/// Applied and pending migrations, as shown by `docshift status`.
#[derive(Debug, Clone)]
pub struct Status {
    pub applied: Vec<LedgerEntry>,
    pub pending: Vec<MigrationId>,
    pub orphans: Vec<String>,
}

pub struct Migrator {
    store: Arc<dyn DocumentStore>,
    source: Arc<dyn MigrationSource>,
    reporter: Arc<dyn Reporter>,
}

impl Migrator {
    pub fn new(store: Arc<dyn DocumentStore>, source: Arc<dyn MigrationSource>) -> Self {
        Self {
            store,
            source,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    fn ledger(&self, collection: &str) -> Ledger<'_> {
        Ledger::new(self.store.as_ref(), collection)
    }

    /// Diff the source against the ledger. Orphaned ledger entries are
    /// reported, or rejected when `strict` is set.
    pub async fn plan(&self, options: &RunOptions) -> Result<Reconciliation> {
        let entries = self
            .ledger(&options.ledger_collection)
            .entries(options.direction.ledger_order())
            .await?;
        let definitions = self.source.discover()?;
        debug!(
            "reconciling {} definitions against {} ledger entries",
            definitions.len(),
            entries.len()
        );

        let reconciliation = reconcile(definitions, &entries, options.direction)?;

        if !reconciliation.orphans.is_empty() {
            let list = reconciliation.orphans.join(", ");
            if options.strict {
                return Err(Error::Integrity(format!(
                    "ledger '{}' records migrations with no matching file: {list}",
                    options.ledger_collection
                )));
            }
            self.reporter.warn(&format!(
                "Ledger '{}' records migrations with no matching file: {list}",
                options.ledger_collection
            ));
        }

        Ok(reconciliation)
    }

    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let reconciliation = self.plan(&options).await?;
        let direction = options.direction;
        let plan = reconciliation.plan;

        if plan.is_empty() {
            let (outcome, message) = match direction {
                Direction::Apply => (
                    Outcome::UpToDate,
                    "All migrations have been applied already, database is up to date",
                ),
                Direction::Revert => (Outcome::NothingToRevert, "There are no migrations to roll back"),
            };
            self.reporter.success(message);
            return Ok(RunSummary {
                direction,
                outcome,
                processed: 0,
                migrations: Vec::new(),
            });
        }

        if options.dry_run {
            for def in &plan {
                self.reporter.info(&format!(
                    "Would perform '{}' migration of '{}'",
                    direction.label(),
                    def.filename
                ));
            }
            return Ok(RunSummary {
                direction,
                outcome: Outcome::DryRun,
                processed: 0,
                migrations: plan.iter().map(|d| d.id.to_string()).collect(),
            });
        }

        let ledger = self.ledger(&options.ledger_collection);
        let mut migrations = Vec::with_capacity(plan.len());
        for def in &plan {
            match direction {
                Direction::Apply => self.apply_step(&ledger, def, migrations.len()).await?,
                Direction::Revert => self.revert_step(&ledger, def, migrations.len()).await?,
            }
            migrations.push(def.id.to_string());
        }

        let noun = if migrations.len() == 1 { "migration" } else { "migrations" };
        self.reporter.success(&match direction {
            Direction::Apply => format!("Successfully applied {} {noun}", migrations.len()),
            Direction::Revert => format!("Successfully rolled back {} {noun}", migrations.len()),
        });

        Ok(RunSummary {
            direction,
            outcome: Outcome::Completed,
            processed: migrations.len(),
            migrations,
        })
    }

    async fn apply_step(
        &self,
        ledger: &Ledger<'_>,
        def: &MigrationDefinition,
        processed: usize,
    ) -> Result<()> {
        // Checked before apply: a change must never run without a recordable entry.
        let create_date = def.id.create_date()?;

        self.reporter
            .info(&format!("Performing 'up' migration of '{}'", def.filename));
        let start_time = Utc::now();
        def.migration
            .apply(self.store.as_ref())
            .await
            .map_err(|e| Error::Execution {
                id: def.id.to_string(),
                processed,
                reason: e.to_string(),
            })?;
        let end_time = Utc::now();
        self.reporter
            .success(&format!("Completed 'up' migration of '{}'", def.filename));

        let entry = LedgerEntry {
            id: def.id.to_string(),
            migration_filename: def.filename.clone(),
            create_date,
            start_time,
            end_time,
        };
        self.reporter.info(&format!(
            "Writing migration data to '{}/{}'",
            ledger.collection(),
            entry.id
        ));
        ledger.record(&entry).await.map_err(|e| Error::Ledger {
            id: entry.id.clone(),
            processed,
            reason: e.to_string(),
        })?;
        self.reporter.success(&format!(
            "Successfully wrote migration data to '{}/{}'",
            ledger.collection(),
            entry.id
        ));
        Ok(())
    }

    async fn revert_step(
        &self,
        ledger: &Ledger<'_>,
        def: &MigrationDefinition,
        processed: usize,
    ) -> Result<()> {
        self.reporter
            .info(&format!("Performing 'down' migration of '{}'", def.filename));
        def.migration
            .revert(self.store.as_ref())
            .await
            .map_err(|e| Error::Execution {
                id: def.id.to_string(),
                processed,
                reason: e.to_string(),
            })?;
        self.reporter
            .success(&format!("Completed 'down' migration of '{}'", def.filename));

        self.reporter.info(&format!(
            "Deleting migration data from '{}/{}'",
            ledger.collection(),
            def.id
        ));
        ledger.remove(def.id.as_str()).await.map_err(|e| Error::Ledger {
            id: def.id.to_string(),
            processed,
            reason: e.to_string(),
        })?;
        self.reporter.success(&format!(
            "Successfully deleted migration data from '{}/{}'",
            ledger.collection(),
            def.id
        ));
        Ok(())
    }

    /// What has been applied and what is still pending.
    pub async fn status(&self, ledger_collection: &str) -> Result<Status> {
        let applied = self
            .ledger(ledger_collection)
            .entries(SortDirection::Ascending)
            .await?;
        let reconciliation = reconcile(self.source.discover()?, &applied, Direction::Apply)?;

        Ok(Status {
            applied,
            pending: reconciliation.plan.into_iter().map(|d| d.id).collect(),
            orphans: reconciliation.orphans,
        })
    }
}
