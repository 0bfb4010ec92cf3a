//! Diffing migration definitions against the ledger.
//!
//! Pure: no I/O, no logging. The runner decides what to do with orphans.

use std::collections::{HashMap, HashSet};

use docshift_common::{Error, Result};
use docshift_db::{LedgerEntry, SortDirection};

use crate::migration::MigrationDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Apply,
    Revert,
}

impl Direction {
    /// Order in which the ledger is read for this direction.
    pub fn ledger_order(self) -> SortDirection {
        match self {
            Direction::Apply => SortDirection::Ascending,
            Direction::Revert => SortDirection::Descending,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Apply => "up",
            Direction::Revert => "down",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub direction: Direction,
    /// Migrations to execute, in execution order.
    pub plan: Vec<MigrationDefinition>,
    /// Ledger ids with no matching definition, in ledger order.
    pub orphans: Vec<String>,
}

/// Build the execution plan for `direction`.
///
/// Apply selects definitions without a ledger entry, oldest first. Revert
/// selects definitions with a ledger entry, newest first. Duplicate
/// identifiers among the definitions are an integrity error.
pub fn reconcile(
    definitions: Vec<MigrationDefinition>,
    ledger: &[LedgerEntry],
    direction: Direction,
) -> Result<Reconciliation> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for def in &definitions {
        if let Some(previous) = seen.insert(def.id.as_str(), def.filename.as_str()) {
            return Err(Error::Integrity(format!(
                "duplicate migration identifier '{}' ({previous} and {})",
                def.id, def.filename
            )));
        }
    }

    let applied: HashSet<&str> = ledger.iter().map(|e| e.id.as_str()).collect();
    let orphans = ledger
        .iter()
        .filter(|e| !seen.contains_key(e.id.as_str()))
        .map(|e| e.id.clone())
        .collect();

    let want_applied = direction == Direction::Revert;
    let mut plan: Vec<MigrationDefinition> = definitions
        .into_iter()
        .filter(|def| applied.contains(def.id.as_str()) == want_applied)
        .collect();

    plan.sort_by(|a, b| a.id.cmp(&b.id));
    if direction == Direction::Revert {
        plan.reverse();
    }

    Ok(Reconciliation {
        direction,
        plan,
        orphans,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{Migration, MigrationRegistry, MigrationSource};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use docshift_db::DocumentStore;
    use std::sync::Arc;

    struct Noop;

    #[async_trait]
    impl Migration for Noop {
        async fn apply(&self, _db: &dyn DocumentStore) -> Result<()> {
            Ok(())
        }

        async fn revert(&self, _db: &dyn DocumentStore) -> Result<()> {
            Ok(())
        }
    }

    fn definitions(ids: &[&str]) -> Vec<MigrationDefinition> {
        let mut registry = MigrationRegistry::new();
        for id in ids {
            registry.register(id, Arc::new(Noop)).unwrap();
        }
        registry.discover().unwrap()
    }

    fn ledger(ids: &[&str]) -> Vec<LedgerEntry> {
        ids.iter()
            .map(|id| {
                let at = Utc.timestamp_opt(0, 0).unwrap();
                LedgerEntry {
                    id: id.to_string(),
                    migration_filename: format!("{id}.yml"),
                    create_date: at,
                    start_time: at,
                    end_time: at,
                }
            })
            .collect()
    }

    fn plan_ids(r: &Reconciliation) -> Vec<&str> {
        r.plan.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn apply_orders_ascending_regardless_of_input_order() {
        let r = reconcile(definitions(&["3_c", "1_a", "2_b"]), &[], Direction::Apply).unwrap();
        assert_eq!(plan_ids(&r), ["1_a", "2_b", "3_c"]);
    }

    #[test]
    fn revert_orders_descending() {
        let r = reconcile(
            definitions(&["3_c", "1_a", "2_b"]),
            &ledger(&["1_a", "2_b", "3_c"]),
            Direction::Revert,
        )
        .unwrap();
        assert_eq!(plan_ids(&r), ["3_c", "2_b", "1_a"]);
    }

    #[test]
    fn apply_skips_recorded_migrations() {
        let r = reconcile(
            definitions(&["1_a", "2_b", "3_c"]),
            &ledger(&["1_a"]),
            Direction::Apply,
        )
        .unwrap();
        assert_eq!(plan_ids(&r), ["2_b", "3_c"]);
    }

    #[test]
    fn revert_selects_only_recorded_migrations() {
        let r = reconcile(
            definitions(&["1_a", "2_b", "3_c"]),
            &ledger(&["1_a"]),
            Direction::Revert,
        )
        .unwrap();
        assert_eq!(plan_ids(&r), ["1_a"]);
    }

    #[test]
    fn same_second_ties_break_on_identifier() {
        let r = reconcile(
            definitions(&["7_beta", "7_alpha", "6_zeta"]),
            &[],
            Direction::Apply,
        )
        .unwrap();
        assert_eq!(plan_ids(&r), ["6_zeta", "7_alpha", "7_beta"]);
    }

    #[test]
    fn empty_inputs_give_empty_plan() {
        let r = reconcile(Vec::new(), &[], Direction::Apply).unwrap();
        assert!(r.plan.is_empty());
        assert!(r.orphans.is_empty());

        let r = reconcile(definitions(&["1_a"]), &[], Direction::Revert).unwrap();
        assert!(r.plan.is_empty());
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let mut defs = definitions(&["1_a", "2_b"]);
        let mut dup = defs[0].clone();
        dup.filename = "1_a.json".into();
        defs.push(dup);

        let err = reconcile(defs, &[], Direction::Apply).unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
        assert!(err.to_string().contains("duplicate migration identifier '1_a'"));
    }

    #[test]
    fn orphans_are_reported_in_ledger_order() {
        let r = reconcile(
            definitions(&["2_b"]),
            &ledger(&["3_gone", "2_b", "1_lost"]),
            Direction::Revert,
        )
        .unwrap();
        assert_eq!(plan_ids(&r), ["2_b"]);
        assert_eq!(r.orphans, ["3_gone", "1_lost"]);
    }
}
