//! Declarative migration files.
//!
//! A script names a default collection and two lists of operations, `up`
//! and `down`. Operations run in order against every document of their
//! collection (field operations) or against a single document.

use std::path::Path;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use docshift_common::{Error, Result};
use docshift_db::DocumentStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::migration::Migration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    Yaml,
    Json,
}

impl ScriptFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "yml" | "yaml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationScript {
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub up: Vec<Operation>,
    #[serde(default)]
    pub down: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Set `field` on every document. With `only_missing`, documents that
    /// already have the field are left alone.
    SetField {
        #[serde(default)]
        collection: Option<String>,
        field: String,
        value: Value,
        #[serde(default)]
        only_missing: bool,
    },
    DeleteField {
        #[serde(default)]
        collection: Option<String>,
        field: String,
    },
    RenameField {
        #[serde(default)]
        collection: Option<String>,
        from: String,
        to: String,
    },
    /// Add `by` to a numeric field; a missing field counts as zero.
    IncrementField {
        #[serde(default)]
        collection: Option<String>,
        field: String,
        by: Number,
    },
    /// Stamp `field` with the current UTC time.
    SetTimestamp {
        #[serde(default)]
        collection: Option<String>,
        field: String,
    },
    SetDocument {
        #[serde(default)]
        collection: Option<String>,
        id: String,
        #[serde(default)]
        data: Map<String, Value>,
    },
    DeleteDocument {
        #[serde(default)]
        collection: Option<String>,
        id: String,
    },
}

impl Operation {
    fn collection_override(&self) -> Option<&str> {
        match self {
            Operation::SetField { collection, .. }
            | Operation::DeleteField { collection, .. }
            | Operation::RenameField { collection, .. }
            | Operation::IncrementField { collection, .. }
            | Operation::SetTimestamp { collection, .. }
            | Operation::SetDocument { collection, .. }
            | Operation::DeleteDocument { collection, .. } => collection.as_deref(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Operation::SetField { .. } => "set_field",
            Operation::DeleteField { .. } => "delete_field",
            Operation::RenameField { .. } => "rename_field",
            Operation::IncrementField { .. } => "increment_field",
            Operation::SetTimestamp { .. } => "set_timestamp",
            Operation::SetDocument { .. } => "set_document",
            Operation::DeleteDocument { .. } => "delete_document",
        }
    }
}

/// A [`MigrationScript`] bound to the [`Migration`] interface.
#[derive(Debug, Clone)]
pub struct ScriptMigration {
    script: MigrationScript,
}

impl ScriptMigration {
    /// Parse and check a script. Every operation must resolve to a collection.
    pub fn parse(contents: &str, format: ScriptFormat) -> Result<Self> {
        let script: MigrationScript = match format {
            ScriptFormat::Yaml => serde_yaml::from_str(contents)
                .map_err(|e| Error::Script(format!("invalid YAML: {e}")))?,
            ScriptFormat::Json => serde_json::from_str(contents)
                .map_err(|e| Error::Script(format!("invalid JSON: {e}")))?,
        };
        Self::new(script)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let format = ScriptFormat::from_path(path).ok_or_else(|| {
            Error::Script(format!("unsupported migration file {}", path.display()))
        })?;
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, format)
            .map_err(|e| Error::Script(format!("{}: {e}", path.display())))
    }

    pub fn new(script: MigrationScript) -> Result<Self> {
        for (direction, ops) in [("up", &script.up), ("down", &script.down)] {
            for (idx, op) in ops.iter().enumerate() {
                if op.collection_override().or(script.collection.as_deref()).is_none() {
                    return Err(Error::Script(format!(
                        "{direction}[{idx}] ({}) has no collection and the script sets no default",
                        op.kind()
                    )));
                }
            }
        }
        Ok(Self { script })
    }

    pub fn script(&self) -> &MigrationScript {
        &self.script
    }

    async fn run(&self, db: &dyn DocumentStore, ops: &[Operation]) -> Result<()> {
        for op in ops {
            let collection = op
                .collection_override()
                .or(self.script.collection.as_deref())
                .ok_or_else(|| Error::Script(format!("{} has no collection", op.kind())))?;
            debug!("running {} on '{collection}'", op.kind());
            execute(db, collection, op).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Migration for ScriptMigration {
    async fn apply(&self, db: &dyn DocumentStore) -> Result<()> {
        self.run(db, &self.script.up).await
    }

    async fn revert(&self, db: &dyn DocumentStore) -> Result<()> {
        self.run(db, &self.script.down).await
    }
}

async fn execute(db: &dyn DocumentStore, collection: &str, op: &Operation) -> Result<()> {
    match op {
        Operation::SetDocument { id, data, .. } => db.set(collection, id, data.clone()).await,
        Operation::DeleteDocument { id, .. } => db.delete(collection, id).await,
        _ => {
            // Field operations touch every document; one timestamp per run.
            let now = Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
            for doc in db.list(collection, None).await? {
                let mut data = doc.data;
                if rewrite(&mut data, op, &now)? {
                    db.set(collection, &doc.id, data).await?;
                }
            }
            Ok(())
        }
    }
}

/// Apply a field operation to one document body. Returns whether it changed.
fn rewrite(data: &mut Map<String, Value>, op: &Operation, now: &Value) -> Result<bool> {
    match op {
        Operation::SetField {
            field,
            value,
            only_missing,
            ..
        } => {
            if *only_missing && data.contains_key(field) {
                return Ok(false);
            }
            Ok(data.insert(field.clone(), value.clone()).as_ref() != Some(value))
        }
        Operation::DeleteField { field, .. } => Ok(data.remove(field).is_some()),
        Operation::RenameField { from, to, .. } => match data.remove(from) {
            Some(value) => {
                data.insert(to.clone(), value);
                Ok(true)
            }
            None => Ok(false),
        },
        Operation::IncrementField { field, by, .. } => {
            let current = data.get(field).cloned().unwrap_or(Value::from(0));
            let Value::Number(current) = current else {
                return Err(Error::Script(format!(
                    "cannot increment non-numeric field '{field}'"
                )));
            };
            data.insert(field.clone(), Value::Number(add(&current, by, field)?));
            Ok(true)
        }
        Operation::SetTimestamp { field, .. } => {
            data.insert(field.clone(), now.clone());
            Ok(true)
        }
        Operation::SetDocument { .. } | Operation::DeleteDocument { .. } => Ok(false),
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn add(a: &Number, b: &Number, field: &str) -> Result<Number> {
    if let (Some(x), Some(y)) = (integer(a), integer(b)) {
        let sum = x + y;
        if let Ok(v) = i64::try_from(sum) {
            return Ok(Number::from(v));
        }
        return u64::try_from(sum).map(Number::from).map_err(|_| {
            Error::Script(format!("increment of '{field}' overflows a 64-bit integer"))
        });
    }
    let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
    Number::from_f64(sum)
        .ok_or_else(|| Error::Script(format!("increment of '{field}' is not a finite number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshift_db::SqliteDocumentStore;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn seeded() -> SqliteDocumentStore {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store
            .set("users", "u1", body(json!({"name": "ada", "logins": 3})))
            .await
            .unwrap();
        store
            .set("users", "u2", body(json!({"name": "bob", "status": "banned"})))
            .await
            .unwrap();
        store
    }

    #[test]
    fn parses_yaml_script() {
        let script = ScriptMigration::parse(
            "collection: users\n\
             up:\n  - op: set_field\n    field: status\n    value: active\n\
             down:\n  - op: delete_field\n    field: status\n",
            ScriptFormat::Yaml,
        )
        .unwrap();
        assert_eq!(script.script().up.len(), 1);
        assert!(matches!(
            &script.script().down[0],
            Operation::DeleteField { field, .. } if field == "status"
        ));
    }

    #[test]
    fn parses_json_script() {
        let script = ScriptMigration::parse(
            r#"{"up": [{"op": "delete_document", "collection": "tmp", "id": "x"}]}"#,
            ScriptFormat::Json,
        )
        .unwrap();
        assert!(script.script().down.is_empty());
    }

    #[test]
    fn operation_without_collection_is_rejected() {
        let err = ScriptMigration::parse(
            "up:\n  - op: delete_field\n    field: x\n",
            ScriptFormat::Yaml,
        )
        .unwrap_err();
        assert!(err.to_string().contains("up[0] (delete_field) has no collection"));
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let err = ScriptMigration::parse(
            "collection: users\nup:\n  - op: drop_everything\n",
            ScriptFormat::Yaml,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Script(_)));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ScriptFormat::from_extension("yml"), Some(ScriptFormat::Yaml));
        assert_eq!(ScriptFormat::from_extension("yaml"), Some(ScriptFormat::Yaml));
        assert_eq!(ScriptFormat::from_extension("json"), Some(ScriptFormat::Json));
        assert_eq!(ScriptFormat::from_extension("js"), None);
    }

    #[tokio::test]
    async fn set_field_only_missing_keeps_existing_values() {
        let store = seeded().await;
        let script = ScriptMigration::new(MigrationScript {
            collection: Some("users".into()),
            description: None,
            up: vec![Operation::SetField {
                collection: None,
                field: "status".into(),
                value: json!("active"),
                only_missing: true,
            }],
            down: vec![],
        })
        .unwrap();

        script.apply(&store).await.unwrap();

        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        let u2 = store.get("users", "u2").await.unwrap().unwrap();
        assert_eq!(u1.field("status"), Some(&json!("active")));
        assert_eq!(u2.field("status"), Some(&json!("banned")));
    }

    #[tokio::test]
    async fn rename_then_revert_restores_field() {
        let store = seeded().await;
        let script = ScriptMigration::new(MigrationScript {
            collection: Some("users".into()),
            description: None,
            up: vec![Operation::RenameField {
                collection: None,
                from: "name".into(),
                to: "display_name".into(),
            }],
            down: vec![Operation::RenameField {
                collection: None,
                from: "display_name".into(),
                to: "name".into(),
            }],
        })
        .unwrap();

        script.apply(&store).await.unwrap();
        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        assert!(u1.field("name").is_none());
        assert_eq!(u1.field("display_name"), Some(&json!("ada")));

        script.revert(&store).await.unwrap();
        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(u1.field("name"), Some(&json!("ada")));
        assert!(u1.field("display_name").is_none());
    }

    #[tokio::test]
    async fn increment_treats_missing_as_zero() {
        let store = seeded().await;
        let script = ScriptMigration::new(MigrationScript {
            collection: Some("users".into()),
            description: None,
            up: vec![Operation::IncrementField {
                collection: None,
                field: "logins".into(),
                by: Number::from(2),
            }],
            down: vec![],
        })
        .unwrap();

        script.apply(&store).await.unwrap();
        let u1 = store.get("users", "u1").await.unwrap().unwrap();
        let u2 = store.get("users", "u2").await.unwrap().unwrap();
        assert_eq!(u1.field("logins"), Some(&json!(5)));
        assert_eq!(u2.field("logins"), Some(&json!(2)));
    }

    #[test]
    fn integer_increments_stay_exact_past_i64() {
        let big = Number::from(i64::MAX as u64 + 10);
        assert_eq!(
            add(&big, &Number::from(5), "n").unwrap(),
            Number::from(i64::MAX as u64 + 15)
        );
        assert_eq!(
            add(&Number::from(u64::MAX - 1), &Number::from(1), "n").unwrap(),
            Number::from(u64::MAX)
        );
        assert_eq!(
            add(&big, &Number::from(-20), "n").unwrap(),
            Number::from(i64::MAX - 10)
        );
        assert!(add(&Number::from(u64::MAX), &Number::from(1), "n").is_err());
        assert_eq!(
            add(&Number::from(2), &Number::from_f64(0.5).unwrap(), "n").unwrap(),
            Number::from_f64(2.5).unwrap()
        );
    }

    #[tokio::test]
    async fn increment_of_string_field_fails() {
        let store = seeded().await;
        let script = ScriptMigration::new(MigrationScript {
            collection: Some("users".into()),
            description: None,
            up: vec![Operation::IncrementField {
                collection: None,
                field: "name".into(),
                by: Number::from(1),
            }],
            down: vec![],
        })
        .unwrap();

        let err = script.apply(&store).await.unwrap_err();
        assert!(err.to_string().contains("non-numeric field 'name'"));
    }

    #[tokio::test]
    async fn set_timestamp_stamps_every_document() {
        let store = seeded().await;
        let script = ScriptMigration::new(MigrationScript {
            collection: Some("users".into()),
            description: None,
            up: vec![Operation::SetTimestamp {
                collection: None,
                field: "migrated_at".into(),
            }],
            down: vec![],
        })
        .unwrap();

        script.apply(&store).await.unwrap();
        for doc in store.list("users", None).await.unwrap() {
            let stamp = doc.field("migrated_at").and_then(Value::as_str).unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
        }
    }

    #[tokio::test]
    async fn document_operations_honour_collection_override() {
        let store = seeded().await;
        let script = ScriptMigration::new(MigrationScript {
            collection: Some("users".into()),
            description: None,
            up: vec![Operation::SetDocument {
                collection: Some("settings".into()),
                id: "global".into(),
                data: body(json!({"theme": "dark"})),
            }],
            down: vec![Operation::DeleteDocument {
                collection: Some("settings".into()),
                id: "global".into(),
            }],
        })
        .unwrap();

        script.apply(&store).await.unwrap();
        assert!(store.get("settings", "global").await.unwrap().is_some());
        assert_eq!(store.count("users").unwrap(), 2);

        script.revert(&store).await.unwrap();
        assert!(store.get("settings", "global").await.unwrap().is_none());
    }
}
