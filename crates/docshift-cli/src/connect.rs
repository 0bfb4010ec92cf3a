use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use docshift_config::{ConnectionTarget, MigratorConfig};
use docshift_db::{DocumentStore, SqliteDocumentStore};
use tracing::info;

pub fn resolve_target(
    config: &MigratorConfig,
    project: Option<&str>,
    credentials: Option<&Path>,
) -> Result<ConnectionTarget> {
    Ok(ConnectionTarget::resolve(config, project, credentials)?)
}

/// Open the target's database. Everything past this point only sees the
/// opened handle.
pub fn open_store(target: &ConnectionTarget) -> Result<Arc<dyn DocumentStore>> {
    if let Some(parent) = target.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create data directory {}", parent.display())
            })?;
        }
    }

    info!("opening {}", target.database_path.display());
    let store = SqliteDocumentStore::open(&target.database_path)?;
    Ok(Arc::new(store))
}

/// Banner shown before a migrate run.
pub fn migrating_banner(target: &ConnectionTarget) -> String {
    format!(
        "Migrating database in project '{}' ({})",
        target.project,
        target.database_path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(path: std::path::PathBuf) -> ConnectionTarget {
        ConnectionTarget {
            project: "staging".into(),
            database_path: path,
        }
    }

    #[tokio::test]
    async fn open_creates_missing_data_directory() {
        let root = tempfile::tempdir().unwrap();
        let target = target(root.path().join("data/nested/staging.sqlite"));

        let store = open_store(&target).unwrap();
        assert!(store.list("users", None).await.unwrap().is_empty());
        assert!(target.database_path.exists());
    }

    #[test]
    fn banner_names_project_and_file() {
        let banner = migrating_banner(&target("/tmp/staging.sqlite".into()));
        assert_eq!(
            banner,
            "Migrating database in project 'staging' (/tmp/staging.sqlite)"
        );
    }
}
