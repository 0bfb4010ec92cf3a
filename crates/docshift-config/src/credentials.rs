use std::path::{Path, PathBuf};

use docshift_common::{Error, Result};
use serde::Deserialize;
use tracing::info;

use crate::model::MigratorConfig;

/// Environment variable consulted when no credentials path is configured.
pub const CREDENTIALS_ENV: &str = "DOCSHIFT_CREDENTIALS";

/// Contents of a credentials file (JSON).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Credentials {
    pub project_id: Option<String>,
    pub database_path: Option<PathBuf>,
}

impl Credentials {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read credentials {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::Config(format!(
                "invalid credentials file {}: {e}",
                path.display()
            ))
        })
    }
}

/// Which database a run talks to, after flags, config and credentials have
/// been merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub project: String,
    pub database_path: PathBuf,
}

impl ConnectionTarget {
    /// Resolve the target. Precedence for the credentials path is the
    /// explicit argument, then config, then `DOCSHIFT_CREDENTIALS`.
    pub fn resolve(
        config: &MigratorConfig,
        project: Option<&str>,
        credentials: Option<&Path>,
    ) -> Result<Self> {
        let path = credentials
            .map(Path::to_path_buf)
            .or_else(|| config.credentials.clone())
            .or_else(|| std::env::var_os(CREDENTIALS_ENV).map(PathBuf::from));

        let creds = match &path {
            Some(path) => Credentials::from_file(path)?,
            None => {
                info!("no credentials file given, using configured defaults");
                Credentials::default()
            }
        };

        Self::from_parts(config, project, creds)
    }

    pub fn from_parts(
        config: &MigratorConfig,
        project: Option<&str>,
        creds: Credentials,
    ) -> Result<Self> {
        let project = project
            .map(str::to_string)
            .or_else(|| config.project.clone())
            .or(creds.project_id)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "no project configured: pass --project, set `project` in docshift.yml, \
                     or provide a credentials file with a project_id"
                        .into(),
                )
            })?;

        let database_path = creds
            .database_path
            .unwrap_or_else(|| config.data_dir().join(format!("{project}.sqlite")));

        Ok(Self {
            project,
            database_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_data_dir() -> MigratorConfig {
        MigratorConfig {
            data_dir: Some(PathBuf::from("/var/lib/docshift")),
            ..Default::default()
        }
    }

    #[test]
    fn flag_project_overrides_everything() {
        let config = MigratorConfig {
            project: Some("from-config".into()),
            ..config_with_data_dir()
        };
        let creds = Credentials {
            project_id: Some("from-creds".into()),
            database_path: None,
        };

        let target = ConnectionTarget::from_parts(&config, Some("from-flag"), creds).unwrap();
        assert_eq!(target.project, "from-flag");
        assert_eq!(
            target.database_path,
            PathBuf::from("/var/lib/docshift/from-flag.sqlite")
        );
    }

    #[test]
    fn credentials_supply_project_and_path() {
        let creds = Credentials {
            project_id: Some("acme".into()),
            database_path: Some(PathBuf::from("/tmp/acme.db")),
        };

        let target =
            ConnectionTarget::from_parts(&config_with_data_dir(), None, creds).unwrap();
        assert_eq!(target.project, "acme");
        assert_eq!(target.database_path, PathBuf::from("/tmp/acme.db"));
    }

    #[test]
    fn missing_project_is_a_config_error() {
        let err = ConnectionTarget::from_parts(
            &config_with_data_dir(),
            None,
            Credentials::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("no project configured"));
    }

    #[test]
    fn reads_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(
            &path,
            r#"{"project_id": "beta", "database_path": "beta.sqlite"}"#,
        )
        .unwrap();

        let target =
            ConnectionTarget::resolve(&config_with_data_dir(), None, Some(&path)).unwrap();
        assert_eq!(target.project, "beta");
        assert_eq!(target.database_path, PathBuf::from("beta.sqlite"));
    }

    #[test]
    fn unreadable_credentials_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConnectionTarget::resolve(
            &config_with_data_dir(),
            Some("p"),
            Some(&dir.path().join("missing.json")),
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to read credentials"));
    }
}
