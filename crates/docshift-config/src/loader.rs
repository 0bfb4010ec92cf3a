use std::path::{Path, PathBuf};

use docshift_common::{Error, Result};
use tracing::{debug, info};

use crate::model::MigratorConfig;

/// File names probed in the working directory, in priority order.
const CANDIDATES: &[&str] = &["docshift.yml", "docshift.yaml", "docshift.toml"];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `.env` and the first config file found in `dir`. No file means
    /// defaults.
    pub fn load(dir: &Path) -> Result<MigratorConfig> {
        match dotenvy::from_path(dir.join(".env")) {
            Ok(()) => debug!("loaded environment from {}/.env", dir.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("failed to read .env: {e}"))),
        }

        match Self::find(dir) {
            Some(path) => {
                info!("loading config from {}", path.display());
                Self::load_file(&path)
            }
            None => {
                debug!("no config file in {}, using defaults", dir.display());
                Ok(MigratorConfig::default())
            }
        }
    }

    pub fn find(dir: &Path) -> Option<PathBuf> {
        CANDIDATES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Parse a config file, choosing the format by extension.
    pub fn load_file(path: &Path) -> Result<MigratorConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error in {}: {e}", path.display()))),
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display()))),
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }
}
