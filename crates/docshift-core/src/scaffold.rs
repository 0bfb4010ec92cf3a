use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use docshift_common::{Error, Result};
use tracing::{info, warn};

use crate::id::MigrationId;

const TEMPLATE: &str = include_str!("../templates/migration.yml");
const COLLECTION_PLACEHOLDER: &str = "{{collectionName}}";

/// Create the migrations directory if it does not exist. Returns whether it
/// was created.
pub fn init(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir)?;
    info!("created migrations folder {}", dir.display());
    Ok(true)
}

/// Writes new migration files from the built-in template.
pub struct Scaffolder {
    dir: PathBuf,
}

impl Scaffolder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create `<now>_<name>.yml` targeting `collection`.
    pub fn create(&self, name: Option<&str>, collection: Option<&str>) -> Result<PathBuf> {
        let now = u64::try_from(Utc::now().timestamp())
            .map_err(|_| Error::Other("system clock is before the Unix epoch".into()))?;
        self.create_at(name, collection, now)
    }

    pub fn create_at(
        &self,
        name: Option<&str>,
        collection: Option<&str>,
        timestamp: u64,
    ) -> Result<PathBuf> {
        let name = name.filter(|n| !n.trim().is_empty()).ok_or_else(|| {
            Error::Config("creating a migration requires a name, pass it with --name".into())
        })?;
        let collection = collection
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "creating a migration requires a collection, pass it with --collection".into(),
                )
            })?;

        if !self.dir.is_dir() {
            return Err(Error::Config(format!(
                "no folder found at {}. Run docshift in the directory that holds your migrations \
                 or run `docshift init` first.",
                self.dir.display()
            )));
        }

        let id = MigrationId::new(timestamp, name)?;
        let filename = format!("{id}.yml");
        let path = self.dir.join(&filename);

        let contents = TEMPLATE.replace(COLLECTION_PLACEHOLDER, &serde_json::to_string(collection)?);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    Error::Validation(format!("migration file {} already exists", path.display()))
                }
                _ => Error::Io(e),
            })?;
        write_or_discard(&path, file, contents.as_bytes())?;

        info!("created migration {filename} for collection '{collection}'");
        Ok(path)
    }
}

/// Write `contents` to a freshly created file. The file is removed if the
/// write fails.
fn write_or_discard<W: Write>(path: &Path, mut file: W, contents: &[u8]) -> Result<()> {
    if let Err(e) = file.write_all(contents).and_then(|()| file.flush()) {
        drop(file);
        if let Err(rm) = std::fs::remove_file(path) {
            warn!("could not remove partial file {}: {rm}", path.display());
        }
        return Err(Error::Io(e));
    }
    Ok(())
}
