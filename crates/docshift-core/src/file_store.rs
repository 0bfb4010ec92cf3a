use std::path::{Path, PathBuf};
use std::sync::Arc;

use docshift_common::{Error, Result};
use tracing::{debug, info};

use crate::id::MigrationId;
use crate::migration::{MigrationDefinition, MigrationSource};
use crate::script::{ScriptFormat, ScriptMigration};

/// Migration files in a single directory, named `<timestamp>_<name>.<ext>`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Enumerate migration files without loading them. Hidden files and
    /// files with an unsupported extension are skipped; a supported file
    /// with a malformed name is an error.
    pub fn files(&self) -> Result<Vec<(MigrationId, PathBuf)>> {
        if !self.dir.is_dir() {
            return Err(Error::Config(format!(
                "no folder found at {}. Run docshift in the directory that holds your migrations \
                 or run `docshift init` first.",
                self.dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
                debug!("skipping non-UTF-8 file name {}", path.display());
                continue;
            };
            if filename.starts_with('.') || !entry.file_type()?.is_file() {
                continue;
            }
            if ScriptFormat::from_path(&path).is_none() {
                debug!("skipping {filename}: not a migration file");
                continue;
            }

            let id = MigrationId::from_filename(filename)?;
            files.push((id, path));
        }

        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }
}

impl MigrationSource for FileStore {
    fn discover(&self) -> Result<Vec<MigrationDefinition>> {
        let files = self.files()?;
        info!(
            "found {} migration files in {}",
            files.len(),
            self.dir.display()
        );

        files
            .into_iter()
            .map(|(id, path)| {
                let migration = ScriptMigration::from_file(&path)?;
                let filename = path
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_else(|| id.to_string());
                Ok(MigrationDefinition::new(id, filename, Arc::new(migration)))
            })
            .collect()
    }
}
