use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use docshift_common::{Error, Result};
use regex::Regex;

/// Alphanumeric runs joined by single underscores.
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+(?:_[A-Za-z0-9]+)*$").expect("name pattern is a valid regex")
});

/// Check a migration name before it is embedded in a new file name.
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "migration name '{name}' must match {}",
            NAME_PATTERN.as_str()
        )))
    }
}

/// `<creation timestamp>_<name>`, the identity of a migration and the id of
/// its ledger document.
///
/// Sorts by timestamp, then by the full identifier string so two migrations
/// created in the same second still order deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationId {
    timestamp: u64,
    key: String,
    name_start: usize,
}

impl MigrationId {
    /// Build an identifier for a new migration; the name is validated.
    pub fn new(timestamp: u64, name: &str) -> Result<Self> {
        validate_name(name)?;
        format!("{timestamp}_{name}").parse()
    }

    /// Parse the identifier out of a file name by dropping everything from
    /// the first `.` onwards.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let stem = filename.split('.').next().unwrap_or(filename);
        stem.parse()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn name(&self) -> &str {
        &self.key[self.name_start..]
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The embedded creation time as a UTC instant.
    pub fn create_date(&self) -> Result<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| {
                Error::Naming(format!(
                    "timestamp {} of '{}' is out of range",
                    self.timestamp, self.key
                ))
            })
    }
}

impl FromStr for MigrationId {
    type Err = Error;

    /// Existing identifiers are trusted: only the timestamp is checked, not
    /// the name pattern.
    fn from_str(s: &str) -> Result<Self> {
        let (ts, name) = s.split_once('_').ok_or_else(|| {
            Error::Naming(format!("'{s}' is not of the form <timestamp>_<name>"))
        })?;

        if ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Naming(format!(
                "'{s}' does not start with a numeric timestamp"
            )));
        }
        let timestamp = ts
            .parse::<u64>()
            .map_err(|e| Error::Naming(format!("'{s}' has an invalid timestamp: {e}")))?;

        if name.is_empty() {
            return Err(Error::Naming(format!("'{s}' has an empty name")));
        }

        Ok(Self {
            timestamp,
            key: s.to_string(),
            name_start: ts.len() + 1,
        })
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl Ord for MigrationId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for MigrationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
