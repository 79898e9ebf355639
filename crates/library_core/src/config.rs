//! Store connection configuration.
//!
//! # Responsibility
//! - Describe where the document store lives and how connections behave.
//! - Load those parameters from process environment for binaries.
//!
//! # Invariants
//! - `database_name` is non-empty and limited to `[A-Za-z0-9_-]`.
//! - A missing `data_dir` selects an in-memory store.

use crate::db::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE_NAME: &str = "onlinelibrary";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub const ENV_DATA_DIR: &str = "LIBRARY_DATA_DIR";
pub const ENV_DB_NAME: &str = "LIBRARY_DB_NAME";
pub const ENV_BUSY_TIMEOUT_MS: &str = "LIBRARY_BUSY_TIMEOUT_MS";

/// Resolved physical location of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

/// Connection parameters supplied when constructing a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the database file. `None` keeps data in memory.
    pub data_dir: Option<PathBuf>,
    /// File stem of the database, `<data_dir>/<database_name>.db`.
    pub database_name: String,
    #[serde(with = "duration_millis")]
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// In-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed store under `data_dir`.
    pub fn file(data_dir: impl Into<PathBuf>, database_name: impl Into<String>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            database_name: database_name.into(),
            ..Self::default()
        }
    }

    /// Reads configuration from `LIBRARY_*` environment variables.
    ///
    /// Unset variables fall back to defaults; malformed values are errors.
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> DbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|value| !value.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(name) = lookup(ENV_DB_NAME) {
            config.database_name = name.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            let millis = raw.trim().parse::<u64>().map_err(|_| {
                DbError::InvalidConfig(format!("{ENV_BUSY_TIMEOUT_MS} must be an integer, got `{raw}`"))
            })?;
            config.busy_timeout = Duration::from_millis(millis);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks parameter shape without touching the filesystem.
    pub fn validate(&self) -> DbResult<()> {
        if self.database_name.is_empty() {
            return Err(DbError::InvalidConfig(
                "database name cannot be empty".to_string(),
            ));
        }
        if !self
            .database_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DbError::InvalidConfig(format!(
                "database name `{}` may only contain [A-Za-z0-9_-]",
                self.database_name
            )));
        }
        Ok(())
    }

    pub fn location(&self) -> StoreLocation {
        match &self.data_dir {
            Some(dir) => StoreLocation::File(dir.join(format!("{}.db", self.database_name))),
            None => StoreLocation::Memory,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
