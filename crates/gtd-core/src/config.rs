//! Tracker configuration.

use gtd_local_db::{Database, MigrationPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for opening a [`crate::Tracker`].
///
/// Every field has a default, so a config file only needs the keys it changes:
///
/// ```json
/// { "database_path": "/tmp/gtd.db", "demo_mode": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file. `None` resolves to [`Database::default_path`].
    pub database_path: Option<PathBuf>,
    /// Partition the tracker starts in.
    pub demo_mode: bool,
    /// Period of the shared timer heartbeat.
    pub heartbeat_millis: u64,
    /// Drop and recreate all tables when the stored schema is newer than this build.
    pub allow_destructive_migration: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            demo_mode: false,
            heartbeat_millis: 1000,
            allow_destructive_migration: false,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// The configured database path, or the platform default.
    pub fn resolved_database_path(&self) -> crate::Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Database::default_path().map_err(|e| crate::Error::store_unavailable(e.to_string())),
        }
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_millis.max(1))
    }

    pub fn migration_policy(&self) -> MigrationPolicy {
        MigrationPolicy {
            allow_destructive_fallback: self.allow_destructive_migration,
        }
    }
}
