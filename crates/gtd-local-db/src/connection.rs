//! Database connection management.

use crate::migrations::{MigrationManager, MigrationOutcome, MigrationPolicy};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Shared handle to the tracker database.
///
/// Cloning is cheap; every clone talks to the same connection, and writes are
/// serialized by the connection mutex.
#[derive(Debug, Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
    outcome: MigrationOutcome,
}

impl Database {
    /// Get the default database path based on the GTD_HOME environment variable or platform defaults.
    ///
    /// Priority order:
    /// 1. GTD_HOME environment variable (custom)
    /// 2. Platform-specific defaults:
    ///    - Linux: `${XDG_STATE_HOME:-~/.local/state}/gtd-tracker/gtd.db`
    ///    - macOS: `~/Library/Application Support/gtd-tracker/gtd.db`
    ///    - Windows: `%LOCALAPPDATA%\gtd-tracker\gtd.db`
    pub fn default_path() -> crate::Result<PathBuf> {
        if let Ok(gtd_home) = std::env::var("GTD_HOME") {
            return Ok(PathBuf::from(gtd_home).join("gtd.db"));
        }

        #[cfg(target_os = "linux")]
        {
            let state_home = match std::env::var("XDG_STATE_HOME") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => home_dir()?.join(".local").join("state"),
            };
            Ok(state_home.join("gtd-tracker").join("gtd.db"))
        }

        #[cfg(target_os = "macos")]
        {
            Ok(home_dir()?
                .join("Library")
                .join("Application Support")
                .join("gtd-tracker")
                .join("gtd.db"))
        }

        #[cfg(target_os = "windows")]
        {
            let local_appdata = std::env::var("LOCALAPPDATA")
                .map_err(|_| crate::Error::generic("LOCALAPPDATA environment variable not set"))?;
            Ok(PathBuf::from(local_appdata).join("gtd-tracker").join("gtd.db"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            Ok(home_dir()?.join(".gtd-tracker").join("gtd.db"))
        }
    }

    /// Open the database at the default path.
    pub fn open_default() -> crate::Result<Self> {
        let path = Self::default_path()?;
        Self::open(&path)
    }
}

#[cfg(not(target_os = "windows"))]
fn home_dir() -> crate::Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| crate::Error::generic("HOME environment variable not set"))
}

impl Database {
    /// Open a database at the specified path with the conservative migration policy.
    ///
    /// If the path doesn't exist, the database (and its parent directory) will be created.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        Self::open_with_policy(path, MigrationPolicy::default())
    }

    /// Open a database at the specified path, migrating it according to `policy`.
    pub fn open_with_policy<P: AsRef<Path>>(path: P, policy: MigrationPolicy) -> crate::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %path.display(), "opening tracker database");
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::from_connection(conn, policy)
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> crate::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, MigrationPolicy::default())
    }

    /// Wrap an already opened connection, bringing its schema up to date.
    pub fn from_connection(conn: Connection, policy: MigrationPolicy) -> crate::Result<Self> {
        let outcome = Self::initialize_schema(&conn, policy)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
            outcome,
        })
    }

    fn initialize_schema(conn: &Connection, policy: MigrationPolicy) -> crate::Result<MigrationOutcome> {
        // Cascading step deletes rely on this; SQLite defaults it to off per connection.
        conn.pragma_update(None, "foreign_keys", true)?;
        MigrationManager::migrate(conn, policy)
    }

    /// What happened to the schema when this handle was opened.
    pub fn migration_outcome(&self) -> MigrationOutcome {
        self.outcome
    }

    /// Get a reference to the underlying connection.
    ///
    /// This method provides access to the connection for executing queries.
    /// The caller must ensure proper locking if used concurrently.
    pub fn connection(&self) -> &Mutex<Connection> {
        &self.connection
    }

    fn lock(&self) -> crate::Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|e| crate::Error::generic(format!("Failed to acquire database lock: {}", e)))
    }

    /// Run a read-only closure against the connection.
    pub fn read<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> crate::Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a transaction with automatic rollback on error.
    pub fn transaction<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> crate::Result<T>,
    {
        let conn = self.lock()?;

        let tx = conn.unchecked_transaction()?;
        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_database_enforces_foreign_keys() {
        let db = Database::open_in_memory().unwrap();
        let enabled: bool = db
            .read(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .unwrap();
        assert!(enabled);
    }

    #[test]
    fn failed_transaction_is_rolled_back() {
        let db = Database::open_in_memory().unwrap();
        let result: crate::Result<()> = db.transaction(|conn| {
            conn.execute("INSERT INTO categories (name) VALUES ('Work')", [])?;
            Err(crate::Error::generic("abort"))
        });
        assert!(result.is_err());

        let count: i64 = db
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gtd.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.migration_outcome(), MigrationOutcome::Migrated { from: 0, to: crate::SCHEMA_VERSION });

        drop(db);
        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.migration_outcome(), MigrationOutcome::UpToDate);
    }
}
