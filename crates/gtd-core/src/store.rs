//! Async access to the tracker database with change notifications.

use gtd_local_db::{Connection, Database};
use tokio::sync::broadcast;
use tracing::debug;

const CHANGE_CAPACITY: usize = 64;

/// A table whose contents a write may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Projects,
    Steps,
    Categories,
    Status,
}

/// Shared store handle.
///
/// Blocking SQLite work runs on the blocking pool. Every committed write
/// announces the tables it touched so live queries can re-run.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
    changes: broadcast::Sender<Table>,
}

impl Store {
    pub fn new(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { db, changes }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Subscribe to change notifications for committed writes.
    pub fn subscribe(&self) -> broadcast::Receiver<Table> {
        self.changes.subscribe()
    }

    /// Run a read against the connection.
    pub async fn read<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> gtd_local_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || db.read(f))
            .await
            .map_err(|e| crate::Error::generic(format!("Store task failed: {}", e)))?;
        Ok(result?)
    }

    /// Run `f` in one transaction and announce `tables` once it commits.
    pub async fn write<F, T>(&self, tables: &[Table], f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> gtd_local_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || db.transaction(f))
            .await
            .map_err(|e| crate::Error::generic(format!("Store task failed: {}", e)))??;
        self.notify(tables);
        Ok(result)
    }

    /// Number of live queries currently listening for changes.
    pub fn listener_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn notify(&self, tables: &[Table]) {
        for table in tables {
            debug!(?table, "table changed");
            // No subscribers is fine.
            let _ = self.changes.send(*table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtd_local_db::{ProjectRecord, ProjectStore};

    #[tokio::test]
    async fn committed_write_announces_its_tables() {
        let store = Store::new(Database::open_in_memory().unwrap());
        let mut changes = store.subscribe();

        store
            .write(&[Table::Projects, Table::Categories], |conn| {
                ProjectStore::new(conn).insert(&ProjectRecord::new("Health"))
            })
            .await
            .unwrap();

        assert_eq!(changes.recv().await.unwrap(), Table::Projects);
        assert_eq!(changes.recv().await.unwrap(), Table::Categories);
    }

    #[tokio::test]
    async fn failed_write_announces_nothing() {
        let store = Store::new(Database::open_in_memory().unwrap());
        let mut changes = store.subscribe();

        let result: crate::Result<()> = store
            .write(&[Table::Projects], |_| Err(gtd_local_db::Error::generic("abort")))
            .await;
        assert!(result.is_err());
        assert!(matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
