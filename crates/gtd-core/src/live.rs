//! Live queries: values that re-derive themselves whenever their tables change.

use crate::store::{Store, Table};
use gtd_local_db::Connection;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// A query the live machinery can re-run on demand.
pub type QueryFn<T> = Arc<dyn Fn(&Connection) -> gtd_local_db::Result<T> + Send + Sync>;

/// Handle to a continuously updated value.
///
/// The background task feeding the view stops once every clone of the handle
/// is dropped.
#[derive(Debug)]
pub struct LiveView<T> {
    rx: watch::Receiver<T>,
    _guard: Arc<DropGuard>,
}

impl<T> Clone for LiveView<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            _guard: self._guard.clone(),
        }
    }
}

impl<T: Clone> LiveView<T> {
    pub(crate) fn new(rx: watch::Receiver<T>, token: CancellationToken) -> Self {
        Self {
            rx,
            _guard: Arc::new(token.drop_guard()),
        }
    }

    /// The latest published value.
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Wait for a value newer than the last one seen through this handle.
    pub async fn changed(&mut self) -> crate::Result<T> {
        self.rx
            .changed()
            .await
            .map_err(|_| crate::Error::generic("live view closed"))?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Wait until the published value satisfies `predicate`.
    pub async fn wait_for<F>(&mut self, predicate: F) -> crate::Result<T>
    where
        F: FnMut(&T) -> bool,
    {
        let value = self
            .rx
            .wait_for(predicate)
            .await
            .map_err(|_| crate::Error::generic("live view closed"))?;
        Ok(value.clone())
    }
}

/// Run `query` now and again after every committed write to one of `tables`.
///
/// Unchanged results are not republished. A failing re-run is logged and the
/// previous value stays visible.
pub async fn live_query<T>(
    store: &Store,
    tables: &'static [Table],
    query: QueryFn<T>,
    parent: &CancellationToken,
) -> crate::Result<LiveView<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    // Subscribe first so no write between the initial read and the loop is missed.
    let changes = store.subscribe();
    let initial = run_query(store, &query).await?;
    let (tx, rx) = watch::channel(initial);
    let token = parent.child_token();

    tokio::spawn(refresh_loop(store.clone(), tables, query, changes, tx, token.clone()));
    Ok(LiveView::new(rx, token))
}

async fn run_query<T>(store: &Store, query: &QueryFn<T>) -> crate::Result<T>
where
    T: Send + 'static,
{
    let query = query.clone();
    store.read(move |conn| query(conn)).await
}

async fn refresh_loop<T>(
    store: Store,
    tables: &'static [Table],
    query: QueryFn<T>,
    mut changes: broadcast::Receiver<Table>,
    tx: watch::Sender<T>,
    token: CancellationToken,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tx.closed() => break,
            change = changes.recv() => match change {
                Ok(table) if !tables.contains(&table) => continue,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "change feed lagged, re-running query");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }

        // Coalesce a burst of writes into one re-run.
        while changes.try_recv().is_ok() {}

        match run_query(&store, &query).await {
            Ok(rows) => {
                tx.send_if_modified(|current| {
                    if *current == rows {
                        return false;
                    }
                    *current = rows;
                    true
                });
            }
            Err(e) => warn!(error = %e, "live query re-run failed, keeping previous value"),
        }
    }
    debug!(?tables, "live query stopped");
}
