//! Filter-driven live queries.
//!
//! The caller owns a `watch` of [`FilterKey`]. Each switching query derives the
//! key it cares about, and whenever that derived key changes it cancels the
//! live query it was forwarding and starts the matching one. Results carry the
//! token of the subscription that produced them, so anything still in flight
//! from a cancelled subscription is discarded.

use crate::live::{live_query, LiveView, QueryFn};
use crate::store::{Store, Table};
use gtd_local_db::{Connection, ProjectFilter, ProjectRecord, ProjectStore};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Combined filter state: partition plus optional category and status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterKey {
    pub demo_mode: bool,
    pub category: Option<String>,
    pub status: Option<String>,
}

impl FilterKey {
    pub fn project_filter(&self) -> ProjectFilter {
        ProjectFilter {
            is_demo: self.demo_mode,
            category: self.category.clone(),
            status: self.status.clone(),
        }
    }
}

/// Blank filter values mean "no filter".
pub(crate) fn normalize(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

const FORWARD_CAPACITY: usize = 16;

/// Projects matching the current filter key.
pub async fn filtered_projects(
    store: Store,
    keys: watch::Receiver<FilterKey>,
    parent: &CancellationToken,
) -> crate::Result<LiveView<Vec<ProjectRecord>>> {
    switching_query(store, keys, parent, FilterKey::project_filter, |filter: &ProjectFilter| {
        let filter = filter.clone();
        let query: QueryFn<Vec<ProjectRecord>> =
            Arc::new(move |conn: &Connection| ProjectStore::new(conn).list(&filter));
        query
    })
    .await
}

/// Categories used by projects of the current partition.
pub async fn categories_in_use(
    store: Store,
    keys: watch::Receiver<FilterKey>,
    parent: &CancellationToken,
) -> crate::Result<LiveView<Vec<String>>> {
    switching_query(store, keys, parent, |key: &FilterKey| key.demo_mode, |is_demo: &bool| {
        let is_demo = *is_demo;
        let query: QueryFn<Vec<String>> =
            Arc::new(move |conn: &Connection| ProjectStore::new(conn).categories_in_partition(is_demo));
        query
    })
    .await
}

/// Statuses used by projects of the current partition.
pub async fn statuses_in_use(
    store: Store,
    keys: watch::Receiver<FilterKey>,
    parent: &CancellationToken,
) -> crate::Result<LiveView<Vec<String>>> {
    switching_query(store, keys, parent, |key: &FilterKey| key.demo_mode, |is_demo: &bool| {
        let is_demo = *is_demo;
        let query: QueryFn<Vec<String>> =
            Arc::new(move |conn: &Connection| ProjectStore::new(conn).statuses_in_partition(is_demo));
        query
    })
    .await
}

async fn switching_query<Q, T, S, M>(
    store: Store,
    mut keys: watch::Receiver<FilterKey>,
    parent: &CancellationToken,
    select: S,
    make: M,
) -> crate::Result<LiveView<T>>
where
    Q: Clone + PartialEq + Debug + Send + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
    S: Fn(&FilterKey) -> Q + Send + 'static,
    M: Fn(&Q) -> QueryFn<T> + Send + 'static,
{
    let token = parent.child_token();
    let query_key = select(&keys.borrow_and_update());
    let source = live_query(&store, &[Table::Projects], make(&query_key), &token).await?;

    let (tx, rx) = watch::channel(source.current());
    let driver = Driver {
        store,
        select,
        make,
        query_key,
        generation: 0,
        token: token.clone(),
        forwarder: token.child_token(),
        tx,
    };
    tokio::spawn(driver.run(keys, source));
    Ok(LiveView::new(rx, token))
}

struct Driver<Q, T, S, M> {
    store: Store,
    select: S,
    make: M,
    query_key: Q,
    generation: u64,
    token: CancellationToken,
    forwarder: CancellationToken,
    tx: watch::Sender<T>,
}

impl<Q, T, S, M> Driver<Q, T, S, M>
where
    Q: Clone + PartialEq + Debug + Send + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
    S: Fn(&FilterKey) -> Q + Send + 'static,
    M: Fn(&Q) -> QueryFn<T> + Send + 'static,
{
    async fn run(mut self, mut keys: watch::Receiver<FilterKey>, source: LiveView<T>) {
        let (rows_tx, mut rows_rx) = mpsc::channel(FORWARD_CAPACITY);
        tokio::spawn(forward(source, self.generation, rows_tx.clone(), self.forwarder.clone()));

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = self.tx.closed() => break,
                changed = keys.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = (self.select)(&keys.borrow_and_update());
                    if next != self.query_key {
                        self.switch_to(next, &rows_tx).await;
                    }
                }
                Some((generation, rows)) = rows_rx.recv() => {
                    if generation != self.generation {
                        debug!(generation, current = self.generation, "dropping stale emission");
                        continue;
                    }
                    self.publish(rows);
                }
            }
        }
        self.forwarder.cancel();
    }

    async fn switch_to(&mut self, next: Q, rows_tx: &mpsc::Sender<(u64, T)>) {
        self.forwarder.cancel();
        self.generation += 1;
        self.query_key = next;
        debug!(generation = self.generation, key = ?self.query_key, "switching live query");

        let query = (self.make)(&self.query_key);
        match live_query(&self.store, &[Table::Projects], query, &self.token).await {
            Ok(source) => {
                self.publish(source.current());
                self.forwarder = self.token.child_token();
                tokio::spawn(forward(source, self.generation, rows_tx.clone(), self.forwarder.clone()));
            }
            // Keep showing the previous result; the next key change retries.
            Err(e) => warn!(error = %e, key = ?self.query_key, "failed to start live query"),
        }
    }

    fn publish(&self, rows: T) {
        self.tx.send_if_modified(|current| {
            if *current == rows {
                return false;
            }
            *current = rows;
            true
        });
    }
}

/// Relay every value of `source`, tagged with `generation`, until cancelled.
async fn forward<T>(
    mut source: LiveView<T>,
    generation: u64,
    rows_tx: mpsc::Sender<(u64, T)>,
    token: CancellationToken,
) where
    T: Clone + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            rows = source.changed() => {
                let Ok(rows) = rows else { break };
                if rows_tx.send((generation, rows)).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filters_are_dropped() {
        assert_eq!(normalize(Some("  ".into())), None);
        assert_eq!(normalize(None), None);
        assert_eq!(normalize(Some("Work".into())), Some("Work".to_string()));
    }

    #[test]
    fn key_maps_onto_project_filter() {
        let key = FilterKey {
            demo_mode: true,
            category: Some("Work".into()),
            status: None,
        };
        let filter = key.project_filter();
        assert!(filter.is_demo);
        assert_eq!(filter.category.as_deref(), Some("Work"));
        assert_eq!(filter.status, None);
    }
}
