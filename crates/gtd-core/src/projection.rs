//! Live elapsed-time projection over persisted steps.
//!
//! The projection keeps the latest persisted value and whether any step in it
//! is running. It holds a heartbeat subscription only while that flag is set,
//! and on every tick recomputes the elapsed seconds without touching storage.

use crate::clock::Clock;
use crate::heartbeat::{Heartbeat, Tick, Ticks};
use crate::live::LiveView;
use crate::timer;
use gtd_local_db::StepRecord;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A step together with its display duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    #[serde(flatten)]
    pub record: StepRecord,
    pub live_elapsed_seconds: i64,
}

impl StepView {
    pub fn at(record: StepRecord, now_millis: i64) -> Self {
        let live_elapsed_seconds = timer::live_elapsed_seconds(&record, now_millis);
        Self {
            record,
            live_elapsed_seconds,
        }
    }
}

/// Persisted shapes the projection understands.
pub trait Timed: Clone + PartialEq + Send + Sync + 'static {
    type View: Clone + PartialEq + Send + Sync + 'static;

    fn any_running(&self) -> bool;
    fn view_at(&self, now_millis: i64) -> Self::View;
}

impl Timed for Vec<StepRecord> {
    type View = Vec<StepView>;

    fn any_running(&self) -> bool {
        self.iter().any(|step| step.is_running)
    }

    fn view_at(&self, now_millis: i64) -> Self::View {
        self.iter().map(|step| StepView::at(step.clone(), now_millis)).collect()
    }
}

impl Timed for Option<StepRecord> {
    type View = Option<StepView>;

    fn any_running(&self) -> bool {
        self.as_ref().is_some_and(|step| step.is_running)
    }

    fn view_at(&self, now_millis: i64) -> Self::View {
        self.as_ref().map(|step| StepView::at(step.clone(), now_millis))
    }
}

/// Project `source` through the heartbeat.
pub fn project<C: Timed>(
    source: LiveView<C>,
    heartbeat: Heartbeat,
    clock: Arc<dyn Clock>,
    parent: &CancellationToken,
) -> LiveView<C::View> {
    let latest = source.current();
    let (tx, rx) = watch::channel(latest.view_at(clock.now_millis()));
    let token = parent.child_token();

    let projection = Projection {
        latest,
        ticks: None,
        heartbeat,
        clock,
        tx,
    };
    tokio::spawn(projection.run(source, token.clone()));
    LiveView::new(rx, token)
}

struct Projection<C: Timed> {
    latest: C,
    ticks: Option<Ticks>,
    heartbeat: Heartbeat,
    clock: Arc<dyn Clock>,
    tx: watch::Sender<C::View>,
}

impl<C: Timed> Projection<C> {
    async fn run(mut self, mut source: LiveView<C>, token: CancellationToken) {
        self.sync_heartbeat();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = self.tx.closed() => break,
                latest = source.changed() => match latest {
                    Ok(latest) => {
                        self.latest = latest;
                        self.sync_heartbeat();
                    }
                    Err(_) => break,
                },
                tick = next_tick(&mut self.ticks) => {
                    if let Err(broadcast::error::RecvError::Closed) = tick {
                        self.ticks = None;
                    }
                }
            }
            self.publish();
        }
    }

    /// Attach to the heartbeat while anything runs, detach otherwise.
    fn sync_heartbeat(&mut self) {
        let running = self.latest.any_running();
        match (running, self.ticks.is_some()) {
            (true, false) => {
                debug!("timer running, attaching heartbeat");
                self.ticks = Some(self.heartbeat.subscribe());
            }
            (false, true) => {
                debug!("no timer running, detaching heartbeat");
                self.ticks = None;
            }
            _ => {}
        }
    }

    fn publish(&self) {
        let view = self.latest.view_at(self.clock.now_millis());
        self.tx.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }
}

async fn next_tick(
    ticks: &mut Option<Ticks>,
) -> Result<Tick, broadcast::error::RecvError> {
    match ticks {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
