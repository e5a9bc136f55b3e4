//! Shared once-per-period tick for running timers.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Sequence number of a heartbeat tick.
pub type Tick = u64;

/// One heartbeat shared by every projection of a tracker.
///
/// The ticking task only runs while somebody is subscribed. Dropping the last
/// [`Ticks`] stops it; the next [`Heartbeat::subscribe`] starts a fresh one.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    period: Duration,
    sender: broadcast::Sender<Tick>,
    ticking: Mutex<bool>,
    left: Notify,
    token: CancellationToken,
}

/// A heartbeat subscription.
#[derive(Debug)]
pub struct Ticks {
    rx: Option<broadcast::Receiver<Tick>>,
    inner: Arc<Inner>,
}

impl Ticks {
    pub async fn recv(&mut self) -> Result<Tick, broadcast::error::RecvError> {
        match &mut self.rx {
            Some(rx) => rx.recv().await,
            None => Err(broadcast::error::RecvError::Closed),
        }
    }
}

impl Drop for Ticks {
    fn drop(&mut self) {
        // Release the receiver first so the tick task sees the new count.
        drop(self.rx.take());
        self.inner.left.notify_one();
    }
}

impl Heartbeat {
    pub fn new(period: Duration, parent: &CancellationToken) -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(Inner {
                period,
                sender,
                ticking: Mutex::new(false),
                left: Notify::new(),
                token: parent.child_token(),
            }),
        }
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    /// Subscribe to ticks, starting the ticking task if it is not running.
    pub fn subscribe(&self) -> Ticks {
        let mut ticking = self.inner.ticking.lock().unwrap_or_else(|e| e.into_inner());
        let rx = self.inner.sender.subscribe();
        if !*ticking && !self.inner.token.is_cancelled() {
            *ticking = true;
            debug!(period_ms = self.inner.period.as_millis() as u64, "heartbeat started");
            tokio::spawn(tick_loop(self.inner.clone()));
        }
        Ticks {
            rx: Some(rx),
            inner: self.inner.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    /// Whether the ticking task is currently alive.
    pub fn is_ticking(&self) -> bool {
        *self.inner.ticking.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn tick_loop(inner: Arc<Inner>) {
    let mut interval = interval_at(Instant::now() + inner.period, inner.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sequence: Tick = 0;

    loop {
        let due = tokio::select! {
            _ = inner.token.cancelled() => break,
            _ = inner.left.notified() => false,
            _ = interval.tick() => true,
        };

        {
            let mut ticking = inner.ticking.lock().unwrap_or_else(|e| e.into_inner());
            if inner.sender.receiver_count() == 0 {
                *ticking = false;
                debug!(ticks = sequence, "heartbeat stopped, no subscribers");
                return;
            }
        }

        if due {
            sequence += 1;
            let _ = inner.sender.send(sequence);
        }
    }

    *inner.ticking.lock().unwrap_or_else(|e| e.into_inner()) = false;
}
