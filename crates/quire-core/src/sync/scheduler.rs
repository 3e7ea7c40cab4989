//! Background drain scheduling.
//!
//! A single task owns the drain cadence: one drain on every offline to online
//! transition, a periodic drain while online, and on-demand drains requested
//! through a [`DrainTrigger`].

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::{ConnectivityGate, SyncQueueProcessor};

/// Cloneable request for "drain as soon as possible".
///
/// Requests made while a drain is running coalesce into one follow-up drain.
#[derive(Clone, Default)]
pub struct DrainTrigger {
    notify: Arc<Notify>,
}

impl DrainTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_drain(&self) {
        self.notify.notify_one();
    }

    async fn requested(&self) {
        self.notify.notified().await;
    }
}

pub struct SyncScheduler {
    processor: Arc<SyncQueueProcessor>,
    gate: ConnectivityGate,
    period: Duration,
    trigger: DrainTrigger,
}

impl SyncScheduler {
    pub fn new(
        processor: Arc<SyncQueueProcessor>,
        gate: ConnectivityGate,
        period: Duration,
        trigger: DrainTrigger,
    ) -> Self {
        Self {
            processor,
            gate,
            period,
            trigger,
        }
    }

    /// Start the scheduling loop on the current tokio runtime.
    pub fn spawn(self) -> SyncHandle {
        let shutdown = Arc::new(Notify::new());
        let trigger = self.trigger.clone();
        let task = tokio::spawn(self.run(shutdown.clone()));
        SyncHandle {
            trigger,
            shutdown,
            task,
        }
    }

    async fn run(self, shutdown: Arc<Notify>) {
        let mut status = self.gate.subscribe();
        let mut online = *status.borrow_and_update();
        let mut ticker = None;
        if online {
            self.drain_once().await;
            ticker = Some(self.ticker());
        }
        tracing::debug!(online, period = ?self.period, "Sync scheduler started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.notified() => break,
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *status.borrow_and_update();
                    if now_online && !online {
                        self.drain_once().await;
                        ticker = Some(self.ticker());
                    } else if !now_online {
                        ticker = None;
                    }
                    online = now_online;
                }
                () = self.trigger.requested() => self.drain_once().await,
                () = next_tick(&mut ticker) => self.drain_once().await,
            }
        }
        tracing::debug!("Sync scheduler stopped");
    }

    fn ticker(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    async fn drain_once(&self) {
        if let Err(e) = self.processor.drain().await {
            tracing::error!("Sync drain failed: {e}");
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

/// Handle to a running [`SyncScheduler`].
pub struct SyncHandle {
    trigger: DrainTrigger,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn request_drain(&self) {
        self.trigger.request_drain();
    }

    pub fn trigger(&self) -> DrainTrigger {
        self.trigger.clone()
    }

    /// Stop the loop after any in-flight drain finishes.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            tracing::warn!("Sync scheduler task ended abnormally: {e}");
        }
    }
}
