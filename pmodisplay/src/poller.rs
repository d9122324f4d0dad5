//! Periodic catalog fetch
//!
//! The poller never touches the scheduler. Each successful fetch is sent as a
//! [`SnapshotUpdate`] to the runtime task, which owns all playlist state. The
//! first successful fetch is flagged `initial`; failures are logged and the
//! next tick simply tries again.

use crate::models::CatalogSnapshot;
use crate::source::CatalogSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default delay between two fetches
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// A fetched catalog on its way to the scheduler
#[derive(Debug, Clone)]
pub struct SnapshotUpdate {
    pub snapshot: CatalogSnapshot,
    /// True for the first successful fetch only
    pub initial: bool,
}

/// Fixed-interval fetch loop
pub struct CatalogPoller {
    source: Arc<dyn CatalogSource>,
    interval: Duration,
}

impl CatalogPoller {
    pub fn new(source: Arc<dyn CatalogSource>, interval: Duration) -> Self {
        Self {
            source,
            interval: if interval.is_zero() {
                DEFAULT_POLL_INTERVAL
            } else {
                interval
            },
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs the loop on a new task
    pub fn spawn(
        self,
        tx: mpsc::Sender<SnapshotUpdate>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(tx, cancel))
    }

    /// Fetches immediately, then once per interval, until cancelled or until
    /// the receiver goes away
    pub async fn run(self, tx: mpsc::Sender<SnapshotUpdate>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut initial = true;
        let mut failures: u32 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.source.fetch_snapshot() => result,
            };

            match result {
                Ok(snapshot) => {
                    if failures > 0 {
                        info!(failures, "Catalog reachable again");
                        failures = 0;
                    }
                    let update = SnapshotUpdate { snapshot, initial };
                    initial = false;
                    if tx.send(update).await.is_err() {
                        debug!("Snapshot receiver closed");
                        break;
                    }
                }
                Err(e) => {
                    failures += 1;
                    if failures == 1 {
                        warn!("Catalog fetch failed: {}", e);
                    } else {
                        debug!(failures, "Catalog fetch failed again: {}", e);
                    }
                }
            }
        }

        debug!("Catalog poller stopped");
    }
}
