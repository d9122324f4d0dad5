//! Stall detection
//!
//! Some media elements stop on their own (decoder hiccup, lost focus, a
//! crashed helper process). The watchdog asks the attached player once per
//! interval whether it is paused and calls `play()` again when it is, unless
//! the slot is halted because there is nothing to play.

use crate::player::PlayerSlot;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default delay between two checks
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_millis(1000);

/// Periodic liveness check on the attached player
#[derive(Debug, Clone)]
pub struct PlaybackWatchdog {
    slot: PlayerSlot,
    interval: Duration,
}

impl PlaybackWatchdog {
    pub fn new(slot: PlayerSlot, interval: Duration) -> Self {
        Self {
            slot,
            interval: if interval.is_zero() {
                DEFAULT_WATCHDOG_INTERVAL
            } else {
                interval
            },
        }
    }

    /// Runs the loop on a new task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }

        debug!("Playback watchdog stopped");
    }

    /// One check; returns true when playback was restarted
    pub async fn check(&self) -> bool {
        if self.slot.is_halted() {
            return false;
        }
        let Some(player) = self.slot.get() else {
            return false;
        };

        match player.is_paused().await {
            Ok(true) => {
                info!(player = player.name(), "Player paused, restarting playback");
                if let Err(e) = player.play().await {
                    warn!(player = player.name(), "Failed to restart playback: {}", e);
                }
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!(player = player.name(), "Could not query player state: {}", e);
                false
            }
        }
    }
}
