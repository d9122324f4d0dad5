//! Reaction to scheduler events: load, play and the auto-advance timer
//!
//! [`PlaybackController`] turns [`SchedulerEvent`]s into player calls. It owns
//! the one-shot timeout timer that advances the playlist when the catalog
//! enables it. Firings are matched against a generation number, so a timer
//! message that was already in flight when its item got replaced is ignored.

use crate::error::Error;
use crate::info::InfoLog;
use crate::models::{ItemId, TimeoutConfig};
use crate::player::{PlayerHandle, PlayerSlot};
use crate::scheduler::{PlaylistScheduler, SchedulerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Message sent when an item timeout fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutElapsed {
    pub generation: u64,
}

/// Pending one-shot timer; aborted when dropped
#[derive(Debug)]
struct TimeoutTimer {
    handle: JoinHandle<()>,
}

impl TimeoutTimer {
    fn start(generation: u64, delay: Duration, tx: mpsc::UnboundedSender<TimeoutElapsed>) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimeoutElapsed { generation });
        });
        Self { handle }
    }
}

impl Drop for TimeoutTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Drives the attached player from scheduler events
#[derive(Debug)]
pub struct PlaybackController {
    slot: PlayerSlot,
    info: InfoLog,
    timeout: TimeoutConfig,
    timeout_tx: mpsc::UnboundedSender<TimeoutElapsed>,
    timer: Option<TimeoutTimer>,
    generation: u64,
}

impl PlaybackController {
    pub fn new(
        slot: PlayerSlot,
        info: InfoLog,
        timeout_tx: mpsc::UnboundedSender<TimeoutElapsed>,
    ) -> Self {
        Self {
            slot,
            info,
            timeout: TimeoutConfig::disabled(),
            timeout_tx,
            timer: None,
            generation: 0,
        }
    }

    /// Handles every pending scheduler event
    pub async fn sync(&mut self, scheduler: &mut PlaylistScheduler) {
        for event in scheduler.drain_events() {
            self.handle_event(event, scheduler).await;
        }
    }

    async fn handle_event(&mut self, event: SchedulerEvent, scheduler: &PlaylistScheduler) {
        match event {
            SchedulerEvent::CurrentItemChanged {
                current: Some(id), ..
            } => {
                self.start_item(&id, scheduler).await;
            }
            SchedulerEvent::CurrentItemChanged { current: None, .. } => {
                debug!("No current item, playback halted");
                self.cancel_timer();
                self.halt_player().await;
            }
            SchedulerEvent::CurrentItemRepeated(id) if self.slot.is_halted() => {
                // nothing loaded any more, so a replay is a fresh start
                self.start_item(&id, scheduler).await;
            }
            SchedulerEvent::CurrentItemRepeated(id) => {
                self.cancel_timer();
                self.slot.set_halted(false);
                if let Some(player) = self.slot.get() {
                    debug!(item = %id, "Replaying current item");
                    if let Err(e) = player.play().await {
                        warn!(item = %id, "Failed to restart playback: {}", e);
                    }
                }
                self.arm_timer();
            }
            SchedulerEvent::TimeoutConfigChanged(config) => {
                self.info.push(config.to_string());
                self.timeout = config;
                if !config.enabled {
                    self.cancel_timer();
                }
            }
            SchedulerEvent::NewItemsDetected(ids) => {
                debug!(count = ids.len(), "New items detected");
            }
            SchedulerEvent::Refilled(batch) => {
                debug!(size = batch.len(), "Queue refilled");
            }
        }
    }

    async fn start_item(&mut self, id: &ItemId, scheduler: &PlaylistScheduler) {
        self.cancel_timer();

        match scheduler.resolve_url(id) {
            Some(url) => {
                self.slot.set_halted(false);
                match self.slot.get() {
                    Some(player) => Self::load_and_play(player, id, url).await,
                    None => info!(item = %id, "No player attached, item not loaded"),
                }
            }
            None => {
                warn!(item = %id, "Item is no longer published, nothing to load");
                self.halt_player().await;
            }
        }

        self.arm_timer();
    }

    /// Halts the slot and unloads whatever the player still holds
    async fn halt_player(&self) {
        self.slot.set_halted(true);
        if let Some(player) = self.slot.get() {
            if let Err(e) = player.stop().await {
                warn!(player = player.name(), "Failed to stop playback: {}", e);
            }
        }
    }

    async fn load_and_play(player: Arc<dyn PlayerHandle>, id: &ItemId, url: &str) {
        info!(item = %id, url = %url, "Load new clip and start playback");
        if let Err(e) = player.load(url).await {
            warn!(item = %id, "Failed to load clip: {}", e);
            return;
        }
        if let Err(e) = player.play().await {
            warn!(item = %id, "Failed to start playback: {}", e);
        }
    }

    fn arm_timer(&mut self) {
        if self.timeout.enabled {
            debug!(delay = ?self.timeout.delay, generation = self.generation, "Timeout armed");
            self.timer = Some(TimeoutTimer::start(
                self.generation,
                self.timeout.delay,
                self.timeout_tx.clone(),
            ));
        }
    }

    fn cancel_timer(&mut self) {
        self.timer = None;
        self.generation += 1;
    }

    /// True while an auto-advance timer is pending
    pub fn timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn timeout(&self) -> TimeoutConfig {
        self.timeout
    }

    /// Advances when `elapsed` belongs to the pending timer
    ///
    /// Returns false for a stale firing.
    pub async fn on_timeout(
        &mut self,
        elapsed: TimeoutElapsed,
        scheduler: &mut PlaylistScheduler,
    ) -> bool {
        if self.timer.is_none() || elapsed.generation != self.generation {
            debug!(
                generation = elapsed.generation,
                current = self.generation,
                "Ignoring stale timeout"
            );
            return false;
        }
        self.timer = None;
        debug!("Timeout elapsed, advancing");
        scheduler.advance();
        self.sync(scheduler).await;
        true
    }

    /// The player reported a natural end
    pub async fn on_ended(&mut self, scheduler: &mut PlaylistScheduler) {
        scheduler.advance();
        self.sync(scheduler).await;
    }

    /// Jumps to the next item
    pub async fn skip(&mut self, scheduler: &mut PlaylistScheduler) {
        info!("Skipping current item");
        scheduler.advance();
        self.sync(scheduler).await;
    }

    /// Passes a fullscreen request to the player; no scheduling effect
    pub async fn toggle_fullscreen(&self) {
        let player = match self.slot.require() {
            Ok(player) => player,
            Err(e) => {
                info!("Fullscreen ignored: {}", e);
                return;
            }
        };
        match player.request_fullscreen().await {
            Ok(()) => debug!(player = player.name(), "Fullscreen requested"),
            Err(Error::Unsupported(what)) => {
                info!(player = player.name(), "Player does not support {}", what)
            }
            Err(e) => warn!(player = player.name(), "Fullscreen request failed: {}", e),
        }
    }

    /// Loads the current item into a freshly attached player
    ///
    /// The pending timer keeps running.
    pub async fn reload_current(&self, scheduler: &PlaylistScheduler) {
        let (Some(id), Some(player)) = (scheduler.current(), self.slot.get()) else {
            return;
        };
        match scheduler.resolve_url(id) {
            Some(url) => Self::load_and_play(player, id, url).await,
            None => warn!(item = %id, "Item is no longer published, nothing to load"),
        }
    }

    /// Stops the timer and halts the slot
    pub fn teardown(&mut self) {
        self.cancel_timer();
        self.slot.set_halted(true);
    }
}
