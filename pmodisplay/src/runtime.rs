//! Wiring of the display loop
//!
//! [`DisplayRuntime::start`] spawns three tasks:
//!
//! - the [`CatalogPoller`], sending snapshots over a channel,
//! - the [`PlaybackWatchdog`], restarting a stalled player,
//! - the runtime task, sole owner of the [`PlaylistScheduler`] and of the
//!   [`PlaybackController`].
//!
//! The runtime task handles one message at a time (a snapshot, a player
//! notification, a timeout firing or a command), so every state change runs to
//! completion before the next one starts. [`DisplayHandle::shutdown`] cancels
//! all tasks and waits for them.

use crate::command_player::CommandPlayerConfig;
use crate::controller::{PlaybackController, TimeoutElapsed};
use crate::error::{Error, Result};
use crate::info::{InfoLog, DEFAULT_INFO_CAPACITY};
use crate::models::{ItemId, TimeoutConfig};
use crate::player::{PlayerEvent, PlayerHandle, PlayerSlot};
use crate::poller::{CatalogPoller, SnapshotUpdate, DEFAULT_POLL_INTERVAL};
use crate::scheduler::{PlaylistScheduler, RefillPolicy};
use crate::source::{CatalogSource, DEFAULT_CATALOG_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::watchdog::{PlaybackWatchdog, DEFAULT_WATCHDOG_INTERVAL};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything the display needs, resolved from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub catalog_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub watchdog_interval: Duration,
    pub refill: RefillPolicy,
    pub info_capacity: usize,
    pub player: CommandPlayerConfig,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            refill: RefillPolicy::default(),
            info_capacity: DEFAULT_INFO_CAPACITY,
            player: CommandPlayerConfig::default(),
        }
    }
}

/// Requests accepted by the runtime task
pub enum DisplayCommand {
    Skip,
    ToggleFullscreen,
    Attach(Arc<dyn PlayerHandle>),
    Detach,
    Status(oneshot::Sender<DisplayStatus>),
}

/// Point-in-time view of the playback state
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayStatus {
    pub current: Option<ItemId>,
    /// None when nothing is current or the current item was dropped
    pub current_url: Option<String>,
    pub queued: usize,
    pub catalog_size: usize,
    pub timeout: TimeoutConfig,
    pub timer_armed: bool,
    pub player_attached: bool,
    pub halted: bool,
}

/// Builder-style entry point
pub struct DisplayRuntime {
    source: Arc<dyn CatalogSource>,
    settings: DisplaySettings,
    info: Option<InfoLog>,
    rng: Option<StdRng>,
}

impl DisplayRuntime {
    pub fn new(source: Arc<dyn CatalogSource>, settings: DisplaySettings) -> Self {
        Self {
            source,
            settings,
            info: None,
            rng: None,
        }
    }

    /// Writes status lines into `info` instead of a private log
    pub fn with_info_log(mut self, info: InfoLog) -> Self {
        self.info = Some(info);
        self
    }

    /// Draws refills from `rng`
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Spawns the poller, the watchdog and the runtime task
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(self, player: Option<Arc<dyn PlayerHandle>>) -> DisplayHandle {
        let info = self
            .info
            .unwrap_or_else(|| InfoLog::new(self.settings.info_capacity));
        let cancel = CancellationToken::new();
        let slot = PlayerSlot::new();

        let (snapshot_tx, snapshot_rx) = mpsc::channel(16);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (timeout_tx, timeout_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let scheduler = match self.rng {
            Some(rng) => PlaylistScheduler::with_rng(self.settings.refill, info.clone(), rng),
            None => PlaylistScheduler::new(self.settings.refill, info.clone()),
        };
        let controller = PlaybackController::new(slot.clone(), info.clone(), timeout_tx);

        let mut state = RuntimeState {
            scheduler,
            controller,
            slot: slot.clone(),
            info: info.clone(),
            cancel: cancel.clone(),
            event_tx,
            attachment: 0,
            forwarder: None,
        };
        if let Some(player) = player {
            state.install_player(player);
        }

        let poller = CatalogPoller::new(self.source, self.settings.poll_interval)
            .spawn(snapshot_tx, cancel.clone());
        let watchdog =
            PlaybackWatchdog::new(slot.clone(), self.settings.watchdog_interval).spawn(cancel.clone());
        let runtime = tokio::spawn(state.run(snapshot_rx, command_rx, timeout_rx, event_rx));

        DisplayHandle {
            commands: command_tx,
            info,
            slot,
            cancel,
            tasks: vec![runtime, poller, watchdog],
        }
    }
}

struct RuntimeState {
    scheduler: PlaylistScheduler,
    controller: PlaybackController,
    slot: PlayerSlot,
    info: InfoLog,
    cancel: CancellationToken,
    event_tx: mpsc::UnboundedSender<(u64, PlayerEvent)>,
    /// Serial of the attached player; events tagged otherwise are stale
    attachment: u64,
    forwarder: Option<CancellationToken>,
}

impl RuntimeState {
    async fn run(
        mut self,
        mut snapshots: mpsc::Receiver<SnapshotUpdate>,
        mut commands: mpsc::Receiver<DisplayCommand>,
        mut timeouts: mpsc::UnboundedReceiver<TimeoutElapsed>,
        mut events: mpsc::UnboundedReceiver<(u64, PlayerEvent)>,
    ) {
        self.info.push("Ready");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(update) = snapshots.recv() => {
                    self.scheduler.on_snapshot(update.snapshot, update.initial);
                    self.controller.sync(&mut self.scheduler).await;
                }
                Some((serial, event)) = events.recv() => {
                    self.on_player_event(serial, event).await;
                }
                Some(elapsed) = timeouts.recv() => {
                    self.controller.on_timeout(elapsed, &mut self.scheduler).await;
                }
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => {
                        debug!("Every display handle dropped");
                        self.cancel.cancel();
                        break;
                    }
                },
            }
        }

        self.controller.teardown();
        self.detach_player();
        debug!("Display runtime stopped");
    }

    async fn on_player_event(&mut self, serial: u64, event: PlayerEvent) {
        if serial != self.attachment {
            debug!(serial, "Ignoring event from a detached player");
            return;
        }
        match event {
            PlayerEvent::Ended { media } => {
                if let Some(player) = self.slot.get() {
                    let loaded = player.media().await;
                    if loaded != media {
                        debug!(media, loaded, "Ignoring end of a replaced clip");
                        return;
                    }
                }
                debug!(media, "Clip ended");
                self.controller.on_ended(&mut self.scheduler).await;
            }
            PlayerEvent::Failed(reason) => {
                // the watchdog restarts a failed player
                warn!("Player reported a failure: {}", reason);
            }
        }
    }

    async fn on_command(&mut self, command: DisplayCommand) {
        match command {
            DisplayCommand::Skip => self.controller.skip(&mut self.scheduler).await,
            DisplayCommand::ToggleFullscreen => self.controller.toggle_fullscreen().await,
            DisplayCommand::Attach(player) => {
                self.install_player(player);
                self.controller.reload_current(&self.scheduler).await;
            }
            DisplayCommand::Detach => self.detach_player(),
            DisplayCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// Puts `player` in the slot and forwards its events, tagged with a new serial
    fn install_player(&mut self, player: Arc<dyn PlayerHandle>) {
        self.detach_player();
        info!(player = player.name(), "Player attached");

        let serial = self.attachment;
        let token = self.cancel.child_token();
        let mut rx = player.subscribe();
        let tx = self.event_tx.clone();
        let stop = token.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = stop.cancelled() => break,
                    event = rx.recv() => event,
                };
                match event {
                    Ok(event) => {
                        if tx.send((serial, event)).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Player events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.forwarder = Some(token);
        self.slot.attach(player);
    }

    fn detach_player(&mut self) {
        if let Some(token) = self.forwarder.take() {
            token.cancel();
        }
        self.attachment += 1;
        if let Some(player) = self.slot.detach() {
            info!(player = player.name(), "Player detached");
        }
    }

    fn status(&self) -> DisplayStatus {
        let current = self.scheduler.current().cloned();
        DisplayStatus {
            current_url: current
                .as_ref()
                .and_then(|id| self.scheduler.resolve_url(id))
                .map(str::to_string),
            current,
            queued: self.scheduler.queue().len(),
            catalog_size: self.scheduler.snapshot().len(),
            timeout: self.controller.timeout(),
            timer_armed: self.controller.timer_armed(),
            player_attached: self.slot.is_attached(),
            halted: self.slot.is_halted(),
        }
    }
}

/// Control handle of a started display
pub struct DisplayHandle {
    commands: mpsc::Sender<DisplayCommand>,
    info: InfoLog,
    slot: PlayerSlot,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl DisplayHandle {
    async fn send(&self, command: DisplayCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::other("display runtime stopped"))
    }

    /// Jumps to the next item
    pub async fn skip(&self) -> Result<()> {
        self.send(DisplayCommand::Skip).await
    }

    pub async fn toggle_fullscreen(&self) -> Result<()> {
        self.send(DisplayCommand::ToggleFullscreen).await
    }

    /// Replaces the player; the current item is loaded into it
    pub async fn attach_player(&self, player: Arc<dyn PlayerHandle>) -> Result<()> {
        self.send(DisplayCommand::Attach(player)).await
    }

    pub async fn detach_player(&self) -> Result<()> {
        self.send(DisplayCommand::Detach).await
    }

    pub async fn status(&self) -> Result<DisplayStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(DisplayCommand::Status(tx)).await?;
        rx.await
            .map_err(|_| Error::other("display runtime stopped"))
    }

    /// Status lines written by the display
    pub fn info(&self) -> &InfoLog {
        &self.info
    }

    pub fn player_slot(&self) -> &PlayerSlot {
        &self.slot
    }

    /// Token cancelled on shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops every task and waits for them
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Display task failed: {}", e);
            }
        }
        info!("Display stopped");
    }
}
