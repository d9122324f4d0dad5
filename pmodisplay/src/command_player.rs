//! Player driving an external media program
//!
//! [`CommandPlayer`] launches one process per clip (`mpv` by default) with the
//! clip URL as last argument. The process running means "playing"; media
//! loaded with no process running means "paused", which is also the state
//! after a natural end. A zero exit status is reported as
//! [`PlayerEvent::Ended`], tagged with the launch generation, which is also
//! what [`PlayerHandle::media`] returns until the next launch.

use crate::error::{Error, Result};
use crate::player::{PlayerEvent, PlayerHandle};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info, warn};

/// Default media program
pub const DEFAULT_PLAYER_PROGRAM: &str = "mpv";

/// Launch settings of a [`CommandPlayer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlayerConfig {
    pub program: String,
    /// Arguments placed before the URL
    pub args: Vec<String>,
    /// Extra arguments used while fullscreen is on; empty disables fullscreen
    pub fullscreen_args: Vec<String>,
}

impl Default for CommandPlayerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PLAYER_PROGRAM.to_string(),
            args: vec!["--really-quiet".to_string(), "--no-terminal".to_string()],
            fullscreen_args: vec!["--fs".to_string()],
        }
    }
}

#[derive(Debug, Default)]
struct ProcessState {
    url: Option<String>,
    running: bool,
    generation: u64,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessState {
    /// Stops the running process without reporting its exit
    fn stop(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
        self.running = false;
        self.generation += 1;
    }
}

/// [`PlayerHandle`] over an external program
pub struct CommandPlayer {
    config: CommandPlayerConfig,
    state: Arc<Mutex<ProcessState>>,
    fullscreen: AtomicBool,
    tx: broadcast::Sender<PlayerEvent>,
}

impl CommandPlayer {
    pub fn new(config: CommandPlayerConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(ProcessState::default())),
            fullscreen: AtomicBool::new(false),
            tx: broadcast::channel(16).0,
        }
    }

    pub fn config(&self) -> &CommandPlayerConfig {
        &self.config
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }

    fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args);
        if self.is_fullscreen() {
            cmd.args(&self.config.fullscreen_args);
        }
        cmd.arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Starts a process on `url` and a task waiting for its exit
    fn launch(&self, state: &mut ProcessState, url: &str) -> Result<()> {
        state.stop();
        let mut child = self.command(url).spawn()?;

        let generation = state.generation;
        let (kill_tx, kill_rx) = oneshot::channel();
        state.running = true;
        state.kill = Some(kill_tx);
        debug!(program = %self.config.program, url = %url, generation, "Player process started");

        let shared = self.state.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => Some(status),
                // also taken when the sender is dropped
                _ = kill_rx => {
                    let _ = child.kill().await;
                    None
                }
            };

            let mut state = shared.lock().await;
            if state.generation != generation {
                return;
            }
            state.running = false;
            state.kill = None;
            drop(state);

            match status {
                Some(Ok(status)) if status.success() => {
                    debug!(generation, "Player process ended");
                    let _ = tx.send(PlayerEvent::Ended { media: generation });
                }
                Some(Ok(status)) => {
                    warn!(generation, "Player process exited with {}", status);
                    let _ = tx.send(PlayerEvent::Failed(status.to_string()));
                }
                Some(Err(e)) => {
                    warn!(generation, "Failed to wait for player process: {}", e);
                    let _ = tx.send(PlayerEvent::Failed(e.to_string()));
                }
                None => {}
            }
        });

        Ok(())
    }
}

#[async_trait]
impl PlayerHandle for CommandPlayer {
    fn name(&self) -> &str {
        &self.config.program
    }

    async fn load(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.url = Some(url.to_string());
        self.launch(&mut state, url)
    }

    async fn play(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.running {
            return Ok(());
        }
        let url = state
            .url
            .clone()
            .ok_or_else(|| Error::player("no media loaded"))?;
        self.launch(&mut state, &url)
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.running {
            debug!(program = %self.config.program, "Player process stopped");
        }
        state.stop();
        state.url = None;
        Ok(())
    }

    async fn is_paused(&self) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.url.is_some() && !state.running)
    }

    async fn media(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// Toggles the fullscreen arguments for the next launches
    async fn request_fullscreen(&self) -> Result<()> {
        if self.config.fullscreen_args.is_empty() {
            return Err(Error::Unsupported("fullscreen"));
        }
        let enabled = !self.fullscreen.fetch_xor(true, Ordering::SeqCst);
        info!(program = %self.config.program, enabled, "Fullscreen toggled");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_lock() {
            state.stop();
        }
    }
}
