//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use pmodisplay::{CatalogSnapshot, CatalogSource, Error, Item, PlayerEvent, PlayerHandle, Result, TimeoutConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

/// Snapshot of items `ids`, each playing `<id>.mp4`
pub fn catalog(ids: &[&str], timeout: TimeoutConfig) -> CatalogSnapshot {
    CatalogSnapshot::new(
        ids.iter().map(|id| Item::new(*id, format!("{}.mp4", id))),
        timeout,
    )
}

pub fn timeout_secs(secs: u64) -> TimeoutConfig {
    TimeoutConfig::after(Duration::from_secs(secs))
}

/// Catalog source returning whatever was last published; fails while empty
#[derive(Default)]
pub struct ScriptedSource {
    snapshot: Mutex<Option<CatalogSnapshot>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(snapshot: Option<CatalogSnapshot>) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn publish(&self, snapshot: CatalogSnapshot) {
        *self.snapshot.lock().unwrap() = Some(snapshot);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<CatalogSnapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::Status(503))
    }
}

/// Player recording every call
pub struct RecordingPlayer {
    calls: Mutex<Vec<String>>,
    paused: AtomicBool,
    media: AtomicU64,
    tx: broadcast::Sender<PlayerEvent>,
}

impl Default for RecordingPlayer {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            paused: AtomicBool::new(false),
            media: AtomicU64::new(0),
            tx: broadcast::channel(16).0,
        }
    }
}

impl RecordingPlayer {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("load ").map(str::to_string))
            .collect()
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Tag of the current playback
    pub fn current_media(&self) -> u64 {
        self.media.load(Ordering::SeqCst)
    }

    /// Simulates the natural end of the loaded clip
    pub fn end(&self) {
        self.paused.store(true, Ordering::SeqCst);
        let _ = self.tx.send(PlayerEvent::Ended {
            media: self.current_media(),
        });
    }

    /// Sends an end notification for the playback tagged `media`
    pub fn end_media(&self, media: u64) {
        let _ = self.tx.send(PlayerEvent::Ended { media });
    }
}

#[async_trait]
impl PlayerHandle for RecordingPlayer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn load(&self, url: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("load {}", url));
        self.media.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.calls.lock().unwrap().push("play".to_string());
        self.paused.store(false, Ordering::SeqCst);
        self.media.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.calls.lock().unwrap().push("stop".to_string());
        self.paused.store(false, Ordering::SeqCst);
        self.media.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn media(&self) -> u64 {
        self.current_media()
    }

    async fn is_paused(&self) -> Result<bool> {
        Ok(self.paused.load(Ordering::SeqCst))
    }

    async fn request_fullscreen(&self) -> Result<()> {
        self.calls.lock().unwrap().push("fullscreen".to_string());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }
}
