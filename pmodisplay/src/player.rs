//! Control surface over a media element
//!
//! A [`PlayerHandle`] is whatever actually renders the clips: an external
//! program, an embedded widget, a remote renderer. The core only needs to load
//! a URL, start playback, stop it, ask whether playback is paused, request
//! fullscreen and hear about natural completion.
//!
//! Players are never global. They are handed to the runtime through a shared
//! [`PlayerSlot`], which the controller and the watchdog both read.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Notifications emitted by a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The media tagged `media` played to its natural end (sent once per
    /// completion); see [`PlayerHandle::media`]
    Ended { media: u64 },
    /// Playback stopped on an error; the watchdog will retry
    Failed(String),
}

/// Abstract media element
#[async_trait]
pub trait PlayerHandle: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str {
        "player"
    }

    /// Replaces the loaded media; does not start playback by itself
    async fn load(&self, url: &str) -> Result<()>;

    /// Starts (or restarts) playback of the loaded media
    async fn play(&self) -> Result<()>;

    /// Stops playback and unloads the media; `is_paused` reads false afterwards
    async fn stop(&self) -> Result<()>;

    /// True when media is loaded but not playing
    async fn is_paused(&self) -> Result<bool>;

    /// Best effort; players without fullscreen return [`Error::Unsupported`]
    async fn request_fullscreen(&self) -> Result<()> {
        Err(Error::Unsupported("fullscreen"))
    }

    /// Tag of the playback currently running, as carried by
    /// [`PlayerEvent::Ended`]
    ///
    /// Changes whenever a new playback starts. Players that cannot tell their
    /// playbacks apart keep the default, so every end matches.
    async fn media(&self) -> u64 {
        0
    }

    /// Stream of [`PlayerEvent`]s
    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;
}

/// Shared slot holding the attached player
///
/// The slot also carries the "halted" flag: while set, the watchdog leaves a
/// paused player alone. It starts halted because nothing is current yet.
#[derive(Clone)]
pub struct PlayerSlot {
    player: Arc<RwLock<Option<Arc<dyn PlayerHandle>>>>,
    halted: Arc<AtomicBool>,
}

impl Default for PlayerSlot {
    fn default() -> Self {
        Self {
            player: Arc::new(RwLock::new(None)),
            halted: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl fmt::Debug for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerSlot")
            .field("player", &self.get().map(|p| p.name().to_string()))
            .field("halted", &self.is_halted())
            .finish()
    }
}

impl PlayerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `player`, returning the one it replaces
    pub fn attach(&self, player: Arc<dyn PlayerHandle>) -> Option<Arc<dyn PlayerHandle>> {
        self.player
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(player)
    }

    pub fn detach(&self) -> Option<Arc<dyn PlayerHandle>> {
        self.player
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn get(&self) -> Option<Arc<dyn PlayerHandle>> {
        self.player
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The attached player, or [`Error::NoPlayer`]
    pub fn require(&self) -> Result<Arc<dyn PlayerHandle>> {
        self.get().ok_or(Error::NoPlayer)
    }

    pub fn is_attached(&self) -> bool {
        self.get().is_some()
    }

    pub fn set_halted(&self, halted: bool) {
        self.halted.store(halted, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent {
        tx: broadcast::Sender<PlayerEvent>,
    }

    #[async_trait]
    impl PlayerHandle for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn load(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn play(&self) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }

        async fn is_paused(&self) -> Result<bool> {
            Ok(false)
        }

        fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
            self.tx.subscribe()
        }
    }

    fn silent() -> Arc<dyn PlayerHandle> {
        Arc::new(Silent {
            tx: broadcast::channel(4).0,
        })
    }

    #[test]
    fn test_slot_starts_empty_and_halted() {
        let slot = PlayerSlot::new();
        assert!(!slot.is_attached());
        assert!(slot.is_halted());
    }

    #[test]
    fn test_attach_replaces_and_detach_clears() {
        let slot = PlayerSlot::new();
        assert!(slot.attach(silent()).is_none());
        assert!(slot.attach(silent()).is_some());

        let clone = slot.clone();
        assert!(clone.is_attached());
        assert_eq!(clone.get().map(|p| p.name().to_string()), Some("silent".into()));

        assert!(slot.detach().is_some());
        assert!(!clone.is_attached());
    }

    #[test]
    fn test_require_reports_missing_player() {
        let slot = PlayerSlot::new();
        assert!(matches!(slot.require(), Err(Error::NoPlayer)));

        slot.attach(silent());
        assert!(slot.require().is_ok());
    }

    #[tokio::test]
    async fn test_fullscreen_defaults_to_unsupported() {
        let player = silent();
        assert!(matches!(
            player.request_fullscreen().await,
            Err(Error::Unsupported(_))
        ));
        assert_eq!(player.media().await, 0);
    }
}
