//! # pmodisplay - Unattended clip display
//!
//! `pmodisplay` keeps a wall display busy with short clips published by a
//! catalog server. It polls the catalog, merges newly published items into
//! the play queue without interrupting what is on screen, refills the queue
//! with a weighted random batch when it runs dry, and advances on its own when
//! a clip ends or when the catalog's timeout fires.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pmodisplay::{CommandPlayer, CommandPlayerConfig, DisplayRuntime, DisplaySettings, HttpCatalogSource};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = DisplaySettings::default();
//!     let source = HttpCatalogSource::builder()
//!         .url(&settings.catalog_url)
//!         .timeout(settings.request_timeout)
//!         .build()?;
//!     let player = CommandPlayer::new(CommandPlayerConfig::default());
//!
//!     let display = DisplayRuntime::new(Arc::new(source), settings)
//!         .start(Some(Arc::new(player)));
//!
//!     tokio::signal::ctrl_c().await?;
//!     display.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`models`]: catalog snapshot, items and their ordering
//! - [`source`]: catalog sources, HTTP implementation
//! - [`scheduler`]: queue merge, refill and advance
//! - [`controller`]: player calls and the auto-advance timer
//! - [`poller`] / [`watchdog`]: the two periodic tasks
//! - [`player`] / [`command_player`]: the media element abstraction and an
//!   implementation driving an external program
//! - [`info`]: status lines for the display
//! - [`runtime`]: task wiring and the control handle
//! - `config_ext`: settings stored in `pmoconfig` (feature `pmoconfig`)

pub mod command_player;
pub mod controller;
pub mod error;
pub mod info;
pub mod models;
pub mod player;
pub mod poller;
pub mod runtime;
pub mod scheduler;
pub mod source;
pub mod watchdog;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

pub use command_player::{CommandPlayer, CommandPlayerConfig};
pub use controller::{PlaybackController, TimeoutElapsed};
pub use error::{Error, Result};
pub use info::{InfoEntry, InfoLog};
pub use models::{CatalogSnapshot, Item, ItemId, TimeoutConfig};
pub use player::{PlayerEvent, PlayerHandle, PlayerSlot};
pub use poller::{CatalogPoller, SnapshotUpdate};
pub use runtime::{DisplayCommand, DisplayHandle, DisplayRuntime, DisplaySettings, DisplayStatus};
pub use scheduler::{PlaylistScheduler, RefillPolicy, SchedulerEvent};
pub use source::{CatalogSource, HttpCatalogSource, HttpCatalogSourceBuilder};
pub use watchdog::PlaybackWatchdog;

#[cfg(feature = "pmoconfig")]
pub use config_ext::DisplayConfigExt;
