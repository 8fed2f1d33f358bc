//! # sheepplayer - endless sheep playback
//!
//! Bridges the pull-based [`electricsheep::Sequencer`] to a push-based
//! playback engine. The engine adapter says when the current clip is about
//! to end; the [`PlaybackCoordinator`] answers by queueing the next sheep so
//! that playback never shows a gap.
//!
//! ```no_run
//! use electricsheep::{DirStore, Sequencer};
//! use sheepplayer::{PlaybackCoordinator, VlcPlayer, VlcSettings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(DirStore::open("./sheep")?);
//!     let player = Arc::new(VlcPlayer::launch(VlcSettings::default()).await?);
//!     let coordinator = PlaybackCoordinator::start(player, Sequencer::new(store, 0.82)).await?;
//!
//!     if let Some(err) = coordinator.failed().await {
//!         eprintln!("Playback engine failed: {err}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod engine;
pub mod errors;
pub mod events;
pub mod vlc;

#[cfg(feature = "sheepconfig")]
pub mod config_ext;

pub use coordinator::PlaybackCoordinator;
pub use engine::PlaybackEngine;
pub use errors::{PlayerError, Result};
pub use events::{CurrentChanged, ImpendingEnd, PlayerEvents, TimeUpdate};
pub use vlc::{VlcPlayer, VlcSettings};

#[cfg(feature = "sheepconfig")]
pub use config_ext::SheepPlayerConfigExt;
