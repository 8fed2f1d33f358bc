//! # electricsheep - Electric Sheep flock client for Rust
//!
//! `electricsheep` follows the community Electric Sheep feed, keeps a local
//! store of the downloaded sheep and walks their graph to produce an endless,
//! seamless sequence of clips.
//!
//! A sheep is a short video going from one abstract scene to another: it is
//! the edge `first -> last` of its flock's graph. Two sheep can be played
//! back to back without a visible cut when the first ends on the scene the
//! second starts from.
//!
//! ## Features
//!
//! - **Feed polling**: redirect resolution, gzip sheep lists, server-declared retry interval
//! - **Local store**: atomic, deduplicated, restart-safe directory of sheep
//! - **Sequencing**: biased random walk favouring loops, restarting on dead ends
//! - **Background ingestion**: a cancellable shepherd task with exponential backoff
//! - **Graph export**: Graphviz rendering of the stored graph
//!
//! ## Quick Start
//!
//! ```no_run
//! use electricsheep::{BackoffPolicy, DirStore, FeedClient, Shepherd};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(DirStore::open("./sheep")?);
//!     let shepherd = Shepherd::spawn(FeedClient::new()?, store, BackoffPolicy::default());
//!     shepherd.wait_for_sheep(Duration::from_secs(10)).await?;
//!
//!     let mut sequence = shepherd.sequence(0.82);
//!     for _ in 0..10 {
//!         if let Some(sheep) = sequence.advance().await? {
//!             println!("{} -> {:?}", sheep, sheep.uri());
//!         }
//!     }
//!
//!     shepherd.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`client`]: feed HTTP client and the [`SheepFeed`] seam
//! - [`store`]: the [`SheepStore`] trait and its directory implementation
//! - [`sequencer`]: graph walk over the store
//! - [`shepherd`]: background ingestion task
//! - [`graph`]: DOT export
//! - [`models`]: sheep, descriptors, snapshots
//! - [`error`]: error types and result alias
//!
//! ## Cargo Features
//!
//! - `sheepconfig` (default): [`ElectricSheepConfigExt`] accessors on `sheepconfig::Config`

pub mod client;
pub mod constants;
mod download;
pub mod error;
pub mod graph;
mod listing;
pub mod models;
pub mod sequencer;
pub mod shepherd;
pub mod store;

#[cfg(feature = "sheepconfig")]
pub mod config_ext;

// Re-exports for convenience
pub use client::{FeedClient, FeedClientBuilder, SheepFeed};
pub use error::{Error, Result};
pub use graph::{latest_flock, render_dot};
pub use models::{FeedSnapshot, FlockId, NodeId, Sheep, SheepDescriptor, SheepId, SheepKey};
pub use sequencer::{choose_successor, Sequencer, Transition};
pub use shepherd::{ingest, BackoffPolicy, IngestReport, Shepherd};
pub use store::{AddOutcome, DirStore, SheepStore, SheepStream};

#[cfg(feature = "sheepconfig")]
pub use config_ext::ElectricSheepConfigExt;
