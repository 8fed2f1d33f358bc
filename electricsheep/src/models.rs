//! Data models for sheep, their identities and feed snapshots

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Generation of the feed; sheep are only graph-comparable within a flock
pub type FlockId = u32;

/// Sheep number, unique within a flock
pub type SheepId = u32;

/// Abstract scene endpoint connected by sheep
pub type NodeId = u32;

/// Durable identity of a sheep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheepKey {
    pub flock: FlockId,
    pub id: SheepId,
}

impl fmt::Display for SheepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}={:05}", self.flock, self.id)
    }
}

/// A sheep advertised by the feed, not downloaded yet
///
/// Only `flock`, `id`, `first`, `last` and `url` drive the store and the
/// sequencer; the other attributes are kept for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct SheepDescriptor {
    pub flock: FlockId,
    pub id: SheepId,
    /// Server-side sheep type
    pub kind: u32,
    /// Server-side state (`done`, `expunge`, ...)
    pub state: String,
    pub time: Option<DateTime<Utc>>,
    /// Advertised size in bytes
    pub size: u64,
    pub rating: i32,
    pub first: NodeId,
    pub last: NodeId,
    /// Where the sheep bytes can be fetched
    pub url: String,
}

impl SheepDescriptor {
    /// Minimal descriptor, mostly useful for tests and tools
    pub fn new(flock: FlockId, id: SheepId, first: NodeId, last: NodeId, url: impl Into<String>) -> Self {
        Self {
            flock,
            id,
            kind: 0,
            state: String::new(),
            time: None,
            size: 0,
            rating: 0,
            first,
            last,
            url: url.into(),
        }
    }

    pub fn key(&self) -> SheepKey {
        SheepKey {
            flock: self.flock,
            id: self.id,
        }
    }

    pub fn is_loop(&self) -> bool {
        self.first == self.last
    }
}

/// A sheep whose bytes are durably stored
///
/// A directed edge `first -> last` of its flock's graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sheep {
    pub flock: FlockId,
    pub id: SheepId,
    pub first: NodeId,
    pub last: NodeId,
    pub path: PathBuf,
}

impl Sheep {
    pub fn key(&self) -> SheepKey {
        SheepKey {
            flock: self.flock,
            id: self.id,
        }
    }

    pub fn is_loop(&self) -> bool {
        self.first == self.last
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file://` URI of the stored file, for playback engines
    pub fn uri(&self) -> Option<String> {
        Url::from_file_path(&self.path).ok().map(String::from)
    }

    /// Whether `next` may be played right after this sheep
    pub fn connects_to(&self, next: &Sheep) -> bool {
        self.flock == next.flock && self.last == next.first
    }
}

impl fmt::Display for Sheep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} -> {})",
            self.key(),
            self.first,
            self.last
        )
    }
}

/// Result of one feed poll. Fully consumed by the shepherd, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub flock: FlockId,
    pub sheep: Vec<SheepDescriptor>,
    /// Minimum delay before the next poll is permitted
    pub retry_after: Duration,
}
