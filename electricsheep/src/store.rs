//! Local sheep storage
//!
//! A sheep is a file of the root directory named
//! `{flock:05}={id:05}={first:05}={last:05}{ext}`. The file name is the only
//! index: it is enough to rebuild the identity and the graph edge.
//!
//! ```text
//! sheep/
//! ├── 00247=00001=00010=00010.avi
//! ├── 00247=00002=00010=00020.avi
//! └── 00247=00003=00020=00020.avi.part   # transfer in progress, invisible
//! ```

use crate::constants::{DEFAULT_DOWNLOAD_TIMEOUT_SECS, PART_SUFFIX};
use crate::download;
use crate::error::{Error, Result};
use crate::models::{Sheep, SheepDescriptor, SheepKey};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lazy stream of the stored sheep
pub type SheepStream = Pin<Box<dyn Stream<Item = Result<Sheep>> + Send>>;

/// Outcome of an add
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The sheep was downloaded and is now visible
    Added(Sheep),
    /// A sheep with the same `(flock, id)` was already stored, nothing was transferred
    AlreadyPresent,
}

/// Durable, deduplicated collection of sheep
#[async_trait]
pub trait SheepStore: Send + Sync {
    /// Iterates over the sheep currently stored
    ///
    /// Every call starts over. A sheep added during the iteration may or may
    /// not show up, but a yielded sheep is always complete.
    fn iter(&self) -> SheepStream;

    /// Every sheep currently stored
    async fn list(&self) -> Result<Vec<Sheep>> {
        self.iter().try_collect().await
    }

    /// True as long as no sheep is stored
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.iter().next().await.transpose()?.is_none())
    }

    async fn contains(&self, key: SheepKey) -> Result<bool> {
        let mut stream = self.iter();
        while let Some(sheep) = stream.next().await {
            if sheep?.key() == key {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Adds a sheep advertised by the feed
    ///
    /// Idempotent: when `(flock, id)` is already stored, returns
    /// [`AddOutcome::AlreadyPresent`] without any transfer.
    async fn add(&self, descriptor: &SheepDescriptor) -> Result<AddOutcome>;
}

/// Sheep store backed by a directory and file names
pub struct DirStore {
    /// Storage directory
    root: PathBuf,
    client: Client,
    /// One lock per key being added, so concurrent adds of a key run one at a time
    in_flight: Mutex<HashMap<SheepKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl DirStore {
    /// Opens (and creates if needed) the store with a default HTTP client
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::other(format!("Cannot build HTTP client: {e}")))?;
        Self::with_client(root, client)
    }

    /// Opens the store with the given HTTP client
    ///
    /// `.part` files left behind by an interrupted transfer are removed.
    pub fn with_client(root: impl AsRef<Path>, client: Client) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        purge_partial_files(&root)?;

        info!(root = %root.display(), "Sheep store opened");
        Ok(Self {
            root,
            client,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Looks up the stored sheep with this key
    pub async fn find(&self, key: SheepKey) -> Result<Option<Sheep>> {
        let mut stream = self.iter();
        while let Some(sheep) = stream.next().await {
            let sheep = sheep?;
            if sheep.key() == key {
                return Ok(Some(sheep));
            }
        }
        Ok(None)
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<SheepKey, Arc<tokio::sync::Mutex<()>>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key_lock(&self, key: SheepKey) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.in_flight().entry(key).or_default())
    }

    /// Forgets the key lock unless another add still holds it
    ///
    /// `held` is the caller's handle, which must still be alive here: with
    /// it, a count of 2 means only the map and the caller know the lock.
    fn release_key(&self, key: SheepKey, held: &Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight();
        let unshared = in_flight
            .get(&key)
            .is_some_and(|lock| Arc::ptr_eq(lock, held) && Arc::strong_count(lock) == 2);
        if unshared {
            in_flight.remove(&key);
        }
    }
}

#[async_trait]
impl SheepStore for DirStore {
    fn iter(&self) -> SheepStream {
        let root = self.root.clone();
        Box::pin(try_stream! {
            let mut entries = tokio::fs::read_dir(&root).await.map_err(Error::from)?;
            while let Some(entry) = entries.next_entry().await.map_err(Error::from)? {
                if let Some(sheep) = parse_sheep_path(entry.path()) {
                    yield sheep;
                }
            }
        })
    }

    async fn add(&self, descriptor: &SheepDescriptor) -> Result<AddOutcome> {
        let key = descriptor.key();
        let lock = self.key_lock(key);
        let outcome = {
            let _guard = lock.lock().await;
            self.add_exclusive(descriptor).await
        };
        self.release_key(key, &lock);
        outcome
    }
}

impl DirStore {
    /// Add under the key lock
    async fn add_exclusive(&self, descriptor: &SheepDescriptor) -> Result<AddOutcome> {
        let key = descriptor.key();
        if self.find(key).await?.is_some() {
            debug!(sheep = %key, "Sheep already stored");
            return Ok(AddOutcome::AlreadyPresent);
        }

        info!(sheep = %key, url = %descriptor.url, "Downloading sheep");
        let sheep = download::fetch_sheep(&self.client, &self.root, descriptor).await?;
        Ok(AddOutcome::Added(sheep))
    }
}

/// File name of a sheep, `ext` includes the dot
pub fn sheep_file_name(flock: u32, id: u32, first: u32, last: u32, ext: &str) -> String {
    format!("{flock:05}={id:05}={first:05}={last:05}{ext}")
}

/// Rebuilds a sheep from its path, `None` when the name does not follow the scheme
pub fn parse_sheep_path(path: PathBuf) -> Option<Sheep> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.') || name.ends_with(PART_SUFFIX) {
        return None;
    }
    let stem = name.split_once('.').map_or(name, |(stem, _)| stem);

    let mut fields = stem.splitn(4, '=').map(|f| f.parse::<u32>().ok());
    let flock = fields.next()??;
    let id = fields.next()??;
    let first = fields.next()??;
    let last = fields.next()??;

    Some(Sheep {
        flock,
        id,
        first,
        last,
        path,
    })
}

fn purge_partial_files(root: &Path) -> Result<()> {
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        let is_part = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(PART_SUFFIX));
        if is_part {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed partial sheep"),
                Err(e) => warn!(path = %path.display(), "Cannot remove partial sheep: {e}"),
            }
        }
    }
    Ok(())
}
