//! Background worker keeping the sheep store in sync with the feed.
//!
//! The shepherd owns one task that sleeps until the feed permits the next
//! poll, polls, then adds every advertised sheep to the store. Feed errors
//! back off exponentially; a failing sheep never stops the others and is
//! simply retried on the next cycle since the feed keeps advertising it.
//! The task runs until [`Shepherd::shutdown`] or until the shepherd is
//! dropped.

use crate::client::SheepFeed;
use crate::constants::*;
use crate::error::Result;
use crate::models::FeedSnapshot;
use crate::sequencer::Sequencer;
use crate::store::{AddOutcome, SheepStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delays applied after failed polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: backoff_initial(),
            max: backoff_max(),
        }
    }
}

struct BackoffState {
    policy: BackoffPolicy,
    current: Option<Duration>,
}

impl BackoffState {
    fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: None,
        }
    }

    fn reset(&mut self) {
        self.current = None;
    }

    fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.policy.initial,
            Some(current) => current.saturating_mul(2).min(self.policy.max),
        };
        self.current = Some(next);
        next
    }
}

/// Counts of one ingestion cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub flock: u32,
    pub added: usize,
    pub present: usize,
    pub failed: usize,
}

/// Adds every sheep of `snapshot` to `store`, one after the other
///
/// A failed sheep is logged and counted; the remaining ones are still added.
pub async fn ingest(store: &dyn SheepStore, snapshot: FeedSnapshot) -> IngestReport {
    let mut report = IngestReport {
        flock: snapshot.flock,
        ..IngestReport::default()
    };

    for descriptor in &snapshot.sheep {
        match store.add(descriptor).await {
            Ok(AddOutcome::Added(sheep)) => {
                debug!(sheep = %sheep, "New sheep");
                report.added += 1;
            }
            Ok(AddOutcome::AlreadyPresent) => report.present += 1,
            Err(err) => {
                warn!(
                    flock = descriptor.flock,
                    id = descriptor.id,
                    url = %descriptor.url,
                    "Cannot add sheep: {err}"
                );
                report.failed += 1;
            }
        }
    }

    report
}

/// Handle on the background ingestion task
///
/// # Example
///
/// ```no_run
/// use electricsheep::{DirStore, FeedClient, Shepherd, BackoffPolicy};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Arc::new(DirStore::open("/tmp/sheep")?);
///     let shepherd = Shepherd::spawn(FeedClient::new()?, store, BackoffPolicy::default());
///
///     shepherd.wait_for_sheep(Duration::from_secs(10)).await?;
///     let mut sequence = shepherd.sequence(0.82);
///     while let Some(sheep) = sequence.advance().await? {
///         println!("{sheep}");
///     }
///     Ok(())
/// }
/// ```
pub struct Shepherd {
    store: Arc<dyn SheepStore>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Shepherd {
    /// Starts the ingestion task. Must be called within a Tokio runtime.
    pub fn spawn<F>(feed: F, store: Arc<dyn SheepStore>, backoff: BackoffPolicy) -> Self
    where
        F: SheepFeed + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task_store = Arc::clone(&store);

        let task = tokio::spawn(async move {
            info!("Starting shepherd");
            tokio::select! {
                _ = token.cancelled() => {}
                _ = poll_loop(feed, task_store, backoff) => {}
            }
            info!("Shepherd stopped");
        });

        Self {
            store,
            cancel,
            task: Some(task),
        }
    }

    pub fn store(&self) -> Arc<dyn SheepStore> {
        Arc::clone(&self.store)
    }

    /// A new walk over the store
    pub fn sequence(&self, loop_chance: f64) -> Sequencer {
        Sequencer::new(self.store(), loop_chance)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Waits until the store holds at least one sheep
    pub async fn wait_for_sheep(&self, interval: Duration) -> Result<()> {
        while self.store.is_empty().await? {
            info!("Waiting for sheep...");
            sleep(interval).await;
        }
        Ok(())
    }

    /// Cancels the ingestion task and waits for it to stop
    ///
    /// A transfer in progress is abandoned; its partial file stays invisible.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("Shepherd task ended abnormally: {err}");
            }
        }
    }
}

impl Drop for Shepherd {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop<F: SheepFeed>(mut feed: F, store: Arc<dyn SheepStore>, policy: BackoffPolicy) {
    let mut backoff = BackoffState::new(policy);
    // extra delay decided by the previous cycle, none before the first poll
    let mut pending = Duration::ZERO;

    loop {
        let wait = feed.time_until_next_poll().max(pending);
        if !wait.is_zero() {
            info!("Sleeping {} seconds...", wait.as_secs_f64().round());
            sleep(wait).await;
        }

        match feed.poll().await {
            Ok(snapshot) => {
                backoff.reset();
                pending = min_poll_interval();
                let report = ingest(store.as_ref(), snapshot).await;
                info!(
                    flock = report.flock,
                    added = report.added,
                    present = report.present,
                    failed = report.failed,
                    "Ingestion cycle done"
                );
            }
            Err(err) => {
                pending = backoff.next_delay();
                warn!(retry_in = ?pending, "Feed poll failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let mut backoff = BackoffState::new(BackoffPolicy {
            initial: Duration::from_secs(20),
            max: Duration::from_secs(100),
        });
        assert_eq!(backoff.next_delay(), Duration::from_secs(20));
        assert_eq!(backoff.next_delay(), Duration::from_secs(40));
        assert_eq!(backoff.next_delay(), Duration::from_secs(80));
        assert_eq!(backoff.next_delay(), Duration::from_secs(100));
        assert_eq!(backoff.next_delay(), Duration::from_secs(100));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(20));
    }

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.initial, Duration::from_secs(BACKOFF_INITIAL_SECONDS));
        assert_eq!(policy.max, Duration::from_secs(BACKOFF_MAX_SECONDS));
    }
}
