//! Shepherd scheduling tests, run on logical time

use async_trait::async_trait;
use electricsheep::{
    AddOutcome, BackoffPolicy, Error, FeedSnapshot, Result, Sheep, SheepDescriptor, SheepFeed,
    SheepStore, SheepStream, Shepherd,
};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Feed answering from a script, recording when it was polled
struct ScriptedFeed {
    script: VecDeque<Result<FeedSnapshot>>,
    fallback: FeedSnapshot,
    polls: Arc<Mutex<Vec<Instant>>>,
    next_retry: Option<Instant>,
}

impl ScriptedFeed {
    fn new(fallback: FeedSnapshot) -> (Self, Arc<Mutex<Vec<Instant>>>) {
        let polls = Arc::new(Mutex::new(Vec::new()));
        let feed = Self {
            script: VecDeque::new(),
            fallback,
            polls: polls.clone(),
            next_retry: None,
        };
        (feed, polls)
    }

    fn then(mut self, answer: Result<FeedSnapshot>) -> Self {
        self.script.push_back(answer);
        self
    }
}

#[async_trait]
impl SheepFeed for ScriptedFeed {
    async fn poll(&mut self) -> Result<FeedSnapshot> {
        self.polls.lock().unwrap().push(Instant::now());
        let answer = self
            .script
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        if let Ok(snapshot) = &answer {
            self.next_retry = Some(Instant::now() + snapshot.retry_after);
        }
        answer
    }

    fn time_until_next_poll(&self) -> Duration {
        self.next_retry
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }
}

/// In-memory store; sheep whose id is in `broken` always fail to transfer
#[derive(Default)]
struct MemoryStore {
    sheep: Mutex<Vec<Sheep>>,
    broken: HashSet<u32>,
    attempts: Mutex<Vec<u32>>,
}

#[async_trait]
impl SheepStore for MemoryStore {
    fn iter(&self) -> SheepStream {
        let items: Vec<Result<Sheep>> = self.sheep.lock().unwrap().iter().cloned().map(Ok).collect();
        Box::pin(futures_util::stream::iter(items))
    }

    async fn add(&self, descriptor: &SheepDescriptor) -> Result<AddOutcome> {
        self.attempts.lock().unwrap().push(descriptor.id);
        if self.broken.contains(&descriptor.id) {
            return Err(Error::TransferFailed {
                flock: descriptor.flock,
                id: descriptor.id,
                reason: "connection reset".to_string(),
            });
        }
        let mut sheep = self.sheep.lock().unwrap();
        if sheep.iter().any(|s| s.key() == descriptor.key()) {
            return Ok(AddOutcome::AlreadyPresent);
        }
        let stored = Sheep {
            flock: descriptor.flock,
            id: descriptor.id,
            first: descriptor.first,
            last: descriptor.last,
            path: PathBuf::from(format!("/mem/{}", descriptor.key())),
        };
        sheep.push(stored.clone());
        Ok(AddOutcome::Added(stored))
    }
}

fn snapshot(retry_secs: u64, ids: &[u32]) -> FeedSnapshot {
    FeedSnapshot {
        flock: 247,
        sheep: ids
            .iter()
            .map(|&id| SheepDescriptor::new(247, id, id * 10, id * 10 + 10, format!("mem://{id}")))
            .collect(),
        retry_after: Duration::from_secs(retry_secs),
    }
}

fn gaps(polls: &[Instant]) -> Vec<Duration> {
    polls.windows(2).map(|w| w[1] - w[0]).collect()
}

#[tokio::test(start_paused = true)]
async fn test_server_retry_interval_is_honoured() {
    let (feed, polls) = ScriptedFeed::new(snapshot(120, &[1]));
    let store = Arc::new(MemoryStore::default());
    let shepherd = Shepherd::spawn(feed, store, BackoffPolicy::default());

    sleep(Duration::from_secs(1000)).await;
    shepherd.shutdown().await;

    let polls = polls.lock().unwrap().clone();
    assert!(polls.len() >= 2, "only {} polls", polls.len());
    assert!(polls.len() <= 9, "{} polls in 1000s", polls.len());
    for gap in gaps(&polls) {
        assert!(gap >= Duration::from_secs(120), "polled again after {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_first_poll_is_immediate() {
    let (feed, polls) = ScriptedFeed::new(snapshot(600, &[]));
    let start = Instant::now();
    let shepherd = Shepherd::spawn(feed, Arc::new(MemoryStore::default()), BackoffPolicy::default());

    sleep(Duration::from_millis(10)).await;
    let first = polls.lock().unwrap().first().copied().unwrap();
    assert!(first - start < Duration::from_secs(1));
    shepherd.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_feed_errors_back_off_then_reset() {
    let unavailable = || Err(Error::FeedUnavailable("unreachable".to_string()));
    let (feed, polls) = ScriptedFeed::new(snapshot(15, &[]));
    let feed = feed
        .then(unavailable())
        .then(unavailable())
        .then(unavailable())
        .then(Ok(snapshot(15, &[])))
        .then(unavailable());
    let policy = BackoffPolicy {
        initial: Duration::from_secs(20),
        max: Duration::from_secs(50),
    };
    let shepherd = Shepherd::spawn(feed, Arc::new(MemoryStore::default()), policy);

    sleep(Duration::from_secs(200)).await;
    shepherd.shutdown().await;

    let polls = polls.lock().unwrap().clone();
    assert!(polls.len() >= 6, "only {} polls", polls.len());
    let secs: Vec<u64> = gaps(&polls).iter().take(5).map(|g| g.as_secs()).collect();
    // 20, 40, capped 50, server retry 15, then backoff restarts at 20
    assert_eq!(secs, vec![20, 40, 50, 15, 20]);
}

#[tokio::test(start_paused = true)]
async fn test_failing_sheep_do_not_stop_ingestion() {
    let (feed, _polls) = ScriptedFeed::new(snapshot(60, &[1, 2, 3]));
    let store = Arc::new(MemoryStore {
        broken: HashSet::from([2]),
        ..MemoryStore::default()
    });
    let shepherd = Shepherd::spawn(feed, store.clone(), BackoffPolicy::default());

    sleep(Duration::from_secs(90)).await;
    shepherd.shutdown().await;

    let mut ids: Vec<u32> = store.list().await.unwrap().iter().map(|s| s.id).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 3]);
    // the broken sheep is retried on the next cycle
    let retries = store.attempts.lock().unwrap().iter().filter(|&&id| id == 2).count();
    assert_eq!(retries, 2);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_sheep_returns_once_ingested() {
    let (feed, _polls) = ScriptedFeed::new(snapshot(600, &[4]));
    let store = Arc::new(MemoryStore::default());
    let shepherd = Shepherd::spawn(feed, store, BackoffPolicy::default());

    shepherd.wait_for_sheep(Duration::from_secs(1)).await.unwrap();
    assert!(!shepherd.store().is_empty().await.unwrap());

    let mut sequence = shepherd.sequence(0.82);
    let sheep = sequence.advance().await.unwrap().unwrap();
    assert_eq!(sheep.id, 4);
    shepherd.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_sleep() {
    let (feed, polls) = ScriptedFeed::new(snapshot(86_400, &[]));
    let shepherd = Shepherd::spawn(feed, Arc::new(MemoryStore::default()), BackoffPolicy::default());

    sleep(Duration::from_secs(5)).await;
    assert!(shepherd.is_running());

    let before = Instant::now();
    shepherd.shutdown().await;
    assert!(Instant::now() - before < Duration::from_secs(1));
    assert_eq!(polls.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_the_task() {
    let (feed, polls) = ScriptedFeed::new(snapshot(30, &[]));
    let shepherd = Shepherd::spawn(feed, Arc::new(MemoryStore::default()), BackoffPolicy::default());
    sleep(Duration::from_secs(1)).await;
    drop(shepherd);

    sleep(Duration::from_secs(300)).await;
    assert_eq!(polls.lock().unwrap().len(), 1);
}
