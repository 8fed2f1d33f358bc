//! Integration tests for the graph walk over a directory store

use electricsheep::{DirStore, Sequencer, Sheep, SheepStore, Transition};
use std::sync::Arc;
use tempfile::TempDir;

/// Store pre-filled with `(flock, id, first, last)` sheep
fn store_with(sheep: &[(u32, u32, u32, u32)]) -> (TempDir, Arc<DirStore>) {
    let dir = TempDir::new().unwrap();
    for &(flock, id, first, last) in sheep {
        let name = electricsheep::store::sheep_file_name(flock, id, first, last, ".avi");
        std::fs::write(dir.path().join(name), b"sheep").unwrap();
    }
    let store = Arc::new(DirStore::open(dir.path()).unwrap());
    (dir, store)
}

async fn find(store: &DirStore, id: u32) -> Sheep {
    store
        .list()
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.id == id)
        .unwrap()
}

#[tokio::test]
async fn test_empty_store_yields_nothing() {
    let (_dir, store) = store_with(&[]);
    let mut sequencer = Sequencer::seeded(store, 0.82, 7);
    assert!(sequencer.advance().await.unwrap().is_none());
    assert!(sequencer.current().is_none());
}

#[tokio::test]
async fn test_first_sheep_is_a_start() {
    let (_dir, store) = store_with(&[(247, 1, 10, 20)]);
    let mut sequencer = Sequencer::seeded(store, 0.82, 7);
    let sheep = sequencer.advance().await.unwrap().unwrap();
    assert_eq!(sheep.id, 1);
    assert_eq!(sequencer.last_transition(), Some(Transition::Start));
}

#[tokio::test]
async fn test_gapless_handoff_with_certain_loop() {
    let (_dir, store) = store_with(&[(247, 1, 10, 20), (247, 2, 20, 20), (247, 3, 20, 30)]);
    let current = find(&store, 1).await;

    for seed in 0..50 {
        let mut sequencer = Sequencer::seeded(store.clone(), 1.0, seed);
        sequencer.resume_from(current.clone());
        let next = sequencer.advance().await.unwrap().unwrap();
        assert_eq!((next.first, next.last), (20, 20));
        assert_eq!(sequencer.last_transition(), Some(Transition::Loop));
    }
}

#[tokio::test]
async fn test_walk_keeps_adjacency_except_after_restart() {
    let (_dir, store) = store_with(&[
        (247, 1, 10, 10),
        (247, 2, 10, 20),
        (247, 3, 20, 20),
        (247, 4, 20, 10),
        (247, 5, 20, 30), // 30 is a dead end
        (247, 6, 10, 20), // parallel edge
        (248, 7, 30, 10), // other flock, never a continuation
    ]);
    let mut sequencer = Sequencer::seeded(store, 0.5, 42);

    let mut previous = sequencer.advance().await.unwrap().unwrap();
    let mut restarts = 0;
    for _ in 0..1000 {
        let next = sequencer.advance().await.unwrap().unwrap();
        match sequencer.last_transition().unwrap() {
            Transition::Restart => {
                restarts += 1;
                assert!(
                    previous.last == 30 || previous.flock == 248,
                    "restart after {previous}"
                );
            }
            Transition::Start => panic!("start after the first sheep"),
            _ => assert!(previous.connects_to(&next), "{previous} then {next}"),
        }
        previous = next;
    }
    assert!(restarts > 0);
}

#[tokio::test]
async fn test_dead_end_restarts() {
    let (_dir, store) = store_with(&[(247, 1, 10, 20)]);
    let mut sequencer = Sequencer::seeded(store, 0.82, 3);

    sequencer.advance().await.unwrap().unwrap();
    for _ in 0..10 {
        let sheep = sequencer.advance().await.unwrap().unwrap();
        assert_eq!(sheep.id, 1);
        assert_eq!(sequencer.last_transition(), Some(Transition::Restart));
    }
}

#[tokio::test]
async fn test_loop_bias_converges() {
    // from node 20: one loop and one branch; from 30 the only way is back to 20
    let (_dir, store) = store_with(&[(247, 1, 20, 20), (247, 2, 20, 30), (247, 3, 30, 20)]);
    let p = 0.7;
    let mut sequencer = Sequencer::seeded(store, p, 2024);

    let mut previous = sequencer.advance().await.unwrap().unwrap();
    let (mut decisions, mut loops) = (0u32, 0u32);
    for _ in 0..6000 {
        let next = sequencer.advance().await.unwrap().unwrap();
        if previous.last == 20 {
            decisions += 1;
            if next.is_loop() {
                loops += 1;
            }
        }
        previous = next;
    }

    let ratio = f64::from(loops) / f64::from(decisions);
    assert!(decisions > 1000);
    assert!((ratio - p).abs() < 0.05, "loop ratio {ratio}");
}

#[tokio::test]
async fn test_new_sheep_are_seen_by_the_next_step() {
    let (dir, store) = store_with(&[(247, 1, 10, 20)]);
    let mut sequencer = Sequencer::seeded(store, 0.0, 9);
    sequencer.advance().await.unwrap().unwrap();

    let name = electricsheep::store::sheep_file_name(247, 2, 20, 40, ".avi");
    std::fs::write(dir.path().join(name), b"sheep").unwrap();

    let next = sequencer.advance().await.unwrap().unwrap();
    assert_eq!(next.id, 2);
    assert_eq!(sequencer.last_transition(), Some(Transition::Branch));
}
