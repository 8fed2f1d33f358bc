//! Feeds the playback engine from the sequencer
//!
//! The coordinator plays the first sheep itself, then only reacts to the
//! engine's `impending_end` signal: each signal advances the sequencer once
//! and enqueues the result. Signals naming an item the coordinator already
//! answered are ignored, so an engine repeating itself while the same item
//! ends never makes the walk skip ahead.

use crate::engine::PlaybackEngine;
use crate::errors::{PlayerError, Result};
use crate::events::ImpendingEnd;
use electricsheep::{Sequencer, Sheep};
use sheepevents::SubscriptionId;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

struct CoordinatorState {
    sequencer: Sequencer,
    /// Engine item for which a successor was queued
    answered: Option<String>,
    /// Last sheep handed to the engine
    last: Sheep,
}

pub struct PlaybackCoordinator {
    engine: Arc<dyn PlaybackEngine>,
    state: Arc<Mutex<CoordinatorState>>,
    subscription: SubscriptionId,
    failures: Mutex<mpsc::UnboundedReceiver<PlayerError>>,
}

impl PlaybackCoordinator {
    /// Plays the first sheep of `sequencer` and starts answering the engine
    ///
    /// Fails with [`PlayerError::NoSheep`] when the store is empty.
    pub async fn start(engine: Arc<dyn PlaybackEngine>, mut sequencer: Sequencer) -> Result<Self> {
        let first = sequencer.advance().await?.ok_or(PlayerError::NoSheep)?;
        engine.play_now(&first).await?;
        info!(sheep = %first, "Playback started");

        let state = Arc::new(Mutex::new(CoordinatorState {
            sequencer,
            answered: None,
            last: first,
        }));
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();

        let handler_engine = Arc::clone(&engine);
        let handler_state = Arc::clone(&state);
        let subscription = engine.events().impending_end.subscribe(move |signal: ImpendingEnd| {
            let engine = Arc::clone(&handler_engine);
            let state = Arc::clone(&handler_state);
            let failures = failures_tx.clone();
            async move {
                match queue_next(engine.as_ref(), &state, signal).await {
                    Ok(_) => Ok(()),
                    Err(err) => {
                        error!("Cannot queue the next sheep: {err}");
                        let _ = failures.send(err.clone());
                        Err(err.into())
                    }
                }
            }
        });

        Ok(Self {
            engine,
            state,
            subscription,
            failures: Mutex::new(failures_rx),
        })
    }

    /// Last sheep handed to the engine, played or queued
    pub async fn last_sheep(&self) -> Sheep {
        self.state.lock().await.last.clone()
    }

    /// Waits for the next failure of the engine while queueing
    ///
    /// Returns `None` once the coordinator no longer listens to the engine.
    pub async fn failed(&self) -> Option<PlayerError> {
        self.failures.lock().await.recv().await
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.engine.events().impending_end.unsubscribe(self.subscription);
    }
}

async fn queue_next(
    engine: &dyn PlaybackEngine,
    state: &Mutex<CoordinatorState>,
    signal: ImpendingEnd,
) -> Result<Option<Sheep>> {
    let mut state = state.lock().await;
    if signal.current.is_some() && signal.current == state.answered {
        debug!(item = ?signal.current, "Successor already queued");
        return Ok(None);
    }

    let next = state.sequencer.advance().await?.ok_or(PlayerError::NoSheep)?;
    if let Err(err) = engine.enqueue(&next).await {
        // the engine never got `next`: walk on from what it really plays
        let last = state.last.clone();
        state.sequencer.resume_from(last);
        return Err(err);
    }
    info!(
        sheep = %next,
        transition = ?state.sequencer.last_transition(),
        remaining = ?signal.remaining,
        "Queued next sheep"
    );

    state.answered = signal.current;
    state.last = next.clone();
    Ok(Some(next))
}
