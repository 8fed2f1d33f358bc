//! Graph walk producing an endless sequence of sheep
//!
//! Each sheep is an edge `first -> last` of its flock's graph. From the
//! current sheep the walk looks at every stored sheep of the same flock
//! starting at `current.last`:
//!
//! 1. with probability `loop_chance`, take a loop (`first == last`) if any;
//! 2. otherwise take a branch (`first != last`) if any;
//! 3. otherwise take a loop if any;
//! 4. otherwise restart from a sheep picked uniformly over the whole store.
//!
//! The walk is pulled one step at a time with [`Sequencer::advance`] and
//! `&mut self` keeps it single-consumer.

use crate::constants::DEFAULT_LOOP_CHANCE;
use crate::error::Result;
use crate::models::Sheep;
use crate::store::SheepStore;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::debug;

/// How the last sheep was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First sheep of the sequence
    Start,
    /// A loop continuing from the previous sheep
    Loop,
    /// A branch continuing from the previous sheep
    Branch,
    /// Dead end: picked at random, with no adjacency to the previous sheep
    Restart,
}

impl Transition {
    /// Whether the chosen sheep is graph-adjacent to its predecessor
    pub fn is_continuation(self) -> bool {
        matches!(self, Transition::Loop | Transition::Branch)
    }
}

pub struct Sequencer {
    store: Arc<dyn SheepStore>,
    loop_chance: f64,
    current: Option<Sheep>,
    last_transition: Option<Transition>,
    rng: StdRng,
}

impl Sequencer {
    /// `loop_chance` is clamped into `[0, 1]`
    pub fn new(store: Arc<dyn SheepStore>, loop_chance: f64) -> Self {
        Self::with_rng(store, loop_chance, StdRng::from_os_rng())
    }

    /// Deterministic sequencer, for reproducible walks
    pub fn seeded(store: Arc<dyn SheepStore>, loop_chance: f64, seed: u64) -> Self {
        Self::with_rng(store, loop_chance, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(store: Arc<dyn SheepStore>, loop_chance: f64, rng: StdRng) -> Self {
        let loop_chance = if loop_chance.is_nan() {
            DEFAULT_LOOP_CHANCE
        } else {
            loop_chance.clamp(0.0, 1.0)
        };
        Self {
            store,
            loop_chance,
            current: None,
            last_transition: None,
            rng,
        }
    }

    pub fn loop_chance(&self) -> f64 {
        self.loop_chance
    }

    /// The last sheep yielded
    pub fn current(&self) -> Option<&Sheep> {
        self.current.as_ref()
    }

    pub fn last_transition(&self) -> Option<Transition> {
        self.last_transition
    }

    /// Continues the walk from `sheep`, as if it had just been yielded
    pub fn resume_from(&mut self, sheep: Sheep) {
        self.current = Some(sheep);
        self.last_transition = None;
    }

    /// Yields the next sheep of the walk
    ///
    /// Returns `Ok(None)` only when the store holds no sheep at all. A dead
    /// end is not an error: the walk restarts.
    pub async fn advance(&mut self) -> Result<Option<Sheep>> {
        let flock = self.store.list().await?;
        if flock.is_empty() {
            return Ok(None);
        }

        let step = match &self.current {
            None => None,
            Some(current) => {
                let step = choose_successor(current, &flock, self.loop_chance, &mut self.rng);
                if step.is_none() {
                    debug!(sheep = %current, "Stuck, picking a sheep at random");
                }
                step
            }
        };

        let (next, transition) = match step {
            Some(step) => step,
            None => {
                let transition = if self.current.is_some() {
                    Transition::Restart
                } else {
                    Transition::Start
                };
                // flock is non-empty
                let Some(sheep) = flock.choose(&mut self.rng) else {
                    return Ok(None);
                };
                (sheep.clone(), transition)
            }
        };

        debug!(sheep = %next, ?transition, "Next sheep");
        self.current = Some(next.clone());
        self.last_transition = Some(transition);
        Ok(Some(next))
    }
}

/// Picks a graph-adjacent successor of `current`, `None` on a dead end
pub fn choose_successor<R: Rng>(
    current: &Sheep,
    flock: &[Sheep],
    loop_chance: f64,
    rng: &mut R,
) -> Option<(Sheep, Transition)> {
    let (loops, branches): (Vec<&Sheep>, Vec<&Sheep>) = flock
        .iter()
        .filter(|s| current.connects_to(s))
        .partition(|s| s.is_loop());

    let draw: f64 = rng.random();
    let (pool, transition) = if !loops.is_empty() && draw < loop_chance {
        (&loops, Transition::Loop)
    } else if !branches.is_empty() {
        (&branches, Transition::Branch)
    } else if !loops.is_empty() {
        (&loops, Transition::Loop)
    } else {
        return None;
    };

    pool.choose(rng).map(|s| ((*s).clone(), transition))
}
