//! Signals published by playback engine adapters

use sheepevents::Notifier;
use std::time::Duration;

/// Elapsed playback time of the current item has changed
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUpdate {
    pub elapsed: Option<Duration>,
    pub total: Option<Duration>,
}

/// The engine is playing another file (or nothing)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentChanged {
    pub filename: Option<String>,
}

/// The current item ends soon and nothing is queued after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpendingEnd {
    /// Engine identity of the item about to end, repeated by every signal
    /// raised for that same item
    pub current: Option<String>,
    pub remaining: Duration,
}

/// The notifiers of one engine
#[derive(Debug, Clone)]
pub struct PlayerEvents {
    pub time_update: Notifier<TimeUpdate>,
    pub current_changed: Notifier<CurrentChanged>,
    pub impending_end: Notifier<ImpendingEnd>,
}

impl PlayerEvents {
    pub fn new(engine: &str) -> Self {
        Self {
            time_update: Notifier::new(format!("{engine}.time_update")),
            current_changed: Notifier::new(format!("{engine}.current_changed")),
            impending_end: Notifier::new(format!("{engine}.impending_end")),
        }
    }
}

impl Default for PlayerEvents {
    fn default() -> Self {
        Self::new("player")
    }
}
