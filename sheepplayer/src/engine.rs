use crate::errors::Result;
use crate::events::PlayerEvents;
use async_trait::async_trait;
use electricsheep::Sheep;

/// What the coordinator needs from a playback engine
///
/// Adapters publish [`PlayerEvents::impending_end`] when the current item is
/// close enough to its end that the next one must be queued now.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Replaces whatever is playing with `sheep`
    async fn play_now(&self, sheep: &Sheep) -> Result<()>;

    /// Appends `sheep` after the last queued item
    async fn enqueue(&self, sheep: &Sheep) -> Result<()>;

    fn events(&self) -> &PlayerEvents;
}
