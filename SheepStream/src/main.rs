use anyhow::{Context, Result};
use electricsheep::{DirStore, ElectricSheepConfigExt, Shepherd};
use sheepconfig::get_config;
use sheepplayer::{PlaybackCoordinator, SheepPlayerConfigExt, VlcPlayer};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const WAIT_FOR_SHEEP_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = get_config();
    sheepstream::init_logging(&config);

    // ========== PHASE 1 : Flock ==========

    let directory = config.get_sheep_directory()?;
    info!(directory = %directory, "Opening sheep store");
    let store = Arc::new(DirStore::with_client(
        &directory,
        config.sheep_download_client()?,
    )?);
    let shepherd = Shepherd::spawn(
        config.sheep_feed_client()?,
        store,
        config.get_sheep_backoff(),
    );

    let ready = tokio::select! {
        waited = shepherd.wait_for_sheep(WAIT_FOR_SHEEP_INTERVAL) => {
            waited.context("Cannot read the sheep store")?;
            true
        }
        _ = tokio::signal::ctrl_c() => false,
    };
    if !ready {
        shepherd.shutdown().await;
        return Ok(());
    }

    // ========== PHASE 2 : Playback ==========

    let player = Arc::new(
        VlcPlayer::launch(config.get_vlc_settings())
            .await
            .context("Cannot start VLC")?,
    );
    let sequencer = shepherd.sequence(config.get_sheep_loop_chance());
    let coordinator = PlaybackCoordinator::start(player.clone(), sequencer)
        .await
        .context("Cannot start playback")?;

    info!("✅ SheepStream is ready!");
    info!("Press Ctrl+C to stop...");

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Stopping SheepStream");
            Ok(())
        }
        failure = coordinator.failed() => match failure {
            Some(err) => Err(err).context("Playback engine failed"),
            None => Ok(()),
        },
    };

    // ========== PHASE 3 : Shutdown ==========

    drop(coordinator);
    shepherd.shutdown().await;
    // the last handle on the player kills VLC
    drop(player);

    outcome
}
