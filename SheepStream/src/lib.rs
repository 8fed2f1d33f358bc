//! Shared setup of the SheepStream binaries

use sheepconfig::Config;
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber, writing to stderr
///
/// `RUST_LOG` wins; otherwise `host.logger.min_level` from the configuration.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config
            .get_log_min_level()
            .unwrap_or_else(|_| "INFO".to_string());
        EnvFilter::new(level.to_lowercase())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}
