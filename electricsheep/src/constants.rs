//! Constants for the Electric Sheep client.
//!
//! Defaults used when the configuration does not override them.

use std::time::Duration;

// ============================================================================
// Feed
// ============================================================================

/// Redirect query answering with the list server to use
pub const DEFAULT_REDIRECT_URL: &str = "https://community.sheepserver.net/query.php?q=redir";

/// Path of the sheep list, relative to the resolved server
pub const LIST_PATH: &str = "cgi/list";

/// Default timeout for feed HTTP requests (seconds)
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("electricsheep-rs/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Downloads
// ============================================================================

/// Default timeout for a whole sheep transfer (seconds)
///
/// Sheep are a few megabytes; slow mirrors can still take minutes.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Suffix of in-flight transfers, never visible to iteration
pub const PART_SUFFIX: &str = ".part";

// ============================================================================
// Polling
// ============================================================================

/// Initial backoff delay on feed error (seconds)
pub const BACKOFF_INITIAL_SECONDS: u64 = 20;

/// Maximum backoff delay (seconds)
pub const BACKOFF_MAX_SECONDS: u64 = 300;

/// Floor between two successful polls when the server declares no retry interval
pub const MIN_POLL_INTERVAL_SECONDS: u64 = 10;

pub fn backoff_initial() -> Duration {
    Duration::from_secs(BACKOFF_INITIAL_SECONDS)
}

pub fn backoff_max() -> Duration {
    Duration::from_secs(BACKOFF_MAX_SECONDS)
}

pub fn min_poll_interval() -> Duration {
    Duration::from_secs(MIN_POLL_INTERVAL_SECONDS)
}

// ============================================================================
// Sequencing
// ============================================================================

/// Default probability of taking an available loop instead of branching
pub const DEFAULT_LOOP_CHANCE: f64 = 0.82;
