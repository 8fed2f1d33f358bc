//! Electric Sheep settings on top of sheepconfig
//!
//! `ElectricSheepConfigExt` adds the feed, store and sequencer settings to
//! `sheepconfig::Config`.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheepconfig::get_config;
//! use electricsheep::ElectricSheepConfigExt;
//!
//! let config = get_config();
//! let store = DirStore::open(config.get_sheep_directory()?)?;
//! let client = config.sheep_feed_client()?;
//! ```

use crate::client::{FeedClient, FeedClientBuilder};
use crate::constants::*;
use crate::shepherd::BackoffPolicy;
use anyhow::Result;
use serde_yaml::{Number, Value};
use sheepconfig::Config;
use std::time::Duration;

const SHEEP_DIRECTORY: &[&str] = &["sheep", "directory"];
const REDIRECT_URL: &[&str] = &["sheep", "feed", "redirect_url"];
const FEED_TIMEOUT: &[&str] = &["sheep", "feed", "timeout_secs"];
const ACCEPT_INVALID_CERTS: &[&str] = &["sheep", "feed", "accept_invalid_certs"];
const DOWNLOAD_TIMEOUT: &[&str] = &["sheep", "download", "timeout_secs"];
const BACKOFF_INITIAL: &[&str] = &["sheep", "backoff", "initial_secs"];
const BACKOFF_MAX: &[&str] = &["sheep", "backoff", "max_secs"];
const LOOP_CHANCE: &[&str] = &["sheep", "sequence", "loop_chance"];

/// Default store directory, relative to the config directory
const DEFAULT_SHEEP_DIRECTORY: &str = "sheep";

/// Extension trait for the Electric Sheep settings
pub trait ElectricSheepConfigExt {
    /// Absolute directory of the sheep store, created when missing
    ///
    /// (default: `<config_dir>/sheep`)
    fn get_sheep_directory(&self) -> Result<String>;

    /// Sets the store directory (absolute or relative to the config directory)
    fn set_sheep_directory(&self, path: String) -> Result<()>;

    /// URL of the feed redirect query
    fn get_sheep_redirect_url(&self) -> String;

    /// Timeout of feed requests (default: 30s)
    fn get_sheep_feed_timeout(&self) -> Duration;

    /// The community server presents invalid certificates (default: true)
    fn get_sheep_accept_invalid_certs(&self) -> bool;

    /// Timeout of a whole transfer (default: 300s)
    fn get_sheep_download_timeout(&self) -> Duration;

    /// Backoff applied after a feed failure (default: 20s, max 300s)
    fn get_sheep_backoff(&self) -> BackoffPolicy;

    /// Chance of taking a loop, clamped into `[0, 1]` (default: 0.82)
    fn get_sheep_loop_chance(&self) -> f64;

    fn set_sheep_loop_chance(&self, chance: f64) -> Result<()>;

    /// Feed client built from the settings above
    fn sheep_feed_client(&self) -> Result<FeedClient>;

    /// HTTP client for transfers, with the configured timeout
    fn sheep_download_client(&self) -> Result<reqwest::Client>;
}

impl ElectricSheepConfigExt for Config {
    fn get_sheep_directory(&self) -> Result<String> {
        self.get_managed_dir(SHEEP_DIRECTORY, DEFAULT_SHEEP_DIRECTORY)
    }

    fn set_sheep_directory(&self, path: String) -> Result<()> {
        self.set_managed_dir(SHEEP_DIRECTORY, path)
    }

    fn get_sheep_redirect_url(&self) -> String {
        self.get_string_or(REDIRECT_URL, DEFAULT_REDIRECT_URL)
    }

    fn get_sheep_feed_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(FEED_TIMEOUT, DEFAULT_FEED_TIMEOUT_SECS))
    }

    fn get_sheep_accept_invalid_certs(&self) -> bool {
        self.get_bool_or(ACCEPT_INVALID_CERTS, true)
    }

    fn get_sheep_download_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(DOWNLOAD_TIMEOUT, DEFAULT_DOWNLOAD_TIMEOUT_SECS))
    }

    fn get_sheep_backoff(&self) -> BackoffPolicy {
        let initial = self.get_u64_or(BACKOFF_INITIAL, BACKOFF_INITIAL_SECONDS).max(1);
        let max = self.get_u64_or(BACKOFF_MAX, BACKOFF_MAX_SECONDS).max(initial);
        BackoffPolicy {
            initial: Duration::from_secs(initial),
            max: Duration::from_secs(max),
        }
    }

    fn get_sheep_loop_chance(&self) -> f64 {
        let chance = self.get_f64_or(LOOP_CHANCE, DEFAULT_LOOP_CHANCE);
        if chance.is_nan() {
            DEFAULT_LOOP_CHANCE
        } else {
            chance.clamp(0.0, 1.0)
        }
    }

    fn set_sheep_loop_chance(&self, chance: f64) -> Result<()> {
        self.set_value(LOOP_CHANCE, Value::Number(Number::from(chance)))
    }

    fn sheep_feed_client(&self) -> Result<FeedClient> {
        let client = FeedClientBuilder::new()
            .redirect_url(self.get_sheep_redirect_url())
            .timeout(self.get_sheep_feed_timeout())
            .accept_invalid_certs(self.get_sheep_accept_invalid_certs())
            .build()?;
        Ok(client)
    }

    fn sheep_download_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(self.get_sheep_download_timeout())
            .danger_accept_invalid_certs(self.get_sheep_accept_invalid_certs())
            .build()?;
        Ok(client)
    }
}
