//! VLC player settings on top of sheepconfig
//!
//! ```rust,ignore
//! use sheepconfig::get_config;
//! use sheepplayer::{SheepPlayerConfigExt, VlcPlayer};
//!
//! let player = VlcPlayer::launch(get_config().get_vlc_settings()).await?;
//! ```

use crate::vlc::VlcSettings;
use sheepconfig::Config;
use std::time::Duration;

const VLC_BINARY: &[&str] = &["player", "vlc", "binary"];
const VLC_HTTP_PORT: &[&str] = &["player", "vlc", "http_port"];
const VLC_PASSWORD: &[&str] = &["player", "vlc", "password"];
const VLC_POLL_INTERVAL: &[&str] = &["player", "vlc", "poll_interval_ms"];
const VLC_IMPENDING_END: &[&str] = &["player", "vlc", "impending_end_secs"];
const VLC_STARTUP_TIMEOUT: &[&str] = &["player", "vlc", "startup_timeout_secs"];

/// Extension trait for the player settings
pub trait SheepPlayerConfigExt {
    /// VLC executable (default: `vlc`)
    fn get_vlc_binary(&self) -> String;

    /// Port of the VLC HTTP interface (default: 8080)
    fn get_vlc_http_port(&self) -> u16;

    /// Password of the HTTP interface (default: `sheepstream`)
    fn get_vlc_password(&self) -> String;

    /// Full settings, with defaults for absent keys
    fn get_vlc_settings(&self) -> VlcSettings;
}

impl SheepPlayerConfigExt for Config {
    fn get_vlc_binary(&self) -> String {
        self.get_string_or(VLC_BINARY, &VlcSettings::default().binary)
    }

    fn get_vlc_http_port(&self) -> u16 {
        let default = VlcSettings::default().http_port;
        u16::try_from(self.get_u64_or(VLC_HTTP_PORT, u64::from(default))).unwrap_or(default)
    }

    fn get_vlc_password(&self) -> String {
        self.get_string_or(VLC_PASSWORD, &VlcSettings::default().password)
    }

    fn get_vlc_settings(&self) -> VlcSettings {
        let defaults = VlcSettings::default();
        VlcSettings {
            binary: self.get_vlc_binary(),
            http_port: self.get_vlc_http_port(),
            password: self.get_vlc_password(),
            poll_interval: Duration::from_millis(
                self.get_u64_or(VLC_POLL_INTERVAL, defaults.poll_interval.as_millis() as u64)
                    .max(10),
            ),
            impending_end: Duration::from_secs(
                self.get_u64_or(VLC_IMPENDING_END, defaults.impending_end.as_secs()),
            ),
            startup_timeout: Duration::from_secs(
                self.get_u64_or(VLC_STARTUP_TIMEOUT, defaults.startup_timeout.as_secs()),
            ),
        }
    }
}
