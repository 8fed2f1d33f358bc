//! VLC driven through its HTTP interface
//!
//! VLC is started with `-I http` (or an already running instance is
//! attached) and controlled with the `requests/*.json` endpoints. A watcher
//! task polls `status.json`, compares it with the previous poll and
//! publishes [`PlayerEvents`]:
//!
//! - `current_changed` when the playing filename changes,
//! - `time_update` when the elapsed time changes,
//! - `impending_end` while the remaining time is below the threshold and the
//!   current item is the last one of its playlist node.

use crate::engine::PlaybackEngine;
use crate::errors::{PlayerError, Result};
use crate::events::{CurrentChanged, ImpendingEnd, PlayerEvents, TimeUpdate};
use async_trait::async_trait;
use electricsheep::Sheep;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

const STATUS_PATH: &str = "requests/status.json";
const PLAYLIST_PATH: &str = "requests/playlist.json";
const READY_PROBE_INTERVAL: Duration = Duration::from_millis(200);

/// How to start and watch VLC
#[derive(Debug, Clone, PartialEq)]
pub struct VlcSettings {
    pub binary: String,
    pub http_port: u16,
    pub password: String,
    /// Delay between two status polls
    pub poll_interval: Duration,
    /// Remaining time under which the next item must be queued
    pub impending_end: Duration,
    /// Bound on the wait for the HTTP interface to answer
    pub startup_timeout: Duration,
}

impl Default for VlcSettings {
    fn default() -> Self {
        Self {
            binary: "vlc".to_string(),
            http_port: 8080,
            password: "sheepstream".to_string(),
            poll_interval: Duration::from_millis(250),
            impending_end: Duration::from_secs(2),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// HTTP interface
// ============================================================================

#[derive(Debug, Deserialize, Default)]
struct VlcStatus {
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    time: Option<f64>,
    #[serde(default)]
    currentplid: Option<i64>,
    #[serde(default)]
    information: Option<Information>,
}

#[derive(Debug, Deserialize)]
struct Information {
    category: Category,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    filename: Option<String>,
}

impl VlcStatus {
    fn filename(&self) -> Option<&str> {
        self.information
            .as_ref()?
            .category
            .meta
            .as_ref()?
            .filename
            .as_deref()
    }

    /// Identity of the current playlist item, VLC uses -1 for none
    fn current_id(&self) -> Option<i64> {
        self.currentplid.filter(|&id| id >= 0)
    }

    fn remaining(&self) -> Option<Duration> {
        let (length, time) = (self.length?, self.time?);
        if length <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64((length - time).max(0.0)))
    }
}

/// VLC reports ids as strings in the playlist and as numbers in the status
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
enum PlaylistId {
    Number(i64),
    Text(String),
}

impl PlaylistId {
    fn is(&self, id: i64) -> bool {
        match self {
            PlaylistId::Number(n) => *n == id,
            PlaylistId::Text(s) => s.trim().parse::<i64>().is_ok_and(|n| n == id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistNode {
    #[serde(default)]
    id: Option<PlaylistId>,
    #[serde(default)]
    children: Vec<PlaylistNode>,
}

impl PlaylistNode {
    /// Whether item `id` is the last child of its parent, `None` when absent
    fn is_last_child(&self, id: i64) -> Option<bool> {
        let position = self
            .children
            .iter()
            .position(|child| child.id.as_ref().is_some_and(|c| c.is(id)));
        if let Some(position) = position {
            return Some(position + 1 == self.children.len());
        }
        self.children.iter().find_map(|child| child.is_last_child(id))
    }
}

#[derive(Debug, Clone)]
struct VlcHttp {
    client: reqwest::Client,
    base: Url,
    password: String,
}

impl VlcHttp {
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self
            .base
            .join(path)
            .map_err(|e| PlayerError::unreachable("Invalid VLC URL", e))?;
        let response = self
            .client
            .get(url)
            .basic_auth("", Some(&self.password))
            .query(query)
            .send()
            .await
            .map_err(|e| PlayerError::unreachable("VLC request failed", e))?;

        if !response.status().is_success() {
            return Err(PlayerError::EngineCommand(format!(
                "VLC returned error status: {}",
                response.status()
            )));
        }

        // VLC answers JSON as text/plain
        let body = response
            .bytes()
            .await
            .map_err(|e| PlayerError::unreachable("VLC body could not be read", e))?;
        serde_json::from_slice(&body).map_err(|e| PlayerError::command("Unexpected VLC answer", e))
    }

    async fn status(&self) -> Result<VlcStatus> {
        self.get(STATUS_PATH, &[]).await
    }

    async fn playlist(&self) -> Result<PlaylistNode> {
        self.get(PLAYLIST_PATH, &[]).await
    }

    async fn command(&self, command: &str, input: Option<&str>) -> Result<()> {
        debug!(command, input, "VLC command");
        let mut query = vec![("command", command)];
        if let Some(input) = input {
            query.push(("input", input));
        }
        let _: serde_json::Value = self.get(STATUS_PATH, &query).await?;
        Ok(())
    }
}

// ============================================================================
// Watcher
// ============================================================================

/// What the previous poll reported
#[derive(Debug, Default)]
struct WatchedState {
    filename: Option<String>,
    elapsed: Option<f64>,
}

async fn watch(
    http: VlcHttp,
    events: PlayerEvents,
    poll_interval: Duration,
    threshold: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut watched = WatchedState::default();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let status = match http.status().await {
            Ok(status) => status,
            Err(err) => {
                warn!("VLC status poll failed: {err}");
                continue;
            }
        };
        if let Err(err) = observe(&http, &events, &mut watched, &status, threshold).await {
            warn!("VLC playlist poll failed: {err}");
        }
    }
    debug!("VLC watcher stopped");
}

async fn observe(
    http: &VlcHttp,
    events: &PlayerEvents,
    watched: &mut WatchedState,
    status: &VlcStatus,
    threshold: Duration,
) -> Result<()> {
    let filename = status.filename().map(str::to_string);
    if filename != watched.filename {
        info!(filename = filename.as_deref().unwrap_or("-"), "Now playing");
        events.current_changed.publish(CurrentChanged {
            filename: filename.clone(),
        });
        watched.filename = filename;
    }

    if status.time != watched.elapsed {
        events.time_update.publish(TimeUpdate {
            elapsed: status.time.map(|t| Duration::from_secs_f64(t.max(0.0))),
            total: status.length.map(|t| Duration::from_secs_f64(t.max(0.0))),
        });
        watched.elapsed = status.time;
    }

    let (Some(remaining), Some(current)) = (status.remaining(), status.current_id()) else {
        return Ok(());
    };
    if remaining >= threshold {
        return Ok(());
    }

    // only the last queued item needs a successor
    if http.playlist().await?.is_last_child(current) == Some(true) {
        trace!(current, ?remaining, "Impending end");
        events.impending_end.publish(ImpendingEnd {
            current: Some(current.to_string()),
            remaining,
        });
    }
    Ok(())
}

// ============================================================================
// Player
// ============================================================================

/// A VLC instance controlled over HTTP
///
/// Dropping the player stops the watcher and kills the VLC process it
/// launched.
pub struct VlcPlayer {
    http: VlcHttp,
    events: PlayerEvents,
    cancel: CancellationToken,
    watcher: Option<JoinHandle<()>>,
    _child: Option<Child>,
}

impl VlcPlayer {
    /// Starts `vlc -I http` and waits for its HTTP interface
    pub async fn launch(settings: VlcSettings) -> Result<Self> {
        info!(binary = %settings.binary, port = settings.http_port, "Starting VLC");
        let child = Command::new(&settings.binary)
            .arg("-I")
            .arg("http")
            .arg("--http-password")
            .arg(&settings.password)
            .arg("--http-port")
            .arg(settings.http_port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlayerError::unreachable("Cannot start VLC", e))?;

        let base = format!("http://localhost:{}/", settings.http_port);
        Self::attach(&base, settings, Some(child)).await
    }

    /// Attaches to a VLC already serving its HTTP interface at `base_url`
    pub async fn connect(base_url: &str, settings: VlcSettings) -> Result<Self> {
        Self::attach(base_url, settings, None).await
    }

    async fn attach(base_url: &str, settings: VlcSettings, child: Option<Child>) -> Result<Self> {
        let mut base = Url::parse(base_url).map_err(|e| PlayerError::unreachable("Invalid VLC URL", e))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(settings.poll_interval.max(Duration::from_secs(5)))
            .build()
            .map_err(|e| PlayerError::unreachable("Cannot build HTTP client", e))?;
        let http = VlcHttp {
            client,
            base,
            password: settings.password.clone(),
        };

        wait_ready(&http, settings.startup_timeout).await?;
        info!(url = %http.base, "VLC is ready");

        let events = PlayerEvents::new("vlc");
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(watch(
            http.clone(),
            events.clone(),
            settings.poll_interval,
            settings.impending_end,
            cancel.clone(),
        ));

        Ok(Self {
            http,
            events,
            cancel,
            watcher: Some(watcher),
            _child: child,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.http.base
    }

    pub async fn play_uri(&self, uri: &str) -> Result<()> {
        self.http.command("in_play", Some(uri)).await
    }

    pub async fn enqueue_uri(&self, uri: &str) -> Result<()> {
        self.http.command("in_enqueue", Some(uri)).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.http.command("pl_forcepause", None).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.http.command("pl_forceresume", None).await
    }

    /// Stops the watcher; VLC itself is killed when the player is dropped
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.await;
        }
    }
}

impl Drop for VlcPlayer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn wait_ready(http: &VlcHttp, limit: Duration) -> Result<()> {
    let started = Instant::now();
    let probe = async {
        loop {
            match http.status().await {
                Ok(_) => return,
                Err(err) => trace!("VLC not ready yet: {err}"),
            }
            sleep(READY_PROBE_INTERVAL).await;
        }
    };
    timeout(limit, probe).await.map_err(|_| {
        PlayerError::EngineUnreachable(format!(
            "VLC HTTP interface at {} did not answer within {:?}",
            http.base,
            started.elapsed()
        ))
    })
}

fn sheep_uri(sheep: &Sheep) -> Result<String> {
    sheep.uri().ok_or_else(|| {
        PlayerError::EngineCommand(format!("{} has no absolute path", sheep.path().display()))
    })
}

#[async_trait]
impl PlaybackEngine for VlcPlayer {
    async fn play_now(&self, sheep: &Sheep) -> Result<()> {
        self.play_uri(&sheep_uri(sheep)?).await
    }

    async fn enqueue(&self, sheep: &Sheep) -> Result<()> {
        self.enqueue_uri(&sheep_uri(sheep)?).await
    }

    fn events(&self) -> &PlayerEvents {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST: &str = r#"{
        "type": "node", "name": "Undefined", "id": "1",
        "children": [
            {"type": "node", "name": "Playlist", "id": "2", "ro": "ro", "children": [
                {"type": "leaf", "name": "a.avi", "id": "4", "duration": 5},
                {"type": "leaf", "name": "b.avi", "id": "5", "duration": 5}
            ]},
            {"type": "node", "name": "Media Library", "id": "3", "ro": "ro", "children": []}
        ]
    }"#;

    #[test]
    fn test_last_child_lookup() {
        let playlist: PlaylistNode = serde_json::from_str(PLAYLIST).unwrap();
        assert_eq!(playlist.is_last_child(4), Some(false));
        assert_eq!(playlist.is_last_child(5), Some(true));
        assert_eq!(playlist.is_last_child(2), Some(false));
        assert_eq!(playlist.is_last_child(42), None);
    }

    #[test]
    fn test_status_fields() {
        let status: VlcStatus = serde_json::from_str(
            r#"{"state": "playing", "length": 10, "time": 9, "currentplid": 5,
                "information": {"category": {"meta": {"filename": "b.avi"}, "Stream 0": {}}}}"#,
        )
        .unwrap();
        assert_eq!(status.filename(), Some("b.avi"));
        assert_eq!(status.current_id(), Some(5));
        assert_eq!(status.remaining(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_idle_status() {
        let status: VlcStatus =
            serde_json::from_str(r#"{"state": "stopped", "length": 0, "time": 0, "currentplid": -1}"#)
                .unwrap();
        assert_eq!(status.filename(), None);
        assert_eq!(status.current_id(), None);
        assert_eq!(status.remaining(), None);
    }
}
