//! HTTP client for the Electric Sheep feed

use crate::constants::*;
use crate::error::{Error, Result};
use crate::listing;
use crate::models::FeedSnapshot;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

/// A source of feed snapshots, polled by the shepherd
#[async_trait]
pub trait SheepFeed: Send {
    /// Performs one round of remote discovery
    async fn poll(&mut self) -> Result<FeedSnapshot>;

    /// Time left before the next poll is permitted, zero when unknown or elapsed
    fn time_until_next_poll(&self) -> Duration;
}

/// Electric Sheep feed client
///
/// The first poll resolves the list server through the redirect query and
/// keeps it for the lifetime of the client. Every poll remembers the
/// server-declared retry interval.
///
/// # Example
///
/// ```no_run
/// use electricsheep::FeedClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = FeedClient::new()?;
///     let snapshot = client.poll().await?;
///     println!("Flock {} has {} sheep", snapshot.flock, snapshot.sheep.len());
///     println!("Next poll in {:?}", client.time_until_next_poll());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    redirect_url: Url,
    server: Option<Url>,
    next_retry: Option<Instant>,
}

impl FeedClient {
    /// Create a new client with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> FeedClientBuilder {
        FeedClientBuilder::default()
    }

    /// The list server resolved by the redirect query, if any yet
    pub fn server(&self) -> Option<&Url> {
        self.server.as_ref()
    }

    /// Forgets the resolved server; the next poll resolves it again
    pub fn reset_server(&mut self) {
        self.server = None;
    }

    /// Time left before the next poll is permitted
    pub fn time_until_next_poll(&self) -> Duration {
        self.next_retry
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Performs one poll: resolves the server if needed, then fetches the sheep list
    ///
    /// Transport, status and parsing failures are reported as
    /// [`Error::FeedUnavailable`]; the resolved server is kept.
    pub async fn poll(&mut self) -> Result<FeedSnapshot> {
        let server = self.resolve_server().await?;
        let list_url = server
            .join(LIST_PATH)
            .map_err(|e| Error::feed("Invalid list URL", e))?;

        debug!(url = %list_url, "Fetching sheep list");
        let response = self
            .client
            .get(list_url.clone())
            .send()
            .await
            .map_err(|e| Error::feed("Sheep list request failed", e))?;

        if !response.status().is_success() {
            return Err(Error::FeedUnavailable(format!(
                "Sheep list returned error status: {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::feed("Sheep list body could not be read", e))?;
        let snapshot = listing::parse_list(&body)?;

        self.next_retry = Some(Instant::now() + snapshot.retry_after);
        info!(
            flock = snapshot.flock,
            sheep = snapshot.sheep.len(),
            retry_secs = snapshot.retry_after.as_secs(),
            "Received sheep list"
        );
        Ok(snapshot)
    }

    async fn resolve_server(&mut self) -> Result<Url> {
        if let Some(server) = &self.server {
            return Ok(server.clone());
        }

        debug!(url = %self.redirect_url, "Resolving sheep server");
        let response = self
            .client
            .get(self.redirect_url.clone())
            .send()
            .await
            .map_err(|e| Error::feed("Redirect request failed", e))?;

        if !response.status().is_success() {
            return Err(Error::FeedUnavailable(format!(
                "Redirect returned error status: {}",
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::feed("Redirect body could not be read", e))?;
        let mut host = listing::parse_redirect(&text)?;
        // Url::join would replace the last segment of a host without trailing slash
        if !host.ends_with('/') {
            host.push('/');
        }
        let server = Url::parse(&host).map_err(|e| Error::feed("Invalid server host", e))?;

        info!(server = %server, "Resolved sheep server");
        self.server = Some(server.clone());
        Ok(server)
    }
}

#[async_trait]
impl SheepFeed for FeedClient {
    async fn poll(&mut self) -> Result<FeedSnapshot> {
        FeedClient::poll(self).await
    }

    fn time_until_next_poll(&self) -> Duration {
        FeedClient::time_until_next_poll(self)
    }
}

/// Builder for configuring a FeedClient
#[derive(Debug)]
pub struct FeedClientBuilder {
    client: Option<Client>,
    redirect_url: String,
    timeout: Duration,
    user_agent: String,
    accept_invalid_certs: bool,
    server: Option<Url>,
}

impl Default for FeedClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_FEED_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_invalid_certs: false,
            server: None,
        }
    }
}

impl FeedClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the redirect query URL
    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = url.into();
        self
    }

    /// Skip the redirect query and use this list server
    pub fn server(mut self, server: Url) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The community sheep server is known to present invalid certificates
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Build the client
    ///
    /// Fails with [`Error::InvalidUrl`] when the redirect URL does not parse.
    pub fn build(self) -> Result<FeedClient> {
        let redirect_url = Url::parse(&self.redirect_url)?;
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .danger_accept_invalid_certs(self.accept_invalid_certs)
                .build()
                .map_err(|e| Error::other(format!("Cannot build HTTP client: {e}")))?,
        };

        Ok(FeedClient {
            client,
            redirect_url,
            server: self.server,
            next_retry: None,
        })
    }
}
