//! Error types for the Electric Sheep client

use crate::models::SheepDescriptor;
use std::fmt::Display;

/// Result type alias for Electric Sheep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while polling, storing or sequencing sheep
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The feed could not be reached, answered with an error status or sent
    /// an unreadable document. Retried on the next poll cycle.
    #[error("Feed unavailable: {0}")]
    FeedUnavailable(String),

    /// Fetching or persisting the bytes of one sheep failed. The sheep stays
    /// absent from the store.
    #[error("Transfer of sheep {flock}={id} failed: {reason}")]
    TransferFailed { flock: u32, id: u32, reason: String },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub(crate) fn feed(context: &str, err: impl Display) -> Self {
        Self::FeedUnavailable(format!("{context}: {err}"))
    }

    pub(crate) fn transfer(descriptor: &SheepDescriptor, reason: impl Display) -> Self {
        Self::TransferFailed {
            flock: descriptor.flock,
            id: descriptor.id,
            reason: reason.to_string(),
        }
    }

    /// True for failures that a later poll cycle may resolve on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FeedUnavailable(_) | Self::TransferFailed { .. } | Self::Io(_)
        )
    }
}
