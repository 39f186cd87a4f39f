//! Port Interfaces
//!
//! Contracts that infrastructure adapters implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`FeedConnector`] / [`FeedTransport`]: the duplex ticker channel
//! - [`CatalogSource`]: the reference catalog of instruments
//! - [`SnapshotStore`]: durable storage for the list and investments

use async_trait::async_trait;

use crate::domain::market::{CatalogEntry, Investment, ListItem};

// =============================================================================
// Feed Transport
// =============================================================================

/// Transport-level failure: refused connect, dropped socket, failed write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Opening the channel failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The open channel failed while reading.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Writing to the open channel failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// A frame read from the feed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    /// A text payload.
    Text(String),
    /// The remote side closed the channel.
    Close,
}

/// One open duplex channel to the feed.
#[async_trait]
pub trait FeedTransport: Send {
    /// Send a text payload.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next frame. `None` means the stream ended.
    ///
    /// Implementations answer keep-alive pings themselves and never surface
    /// them here.
    async fn next_frame(&mut self) -> Option<Result<FeedFrame, TransportError>>;

    /// Close the channel, best effort.
    async fn close(&mut self);
}

/// Opens feed channels.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Open a new channel to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn FeedTransport>, TransportError>;
}

// =============================================================================
// Catalog
// =============================================================================

/// Failure loading the reference catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The request could not be completed.
    #[error("catalog request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("catalog request returned {status}: {reason}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Status reason phrase.
        reason: String,
    },

    /// The body was not a product list.
    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
}

/// Source of the static instrument list.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every instrument once. The caller decides whether to retry.
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
}

// =============================================================================
// Snapshot Storage
// =============================================================================

/// Failure reading or writing durable snapshots.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem error.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stored content is not valid JSON for the expected shape.
    #[error("stored snapshot is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Durable storage for the merged list and held investments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the stored list if it exists and has not expired.
    async fn load_list(&self) -> Result<Option<Vec<ListItem>>, PersistenceError>;

    /// Store the list stamped with the current time.
    async fn save_list(&self, list: &[ListItem]) -> Result<(), PersistenceError>;

    /// Load stored investments, if any were saved.
    async fn load_investments(&self) -> Result<Option<Vec<Investment>>, PersistenceError>;

    /// Store investments.
    async fn save_investments(&self, investments: &[Investment]) -> Result<(), PersistenceError>;
}
