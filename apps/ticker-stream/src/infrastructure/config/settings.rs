//! Application Settings
//!
//! Configuration types for the ticker stream, loaded from environment
//! variables. Every variable is optional; numeric values that do not parse
//! fall back to their defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Streaming feed settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// WebSocket feed URL.
    pub ws_url: String,
    /// Ids to subscribe to. Empty means every catalog id.
    pub product_ids: Vec<String>,
    /// Fixed delay between a close and the next connect attempt.
    pub reconnect_interval: Duration,
    /// Maximum consecutive reconnect attempts (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Throttle window for batching ticker updates.
    pub flush_window: Duration,
    /// Capacity of the batch channel to the market view.
    pub batch_channel_capacity: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws-feed.exchange.coinbase.com".to_string(),
            product_ids: Vec::new(),
            reconnect_interval: Duration::from_millis(2000),
            max_reconnect_attempts: 0,
            flush_window: Duration::from_millis(500),
            batch_channel_capacity: 256,
        }
    }
}

/// Reference catalog settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    /// REST API base URL.
    pub rest_url: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            rest_url: "https://api.exchange.coinbase.com".to_string(),
        }
    }
}

/// Snapshot storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// Directory holding the snapshot files.
    pub dir: PathBuf,
    /// Age after which a stored list is ignored.
    pub expiry: Duration,
    /// Minimum interval between list writes.
    pub throttle: Duration,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".ticker-stream"),
            expiry: Duration::from_secs(300),
            throttle: Duration::from_secs(30),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Port for health, metrics and the view API.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8083 }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Streaming feed settings.
    pub feed: FeedSettings,
    /// Reference catalog settings.
    pub catalog: CatalogSettings,
    /// Snapshot storage settings.
    pub storage: StorageSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL has the wrong scheme or the flush window is
    /// zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let feed_defaults = FeedSettings::default();
        let storage_defaults = StorageSettings::default();

        let feed = FeedSettings {
            ws_url: lookup("TICKER_WS_URL").unwrap_or(feed_defaults.ws_url),
            product_ids: lookup("TICKER_PRODUCT_IDS")
                .map(|ids| parse_id_list(&ids))
                .unwrap_or_default(),
            reconnect_interval: parse_env(&lookup, "TICKER_RECONNECT_INTERVAL_MS")
                .map_or(feed_defaults.reconnect_interval, Duration::from_millis),
            max_reconnect_attempts: parse_env(&lookup, "TICKER_MAX_RECONNECT_ATTEMPTS")
                .unwrap_or(feed_defaults.max_reconnect_attempts),
            flush_window: parse_env(&lookup, "TICKER_FLUSH_WINDOW_MS")
                .map_or(feed_defaults.flush_window, Duration::from_millis),
            batch_channel_capacity: parse_env(&lookup, "TICKER_BATCH_CHANNEL_CAPACITY")
                .unwrap_or(feed_defaults.batch_channel_capacity)
                .max(1),
        };

        let catalog = CatalogSettings {
            rest_url: lookup("TICKER_REST_URL")
                .unwrap_or_else(|| CatalogSettings::default().rest_url),
        };

        let storage = StorageSettings {
            dir: lookup("TICKER_STORAGE_DIR").map_or(storage_defaults.dir, PathBuf::from),
            expiry: parse_env(&lookup, "TICKER_STORAGE_EXPIRY_SECS")
                .map_or(storage_defaults.expiry, Duration::from_secs),
            throttle: parse_env(&lookup, "TICKER_STORAGE_THROTTLE_SECS")
                .map_or(storage_defaults.throttle, Duration::from_secs),
        };

        let server = ServerSettings {
            http_port: parse_env(&lookup, "TICKER_HTTP_PORT")
                .unwrap_or(ServerSettings::default().http_port),
        };

        let config = Self {
            feed,
            catalog,
            storage,
            server,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the feed and catalog rely on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !has_scheme(&self.feed.ws_url, &["ws://", "wss://"]) {
            return Err(ConfigError::InvalidUrl {
                key: "TICKER_WS_URL",
                url: self.feed.ws_url.clone(),
            });
        }
        if !has_scheme(&self.catalog.rest_url, &["http://", "https://"]) {
            return Err(ConfigError::InvalidUrl {
                key: "TICKER_REST_URL",
                url: self.catalog.rest_url.clone(),
            });
        }
        if self.feed.flush_window.is_zero() {
            return Err(ConfigError::ZeroFlushWindow);
        }
        Ok(())
    }

    /// Maximum reconnect attempts, `None` when unlimited.
    #[must_use]
    pub const fn max_reconnect_attempts(&self) -> Option<u32> {
        match self.feed.max_reconnect_attempts {
            0 => None,
            n => Some(n),
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A URL does not use an accepted scheme.
    #[error("{key} has an unsupported scheme: {url}")]
    InvalidUrl {
        /// Variable the URL came from.
        key: &'static str,
        /// The rejected URL.
        url: String,
    },

    /// The throttle window must be positive.
    #[error("TICKER_FLUSH_WINDOW_MS must be greater than zero")]
    ZeroFlushWindow,
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    let lower = url.to_ascii_lowercase();
    schemes
        .iter()
        .any(|&scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_uppercase)
        .collect()
}

fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
