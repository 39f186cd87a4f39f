//! Configuration Module
//!
//! Environment-driven settings for the feed, catalog, storage and HTTP
//! server.

mod settings;

pub use settings::{
    AppConfig, CatalogSettings, ConfigError, FeedSettings, ServerSettings, StorageSettings,
};
