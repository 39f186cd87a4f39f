#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Ticker Stream - Live Instrument Watch List
//!
//! Keeps one WebSocket subscription to the Coinbase ticker channel, merges
//! throttled update batches into a catalog-seeded instrument table, and
//! derives a filtered, sorted, and valued view of it.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure watch-list types and transforms
//!   - `market`: Instruments, ticker updates, investments
//!   - `market_list`: The id-keyed instrument table and batch merge
//!   - `view`: Filter and sort derivations
//!   - `portfolio`: Investment valuation
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Feed transport, catalog, and snapshot storage interfaces
//!   - `services`: List store, market view, bootstrap, persistence writers
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `coinbase`: Ticker feed client and REST catalog
//!   - `storage`: File snapshot store
//!   - `config`: Environment configuration
//!   - `http`: Health checks and view API
//!
//! # Data Flow
//!
//! ```text
//! Coinbase WS ──► TickerClient ──(batch / 500ms)──► MarketView ──► snapshot watchers
//!                                                     │    ▲
//!                                                     ▼    │
//!                                         persistence   HTTP API
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core watch-list types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{
    CatalogEntry, ConnectionState, Investment, ListItem, TickerBatch, TickerUpdate,
};
pub use domain::portfolio::Valuation;
pub use domain::view::{SortKey, SortOrder, SortSpec};

// Ports
pub use application::ports::{
    CatalogError, CatalogSource, FeedConnector, FeedFrame, FeedTransport, PersistenceError,
    SnapshotStore, TransportError,
};

// Services
pub use application::services::{
    BootstrapError, BootstrapReport, ListSource, ListSnapshot, ListStore, MarketSnapshot,
    MarketView, bootstrap, run_investments_writer, run_list_writer,
};

// Infrastructure config
pub use infrastructure::config::{
    AppConfig, CatalogSettings, ConfigError, FeedSettings, ServerSettings, StorageSettings,
};

// Feed client and catalog
pub use infrastructure::coinbase::{
    ClientStatus, CoinbaseRestClient, ReconnectConfig, SessionPhase, TickerClient,
    TickerClientConfig, TickerClientError, WsConnector,
};

// Storage
pub use infrastructure::storage::FileSnapshotStore;

// HTTP server
pub use infrastructure::http::{HttpServer, HttpServerError, HttpServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
