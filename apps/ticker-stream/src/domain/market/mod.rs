//! Market Types
//!
//! Canonical internal representation of instruments and the updates that
//! move their prices. These types are codec-agnostic: wire messages from the
//! exchange are converted into them at the infrastructure boundary.

use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Catalog
// =============================================================================

/// One instrument as supplied by the reference catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable instrument id (e.g. `BTC-USD`).
    pub id: String,
    /// Display name.
    pub label: String,
    /// Minimum price increment.
    pub increment: Decimal,
}

impl CatalogEntry {
    /// Create a catalog entry.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>, increment: Decimal) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            increment,
        }
    }
}

// =============================================================================
// List Item
// =============================================================================

/// One row of the authoritative instrument table.
///
/// `id`, `label` and `increment` are fixed when the row is seeded. Only
/// `price`, `volume` and `last_updated` change afterwards, and always
/// together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    /// Instrument id.
    pub id: String,
    /// Display name.
    pub label: String,
    /// Last traded price, `None` until the first update.
    pub price: Option<Decimal>,
    /// 30-day volume, `None` until the first update.
    pub volume: Option<Decimal>,
    /// Minimum price increment from the catalog.
    pub increment: Decimal,
    /// Wall-clock label of the last merge, empty until the first update.
    pub last_updated: String,
}

impl From<CatalogEntry> for ListItem {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            id: entry.id,
            label: entry.label,
            price: None,
            volume: None,
            increment: entry.increment,
            last_updated: String::new(),
        }
    }
}

/// Format the `HH:MM:SS` label stored in [`ListItem::last_updated`].
#[must_use]
pub fn last_updated_label(now: DateTime<Local>) -> String {
    now.format("%H:%M:%S").to_string()
}

// =============================================================================
// Ticker Update
// =============================================================================

/// A single price/volume snapshot for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerUpdate {
    /// Instrument id the update applies to.
    pub product_id: String,
    /// Last traded price.
    pub price: Decimal,
    /// 30-day volume.
    pub volume: Decimal,
    /// Exchange timestamp of the trade.
    pub time: DateTime<Utc>,
    /// Feed sequence number.
    pub sequence: u64,
    /// Trade id, when the exchange reports one.
    pub trade_id: Option<u64>,
}

/// A coalesced group of updates published by one flush.
pub type TickerBatch = Vec<TickerUpdate>;

// =============================================================================
// Connection State
// =============================================================================

/// Connection signal exposed to readers.
///
/// `error` survives a close so the last reason stays visible; it is cleared
/// only when a connection opens successfully or on `disconnect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    /// Whether the feed is currently open and subscribed.
    pub connected: bool,
    /// Last transport or protocol error reason.
    pub error: Option<String>,
}

impl ConnectionState {
    /// State after a successful open.
    #[must_use]
    pub const fn open() -> Self {
        Self {
            connected: true,
            error: None,
        }
    }
}

// =============================================================================
// Investment
// =============================================================================

/// A held position, created by the user and read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    /// Instrument id the position is in.
    pub id: String,
    /// Display name at purchase time.
    pub label: String,
    /// Quantity held.
    pub amount: Decimal,
    /// USD spent.
    pub usd_invested: Decimal,
    /// Unit price at purchase.
    pub usd_per_product_at_purchase: Decimal,
    /// Purchase time, epoch milliseconds.
    pub date: i64,
}
