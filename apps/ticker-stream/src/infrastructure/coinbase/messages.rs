//! Coinbase WebSocket Message Types
//!
//! Wire format types for the Coinbase Exchange ticker channel. Every message
//! is a JSON object carrying a `type` discriminator.
//!
//! # Message Types
//!
//! ## Outbound
//! - `subscribe`: names the product ids and the `ticker` channel
//!
//! ## Inbound
//! - `ticker`: last trade price and rolling volumes for one product
//! - `subscriptions`: acknowledgement listing the active channels
//! - `error`: server-reported failure with a message and reason
//!
//! Any other `type` decodes to [`FeedMessage::Unknown`] and is ignored.
//!
//! # References
//!
//! - [Exchange WebSocket Channels](https://docs.cdp.coinbase.com/exchange/docs/websocket-channels)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::TickerUpdate;

/// Name of the only channel this client subscribes to.
pub const TICKER_CHANNEL: &str = "ticker";

// =============================================================================
// Outbound
// =============================================================================

/// Subscription request.
///
/// # Wire Format (JSON)
/// ```json
/// {"type": "subscribe", "product_ids": ["BTC-USD"], "channels": ["ticker"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Always "subscribe".
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Products to receive updates for.
    pub product_ids: Vec<String>,
    /// Channels to join.
    pub channels: Vec<String>,
}

impl SubscribeRequest {
    /// Subscribe `product_ids` to the ticker channel.
    #[must_use]
    pub fn ticker(product_ids: Vec<String>) -> Self {
        Self {
            msg_type: "subscribe".to_string(),
            product_ids,
            channels: vec![TICKER_CHANNEL.to_string()],
        }
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Any message received on the feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    /// Price update.
    Ticker(TickerMessage),
    /// Subscription acknowledgement.
    Subscriptions(SubscriptionsMessage),
    /// Server-reported error.
    Error(ErrorMessage),
    /// Any other message type.
    #[serde(other)]
    Unknown,
}

/// Ticker update for one product.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "type": "ticker", "sequence": 37475248783, "product_id": "ETH-USD",
///   "price": "1285.22", "open_24h": "1310.79", "volume_24h": "245532.79",
///   "low_24h": "1280.52", "high_24h": "1313.8", "volume_30d": "9788783.60",
///   "best_bid": "1285.04", "best_ask": "1285.27", "side": "buy",
///   "time": "2022-10-19T23:28:22.061769Z", "trade_id": 370843401,
///   "last_size": "11.4396987"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerMessage {
    /// Feed sequence number.
    pub sequence: u64,
    /// Product id.
    pub product_id: String,
    /// Last trade price.
    pub price: Decimal,
    /// 30-day volume.
    pub volume_30d: Decimal,
    /// Trade time.
    pub time: DateTime<Utc>,
    /// Trade id.
    #[serde(default)]
    pub trade_id: Option<u64>,
    /// Price 24 hours ago.
    #[serde(default)]
    pub open_24h: Option<Decimal>,
    /// 24-hour volume.
    #[serde(default)]
    pub volume_24h: Option<Decimal>,
    /// 24-hour low.
    #[serde(default)]
    pub low_24h: Option<Decimal>,
    /// 24-hour high.
    #[serde(default)]
    pub high_24h: Option<Decimal>,
    /// Best bid.
    #[serde(default)]
    pub best_bid: Option<Decimal>,
    /// Best ask.
    #[serde(default)]
    pub best_ask: Option<Decimal>,
    /// Taker side of the last trade.
    #[serde(default)]
    pub side: Option<TradeSide>,
    /// Size of the last trade.
    #[serde(default)]
    pub last_size: Option<Decimal>,
}

impl From<TickerMessage> for TickerUpdate {
    fn from(msg: TickerMessage) -> Self {
        Self {
            product_id: msg.product_id,
            price: msg.price,
            volume: msg.volume_30d,
            time: msg.time,
            sequence: msg.sequence,
            trade_id: msg.trade_id,
        }
    }
}

/// Taker side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Buyer was the taker.
    Buy,
    /// Seller was the taker.
    Sell,
}

/// Subscription acknowledgement.
///
/// # Wire Format (JSON)
/// ```json
/// {"type": "subscriptions", "channels": [{"name": "ticker", "product_ids": ["BTC-USD"]}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionsMessage {
    /// Active channels.
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// One active channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel name.
    pub name: String,
    /// Products on the channel.
    #[serde(default)]
    pub product_ids: Vec<String>,
}

/// Server-reported error.
///
/// # Wire Format (JSON)
/// ```json
/// {"type": "error", "message": "Failed to subscribe", "reason": "BAD-ID is not a valid product"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Short description.
    pub message: String,
    /// Detailed reason, may be empty.
    #[serde(default)]
    pub reason: String,
}

impl ErrorMessage {
    /// The reason, falling back to the message when the reason is empty.
    #[must_use]
    pub fn display_reason(&self) -> &str {
        if self.reason.is_empty() {
            &self.message
        } else {
            &self.reason
        }
    }
}
