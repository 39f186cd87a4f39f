//! Coinbase Exchange Adapters
//!
//! - **Feed**: WebSocket ticker channel (JSON codec), with flush throttling
//!   and fixed-interval reconnection
//! - **Catalog**: REST products endpoint

pub mod client;
pub mod codec;
pub mod messages;
pub mod reconnect;
pub mod rest;
pub mod throttle;
pub mod transport;

pub use client::{ClientStatus, SessionPhase, TickerClient, TickerClientConfig, TickerClientError};
pub use codec::{CodecError, JsonCodec};
pub use messages::*;
pub use reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
pub use rest::CoinbaseRestClient;
pub use throttle::FlushThrottle;
pub use transport::{WsConnector, WsTransport};
