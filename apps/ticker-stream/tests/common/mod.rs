//! In-memory feed transport for driving `TickerClient` from tests.
//!
//! Every `connect` on [`ScriptedConnector`] hands a [`FakeServer`] to the
//! test through an unbounded channel. The test plays the exchange: it reads
//! what the client sent and pushes frames back.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use ticker_stream::{FeedConnector, FeedFrame, FeedTransport, TransportError};

/// Connector whose channels are driven by the test.
pub struct ScriptedConnector {
    servers_tx: mpsc::UnboundedSender<FakeServer>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
    stall_sends: Arc<AtomicBool>,
}

/// Test side of a [`ScriptedConnector`].
pub struct ConnectorHandle {
    servers_rx: mpsc::UnboundedReceiver<FakeServer>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
    stall_sends: Arc<AtomicBool>,
}

impl ScriptedConnector {
    /// Create a connector and the handle that receives its connections.
    pub fn new() -> (Arc<Self>, ConnectorHandle) {
        let (servers_tx, servers_rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let refuse = Arc::new(AtomicBool::new(false));
        let stall_sends = Arc::new(AtomicBool::new(false));
        let connector = Arc::new(Self {
            servers_tx,
            attempts: Arc::clone(&attempts),
            refuse: Arc::clone(&refuse),
            stall_sends: Arc::clone(&stall_sends),
        });
        let handle = ConnectorHandle {
            servers_rx,
            attempts,
            refuse,
            stall_sends,
        };
        (connector, handle)
    }
}

#[async_trait]
impl FeedConnector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn FeedTransport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed("connection refused".to_string()));
        }

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let server = FakeServer {
            frames_tx,
            sent_rx,
            closed: Arc::clone(&closed),
        };
        self.servers_tx
            .send(server)
            .map_err(|_| TransportError::ConnectFailed("test dropped handle".to_string()))?;

        Ok(Box::new(FakeTransport {
            frames_rx,
            sent_tx,
            closed,
            stall_sends: self.stall_sends.load(Ordering::SeqCst),
        }))
    }
}

impl ConnectorHandle {
    /// Wait for the client to open the next channel.
    pub async fn accept(&mut self) -> FakeServer {
        self.servers_rx.recv().await.expect("connector dropped")
    }

    /// Connect attempts made so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Make subsequent connects fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make sends on subsequently opened channels never complete.
    pub fn stall_sends(&self, stall: bool) {
        self.stall_sends.store(stall, Ordering::SeqCst);
    }
}

/// The exchange end of one open channel.
pub struct FakeServer {
    frames_tx: mpsc::UnboundedSender<Result<FeedFrame, TransportError>>,
    sent_rx: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl FakeServer {
    /// Push a text frame to the client.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.frames_tx.send(Ok(FeedFrame::Text(text.into())));
    }

    /// Close the channel from the server side.
    pub fn close(&self) {
        let _ = self.frames_tx.send(Ok(FeedFrame::Close));
    }

    /// Fail the channel with a receive error.
    pub fn fail(&self, reason: &str) {
        let _ = self
            .frames_tx
            .send(Err(TransportError::ReceiveFailed(reason.to_string())));
    }

    /// Next payload the client sent.
    pub async fn next_sent(&mut self) -> String {
        self.sent_rx.recv().await.expect("client transport dropped")
    }

    /// Whether the client closed its end.
    pub fn client_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeTransport {
    frames_rx: mpsc::UnboundedReceiver<Result<FeedFrame, TransportError>>,
    sent_tx: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
    stall_sends: bool,
}

#[async_trait]
impl FeedTransport for FakeTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.stall_sends {
            std::future::pending::<()>().await;
        }
        self.sent_tx
            .send(text)
            .map_err(|_| TransportError::SendFailed("server gone".to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<FeedFrame, TransportError>> {
        self.frames_rx.recv().await
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A ticker frame as the exchange sends it.
pub fn ticker_json(product_id: &str, price: &str, sequence: u64) -> String {
    serde_json::json!({
        "type": "ticker",
        "sequence": sequence,
        "product_id": product_id,
        "price": price,
        "open_24h": "100",
        "volume_24h": "10",
        "low_24h": "90",
        "high_24h": "110",
        "volume_30d": "1234.5",
        "best_bid": price,
        "best_ask": price,
        "side": "buy",
        "time": "2024-03-09T07:05:03.123456Z",
        "trade_id": sequence,
        "last_size": "0.1"
    })
    .to_string()
}
