//! Ticker Feed Client
//!
//! Maintains one logical subscription to the ticker channel over a
//! [`FeedTransport`] that may drop at any time.
//!
//! # Session State Machine
//!
//! ```text
//! Idle → Connecting → Open → (Closed | Errored) → Connecting (after delay) → …
//! ```
//!
//! A session task owns the transport, the [`FlushThrottle`] and the
//! [`ReconnectPolicy`]. It publishes batches on an `mpsc` channel and its
//! [`ClientStatus`] on a `watch` channel. `disconnect` cancels the task and
//! waits for it, so nothing is published once it returns.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::codec::JsonCodec;
use super::messages::{FeedMessage, SubscribeRequest};
use super::reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
use super::throttle::FlushThrottle;
use super::transport::WsConnector;
use crate::application::ports::{FeedConnector, FeedFrame, FeedTransport, TransportError};
use crate::domain::market::{ConnectionState, TickerBatch, TickerUpdate};
use crate::infrastructure::metrics::{self, MessageKind};

/// Time allowed for a polite close on disconnect.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Error Type
// =============================================================================

/// Errors returned by [`TickerClient`] calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickerClientError {
    /// `connect` was called without any product ids.
    #[error("at least one product id is required")]
    EmptyProductIds,
}

// =============================================================================
// Status
// =============================================================================

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No session, or the session gave up.
    #[default]
    Idle,
    /// Opening the channel.
    Connecting,
    /// Open and subscribed.
    Open,
    /// The channel closed; a reconnect is pending.
    Closed,
    /// The server reported an error on the open channel.
    Errored,
}

/// Connection signal plus session detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    /// Session phase.
    pub phase: SessionPhase,
    /// Connection state exposed to readers.
    pub connection: ConnectionState,
    /// Reconnect attempts since the last successful open.
    pub attempt: u32,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the ticker client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerClientConfig {
    /// Feed URL.
    pub url: String,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Throttle window for batching updates.
    pub flush_window: Duration,
}

impl TickerClientConfig {
    /// Create a configuration with default reconnect and throttle settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectConfig::default(),
            flush_window: Duration::from_millis(500),
        }
    }
}

// =============================================================================
// Ticker Client
// =============================================================================

struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Streaming client for the ticker channel.
pub struct TickerClient {
    config: TickerClientConfig,
    connector: Arc<dyn FeedConnector>,
    batch_tx: mpsc::Sender<TickerBatch>,
    status_tx: watch::Sender<ClientStatus>,
    session: Mutex<Option<Session>>,
}

impl std::fmt::Debug for TickerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerClient")
            .field("config", &self.config)
            .field("status", &*self.status_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl TickerClient {
    /// Create a client that opens channels with `connector`.
    #[must_use]
    pub fn new(
        config: TickerClientConfig,
        connector: Arc<dyn FeedConnector>,
        batch_tx: mpsc::Sender<TickerBatch>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ClientStatus::default());
        Self {
            config,
            connector,
            batch_tx,
            status_tx,
            session: Mutex::new(None),
        }
    }

    /// Create a client over a real WebSocket.
    #[must_use]
    pub fn websocket(config: TickerClientConfig, batch_tx: mpsc::Sender<TickerBatch>) -> Self {
        Self::new(config, Arc::new(WsConnector::new()), batch_tx)
    }

    /// Start a session subscribed to `product_ids`.
    ///
    /// An active session is disconnected first.
    ///
    /// # Errors
    ///
    /// Returns [`TickerClientError::EmptyProductIds`] if `product_ids` is
    /// empty; any active session is left untouched.
    pub async fn connect(&self, product_ids: Vec<String>) -> Result<(), TickerClientError> {
        if product_ids.is_empty() {
            return Err(TickerClientError::EmptyProductIds);
        }

        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            tracing::info!("Replacing active ticker session");
            stop_session(previous).await;
        }

        tracing::info!(
            url = %self.config.url,
            products = product_ids.len(),
            "Starting ticker session"
        );

        let cancel = CancellationToken::new();
        let runner = SessionRunner {
            url: self.config.url.clone(),
            product_ids,
            connector: Arc::clone(&self.connector),
            codec: JsonCodec::new(),
            batch_tx: self.batch_tx.clone(),
            status_tx: self.status_tx.clone(),
            policy: ReconnectPolicy::new(self.config.reconnect),
            throttle: FlushThrottle::new(self.config.flush_window),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(runner.run());
        *session = Some(Session { cancel, handle });

        Ok(())
    }

    /// Stop the session, if any, and reset the status.
    ///
    /// Idempotent. Pending reconnect and flush timers are cancelled and
    /// buffered updates are dropped. Returns after the session task has
    /// stopped.
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        if let Some(active) = session.take() {
            stop_session(active).await;
            tracing::info!("Ticker session disconnected");
        }
        self.status_tx.send_replace(ClientStatus::default());
        metrics::set_connected(false);
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ClientStatus {
        self.status_tx.borrow().clone()
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.status_tx.borrow().connection.clone()
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ClientStatus> {
        self.status_tx.subscribe()
    }
}

async fn stop_session(session: Session) {
    session.cancel.cancel();
    if let Err(e) = session.handle.await {
        tracing::warn!(error = %e, "Ticker session task failed");
    }
}

// =============================================================================
// Session Task
// =============================================================================

enum ConnectionEnd {
    Cancelled,
    Lost,
}

struct SessionRunner {
    url: String,
    product_ids: Vec<String>,
    connector: Arc<dyn FeedConnector>,
    codec: JsonCodec,
    batch_tx: mpsc::Sender<TickerBatch>,
    status_tx: watch::Sender<ClientStatus>,
    policy: ReconnectPolicy,
    throttle: FlushThrottle<TickerUpdate>,
    cancel: CancellationToken,
}

impl SessionRunner {
    async fn run(mut self) {
        loop {
            let attempt = self.policy.attempt_count();
            self.update_status(|status| {
                status.phase = SessionPhase::Connecting;
                status.attempt = attempt;
            });

            if let ConnectionEnd::Cancelled = self.run_connection().await {
                return;
            }

            let Some(delay) = self.policy.next_delay() else {
                let max = self.policy.max_attempts().unwrap_or_default();
                let error = ReconnectError::MaxAttemptsExceeded(max);
                tracing::error!(error = %error, "Giving up on ticker feed");
                self.flush().await;
                self.update_status(|status| {
                    status.phase = SessionPhase::Idle;
                    status.connection.connected = false;
                    status.connection.error = Some(error.to_string());
                });
                return;
            };

            metrics::record_reconnect();
            tracing::info!(
                attempt = self.policy.attempt_count(),
                delay_ms = delay.as_millis(),
                "Reconnecting to ticker feed"
            );

            if !self.wait_before_reconnect(delay).await {
                return;
            }
        }
    }

    /// Open, subscribe and read until the channel ends or the session is
    /// cancelled.
    async fn run_connection(&mut self) -> ConnectionEnd {
        let connected = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return ConnectionEnd::Cancelled,
            result = self.connector.connect(&self.url) => result,
        };

        let mut transport = match connected {
            Ok(transport) => transport,
            Err(e) => {
                self.record_transport_error("connect", &e);
                return ConnectionEnd::Lost;
            }
        };

        self.policy.reset();
        self.throttle.clear();

        let subscribed = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return ConnectionEnd::Cancelled,
            result = self.subscribe(transport.as_mut()) => result,
        };
        if let Err(e) = subscribed {
            self.record_transport_error("send", &e);
            return ConnectionEnd::Lost;
        }

        self.update_status(|status| {
            status.phase = SessionPhase::Open;
            status.connection = ConnectionState::open();
            status.attempt = 0;
        });
        metrics::set_connected(true);
        tracing::info!(products = self.product_ids.len(), "Ticker feed open");

        loop {
            let deadline = self.throttle.deadline();
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    if tokio::time::timeout(CLOSE_TIMEOUT, transport.close()).await.is_err() {
                        tracing::debug!("Timed out closing ticker feed");
                    }
                    return ConnectionEnd::Cancelled;
                }
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if !self.flush().await {
                        return ConnectionEnd::Cancelled;
                    }
                }
                frame = transport.next_frame() => match frame {
                    Some(Ok(FeedFrame::Text(text))) => self.handle_text(&text),
                    Some(Ok(FeedFrame::Close)) | None => {
                        tracing::info!("Ticker feed closed");
                        self.mark_closed();
                        return ConnectionEnd::Lost;
                    }
                    Some(Err(e)) => {
                        self.record_transport_error("receive", &e);
                        return ConnectionEnd::Lost;
                    }
                },
            }
        }
    }

    async fn subscribe(&self, transport: &mut dyn FeedTransport) -> Result<(), TransportError> {
        let request = SubscribeRequest::ticker(self.product_ids.clone());
        let json = self
            .codec
            .encode_subscribe(&request)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        tracing::debug!(products = ?request.product_ids, "Sending subscribe request");
        transport.send_text(json).await
    }

    fn handle_text(&mut self, text: &str) {
        let message = match self.codec.decode(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed feed message");
                metrics::record_parse_failure();
                return;
            }
        };

        match message {
            FeedMessage::Ticker(ticker) => {
                metrics::record_message_received(MessageKind::Ticker);
                if self.throttle.push(ticker.into(), Instant::now()) {
                    tracing::trace!("Flush scheduled");
                }
            }
            FeedMessage::Subscriptions(ack) => {
                metrics::record_message_received(MessageKind::Subscriptions);
                tracing::debug!(
                    channels = ?ack.channels.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                    "Subscription confirmed"
                );
            }
            FeedMessage::Error(error) => {
                metrics::record_message_received(MessageKind::Error);
                tracing::warn!(message = %error.message, reason = %error.reason, "Feed reported an error");
                let reason = error.display_reason().to_string();
                self.update_status(|status| {
                    status.phase = SessionPhase::Errored;
                    status.connection.connected = false;
                    status.connection.error = Some(reason);
                });
                metrics::set_connected(false);
            }
            FeedMessage::Unknown => {
                metrics::record_message_received(MessageKind::Unknown);
                tracing::trace!("Ignoring unhandled message type");
            }
        }
    }

    /// Publish the buffer as one batch.
    ///
    /// Returns `false` if the session was cancelled while the batch channel
    /// was full.
    async fn flush(&mut self) -> bool {
        let batch = self.throttle.take();
        if batch.is_empty() {
            return true;
        }
        metrics::record_batch_flushed(batch.len());
        tracing::trace!(size = batch.len(), "Flushing ticker batch");

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.batch_tx.send(batch) => {
                if sent.is_err() {
                    tracing::warn!("Batch receiver dropped, discarding batch");
                }
                true
            }
        }
    }

    /// Sleep out the reconnect delay while still honouring flush deadlines.
    ///
    /// Returns `false` if cancelled.
    async fn wait_before_reconnect(&mut self, delay: Duration) -> bool {
        let reconnect_at = Instant::now() + delay;
        loop {
            let deadline = self.throttle.deadline();
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return false,
                () = tokio::time::sleep_until(deadline.unwrap_or(reconnect_at)), if deadline.is_some() => {
                    if !self.flush().await {
                        return false;
                    }
                }
                () = tokio::time::sleep_until(reconnect_at) => return true,
            }
        }
    }

    fn mark_closed(&self) {
        self.update_status(|status| {
            status.phase = SessionPhase::Closed;
            status.connection.connected = false;
        });
        metrics::set_connected(false);
    }

    fn record_transport_error(&self, kind: &'static str, error: &TransportError) {
        tracing::warn!(error = %error, "Ticker feed transport failure");
        metrics::record_transport_error(kind);
        let reason = error.to_string();
        self.update_status(|status| {
            status.phase = SessionPhase::Closed;
            status.connection.connected = false;
            status.connection.error = Some(reason);
        });
        metrics::set_connected(false);
    }

    /// Apply `change` unless the session has been cancelled.
    fn update_status(&self, change: impl FnOnce(&mut ClientStatus)) {
        let cancel = &self.cancel;
        self.status_tx.send_if_modified(|status| {
            if cancel.is_cancelled() {
                return false;
            }
            let before = status.clone();
            change(status);
            *status != before
        });
    }
}
