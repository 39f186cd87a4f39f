//! WebSocket Transport
//!
//! [`FeedConnector`] and [`FeedTransport`] over `tokio-tungstenite`. Pings
//! are answered here and never reach the session; binary and pong frames are
//! dropped.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{FeedConnector, FeedFrame, FeedTransport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` and `wss://` connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FeedConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn FeedTransport>, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        Ok(Box::new(WsTransport { stream }))
    }
}

/// One open WebSocket.
pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl FeedTransport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<FeedFrame, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(FeedFrame::Text(text.to_string()))),
                Ok(Message::Close(frame)) => {
                    if let Some(frame) = frame {
                        tracing::debug!(code = %frame.code, reason = %frame.reason, "Server sent close frame");
                    }
                    return Some(Ok(FeedFrame::Close));
                }
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        return Some(Err(TransportError::SendFailed(e.to_string())));
                    }
                }
                Ok(_) => {}
                Err(e) => return Some(Err(TransportError::ReceiveFailed(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
    }
}
