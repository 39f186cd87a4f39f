//! WebSocket Feed Integration Tests
//!
//! Runs `TickerClient` against a local `tokio-tungstenite` server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use common::ticker_json;
use ticker_stream::{
    ReconnectConfig, SessionPhase, TickerBatch, TickerClient, TickerClientConfig,
};

const WAIT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<tokio::net::TcpStream> {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    accept_async(stream).await.unwrap()
}

async fn next_text(ws: &mut WebSocketStream<tokio::net::TcpStream>) -> String {
    loop {
        match timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap() {
            Message::Text(text) => return text.to_string(),
            Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

fn client_for(url: String) -> (TickerClient, mpsc::Receiver<TickerBatch>) {
    let (batch_tx, batch_rx) = mpsc::channel(16);
    let config = TickerClientConfig {
        reconnect: ReconnectConfig::new(Duration::from_millis(100), None),
        flush_window: Duration::from_millis(50),
        ..TickerClientConfig::new(url)
    };
    (TickerClient::websocket(config, batch_tx), batch_rx)
}

#[tokio::test]
async fn streams_ticker_batches_over_websocket() {
    let (listener, url) = bind().await;
    let (client, mut batches) = client_for(url);

    client
        .connect(vec!["BTC-USD".to_string(), "ETH-USD".to_string()])
        .await
        .unwrap();
    let mut ws = accept(&listener).await;

    let subscribe: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(subscribe["type"], "subscribe");
    assert_eq!(subscribe["channels"], serde_json::json!(["ticker"]));

    ws.send(Message::Ping(vec![1, 2, 3].into())).await.unwrap();
    ws.send(Message::Text(ticker_json("BTC-USD", "42000.5", 1).into()))
        .await
        .unwrap();
    ws.send(Message::Text(ticker_json("ETH-USD", "2000", 2).into()))
        .await
        .unwrap();

    let batch = timeout(WAIT, batches.recv()).await.unwrap().unwrap();
    let ids: Vec<_> = batch.iter().map(|u| u.product_id.as_str()).collect();
    assert_eq!(ids, ["BTC-USD", "ETH-USD"]);
    assert_eq!(batch[0].price, Decimal::new(420_005, 1));

    // The ping was answered by the transport.
    match timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap() {
        Message::Pong(data) => assert_eq!(&data[..], &[1, 2, 3]),
        other => panic!("expected pong, got {other:?}"),
    }

    client.disconnect().await;
    assert!(!client.connection_state().connected);
}

#[tokio::test]
async fn resubscribes_after_server_close() {
    let (listener, url) = bind().await;
    let (client, _batches) = client_for(url);

    client.connect(vec!["BTC-USD".to_string()]).await.unwrap();

    let mut first = accept(&listener).await;
    next_text(&mut first).await;
    first.close(None).await.unwrap();

    let mut second = accept(&listener).await;
    let subscribe: serde_json::Value =
        serde_json::from_str(&next_text(&mut second).await).unwrap();
    assert_eq!(subscribe["product_ids"], serde_json::json!(["BTC-USD"]));

    let mut status = client.subscribe_status();
    timeout(
        WAIT,
        status.wait_for(|status| status.phase == SessionPhase::Open && status.connection.connected),
    )
    .await
    .unwrap()
    .unwrap();

    client.disconnect().await;
}
