//! Ticker Stream Binary
//!
//! Loads the instrument list, subscribes to the ticker feed, and serves the
//! derived view over HTTP.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ticker-stream
//! ```
//!
//! # Environment Variables
//!
//! All optional.
//! - `TICKER_WS_URL`: Feed URL (default: <wss://ws-feed.exchange.coinbase.com>)
//! - `TICKER_REST_URL`: Catalog base URL (default: <https://api.exchange.coinbase.com>)
//! - `TICKER_PRODUCT_IDS`: Comma-separated ids (default: every catalog id)
//! - `TICKER_RECONNECT_INTERVAL_MS`: Delay between reconnects (default: 2000)
//! - `TICKER_MAX_RECONNECT_ATTEMPTS`: 0 = unlimited (default: 0)
//! - `TICKER_FLUSH_WINDOW_MS`: Batch window (default: 500)
//! - `TICKER_BATCH_CHANNEL_CAPACITY`: Pending batches (default: 256)
//! - `TICKER_STORAGE_DIR`: Snapshot directory (default: .ticker-stream)
//! - `TICKER_STORAGE_EXPIRY_SECS`: Stored list lifetime (default: 300)
//! - `TICKER_STORAGE_THROTTLE_SECS`: Minimum interval between list writes (default: 30)
//! - `TICKER_HTTP_PORT`: Health and view API port (default: 8083)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: ticker-stream)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ticker_stream::{
    AppConfig, CoinbaseRestClient, FileSnapshotStore, HttpServer, HttpServerState, MarketView,
    ReconnectConfig, SnapshotStore, TickerClient, TickerClientConfig, bootstrap, init_metrics,
    init_telemetry, run_investments_writer, run_list_writer,
};

/// Time allowed for background tasks to finish after shutdown starts.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = init_telemetry().context("failed to initialize telemetry")?;

    tracing::info!("Starting Ticker Stream");

    let _metrics_handle = init_metrics().context("failed to install metrics recorder")?;

    let config = AppConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Load the list and investments
    let view = Arc::new(MarketView::new());
    let storage: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(
        config.storage.dir.clone(),
        config.storage.expiry,
    ));
    let catalog = CoinbaseRestClient::new(config.catalog.rest_url.clone())?;
    let report = bootstrap(&view, &catalog, storage.as_ref()).await?;
    tracing::info!(
        source = ?report.source,
        rows = report.rows,
        investments = report.investments,
        "Watch list loaded"
    );

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    // Persistence writers
    tasks.push(tokio::spawn(run_list_writer(
        Arc::clone(&storage),
        view.subscribe_list(),
        config.storage.throttle,
        shutdown_token.clone(),
    )));
    tasks.push(tokio::spawn(run_investments_writer(
        Arc::clone(&storage),
        view.subscribe_investments(),
        shutdown_token.clone(),
    )));

    // Batch ingestion
    let (batch_tx, batch_rx) = mpsc::channel(config.feed.batch_channel_capacity);
    tasks.push(tokio::spawn(
        Arc::clone(&view).run(batch_rx, shutdown_token.clone()),
    ));

    // Feed client
    let client_config = TickerClientConfig {
        url: config.feed.ws_url.clone(),
        reconnect: ReconnectConfig::new(
            config.feed.reconnect_interval,
            config.max_reconnect_attempts(),
        ),
        flush_window: config.feed.flush_window,
    };
    let client = TickerClient::websocket(client_config, batch_tx);

    // HTTP server
    let http_state = Arc::new(HttpServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&view),
        client.subscribe_status(),
    ));
    let http_server = HttpServer::new(
        config.server.http_port,
        http_state,
        shutdown_token.clone(),
    );
    tasks.push(tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
        }
    }));

    let product_ids = if config.feed.product_ids.is_empty() {
        report.product_ids
    } else {
        config.feed.product_ids.clone()
    };
    client
        .connect(product_ids)
        .await
        .context("failed to start ticker session")?;

    tracing::info!("Ticker stream ready");

    await_shutdown(shutdown_token).await;

    client.disconnect().await;

    let drain = futures_util::future::join_all(tasks);
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Background tasks did not stop in time"
        );
    }

    tracing::info!("Ticker stream stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    tracing::info!(
        ws_url = %config.feed.ws_url,
        rest_url = %config.catalog.rest_url,
        products = config.feed.product_ids.len(),
        flush_window_ms = config.feed.flush_window.as_millis(),
        http_port = config.server.http_port,
        "Configuration loaded"
    );
    tracing::debug!(
        storage_dir = %config.storage.dir.display(),
        expiry_secs = config.storage.expiry.as_secs(),
        throttle_secs = config.storage.throttle.as_secs(),
        "Snapshot storage"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
