//! HTTP Server
//!
//! Health checks, Prometheus metrics, and a small API over the market view.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /readyz` - readiness probe (feed open and table seeded)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /view` - current derived snapshot
//! - `POST /view/filter` - set the filter query, body `{"query": "..."}`
//! - `POST /view/sort/{key}` - toggle sorting by `currency` or `price`
//! - `PUT /investments` - replace held investments, body `[Investment]`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::application::services::{MarketSnapshot, MarketView};
use crate::domain::market::Investment;
use crate::domain::view::SortKey;
use crate::infrastructure::coinbase::{ClientStatus, SessionPhase};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Feed connection status.
    pub feed: FeedInfo,
    /// Rows in the instrument table.
    pub rows: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Feed open.
    Healthy,
    /// Feed down but a session is working on it.
    Degraded,
    /// No session, or the session gave up.
    Unhealthy,
}

/// Feed status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Session phase.
    pub phase: SessionPhase,
    /// Whether the feed is open.
    pub connected: bool,
    /// Last reported error.
    pub error: Option<String>,
    /// Reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,
}

impl From<&ClientStatus> for FeedInfo {
    fn from(status: &ClientStatus) -> Self {
        Self {
            phase: status.phase,
            connected: status.connection.connected,
            error: status.connection.error.clone(),
            reconnect_attempts: status.attempt,
        }
    }
}

/// Body of `POST /view/filter`.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterRequest {
    /// Case-insensitive substring matched against labels.
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the HTTP server.
pub struct HttpServerState {
    version: String,
    started_at: Instant,
    view: Arc<MarketView>,
    client_status: watch::Receiver<ClientStatus>,
}

impl HttpServerState {
    /// Create new server state.
    #[must_use]
    pub fn new(
        version: String,
        view: Arc<MarketView>,
        client_status: watch::Receiver<ClientStatus>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            view,
            client_status,
        }
    }
}

// =============================================================================
// HTTP Server
// =============================================================================

/// Health, metrics and view API server.
pub struct HttpServer {
    port: u16,
    state: Arc<HttpServerState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HttpServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router over `state`.
#[must_use]
pub fn router(state: Arc<HttpServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/view", get(view_handler))
        .route("/view/filter", post(filter_handler))
        .route("/view/sort/{key}", post(sort_handler))
        .route("/investments", put(investments_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HttpServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HttpServerState>>) -> impl IntoResponse {
    let connected = state.client_status.borrow().connection.connected;

    if connected && state.view.row_count() > 0 {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

async fn view_handler(State(state): State<Arc<HttpServerState>>) -> Json<MarketSnapshot> {
    Json(MarketSnapshot::clone(&state.view.snapshot()))
}

async fn filter_handler(
    State(state): State<Arc<HttpServerState>>,
    Json(request): Json<FilterRequest>,
) -> Json<MarketSnapshot> {
    state.view.set_filter_query(request.query);
    Json(MarketSnapshot::clone(&state.view.snapshot()))
}

async fn sort_handler(
    State(state): State<Arc<HttpServerState>>,
    Path(key): Path<String>,
) -> Response {
    match key.parse::<SortKey>() {
        Ok(criteria) => {
            state.view.toggle_sort(criteria);
            Json(MarketSnapshot::clone(&state.view.snapshot())).into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn investments_handler(
    State(state): State<Arc<HttpServerState>>,
    Json(investments): Json<Vec<Investment>>,
) -> StatusCode {
    tracing::info!(count = investments.len(), "Replacing investments");
    state.view.set_investments(investments);
    StatusCode::NO_CONTENT
}

fn build_health_response(state: &HttpServerState) -> HealthResponse {
    let feed = FeedInfo::from(&*state.client_status.borrow());

    HealthResponse {
        status: determine_health_status(&feed),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed,
        rows: state.view.row_count(),
    }
}

const fn determine_health_status(feed: &FeedInfo) -> HealthStatus {
    if feed.connected {
        return HealthStatus::Healthy;
    }
    match feed.phase {
        SessionPhase::Idle => HealthStatus::Unhealthy,
        SessionPhase::Connecting
        | SessionPhase::Open
        | SessionPhase::Closed
        | SessionPhase::Errored => HealthStatus::Degraded,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::market::{CatalogEntry, ConnectionState};

    fn state_with(status: ClientStatus) -> (Arc<HttpServerState>, Arc<MarketView>) {
        let view = Arc::new(MarketView::new());
        view.seed(vec![
            CatalogEntry::new("ETH-USD", "ETH/USD", Decimal::new(1, 2)),
            CatalogEntry::new("BTC-USD", "BTC/USD", Decimal::new(1, 2)),
        ]);
        let (_tx, rx) = watch::channel(status);
        let state = Arc::new(HttpServerState::new("test".to_string(), Arc::clone(&view), rx));
        (state, view)
    }

    fn open_status() -> ClientStatus {
        ClientStatus {
            phase: SessionPhase::Open,
            connection: ConnectionState::open(),
            attempt: 0,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }

    #[test]
    fn determine_status_by_phase() {
        let mut feed = FeedInfo::from(&open_status());
        assert_eq!(determine_health_status(&feed), HealthStatus::Healthy);

        feed.connected = false;
        feed.phase = SessionPhase::Closed;
        assert_eq!(determine_health_status(&feed), HealthStatus::Degraded);

        feed.phase = SessionPhase::Idle;
        assert_eq!(determine_health_status(&feed), HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn readyz_requires_open_feed() {
        let (state, _view) = state_with(ClientStatus::default());
        let response = router(state)
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let (state, _view) = state_with(open_status());
        let response = router(state)
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_feed_and_rows() {
        let (state, _view) = state_with(open_status());
        let response = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["feed"]["phase"], "open");
        assert_eq!(json["rows"], 2);
    }

    #[tokio::test]
    async fn view_is_sorted_by_label() {
        let (state, _view) = state_with(open_status());
        let response = router(state)
            .oneshot(Request::get("/view").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["rows"][0]["id"], "BTC-USD");
        assert_eq!(json["rows"][1]["id"], "ETH-USD");
        assert_eq!(json["sort"]["key"], "currency");
    }

    #[tokio::test]
    async fn filter_narrows_rows() {
        let (state, view) = state_with(open_status());
        let response = router(state)
            .oneshot(
                Request::post("/view/filter")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query":"eth"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["rows"].as_array().unwrap().len(), 1);
        assert_eq!(view.snapshot().query, "eth");
    }

    #[tokio::test]
    async fn sort_toggles_and_rejects_unknown_keys() {
        let (state, view) = state_with(open_status());
        let app = router(state);

        let response = app
            .clone()
            .oneshot(Request::post("/view/sort/currency").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(view.snapshot().rows[0].id, "ETH-USD");

        let response = app
            .oneshot(Request::post("/view/sort/volume").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "unknown sort key: volume");
    }

    #[tokio::test]
    async fn investments_replace_holdings() {
        let (state, view) = state_with(open_status());
        let body = r#"[{
            "id": "BTC-USD",
            "label": "BTC/USD",
            "amount": "0.5",
            "usdInvested": "20000",
            "usdPerProductAtPurchase": "40000",
            "date": 1700000000000
        }]"#;

        let response = router(state)
            .oneshot(
                Request::put("/investments")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(view.subscribe_investments().borrow().len(), 1);
        assert!(view.snapshot().valuation.contains_key("BTC/USD"));
    }
}
