//! Prometheus Metrics Module
//!
//! Exposes feed, merge and storage metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Messages**: feed messages received by type, parse failures
//! - **Batches**: flushed batches and their sizes, unmatched updates
//! - **Connection**: connected gauge and reconnect attempts
//! - **Storage**: persistence writes by kind and outcome
//!
//! # Integration
//!
//! Metrics are rendered at `/metrics` on the HTTP server port. Recording
//! before [`init_metrics`] is a no-op.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and describe every metric.
///
/// Calling this again returns the handle from the first call.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "ticker_stream_messages_received_total",
        "Feed messages received by type"
    );
    describe_counter!(
        "ticker_stream_parse_failures_total",
        "Feed messages that could not be decoded"
    );

    describe_counter!(
        "ticker_stream_batches_flushed_total",
        "Throttled batches published to the list"
    );
    describe_histogram!(
        "ticker_stream_batch_size",
        "Ticker updates per flushed batch"
    );
    describe_counter!(
        "ticker_stream_updates_applied_total",
        "Ticker updates merged into a row"
    );
    describe_counter!(
        "ticker_stream_unmatched_updates_total",
        "Ticker updates dropped because no row has their id"
    );

    describe_gauge!(
        "ticker_stream_connected",
        "1 while the feed is open and subscribed"
    );
    describe_counter!(
        "ticker_stream_reconnects_total",
        "Feed reconnection attempts"
    );
    describe_counter!(
        "ticker_stream_transport_errors_total",
        "Feed transport failures"
    );

    describe_counter!(
        "ticker_stream_persistence_writes_total",
        "Snapshot writes by kind and outcome"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for inbound feed message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Price update.
    Ticker,
    /// Subscription acknowledgement.
    Subscriptions,
    /// Server-reported error.
    Error,
    /// A type this client does not handle.
    Unknown,
}

impl MessageKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Subscriptions => "subscriptions",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// Record a decoded feed message.
pub fn record_message_received(kind: MessageKind) {
    counter!(
        "ticker_stream_messages_received_total",
        "message_type" => kind.as_str()
    )
    .increment(1);
}

/// Record a feed message that failed to decode.
pub fn record_parse_failure() {
    counter!("ticker_stream_parse_failures_total").increment(1);
}

/// Record a flushed batch.
pub fn record_batch_flushed(size: usize) {
    counter!("ticker_stream_batches_flushed_total").increment(1);
    histogram!("ticker_stream_batch_size").record(size as f64);
}

/// Record updates merged into a row.
pub fn record_updates_applied(applied: usize) {
    counter!("ticker_stream_updates_applied_total").increment(applied as u64);
}

/// Record updates dropped for unknown ids.
pub fn record_unmatched_updates(count: u64) {
    counter!("ticker_stream_unmatched_updates_total").increment(count);
}

/// Update the connected gauge.
pub fn set_connected(connected: bool) {
    gauge!("ticker_stream_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("ticker_stream_reconnects_total").increment(1);
}

/// Record a transport failure.
pub fn record_transport_error(error_type: &'static str) {
    counter!(
        "ticker_stream_transport_errors_total",
        "error_type" => error_type
    )
    .increment(1);
}

/// Record a snapshot write.
pub fn record_persistence_write(kind: &'static str, ok: bool) {
    counter!(
        "ticker_stream_persistence_writes_total",
        "kind" => kind,
        "outcome" => if ok { "ok" } else { "error" }
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
