//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Coinbase Exchange adapters (WebSocket ticker feed, REST catalog).
pub mod coinbase;

/// Configuration loaded from the environment.
pub mod config;

/// Health, metrics, and view API over HTTP.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// File-backed snapshot storage.
pub mod storage;

/// OpenTelemetry tracing integration.
pub mod telemetry;
