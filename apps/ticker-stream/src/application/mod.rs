//! Application Layer - Services and port definitions.
//!
//! Services here own the mutable watch-list state and coordinate the
//! domain transforms. Ports define what the services need from the outside
//! world (feed transport, catalog, durable storage).

/// Port interfaces for external systems.
pub mod ports;

/// List store, market view, bootstrap, and persistence writers.
pub mod services;
