//! Domain Layer - Core watch-list types and pure transforms.
//!
//! Nothing in this layer performs I/O or holds locks. Services in the
//! application layer own the mutable state and call into these modules.

/// Instruments, ticker updates, connection state, and investments.
pub mod market;

/// Authoritative instrument table keyed by id.
pub mod market_list;

/// Filter and sort derivations over list snapshots.
pub mod view;

/// Valuation of held investments against current prices.
pub mod portfolio;
