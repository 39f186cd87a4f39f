//! List State Store
//!
//! Owns the [`ListTable`] and notifies subscribers with an immutable
//! snapshot after every change.

use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::market::{CatalogEntry, ListItem, TickerUpdate, last_updated_label};
use crate::domain::market_list::{ListTable, MergeOutcome};
use crate::infrastructure::metrics;

/// Immutable view of the table at one point in time.
pub type ListSnapshot = Arc<[ListItem]>;

/// The single authoritative instrument table.
///
/// Mutations take the table lock, apply, and publish a new snapshot before
/// releasing it, so snapshots are published in mutation order.
#[derive(Debug)]
pub struct ListStore {
    table: Mutex<ListTable>,
    snapshot_tx: watch::Sender<ListSnapshot>,
}

impl Default for ListStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ListStore {
    /// Create an empty, unseeded store.
    #[must_use]
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(ListSnapshot::from(Vec::new()));
        Self {
            table: Mutex::new(ListTable::new()),
            snapshot_tx,
        }
    }

    /// Replace the table with rows from the catalog.
    pub fn seed(&self, entries: Vec<CatalogEntry>) {
        let mut table = self.table.lock();
        let dropped = table.seed(entries);
        if !dropped.is_empty() {
            tracing::warn!(ids = ?dropped, "Catalog contained duplicate ids, kept first occurrence");
        }
        tracing::info!(rows = table.len(), "List seeded from catalog");
        self.publish(&table);
    }

    /// Replace the table with persisted rows.
    pub fn restore(&self, rows: Vec<ListItem>) {
        let mut table = self.table.lock();
        let dropped = table.restore(rows);
        if !dropped.is_empty() {
            tracing::warn!(ids = ?dropped, "Stored list contained duplicate ids, kept first occurrence");
        }
        tracing::info!(rows = table.len(), "List restored from storage");
        self.publish(&table);
    }

    /// Merge a flushed batch, stamping rows with the current wall-clock label.
    pub fn apply_batch(&self, updates: &[TickerUpdate]) -> MergeOutcome {
        self.apply_batch_labelled(updates, &last_updated_label(Local::now()))
    }

    /// Merge a flushed batch using an explicit last-updated label.
    pub fn apply_batch_labelled(&self, updates: &[TickerUpdate], label: &str) -> MergeOutcome {
        let mut table = self.table.lock();
        let outcome = table.apply_batch(updates, label);

        if outcome.unmatched > 0 {
            tracing::debug!(unmatched = outcome.unmatched, "Dropped updates for unknown ids");
            metrics::record_unmatched_updates(outcome.unmatched as u64);
        }
        if outcome.changed() {
            self.publish(&table);
        }
        outcome
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ListSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver notified after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Whether the store has not been seeded (or was seeded empty).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    fn publish(&self, table: &ListTable) {
        self.snapshot_tx.send_replace(ListSnapshot::from(table.rows()));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    fn entry(id: &str) -> CatalogEntry {
        CatalogEntry::new(id, id, Decimal::new(1, 2))
    }

    fn update(id: &str, price: i64) -> TickerUpdate {
        TickerUpdate {
            product_id: id.to_string(),
            price: Decimal::from(price),
            volume: Decimal::ONE,
            time: Utc::now(),
            sequence: 7,
            trade_id: Some(99),
        }
    }

    #[test]
    fn seed_publishes_snapshot() {
        let store = ListStore::new();
        let mut rx = store.subscribe();
        assert!(store.is_empty());

        store.seed(vec![entry("BTC-USD"), entry("ETH-USD")]);

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unmatched_batch_does_not_notify() {
        let store = ListStore::new();
        store.seed(vec![entry("BTC-USD")]);
        let mut rx = store.subscribe();
        rx.mark_unchanged();

        let outcome = store.apply_batch(&[update("XRP-USD", 1)]);

        assert_eq!(outcome.unmatched, 1);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn matched_batch_notifies_with_merged_row() {
        let store = ListStore::new();
        store.seed(vec![entry("BTC-USD")]);
        let mut rx = store.subscribe();
        rx.mark_unchanged();

        store.apply_batch_labelled(&[update("BTC-USD", 42_000)], "11:22:33");

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot[0].price, Some(Decimal::from(42_000)));
        assert_eq!(snapshot[0].last_updated, "11:22:33");
    }

    #[test]
    fn earlier_snapshots_are_not_affected_by_later_merges() {
        let store = ListStore::new();
        store.seed(vec![entry("BTC-USD")]);
        let before = store.snapshot();

        store.apply_batch(&[update("BTC-USD", 1)]);

        assert!(before[0].price.is_none());
        assert_eq!(store.snapshot()[0].price, Some(Decimal::ONE));
    }
}
