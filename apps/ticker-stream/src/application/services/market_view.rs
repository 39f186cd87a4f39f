//! Market View Service
//!
//! Owns the view inputs (filter query, sort spec, investments) next to the
//! [`ListStore`] and publishes a fully derived [`MarketSnapshot`] after any
//! of them changes.
//!
//! # Ordering
//!
//! Every mutation takes the inputs lock, mutates, then derives
//! `list → filter → sort → valuation` and publishes before releasing it.
//! Published snapshots therefore follow mutation order, and a reader never
//! sees a half-applied change such as a new sort key with a stale order.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::list_store::{ListSnapshot, ListStore};
use crate::domain::market::{CatalogEntry, Investment, ListItem, TickerBatch, TickerUpdate};
use crate::domain::market_list::MergeOutcome;
use crate::domain::portfolio::{Valuation, valuation};
use crate::domain::view::{SortKey, SortSpec, filter_rows, sort_rows};
use crate::infrastructure::metrics;

/// Everything a reader needs, derived from one consistent set of inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarketSnapshot {
    /// Rows after filtering and sorting.
    pub rows: Vec<ListItem>,
    /// `label → current price` for held instruments among `rows`.
    pub valuation: Valuation,
    /// Sort applied to `rows`.
    pub sort: SortSpec,
    /// Filter applied to `rows`.
    pub query: String,
    /// Rows in the store before filtering.
    pub total_rows: usize,
}

#[derive(Debug, Default)]
struct ViewInputs {
    query: String,
    sort: SortSpec,
    investments: Arc<[Investment]>,
}

/// Derived, read-only view over the instrument table.
#[derive(Debug)]
pub struct MarketView {
    store: ListStore,
    inputs: Mutex<ViewInputs>,
    snapshot_tx: watch::Sender<Arc<MarketSnapshot>>,
    investments_tx: watch::Sender<Arc<[Investment]>>,
}

impl Default for MarketView {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketView {
    /// Create a view over an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(MarketSnapshot::default()));
        let (investments_tx, _) = watch::channel(Arc::<[Investment]>::from(Vec::new()));
        Self {
            store: ListStore::new(),
            inputs: Mutex::new(ViewInputs::default()),
            snapshot_tx,
            investments_tx,
        }
    }

    // =========================================================================
    // List Mutations
    // =========================================================================

    /// Replace the list with catalog rows.
    pub fn seed(&self, entries: Vec<CatalogEntry>) {
        let inputs = self.inputs.lock();
        self.store.seed(entries);
        self.publish(&inputs);
    }

    /// Replace the list with persisted rows.
    pub fn restore(&self, rows: Vec<ListItem>) {
        let inputs = self.inputs.lock();
        self.store.restore(rows);
        self.publish(&inputs);
    }

    /// Merge one flushed batch and re-derive if any row changed.
    pub fn apply_batch(&self, updates: &[TickerUpdate]) -> MergeOutcome {
        let inputs = self.inputs.lock();
        let outcome = self.store.apply_batch(updates);
        if outcome.changed() {
            self.publish(&inputs);
        }
        outcome
    }

    // =========================================================================
    // View Inputs
    // =========================================================================

    /// Set the label filter.
    pub fn set_filter_query(&self, query: impl Into<String>) {
        let mut inputs = self.inputs.lock();
        inputs.query = query.into();
        self.publish(&inputs);
    }

    /// Toggle sorting on `criteria` and return the resulting spec.
    pub fn toggle_sort(&self, criteria: SortKey) -> SortSpec {
        let mut inputs = self.inputs.lock();
        inputs.sort = inputs.sort.toggled(criteria);
        tracing::info!(key = %inputs.sort.key, order = ?inputs.sort.order, "Sort changed");
        self.publish(&inputs);
        inputs.sort
    }

    /// Replace the held investments.
    pub fn set_investments(&self, investments: Vec<Investment>) {
        let mut inputs = self.inputs.lock();
        inputs.investments = Arc::from(investments);
        self.investments_tx.send_replace(Arc::clone(&inputs.investments));
        self.publish(&inputs);
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Latest derived snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver notified with every derived snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<MarketSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Current raw list in catalog order.
    #[must_use]
    pub fn list_snapshot(&self) -> ListSnapshot {
        self.store.snapshot()
    }

    /// Receiver notified whenever the raw list changes.
    #[must_use]
    pub fn subscribe_list(&self) -> watch::Receiver<ListSnapshot> {
        self.store.subscribe()
    }

    /// Receiver notified whenever the investments are replaced.
    #[must_use]
    pub fn subscribe_investments(&self) -> watch::Receiver<Arc<[Investment]>> {
        self.investments_tx.subscribe()
    }

    /// Number of rows in the underlying list.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.store.len()
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Merge batches from the streaming client until cancelled or the
    /// client side of the channel is dropped.
    pub async fn run(
        self: Arc<Self>,
        mut batches: mpsc::Receiver<TickerBatch>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("Market view ingestion cancelled");
                    return;
                }
                batch = batches.recv() => {
                    let Some(batch) = batch else {
                        tracing::info!("Batch channel closed, market view ingestion stopped");
                        return;
                    };
                    let outcome = self.apply_batch(&batch);
                    metrics::record_updates_applied(outcome.applied);
                    tracing::trace!(
                        size = batch.len(),
                        applied = outcome.applied,
                        unmatched = outcome.unmatched,
                        "Merged ticker batch"
                    );
                }
            }
        }
    }

    fn publish(&self, inputs: &ViewInputs) {
        let list = self.store.snapshot();
        let filtered = filter_rows(&list, &inputs.query);
        let rows = sort_rows(&filtered, inputs.sort);
        let valuation = valuation(&inputs.investments, &rows);

        self.snapshot_tx.send_replace(Arc::new(MarketSnapshot {
            rows,
            valuation,
            sort: inputs.sort,
            query: inputs.query.clone(),
            total_rows: list.len(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::view::SortOrder;

    fn entry(id: &str, label: &str) -> CatalogEntry {
        CatalogEntry::new(id, label, Decimal::new(1, 2))
    }

    fn update(id: &str, price: i64) -> TickerUpdate {
        TickerUpdate {
            product_id: id.to_string(),
            price: Decimal::from(price),
            volume: Decimal::from(10),
            time: Utc::now(),
            sequence: 1,
            trade_id: None,
        }
    }

    fn investment(id: &str) -> Investment {
        Investment {
            id: id.to_string(),
            label: id.to_string(),
            amount: Decimal::ONE,
            usd_invested: Decimal::from(100),
            usd_per_product_at_purchase: Decimal::from(100),
            date: 0,
        }
    }

    fn seeded_view() -> MarketView {
        let view = MarketView::new();
        view.seed(vec![
            entry("eth-usd", "ETH/USD"),
            entry("btc-usd", "BTC/USD"),
            entry("ada-usd", "ADA/USD"),
        ]);
        view
    }

    fn labels(snapshot: &MarketSnapshot) -> Vec<&str> {
        snapshot.rows.iter().map(|row| row.label.as_str()).collect()
    }

    #[test]
    fn seed_derives_sorted_snapshot() {
        let view = seeded_view();
        let snapshot = view.snapshot();

        assert_eq!(labels(&snapshot), ["ADA/USD", "BTC/USD", "ETH/USD"]);
        assert_eq!(snapshot.total_rows, 3);
    }

    #[test]
    fn filter_applies_before_sort() {
        let view = seeded_view();
        view.set_filter_query("tH");

        let snapshot = view.snapshot();
        assert_eq!(labels(&snapshot), ["ETH/USD"]);
        assert_eq!(snapshot.query, "tH");
        assert_eq!(snapshot.total_rows, 3);
    }

    #[test]
    fn toggle_sort_publishes_key_and_order_together() {
        let view = seeded_view();
        let mut rx = view.subscribe();
        rx.mark_unchanged();

        let spec = view.toggle_sort(SortKey::Price);
        assert_eq!(spec, SortSpec::new(SortKey::Price, SortOrder::Asc));
        assert_eq!(rx.borrow_and_update().sort, spec);

        let spec = view.toggle_sort(SortKey::Price);
        assert_eq!(spec.order, SortOrder::Desc);
        assert_eq!(rx.borrow_and_update().sort, spec);

        let spec = view.toggle_sort(SortKey::Price);
        assert_eq!(spec.order, SortOrder::Asc);
    }

    #[test]
    fn batch_reorders_price_sorted_view() {
        let view = seeded_view();
        view.toggle_sort(SortKey::Price);
        view.toggle_sort(SortKey::Price);

        view.apply_batch(&[update("ada-usd", 1), update("btc-usd", 42_000)]);

        let snapshot = view.snapshot();
        assert_eq!(labels(&snapshot), ["BTC/USD", "ADA/USD", "ETH/USD"]);
    }

    #[test]
    fn valuation_follows_prices_and_filter() {
        let view = seeded_view();
        view.set_investments(vec![investment("btc-usd")]);
        view.apply_batch(&[update("btc-usd", 42_000)]);

        let snapshot = view.snapshot();
        assert_eq!(
            snapshot.valuation.get("BTC/USD"),
            Some(&Some(Decimal::from(42_000)))
        );

        view.set_filter_query("eth");
        assert!(view.snapshot().valuation.is_empty());
    }

    #[test]
    fn unmatched_batch_leaves_snapshot_untouched() {
        let view = seeded_view();
        let mut rx = view.subscribe();
        rx.mark_unchanged();

        let outcome = view.apply_batch(&[update("doge-usd", 1)]);

        assert!(!outcome.changed());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn set_investments_notifies_investment_subscribers() {
        let view = MarketView::new();
        let mut rx = view.subscribe_investments();
        rx.mark_unchanged();

        view.set_investments(vec![investment("btc-usd")]);

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[tokio::test]
    async fn run_merges_batches_until_sender_dropped() {
        let view = Arc::new(seeded_view());
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(Arc::clone(&view).run(rx, CancellationToken::new()));

        tx.send(vec![update("eth-usd", 2_500)]).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let snapshot = view.snapshot();
        let eth = snapshot.rows.iter().find(|row| row.id == "eth-usd").unwrap();
        assert_eq!(eth.price, Some(Decimal::from(2_500)));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let view = Arc::new(MarketView::new());
        let (_tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&view).run(rx, cancel.clone()));

        cancel.cancel();
        handle.await.unwrap();
    }
}
