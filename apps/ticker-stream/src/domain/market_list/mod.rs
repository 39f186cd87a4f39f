//! Instrument Table
//!
//! The authoritative table of [`ListItem`] rows, merged from two sources:
//! the reference catalog (which creates rows) and the ticker feed (which
//! only moves prices).
//!
//! # Invariants
//!
//! - Exactly one row per id.
//! - Rows are never removed once seeded; re-seeding replaces the table.
//! - A merge writes price, volume and the last-updated label together.
//!
//! Catalog order is preserved so that an unfiltered, unsorted read returns
//! rows the way the catalog listed them.

use std::collections::HashMap;

use crate::domain::market::{CatalogEntry, ListItem, TickerUpdate};

/// Outcome of merging one batch into the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Updates that matched a row and were written.
    pub applied: usize,
    /// Updates whose id has no row (catalog/stream race).
    pub unmatched: usize,
}

impl MergeOutcome {
    /// Whether the merge changed any row.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Instrument rows in catalog order with an id index.
#[derive(Debug, Clone, Default)]
pub struct ListTable {
    rows: Vec<ListItem>,
    index: HashMap<String, usize>,
}

impl ListTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table with unpriced rows built from catalog entries.
    ///
    /// Returns the ids that were dropped because an earlier entry already
    /// used them.
    pub fn seed(&mut self, entries: impl IntoIterator<Item = CatalogEntry>) -> Vec<String> {
        self.replace(entries.into_iter().map(ListItem::from))
    }

    /// Replace the table with previously persisted rows, prices included.
    ///
    /// Returns the ids that were dropped as duplicates.
    pub fn restore(&mut self, rows: impl IntoIterator<Item = ListItem>) -> Vec<String> {
        self.replace(rows)
    }

    fn replace(&mut self, rows: impl IntoIterator<Item = ListItem>) -> Vec<String> {
        self.rows.clear();
        self.index.clear();

        let mut duplicates = Vec::new();
        for row in rows {
            if self.index.contains_key(&row.id) {
                duplicates.push(row.id);
                continue;
            }
            self.index.insert(row.id.clone(), self.rows.len());
            self.rows.push(row);
        }
        duplicates
    }

    /// Merge a batch of ticker updates in arrival order.
    ///
    /// Updates for unknown ids are skipped. When an id appears more than once
    /// the later update wins because it is written last.
    pub fn apply_batch(&mut self, updates: &[TickerUpdate], label: &str) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for update in updates {
            let Some(&position) = self.index.get(&update.product_id) else {
                outcome.unmatched += 1;
                continue;
            };

            let row = &mut self.rows[position];
            row.price = Some(update.price);
            row.volume = Some(update.volume);
            row.last_updated = label.to_string();
            outcome.applied += 1;
        }

        outcome
    }

    /// Look up a row by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ListItem> {
        self.index.get(id).map(|&position| &self.rows[position])
    }

    /// Rows in catalog order.
    #[must_use]
    pub fn rows(&self) -> &[ListItem] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
