//! Investment Valuation
//!
//! Joins held positions against the current (filtered, sorted) rows to
//! produce a `label → current price` mapping.

use std::collections::HashSet;

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::domain::market::{Investment, ListItem};

/// Current price per held instrument, keyed by row label, in the order the
/// rows were given.
///
/// A `None` price means the instrument is held and listed but has not
/// traded since the list was seeded.
pub type Valuation = IndexMap<String, Option<Decimal>>;

/// Value held investments at the prices in `sorted_rows`.
///
/// Investments whose instrument is not among `sorted_rows` are left out.
#[must_use]
pub fn valuation(investments: &[Investment], sorted_rows: &[ListItem]) -> Valuation {
    let held: HashSet<&str> = investments.iter().map(|inv| inv.id.as_str()).collect();

    sorted_rows
        .iter()
        .filter(|row| held.contains(row.id.as_str()))
        .map(|row| (row.label.clone(), row.price))
        .collect()
}
